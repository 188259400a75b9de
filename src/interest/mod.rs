//! Interest list: standing questions and topics.
//!
//! Interests are parsed from plain text lines, normalized, and frozen into versioned
//! [`InterestSnapshot`]s. A run holds one snapshot for its whole lifetime; reloading the list
//! produces a new snapshot instead of mutating the old one.

pub mod error;
pub mod snapshot;
pub mod source;

#[cfg(test)]
mod tests;

pub use error::InterestError;
pub use snapshot::{InterestSnapshot, InterestStore};
pub use source::{FileInterestSource, InterestSource, InterestTexts, StaticInterestSource};

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::hashing::interest_id;

/// Whether an interest is a question to be answered or a topic to be followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterestKind {
    Question,
    Topic,
}

impl InterestKind {
    /// Prefix used for content-derived ids.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            InterestKind::Question => "q",
            InterestKind::Topic => "t",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InterestKind::Question => "question",
            InterestKind::Topic => "topic",
        }
    }
}

impl fmt::Display for InterestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InterestKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "question" | "q" => Ok(Self::Question),
            "topic" | "t" => Ok(Self::Topic),
            other => Err(format!("unknown interest kind: {}", other)),
        }
    }
}

/// A single question or topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interest {
    pub id: String,
    pub kind: InterestKind,
    pub text: String,
    /// Precomputed embedding; when present the prefilter uses it instead of calling the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Arc<Vec<f32>>>,
}

impl Interest {
    /// Creates an interest with an explicit id.
    pub fn new(
        id: impl Into<String>,
        kind: InterestKind,
        text: impl Into<String>,
    ) -> Result<Self, InterestError> {
        let text = normalize_line(&text.into());
        if text.is_empty() {
            return Err(InterestError::EmptyText);
        }
        Ok(Self {
            id: id.into(),
            kind,
            text,
            embedding: None,
        })
    }

    /// Creates an interest whose id is derived from its kind and text.
    pub fn derived(kind: InterestKind, text: &str) -> Result<Self, InterestError> {
        let text = normalize_line(text);
        if text.is_empty() {
            return Err(InterestError::EmptyText);
        }
        Ok(Self {
            id: interest_id(kind.id_prefix(), &text),
            kind,
            text,
            embedding: None,
        })
    }

    /// Attaches a precomputed embedding.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(Arc::new(embedding));
        self
    }
}

/// Strips list markers and surrounding whitespace from a line.
fn normalize_line(line: &str) -> String {
    line.trim()
        .trim_start_matches(['-', '*', '+'])
        .trim()
        .to_string()
}

/// Parses one interest per line.
///
/// Blank lines and markdown headings are skipped; duplicates (case-insensitive) collapse to
/// the first occurrence.
pub fn parse_interest_lines(text: &str, kind: InterestKind) -> Vec<Interest> {
    let mut seen = HashSet::new();
    text.lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .filter_map(|line| Interest::derived(kind, line).ok())
        .filter(|interest| seen.insert(interest.id.clone()))
        .collect()
}
