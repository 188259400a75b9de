//! Article model.
//!
//! [`RawArticle`] is what a fetch source yields; [`Article`] is the immutable record the
//! pipeline and storage work with. The id is derived once, from the canonical URL when one is
//! present and from the content otherwise.

#[cfg(test)]
mod tests;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hashing::{article_id_from_content, article_id_from_url};

/// Stable article identifier (`a-` followed by 16 hex chars).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleId(String);

impl ArticleId {
    /// Wraps an existing id (e.g. one read back from storage).
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ArticleId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Article-shaped record as produced by a fetch source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawArticle {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "content")]
    pub body: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, alias = "date")]
    pub published_at: Option<DateTime<Utc>>,
}

/// Immutable article record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    /// Canonical URL, if the source provided one.
    pub url: Option<String>,
    pub title: String,
    pub body: String,
    pub source: String,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
}

impl Article {
    /// Builds an article from a fetched record.
    ///
    /// `default_source` is used when the record does not name its source.
    pub fn from_raw(raw: RawArticle, default_source: &str, fetched_at: DateTime<Utc>) -> Self {
        let url = raw
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(canonicalize_url);

        let id = match &url {
            Some(canonical) => article_id_from_url(canonical),
            None => article_id_from_content(&raw.title, &raw.body),
        };

        let source = raw
            .source
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| default_source.to_string());

        Self {
            id: ArticleId(id),
            url,
            title: raw.title.trim().to_string(),
            body: raw.body,
            source,
            published_at: raw.published_at,
            fetched_at,
        }
    }

    /// Text to embed: the leading `max_chars` of the body, or the title when the body is blank.
    ///
    /// Returns `None` when there is nothing to embed.
    pub fn embedding_text(&self, max_chars: usize) -> Option<&str> {
        let body = self.body.trim();
        if !body.is_empty() {
            return Some(truncate_chars(body, max_chars));
        }
        let title = self.title.trim();
        (!title.is_empty()).then_some(title)
    }

    /// Leading `max_chars` of the body, for prompts and previews.
    pub fn excerpt(&self, max_chars: usize) -> &str {
        truncate_chars(self.body.trim(), max_chars)
    }
}

/// Returns at most the first `max_chars` characters of `text` (never splits a char).
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Normalizes a URL so trivially different links to the same article share one id.
///
/// Lower-cases scheme and host, drops the fragment and `utm_*` tracking parameters, and
/// strips trailing slashes from the path. Inputs without a scheme are only trimmed.
pub fn canonicalize_url(url: &str) -> String {
    let url = url.trim();
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };

    let rest = rest.split('#').next().unwrap_or_default();
    let (location, query) = match rest.split_once('?') {
        Some((location, query)) => (location, Some(query)),
        None => (rest, None),
    };
    let (host, path) = match location.find('/') {
        Some(idx) => location.split_at(idx),
        None => (location, ""),
    };

    let mut canonical = format!(
        "{}://{}{}",
        scheme.to_ascii_lowercase(),
        host.to_ascii_lowercase(),
        path.trim_end_matches('/')
    );

    if let Some(query) = query {
        let kept: Vec<&str> = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .filter(|pair| !pair.to_ascii_lowercase().starts_with("utm_"))
            .collect();
        if !kept.is_empty() {
            canonical.push('?');
            canonical.push_str(&kept.join("&"));
        }
    }

    canonical
}
