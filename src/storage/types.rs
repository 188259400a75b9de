use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::article::{Article, ArticleId};
use crate::interest::InterestKind;

/// Result of an idempotent write: the stored value either way.
#[derive(Debug, Clone, PartialEq)]
pub enum Upsert<T> {
    Inserted(T),
    /// The key was already present; carries the prior record unchanged.
    Existing(T),
}

impl<T> Upsert<T> {
    pub fn is_inserted(&self) -> bool {
        matches!(self, Upsert::Inserted(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Upsert::Inserted(value) | Upsert::Existing(value) => value,
        }
    }
}

/// A confirmed (article, interest) match. Keyed on `(article_id, interest_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub article_id: ArticleId,
    pub interest_id: String,
    pub interest_kind: InterestKind,
    pub interest_text: String,
    pub verified: bool,
    pub confidence: f32,
    pub explanation: String,
    /// Prefilter score that let the pair through.
    pub similarity: f32,
    pub decided_at: DateTime<Utc>,
}

/// Filter for [`MatchStore::query_matches`](super::MatchStore::query_matches).
///
/// Empty fields match everything. Results are ordered newest decision first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchFilter {
    pub article_id: Option<ArticleId>,
    pub interest_id: Option<String>,
    /// Inclusive lower bound on `decided_at`.
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `decided_at`.
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl MatchFilter {
    pub fn for_article(article_id: ArticleId) -> Self {
        Self {
            article_id: Some(article_id),
            ..Default::default()
        }
    }

    pub fn for_interest(interest_id: impl Into<String>) -> Self {
        Self {
            interest_id: Some(interest_id.into()),
            ..Default::default()
        }
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// `true` if `record` passes every set field (ignores `limit`).
    pub fn accepts(&self, record: &MatchRecord) -> bool {
        self.article_id
            .as_ref()
            .is_none_or(|id| *id == record.article_id)
            && self
                .interest_id
                .as_ref()
                .is_none_or(|id| *id == record.interest_id)
            && self.since.is_none_or(|since| record.decided_at >= since)
            && self.until.is_none_or(|until| record.decided_at < until)
    }
}

/// Outcome of committing one article with its matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitReceipt {
    pub article_inserted: bool,
    pub matches_inserted: usize,
    pub matches_existing: usize,
}

/// A stored article with its matches, as the UI layer lists them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredArticle {
    pub article: Article,
    pub matches: Vec<MatchRecord>,
}
