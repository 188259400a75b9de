use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::article::ArticleId;
use crate::pipeline::RunStats;

/// Terminal state of one article, as reported to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    Matched,
    Rejected,
    Errored,
    Skipped,
    Cancelled,
}

impl ArticleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Matched => "matched",
            ArticleStatus::Rejected => "rejected",
            ArticleStatus::Errored => "errored",
            ArticleStatus::Skipped => "skipped",
            ArticleStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub interest_id: String,
    pub confidence: f32,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleProgress {
    pub article_id: ArticleId,
    pub title: String,
    pub status: ArticleStatus,
    /// Interests that cleared the prefilter.
    pub candidates: usize,
    pub matches: Vec<MatchSummary>,
    /// Candidate pairs whose verification failed after retries.
    pub errored_pairs: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    RunStarted {
        articles: usize,
        interests: usize,
        interest_version: u64,
    },
    ArticleCompleted(ArticleProgress),
    RunCompleted {
        stats: RunStats,
    },
    RunAborted {
        reason: String,
        committed: usize,
    },
}

/// One progress notification. `seq` increases per emitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub seq: u64,
    pub run_id: Uuid,
    pub emitted_at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}
