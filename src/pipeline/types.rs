use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::article::ArticleId;
use crate::constants::{
    DEFAULT_ARTICLE_CONCURRENCY, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_FAILURE_BUDGET,
    DEFAULT_MAX_CANDIDATES, DEFAULT_SIMILARITY_THRESHOLD, DEFAULT_VERIFIER_CONCURRENCY,
    is_valid_threshold,
};
use crate::events::ArticleStatus;
use crate::storage::MatchRecord;

/// Policy knobs for one pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Minimum cosine similarity for a pair to reach the verifier.
    pub similarity_threshold: f32,
    /// Cap on candidates per article; `None` sends every pair above the threshold.
    pub max_candidates: Option<usize>,
    /// Minimum verifier confidence for a `match` to be stored.
    pub confidence_threshold: f32,
    /// Verifier calls in flight across the whole pipeline.
    pub verifier_concurrency: usize,
    /// Articles processed in parallel.
    pub article_concurrency: usize,
    /// Consecutive exhausted failures of one dependency that abort a run.
    pub failure_budget: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            max_candidates: Some(DEFAULT_MAX_CANDIDATES),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            verifier_concurrency: DEFAULT_VERIFIER_CONCURRENCY,
            article_concurrency: DEFAULT_ARTICLE_CONCURRENCY,
            failure_budget: DEFAULT_FAILURE_BUDGET,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !is_valid_threshold(self.similarity_threshold) {
            return Err(format!(
                "similarity_threshold must be within [0, 1], got {}",
                self.similarity_threshold
            ));
        }
        if !is_valid_threshold(self.confidence_threshold) {
            return Err(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            ));
        }
        if self.max_candidates == Some(0) {
            return Err("max_candidates must be at least 1 when set".to_string());
        }
        if self.verifier_concurrency == 0 {
            return Err("verifier_concurrency must be at least 1".to_string());
        }
        if self.article_concurrency == 0 {
            return Err("article_concurrency must be at least 1".to_string());
        }
        if self.failure_budget == 0 {
            return Err("failure_budget must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Failure categories for a single article or pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Service kept failing after retries (timeouts, refused connections).
    TransientService,
    /// The article itself cannot be processed.
    PermanentInput,
    /// Atomic commit failed.
    Storage,
}

/// External dependencies whose total loss aborts a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dependency {
    Embedding,
    Llm,
    Storage,
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Dependency::Embedding => "embedding service",
            Dependency::Llm => "LLM service",
            Dependency::Storage => "storage",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleFailure {
    pub kind: FailureKind,
    pub message: String,
}

/// Final result for one article of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleOutcome {
    pub article_id: ArticleId,
    pub title: String,
    pub status: ArticleStatus,
    /// The article was embedded and compared against the interests.
    pub prefiltered: bool,
    pub candidates: usize,
    /// Confirmed matches (persisted when `committed`).
    pub matches: Vec<MatchRecord>,
    pub verified_pairs: usize,
    pub unverified_pairs: usize,
    pub errored_pairs: usize,
    pub committed: bool,
    pub failure: Option<ArticleFailure>,
}

impl ArticleOutcome {
    pub(crate) fn new(article_id: ArticleId, title: String, status: ArticleStatus) -> Self {
        Self {
            article_id,
            title,
            status,
            prefiltered: false,
            candidates: 0,
            matches: Vec::new(),
            verified_pairs: 0,
            unverified_pairs: 0,
            errored_pairs: 0,
            committed: false,
            failure: None,
        }
    }
}

/// Counters for one processing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub fetched: usize,
    pub skipped: usize,
    /// Articles that made it through the prefilter.
    pub prefiltered: usize,
    pub candidate_pairs: usize,
    /// Pairs with a parsed verifier judgment.
    pub verified_pairs: usize,
    pub unverified_pairs: usize,
    pub errored_pairs: usize,
    pub matched: usize,
    pub match_records: usize,
    pub rejected: usize,
    pub errored: usize,
    pub cancelled: usize,
    pub committed: usize,
}

impl RunStats {
    pub(crate) fn record(&mut self, outcome: &ArticleOutcome) {
        match outcome.status {
            ArticleStatus::Matched => self.matched += 1,
            ArticleStatus::Rejected => self.rejected += 1,
            ArticleStatus::Errored => self.errored += 1,
            ArticleStatus::Skipped => self.skipped += 1,
            ArticleStatus::Cancelled => self.cancelled += 1,
        }
        if outcome.committed {
            self.committed += 1;
            self.match_records += outcome.matches.len();
        }
        if outcome.prefiltered {
            self.prefiltered += 1;
        }
        self.candidate_pairs += outcome.candidates;
        self.verified_pairs += outcome.verified_pairs;
        self.unverified_pairs += outcome.unverified_pairs;
        self.errored_pairs += outcome.errored_pairs;
    }
}

/// Everything a finished (or aborted) run reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub interest_version: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub cancelled: bool,
    pub stats: RunStats,
    pub outcomes: Vec<ArticleOutcome>,
}

impl RunSummary {
    pub fn outcome(&self, article_id: &ArticleId) -> Option<&ArticleOutcome> {
        self.outcomes.iter().find(|o| o.article_id == *article_id)
    }
}
