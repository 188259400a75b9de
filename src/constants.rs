//! Cross-cutting, shared defaults.
//!
//! Thresholds and concurrency limits are policy knobs. Every value here can be overridden
//! through [`crate::config::Config`]; nothing in the pipeline reads these directly except as
//! a `Default`.

/// Prefilter cosine threshold. Tuned to favor recall: stage 2 rejects false positives.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.55;

/// Most prefilter candidates per article handed to the verifier, best scores first.
pub const DEFAULT_MAX_CANDIDATES: usize = 5;

/// Minimum verifier confidence for a `matched=true` judgment to become a stored match.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.70;

/// Concurrent LLM verification sessions across the whole pipeline.
pub const DEFAULT_VERIFIER_CONCURRENCY: usize = 4;

/// Articles processed in parallel within one run.
pub const DEFAULT_ARTICLE_CONCURRENCY: usize = 2;

/// Leading characters of an article body sent to the embedding model.
pub const DEFAULT_MAX_EMBED_CHARS: usize = 8_000;

/// Leading characters of an article body quoted in the verification prompt.
pub const DEFAULT_EXCERPT_CHARS: usize = 1_000;

/// Per-call timeout for embedding, LLM and storage calls.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 750;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 10_000;
pub const DEFAULT_RETRY_JITTER: f64 = 0.2;

/// Per-subscriber event buffer before events start being dropped.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Consecutive exhausted failures of one dependency before a run is aborted.
pub const DEFAULT_FAILURE_BUDGET: u32 = 5;

pub const DEFAULT_MAX_ARTICLES_PER_SOURCE: usize = 10;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_EMBED_MODEL: &str = "bge-large";
pub const DEFAULT_LLM_MODEL: &str = "llama3.1:8b";

/// Returns `true` if `value` is a usable threshold (finite, within `[0, 1]`).
pub fn is_valid_threshold(value: f32) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}
