//! Newsmatch library crate (used by the binary and integration tests).
//!
//! Matches freshly fetched news articles against a list of standing questions and topics in
//! two stages: a cheap embedding-similarity prefilter, then an LLM verifier that confirms or
//! rejects each candidate pair. Confirmed matches are persisted with the article in one atomic
//! commit, and an article already stored is never processed again.
//!
//! # Public API Surface
//!
//! ## Pipeline
//! - [`MatchPipeline`], [`PipelineConfig`], [`RunSummary`], [`CancellationSignal`]
//! - [`EmbeddingPrefilter`] (stage 1) and [`LlmVerifier`] (stage 2)
//! - [`EventEmitter`], [`ProgressEvent`] - per-article progress fan-out
//!
//! ## Data
//! - [`Article`], [`RawArticle`], [`ArticleId`]
//! - [`Interest`], [`InterestSnapshot`], [`InterestStore`]
//! - [`MatchRecord`], [`MatchFilter`]
//!
//! ## Services and storage
//! - [`EmbeddingService`], [`OllamaEmbedder`]
//! - [`LlmService`], [`GenaiLlm`]
//! - [`MatchStore`], [`SqliteStore`], [`MemoryStore`], [`PersistenceGateway`]
//! - [`ArticleSource`], [`JsonLinesSource`]
//!
//! ## Test/Mock Support
//! Mock services are available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod article;
pub mod config;
pub mod constants;
pub mod embedding;
pub mod events;
pub mod hashing;
pub mod interest;
pub mod llm;
pub mod pipeline;
pub mod prefilter;
pub mod retry;
pub mod sources;
pub mod storage;
pub mod verifier;

pub use article::{Article, ArticleId, RawArticle, canonicalize_url};
pub use config::{Config, ConfigError};
pub use embedding::{EmbeddingError, EmbeddingService, OllamaEmbedConfig, OllamaEmbedder};
#[cfg(any(test, feature = "mock"))]
pub use embedding::MockEmbedder;
pub use events::{
    ArticleProgress, ArticleStatus, EventEmitter, EventKind, EventSubscriber, ProgressEvent,
};
pub use interest::{
    FileInterestSource, Interest, InterestError, InterestKind, InterestSnapshot, InterestSource,
    InterestStore,
};
pub use llm::{GenaiLlm, LlmError, LlmService};
#[cfg(any(test, feature = "mock"))]
pub use llm::MockLlm;
pub use pipeline::{
    ArticleOutcome, CancellationSignal, Dependency, FailureKind, MatchPipeline, PipelineConfig,
    PipelineError, RunStats, RunSummary,
};
pub use prefilter::{CandidatePair, EmbeddingPrefilter, PrefilterError};
pub use retry::{RetryPolicy, Retryable};
pub use sources::{
    ArticleSource, FetchedBatch, JsonLinesSource, SourceError, VecSource, collect_batch,
};
pub use storage::{
    MatchFilter, MatchRecord, MatchStore, MemoryStore, PersistenceGateway, SqliteStore,
    StorageError,
};
pub use verifier::{LlmVerifier, Verdict, VerificationResponse, VerifierError};
