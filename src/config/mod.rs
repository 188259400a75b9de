//! Environment-backed configuration.
//!
//! Every setting has a default. Override with `NEWSMATCH_*` environment variables.

pub mod error;

#[cfg(test)]
mod tests;

pub use error::ConfigError;

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_ARTICLE_CONCURRENCY, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_EMBED_MODEL,
    DEFAULT_EVENT_CAPACITY, DEFAULT_EXCERPT_CHARS, DEFAULT_FAILURE_BUDGET, DEFAULT_LLM_MODEL,
    DEFAULT_MAX_ARTICLES_PER_SOURCE, DEFAULT_MAX_CANDIDATES, DEFAULT_MAX_EMBED_CHARS,
    DEFAULT_OLLAMA_URL, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_RETRY_BASE_DELAY_MS,
    DEFAULT_RETRY_MAX_ATTEMPTS, DEFAULT_SIMILARITY_THRESHOLD, DEFAULT_VERIFIER_CONCURRENCY,
    is_valid_threshold,
};
use crate::embedding::OllamaEmbedConfig;
use crate::pipeline::PipelineConfig;
use crate::retry::RetryPolicy;

/// Runtime configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `NEWSMATCH_*` overrides on top of defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// SQLite database file. Default: `./.data/newsmatch.db`.
    pub db_path: PathBuf,

    /// Question list, one per line. Default: `./question_list.md`.
    pub questions_path: PathBuf,

    /// Topic list, one per line. Default: `./topic_list.md`.
    pub topics_path: PathBuf,

    /// JSON-lines article feeds. Default: `./articles.jsonl`.
    ///
    /// Read from a comma-separated list.
    pub articles_paths: Vec<PathBuf>,

    /// Ollama endpoint for embeddings. Default: `http://localhost:11434`.
    pub ollama_url: String,

    pub embed_model: String,

    /// Model name handed to `genai`; the provider is picked from the name.
    pub llm_model: String,

    pub similarity_threshold: f32,

    /// Candidates per article sent to the verifier. `0` removes the cap. Default: 5.
    pub max_candidates: usize,

    pub confidence_threshold: f32,
    pub verifier_concurrency: usize,
    pub article_concurrency: usize,
    pub max_embed_chars: usize,
    pub excerpt_chars: usize,
    pub request_timeout_secs: u64,
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub event_capacity: usize,
    pub failure_budget: u32,
    pub max_articles_per_source: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./.data/newsmatch.db"),
            questions_path: PathBuf::from("./question_list.md"),
            topics_path: PathBuf::from("./topic_list.md"),
            articles_paths: vec![PathBuf::from("./articles.jsonl")],
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            max_candidates: DEFAULT_MAX_CANDIDATES,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            verifier_concurrency: DEFAULT_VERIFIER_CONCURRENCY,
            article_concurrency: DEFAULT_ARTICLE_CONCURRENCY,
            max_embed_chars: DEFAULT_MAX_EMBED_CHARS,
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            retry_max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            failure_budget: DEFAULT_FAILURE_BUDGET,
            max_articles_per_source: DEFAULT_MAX_ARTICLES_PER_SOURCE,
        }
    }
}

impl Config {
    const ENV_DB_PATH: &'static str = "NEWSMATCH_DB_PATH";
    const ENV_QUESTIONS_PATH: &'static str = "NEWSMATCH_QUESTIONS_PATH";
    const ENV_TOPICS_PATH: &'static str = "NEWSMATCH_TOPICS_PATH";
    const ENV_ARTICLES_PATH: &'static str = "NEWSMATCH_ARTICLES_PATH";
    const ENV_OLLAMA_URL: &'static str = "NEWSMATCH_OLLAMA_URL";
    const ENV_EMBED_MODEL: &'static str = "NEWSMATCH_EMBED_MODEL";
    const ENV_LLM_MODEL: &'static str = "NEWSMATCH_LLM_MODEL";
    const ENV_SIMILARITY_THRESHOLD: &'static str = "NEWSMATCH_SIMILARITY_THRESHOLD";
    const ENV_MAX_CANDIDATES: &'static str = "NEWSMATCH_MAX_CANDIDATES";
    const ENV_CONFIDENCE_THRESHOLD: &'static str = "NEWSMATCH_CONFIDENCE_THRESHOLD";
    const ENV_VERIFIER_CONCURRENCY: &'static str = "NEWSMATCH_VERIFIER_CONCURRENCY";
    const ENV_ARTICLE_CONCURRENCY: &'static str = "NEWSMATCH_ARTICLE_CONCURRENCY";
    const ENV_MAX_EMBED_CHARS: &'static str = "NEWSMATCH_MAX_EMBED_CHARS";
    const ENV_EXCERPT_CHARS: &'static str = "NEWSMATCH_EXCERPT_CHARS";
    const ENV_REQUEST_TIMEOUT_SECS: &'static str = "NEWSMATCH_REQUEST_TIMEOUT_SECS";
    const ENV_RETRY_MAX_ATTEMPTS: &'static str = "NEWSMATCH_RETRY_MAX_ATTEMPTS";
    const ENV_RETRY_BASE_DELAY_MS: &'static str = "NEWSMATCH_RETRY_BASE_DELAY_MS";
    const ENV_EVENT_CAPACITY: &'static str = "NEWSMATCH_EVENT_CAPACITY";
    const ENV_FAILURE_BUDGET: &'static str = "NEWSMATCH_FAILURE_BUDGET";
    const ENV_MAX_ARTICLES_PER_SOURCE: &'static str = "NEWSMATCH_MAX_ARTICLES_PER_SOURCE";

    /// Every variable [`Config::from_env`] reads.
    pub const ENV_VARS: [&'static str; 20] = [
        Self::ENV_DB_PATH,
        Self::ENV_QUESTIONS_PATH,
        Self::ENV_TOPICS_PATH,
        Self::ENV_ARTICLES_PATH,
        Self::ENV_OLLAMA_URL,
        Self::ENV_EMBED_MODEL,
        Self::ENV_LLM_MODEL,
        Self::ENV_SIMILARITY_THRESHOLD,
        Self::ENV_MAX_CANDIDATES,
        Self::ENV_CONFIDENCE_THRESHOLD,
        Self::ENV_VERIFIER_CONCURRENCY,
        Self::ENV_ARTICLE_CONCURRENCY,
        Self::ENV_MAX_EMBED_CHARS,
        Self::ENV_EXCERPT_CHARS,
        Self::ENV_REQUEST_TIMEOUT_SECS,
        Self::ENV_RETRY_MAX_ATTEMPTS,
        Self::ENV_RETRY_BASE_DELAY_MS,
        Self::ENV_EVENT_CAPACITY,
        Self::ENV_FAILURE_BUDGET,
        Self::ENV_MAX_ARTICLES_PER_SOURCE,
    ];

    /// Loads configuration from environment variables (falling back to defaults).
    ///
    /// A variable that is set but unparsable is an error, not a silent default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            db_path: Self::parse_path_from_env(Self::ENV_DB_PATH, defaults.db_path),
            questions_path: Self::parse_path_from_env(
                Self::ENV_QUESTIONS_PATH,
                defaults.questions_path,
            ),
            topics_path: Self::parse_path_from_env(Self::ENV_TOPICS_PATH, defaults.topics_path),
            articles_paths: Self::parse_path_list_from_env(
                Self::ENV_ARTICLES_PATH,
                defaults.articles_paths,
            ),
            ollama_url: Self::parse_string_from_env(Self::ENV_OLLAMA_URL, defaults.ollama_url),
            embed_model: Self::parse_string_from_env(Self::ENV_EMBED_MODEL, defaults.embed_model),
            llm_model: Self::parse_string_from_env(Self::ENV_LLM_MODEL, defaults.llm_model),
            similarity_threshold: Self::parse_from_env(
                Self::ENV_SIMILARITY_THRESHOLD,
                defaults.similarity_threshold,
            )?,
            max_candidates: Self::parse_from_env(
                Self::ENV_MAX_CANDIDATES,
                defaults.max_candidates,
            )?,
            confidence_threshold: Self::parse_from_env(
                Self::ENV_CONFIDENCE_THRESHOLD,
                defaults.confidence_threshold,
            )?,
            verifier_concurrency: Self::parse_from_env(
                Self::ENV_VERIFIER_CONCURRENCY,
                defaults.verifier_concurrency,
            )?,
            article_concurrency: Self::parse_from_env(
                Self::ENV_ARTICLE_CONCURRENCY,
                defaults.article_concurrency,
            )?,
            max_embed_chars: Self::parse_from_env(
                Self::ENV_MAX_EMBED_CHARS,
                defaults.max_embed_chars,
            )?,
            excerpt_chars: Self::parse_from_env(Self::ENV_EXCERPT_CHARS, defaults.excerpt_chars)?,
            request_timeout_secs: Self::parse_from_env(
                Self::ENV_REQUEST_TIMEOUT_SECS,
                defaults.request_timeout_secs,
            )?,
            retry_max_attempts: Self::parse_from_env(
                Self::ENV_RETRY_MAX_ATTEMPTS,
                defaults.retry_max_attempts,
            )?,
            retry_base_delay_ms: Self::parse_from_env(
                Self::ENV_RETRY_BASE_DELAY_MS,
                defaults.retry_base_delay_ms,
            )?,
            event_capacity: Self::parse_from_env(
                Self::ENV_EVENT_CAPACITY,
                defaults.event_capacity,
            )?,
            failure_budget: Self::parse_from_env(
                Self::ENV_FAILURE_BUDGET,
                defaults.failure_budget,
            )?,
            max_articles_per_source: Self::parse_from_env(
                Self::ENV_MAX_ARTICLES_PER_SOURCE,
                defaults.max_articles_per_source,
            )?,
        })
    }

    /// Validates ranges and paths (does not create directories).
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            (Self::ENV_SIMILARITY_THRESHOLD, self.similarity_threshold),
            (Self::ENV_CONFIDENCE_THRESHOLD, self.confidence_threshold),
        ] {
            if !is_valid_threshold(value) {
                return Err(ConfigError::InvalidThreshold { name, value });
            }
        }

        for (name, value) in [
            (Self::ENV_VERIFIER_CONCURRENCY, self.verifier_concurrency),
            (Self::ENV_ARTICLE_CONCURRENCY, self.article_concurrency),
            (Self::ENV_MAX_EMBED_CHARS, self.max_embed_chars),
            (Self::ENV_EXCERPT_CHARS, self.excerpt_chars),
            (Self::ENV_EVENT_CAPACITY, self.event_capacity),
            (Self::ENV_MAX_ARTICLES_PER_SOURCE, self.max_articles_per_source),
            (Self::ENV_REQUEST_TIMEOUT_SECS, self.request_timeout_secs as usize),
            (Self::ENV_RETRY_MAX_ATTEMPTS, self.retry_max_attempts as usize),
            (Self::ENV_FAILURE_BUDGET, self.failure_budget as usize),
        ] {
            if value == 0 {
                return Err(ConfigError::MustBePositive { name });
            }
        }

        if self.db_path.is_dir() {
            return Err(ConfigError::NotAFile {
                path: self.db_path.clone(),
            });
        }
        if self.articles_paths.is_empty() {
            return Err(ConfigError::MissingEnvVar {
                name: Self::ENV_ARTICLES_PATH,
            });
        }

        Ok(())
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            similarity_threshold: self.similarity_threshold,
            max_candidates: (self.max_candidates > 0).then_some(self.max_candidates),
            confidence_threshold: self.confidence_threshold,
            verifier_concurrency: self.verifier_concurrency,
            article_concurrency: self.article_concurrency,
            failure_budget: self.failure_budget,
        }
    }

    /// Retry policy shared by the embedding, LLM and storage calls.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_max_attempts,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            call_timeout: self.request_timeout(),
            ..RetryPolicy::default()
        }
    }

    pub fn ollama_config(&self) -> OllamaEmbedConfig {
        OllamaEmbedConfig {
            endpoint: self.ollama_url.clone(),
            model: self.embed_model.clone(),
            timeout: self.request_timeout(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn parse_from_env<T>(var_name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match env::var(var_name) {
            Ok(value) => value
                .trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidValue {
                    name: var_name,
                    value,
                    reason: e.to_string(),
                }),
            Err(_) => Ok(default),
        }
    }

    fn parse_path_from_env(var_name: &str, default: PathBuf) -> PathBuf {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or(default)
    }

    fn parse_path_list_from_env(var_name: &str, default: Vec<PathBuf>) -> Vec<PathBuf> {
        match env::var(var_name) {
            Ok(value) => value
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .collect(),
            Err(_) => default,
        }
    }

    fn parse_string_from_env(var_name: &str, default: String) -> String {
        env::var(var_name)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(default)
    }
}
