//! Embedding service seam.
//!
//! - [`ollama`] talks to an Ollama-compatible `/api/embed` endpoint.
//! - [`mock`] provides a deterministic bag-of-words embedder for tests.

mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod ollama;
/// Vector math helpers.
pub mod utils;


pub use error::EmbeddingError;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockEmbedder;
pub use ollama::{OllamaEmbedConfig, OllamaEmbedder};
pub use utils::{cosine_similarity, l2_normalize};

use async_trait::async_trait;

#[async_trait]
/// Turns text into a vector. Identical input must give identical output.
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Model name, for logs.
    fn model_name(&self) -> &str;
}
