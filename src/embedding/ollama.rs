//! Ollama embedding client.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{EmbeddingError, EmbeddingService};
use crate::constants::{DEFAULT_EMBED_MODEL, DEFAULT_OLLAMA_URL, DEFAULT_REQUEST_TIMEOUT_SECS};

#[derive(Debug, Clone)]
pub struct OllamaEmbedConfig {
    pub endpoint: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for OllamaEmbedConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_EMBED_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

/// Embeds text with an Ollama server (`POST {endpoint}/api/embed`).
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: reqwest::Client,
    config: OllamaEmbedConfig,
    /// Fixed by the first vector returned.
    dimension: OnceLock<usize>,
}

impl OllamaEmbedder {
    pub fn new(config: OllamaEmbedConfig) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EmbeddingError::Unavailable {
                reason: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            config,
            dimension: OnceLock::new(),
        })
    }

    pub fn config(&self) -> &OllamaEmbedConfig {
        &self.config
    }

    fn url(&self) -> String {
        format!("{}/api/embed", self.config.endpoint.trim_end_matches('/'))
    }

    /// Rejects vectors whose size differs from the first one seen, e.g. after the model behind
    /// the endpoint was swapped.
    fn check_dimension(&self, actual: usize) -> Result<(), EmbeddingError> {
        let expected = *self.dimension.get_or_init(|| actual);
        if expected == actual {
            Ok(())
        } else {
            Err(EmbeddingError::DimensionMismatch { expected, actual })
        }
    }
}

/// Maps an HTTP status to the transient/permanent split.
fn status_error(status: StatusCode, body: String) -> EmbeddingError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        EmbeddingError::Unavailable {
            reason: format!("HTTP {}: {}", status, body),
        }
    } else {
        EmbeddingError::InvalidInput {
            reason: format!("HTTP {}: {}", status, body),
        }
    }
}

#[async_trait]
impl EmbeddingService for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let request = EmbedRequest {
            model: &self.config.model,
            input: text,
        };

        let response = self.client.post(self.url()).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        let parsed: EmbedResponse = response.json().await?;
        let embedding = parsed.embeddings.into_iter().next().ok_or_else(|| {
            EmbeddingError::InvalidResponse {
                reason: "response contained no embeddings".to_string(),
            }
        })?;

        if embedding.is_empty() {
            return Err(EmbeddingError::InvalidResponse {
                reason: "empty embedding vector".to_string(),
            });
        }
        self.check_dimension(embedding.len())?;

        debug!(
            model = %self.config.model,
            text_len = text.len(),
            dim = embedding.len(),
            "Embedded text"
        );
        Ok(embedding)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::Retryable;

    #[test]
    fn test_status_error_classification() {
        assert!(status_error(StatusCode::SERVICE_UNAVAILABLE, String::new()).is_transient());
        assert!(status_error(StatusCode::TOO_MANY_REQUESTS, String::new()).is_transient());
        assert!(!status_error(StatusCode::BAD_REQUEST, String::new()).is_transient());
        assert!(!status_error(StatusCode::NOT_FOUND, "model not found".into()).is_transient());
    }

    #[test]
    fn test_url_trims_trailing_slash() {
        let embedder = OllamaEmbedder::new(OllamaEmbedConfig {
            endpoint: "http://localhost:11434/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(embedder.url(), "http://localhost:11434/api/embed");
    }

    #[test]
    fn test_dimension_fixed_by_first_vector() {
        let embedder = OllamaEmbedder::new(OllamaEmbedConfig::default()).unwrap();

        assert!(embedder.check_dimension(1024).is_ok());
        assert!(embedder.check_dimension(1024).is_ok());

        let err = embedder.check_dimension(768).unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::DimensionMismatch {
                expected: 1024,
                actual: 768
            }
        ));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transient() {
        let embedder = OllamaEmbedder::new(OllamaEmbedConfig {
            endpoint: "http://127.0.0.1:1".to_string(),
            timeout: Duration::from_millis(500),
            ..Default::default()
        })
        .unwrap();

        let err = embedder.embed("hello").await.unwrap_err();
        assert!(err.is_transient(), "expected transient, got {:?}", err);
    }
}
