use std::time::Duration;

use thiserror::Error;

use crate::retry::Retryable;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding service unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    #[error("embedding service rejected input: {reason}")]
    InvalidInput { reason: String },

    #[error("invalid embedding response: {reason}")]
    InvalidResponse { reason: String },

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl Retryable for EmbeddingError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            EmbeddingError::Unavailable { .. } | EmbeddingError::Timeout { .. }
        )
    }

    fn timed_out(operation: &str, after: Duration) -> Self {
        EmbeddingError::Timeout {
            operation: operation.to_string(),
            after,
        }
    }
}

impl From<reqwest::Error> for EmbeddingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            EmbeddingError::Unavailable {
                reason: err.to_string(),
            }
        } else if err.is_decode() {
            EmbeddingError::InvalidResponse {
                reason: err.to_string(),
            }
        } else {
            EmbeddingError::Unavailable {
                reason: err.to_string(),
            }
        }
    }
}
