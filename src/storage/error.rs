use std::time::Duration;

use rusqlite::ErrorCode;
use thiserror::Error;

use crate::article::ArticleId;
use crate::retry::Retryable;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("match for interest {interest_id} references unknown article {article_id}")]
    OrphanMatch {
        article_id: ArticleId,
        interest_id: String,
    },

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    #[error("storage task failed: {0}")]
    Task(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl Retryable for StorageError {
    fn is_transient(&self) -> bool {
        match self {
            StorageError::Database(rusqlite::Error::SqliteFailure(e, _)) => {
                matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
            }
            StorageError::Unavailable(_) | StorageError::Timeout { .. } | StorageError::Task(_) => {
                true
            }
            _ => false,
        }
    }

    fn timed_out(operation: &str, after: Duration) -> Self {
        StorageError::Timeout {
            operation: operation.to_string(),
            after,
        }
    }
}

impl From<tokio::task::JoinError> for StorageError {
    fn from(err: tokio::task::JoinError) -> Self {
        StorageError::Task(err.to_string())
    }
}
