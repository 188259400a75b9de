use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source {source_name}: cannot read {path}: {error}")]
    Io {
        source_name: String,
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    #[error("source {source_name}: malformed record on line {line}: {reason}")]
    Malformed {
        source_name: String,
        line: usize,
        reason: String,
    },
}
