use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InterestError {
    #[error("failed to read interest file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("interest text is empty")]
    EmptyText,
}
