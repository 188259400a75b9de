use thiserror::Error;

use crate::article::ArticleId;
use crate::embedding::EmbeddingError;
use crate::retry::Retryable;

#[derive(Debug, Error)]
pub enum PrefilterError {
    #[error("article {article_id} has no text to embed")]
    EmptyArticle { article_id: ArticleId },

    #[error("failed to embed article {article_id}: {source}")]
    ArticleEmbedding {
        article_id: ArticleId,
        #[source]
        source: EmbeddingError,
    },

    #[error("failed to embed interest {interest_id}: {source}")]
    InterestEmbedding {
        interest_id: String,
        #[source]
        source: EmbeddingError,
    },
}

impl PrefilterError {
    /// `true` when the embedding service, not the input, is at fault.
    pub fn is_transient(&self) -> bool {
        match self {
            PrefilterError::ArticleEmbedding { source, .. }
            | PrefilterError::InterestEmbedding { source, .. } => source.is_transient(),
            PrefilterError::EmptyArticle { .. } => false,
        }
    }
}
