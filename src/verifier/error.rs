use thiserror::Error;

use crate::article::ArticleId;
use crate::llm::LlmError;

#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("verification of article {article_id} against {interest_id} failed: {source}")]
    Llm {
        article_id: ArticleId,
        interest_id: String,
        #[source]
        source: LlmError,
    },
}

impl VerifierError {
    /// `true` when the retries ran out on a transient failure.
    pub fn is_transient(&self) -> bool {
        use crate::retry::Retryable;

        match self {
            VerifierError::Llm { source, .. } => source.is_transient(),
        }
    }
}
