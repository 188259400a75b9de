//! Stage 2: LLM verification of candidate pairs.
//!
//! One request per (article, interest) pair. Transport failures go through the retry policy
//! and surface as [`VerifierError`]; replies that cannot be read become
//! [`VerificationResponse::Unparsable`] instead of errors.

mod error;
mod parse;
mod prompt;
mod types;


pub use error::VerifierError;
pub use parse::parse_response;
pub use prompt::build_prompt;
pub use types::{Verdict, VerificationResponse, VerificationResult};

use std::sync::Arc;

use tracing::{debug, warn};

use crate::article::Article;
use crate::constants::DEFAULT_EXCERPT_CHARS;
use crate::interest::Interest;
use crate::llm::LlmService;
use crate::retry::RetryPolicy;

pub struct LlmVerifier {
    llm: Arc<dyn LlmService>,
    retry: RetryPolicy,
    excerpt_chars: usize,
}

impl std::fmt::Debug for LlmVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmVerifier")
            .field("model", &self.llm.model_name())
            .field("excerpt_chars", &self.excerpt_chars)
            .finish()
    }
}

impl LlmVerifier {
    pub fn new(llm: Arc<dyn LlmService>, retry: RetryPolicy) -> Self {
        Self {
            llm,
            retry,
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
        }
    }

    /// Number of body characters included in the prompt.
    pub fn with_excerpt_chars(mut self, excerpt_chars: usize) -> Self {
        self.excerpt_chars = excerpt_chars;
        self
    }

    /// Asks the model whether `article` is relevant to `interest`.
    pub async fn verify(
        &self,
        article: &Article,
        interest: &Interest,
    ) -> Result<VerificationResponse, VerifierError> {
        let prompt = build_prompt(article, interest, self.excerpt_chars);

        let raw = self
            .retry
            .run("verify", || self.llm.complete(&prompt))
            .await
            .map_err(|source| VerifierError::Llm {
                article_id: article.id.clone(),
                interest_id: interest.id.clone(),
                source,
            })?;

        let response = parse_response(&raw);
        match &response {
            VerificationResponse::Parsed(result) => debug!(
                article_id = %article.id,
                interest_id = %interest.id,
                matched = result.matched,
                confidence = result.confidence,
                "Verifier judgment"
            ),
            VerificationResponse::Unparsable { raw_text } => warn!(
                article_id = %article.id,
                interest_id = %interest.id,
                raw = %raw_text,
                "Unparsable verifier response, treating pair as unverified"
            ),
        }
        Ok(response)
    }
}
