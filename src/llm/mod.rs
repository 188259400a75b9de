//! LLM completion seam.
//!
//! The verifier only needs `complete(prompt) -> text`. [`GenaiLlm`] routes the call through
//! `genai`, which picks the provider (Ollama, Gemini, OpenAI, ...) from the model name.

mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(test)]
mod tests;

pub use error::LlmError;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockLlm;

use async_trait::async_trait;
use genai::Client;
use genai::chat::{ChatMessage, ChatRequest};
use tracing::debug;

#[async_trait]
/// Text completion. Responses may differ between calls for the same prompt.
pub trait LlmService: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    /// Model name, for logs.
    fn model_name(&self) -> &str;
}

/// [`LlmService`] backed by a `genai` client.
#[derive(Clone)]
pub struct GenaiLlm {
    client: Client,
    model: String,
}

impl std::fmt::Debug for GenaiLlm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenaiLlm")
            .field("model", &self.model)
            .finish()
    }
}

impl GenaiLlm {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: Client::default(),
            model: model.into(),
        }
    }

    pub fn with_client(client: Client, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl LlmService for GenaiLlm {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let request = ChatRequest::new(vec![ChatMessage::user(prompt)]);

        let response = self.client.exec_chat(&self.model, request, None).await?;
        let text = response.first_text().unwrap_or_default().to_string();

        debug!(
            model = %self.model,
            prompt_len = prompt.len(),
            response_len = text.len(),
            "LLM completion finished"
        );
        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
