use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{LlmError, LlmService};

type Responder = dyn Fn(&str) -> Result<String, LlmError> + Send + Sync;

/// Scripted LLM: a closure decides the reply for each prompt.
///
/// Records every prompt and the peak number of concurrent calls.
pub struct MockLlm {
    responder: Arc<Responder>,
    delay: Duration,
    prompts: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockLlm {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            delay: Duration::ZERO,
            prompts: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Always answers with `text`.
    pub fn always(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(move |_| Ok(text.clone()))
    }

    /// Sleeps for `delay` inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    /// Number of recorded prompts containing `needle`.
    pub fn calls_containing(&self, needle: &str) -> usize {
        self.prompts
            .lock()
            .iter()
            .filter(|p| p.contains(needle))
            .count()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Builds the JSON judgment the verification prompt asks for.
pub fn judgment_json(matched: bool, confidence: f32, explanation: &str) -> String {
    serde_json::json!({
        "match": matched,
        "confidence": confidence,
        "explanation": explanation,
    })
    .to_string()
}

#[async_trait]
impl LlmService for MockLlm {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().push(prompt.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.responder)(prompt)
    }

    fn model_name(&self) -> &str {
        "mock-llm"
    }
}
