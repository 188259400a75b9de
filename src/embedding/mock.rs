use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{EmbeddingError, EmbeddingService, l2_normalize};
use crate::hashing::hash_to_u64;

/// Dimension of the bag-of-words vectors.
pub const MOCK_EMBEDDING_DIM: usize = 256;

/// Deterministic embedder: hashes words into buckets, so texts sharing vocabulary score high.
///
/// Exact-text overrides and failure injection make pipeline scenarios reproducible.
#[derive(Default)]
pub struct MockEmbedder {
    overrides: RwLock<HashMap<String, Vec<f32>>>,
    reject_substrings: RwLock<Vec<String>>,
    transient_failures: AtomicU32,
    unavailable: AtomicBool,
    calls: AtomicUsize,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `vector` whenever exactly `text` is embedded.
    pub fn with_vector(self, text: &str, vector: Vec<f32>) -> Self {
        self.overrides.write().insert(text.to_string(), vector);
        self
    }

    /// Permanently rejects any text containing `needle`.
    pub fn rejecting(self, needle: &str) -> Self {
        self.reject_substrings.write().push(needle.to_string());
        self
    }

    /// The next `n` calls fail with a transient error.
    pub fn fail_next(&self, n: u32) {
        self.transient_failures.store(n, Ordering::SeqCst);
    }

    /// Every call fails transiently until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Bag-of-words vector for `text` (ignores overrides).
    pub fn bag_of_words(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; MOCK_EMBEDDING_DIM];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() >= 3)
        {
            let bucket = hash_to_u64(word.to_lowercase().as_bytes()) as usize % MOCK_EMBEDDING_DIM;
            v[bucket] += 1.0;
        }
        l2_normalize(&mut v);
        v
    }
}

#[async_trait]
impl EmbeddingService for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(EmbeddingError::Unavailable {
                reason: "mock embedder unavailable".to_string(),
            });
        }

        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(EmbeddingError::Unavailable {
                reason: "injected transient failure".to_string(),
            });
        }

        if self
            .reject_substrings
            .read()
            .iter()
            .any(|needle| text.contains(needle.as_str()))
        {
            return Err(EmbeddingError::InvalidInput {
                reason: "mock embedder rejected text".to_string(),
            });
        }

        if let Some(vector) = self.overrides.read().get(text) {
            return Ok(vector.clone());
        }

        Ok(Self::bag_of_words(text))
    }

    fn model_name(&self) -> &str {
        "mock-bow"
    }
}
