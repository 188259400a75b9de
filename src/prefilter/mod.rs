//! Stage 1: embedding-similarity prefilter.
//!
//! Embeds the leading part of an article once and keeps the interests whose cosine similarity
//! clears the threshold. Interest vectors are computed once and cached; the prefilter is
//! otherwise pure given `(article, snapshot)`.

pub mod error;

#[cfg(test)]
mod tests;

pub use error::PrefilterError;

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use moka::sync::Cache;
use tracing::{debug, warn};

use crate::article::Article;
use crate::constants::DEFAULT_MAX_EMBED_CHARS;
use crate::embedding::{EmbeddingService, cosine_similarity};
use crate::interest::{Interest, InterestSnapshot};
use crate::retry::RetryPolicy;

const INTEREST_CACHE_CAPACITY: u64 = 10_000;

/// (id, text): an explicit id whose text changed on reload must not reuse the old vector.
type InterestKey = (String, String);

/// An interest that cleared the prefilter for an article.
#[derive(Debug, Clone)]
pub struct CandidatePair {
    pub article: Arc<Article>,
    pub interest: Arc<Interest>,
    pub similarity: f32,
}

pub struct EmbeddingPrefilter {
    service: Arc<dyn EmbeddingService>,
    retry: RetryPolicy,
    max_input_chars: usize,
    interest_vectors: Cache<InterestKey, Arc<Vec<f32>>>,
}

impl std::fmt::Debug for EmbeddingPrefilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingPrefilter")
            .field("model", &self.service.model_name())
            .field("max_input_chars", &self.max_input_chars)
            .field("cached_interests", &self.interest_vectors.entry_count())
            .finish()
    }
}

impl EmbeddingPrefilter {
    pub fn new(service: Arc<dyn EmbeddingService>, retry: RetryPolicy) -> Self {
        Self {
            service,
            retry,
            max_input_chars: DEFAULT_MAX_EMBED_CHARS,
            interest_vectors: Cache::builder()
                .max_capacity(INTEREST_CACHE_CAPACITY)
                .build(),
        }
    }

    /// Sets how many leading characters of an article are embedded.
    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars.max(1);
        self
    }

    pub fn max_input_chars(&self) -> usize {
        self.max_input_chars
    }

    /// Number of cached interest vectors.
    pub fn cached_interests(&self) -> u64 {
        self.interest_vectors.run_pending_tasks();
        self.interest_vectors.entry_count()
    }

    /// Precomputes vectors for every interest in `snapshot` and evicts interests that are no
    /// longer listed.
    ///
    /// Best-effort: failures are logged and retried lazily per article, and a transient
    /// failure stops the warm-up. Returns how many interests have a vector ready.
    pub async fn warm(&self, snapshot: &InterestSnapshot) -> usize {
        let live: HashSet<InterestKey> = snapshot
            .interests()
            .iter()
            .map(|i| Self::key(i))
            .collect();
        let stale: Vec<InterestKey> = self
            .interest_vectors
            .iter()
            .map(|(key, _)| (*key).clone())
            .filter(|key| !live.contains(key))
            .collect();
        for key in &stale {
            self.interest_vectors.invalidate(key);
        }

        let mut ready = 0usize;
        for interest in snapshot.interests() {
            match self.interest_vector(interest).await {
                Ok(_) => ready += 1,
                Err(e) => {
                    warn!(
                        interest_id = %interest.id,
                        error = %e,
                        "Failed to precompute interest embedding"
                    );
                    // Service down: leave the rest to the per-article path.
                    if e.is_transient() {
                        break;
                    }
                }
            }
        }

        debug!(
            version = snapshot.version(),
            ready,
            evicted = stale.len(),
            "Interest embeddings warmed"
        );
        ready
    }

    /// Returns the interests of `snapshot` scoring at least `threshold`, best first, keeping
    /// at most `max_candidates` of them.
    ///
    /// An interest the embedding service permanently refuses, or whose vector has a different
    /// dimension than the article's, is skipped with a warning. A transient interest failure
    /// fails the article.
    pub async fn filter_candidates(
        &self,
        article: &Arc<Article>,
        snapshot: &InterestSnapshot,
        threshold: f32,
        max_candidates: Option<usize>,
    ) -> Result<Vec<CandidatePair>, PrefilterError> {
        if snapshot.is_empty() {
            return Ok(Vec::new());
        }

        let article_vector = self.embed_article(article).await?;

        let mut candidates = Vec::new();
        let mut skipped = 0usize;
        for interest in snapshot.interests() {
            let interest_vector = match self.interest_vector(interest).await {
                Ok(vector) => vector,
                Err(e) if !e.is_transient() => {
                    warn!(
                        interest_id = %interest.id,
                        error = %e,
                        "Interest cannot be embedded, skipping it"
                    );
                    skipped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };
            if interest_vector.len() != article_vector.len() {
                warn!(
                    interest_id = %interest.id,
                    article_dim = article_vector.len(),
                    interest_dim = interest_vector.len(),
                    "Embedding dimension mismatch, skipping interest"
                );
                skipped += 1;
                continue;
            }

            let similarity = cosine_similarity(&article_vector, &interest_vector);
            if similarity >= threshold {
                candidates.push(CandidatePair {
                    article: Arc::clone(article),
                    interest: Arc::clone(interest),
                    similarity,
                });
            }
        }

        candidates.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
        });
        let above_threshold = candidates.len();
        if let Some(max) = max_candidates {
            candidates.truncate(max);
        }

        debug!(
            article_id = %article.id,
            interests = snapshot.len(),
            skipped,
            above_threshold,
            candidates = candidates.len(),
            best = candidates.first().map(|c| c.similarity),
            threshold,
            "Prefilter finished"
        );
        Ok(candidates)
    }

    async fn embed_article(&self, article: &Article) -> Result<Vec<f32>, PrefilterError> {
        let text = article
            .embedding_text(self.max_input_chars)
            .ok_or_else(|| PrefilterError::EmptyArticle {
                article_id: article.id.clone(),
            })?;

        self.retry
            .run("embed_article", || self.service.embed(text))
            .await
            .map_err(|source| PrefilterError::ArticleEmbedding {
                article_id: article.id.clone(),
                source,
            })
    }

    async fn interest_vector(&self, interest: &Interest) -> Result<Arc<Vec<f32>>, PrefilterError> {
        if let Some(precomputed) = &interest.embedding {
            return Ok(Arc::clone(precomputed));
        }

        let key = Self::key(interest);
        if let Some(cached) = self.interest_vectors.get(&key) {
            return Ok(cached);
        }

        let vector = self
            .retry
            .run("embed_interest", || self.service.embed(&interest.text))
            .await
            .map_err(|source| PrefilterError::InterestEmbedding {
                interest_id: interest.id.clone(),
                source,
            })?;

        let vector = Arc::new(vector);
        self.interest_vectors.insert(key, Arc::clone(&vector));
        Ok(vector)
    }

    fn key(interest: &Interest) -> InterestKey {
        (interest.id.clone(), interest.text.clone())
    }
}
