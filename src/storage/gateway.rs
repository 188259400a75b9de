use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::{CommitReceipt, MatchFilter, MatchRecord, MatchStore, StorageError, StoredArticle};
use crate::article::{Article, ArticleId};
use crate::retry::RetryPolicy;

type InFlight = Arc<Mutex<HashSet<ArticleId>>>;

/// Outcome of [`PersistenceGateway::reserve`].
#[derive(Debug)]
pub enum Reservation {
    /// The article is new and now claimed by the caller until the guard drops.
    Acquired(ReservationGuard),
    AlreadyStored,
    /// Another task holds the claim.
    InFlight,
}

/// Claim on an article id; released on drop.
#[derive(Debug)]
pub struct ReservationGuard {
    id: ArticleId,
    in_flight: InFlight,
}

impl ReservationGuard {
    pub fn article_id(&self) -> &ArticleId {
        &self.id
    }
}

impl Drop for ReservationGuard {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.id);
    }
}

/// Sole writer of articles and match records.
///
/// Adds the atomic check-and-reserve used for dedup and retries store calls under the
/// injected policy. Upserts are idempotent, so retrying a commit is safe.
#[derive(Clone)]
pub struct PersistenceGateway {
    store: Arc<dyn MatchStore>,
    retry: RetryPolicy,
    in_flight: InFlight,
}

impl std::fmt::Debug for PersistenceGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceGateway")
            .field("in_flight", &self.in_flight.lock().len())
            .finish()
    }
}

impl PersistenceGateway {
    pub fn new(store: Arc<dyn MatchStore>, retry: RetryPolicy) -> Self {
        Self {
            store,
            retry,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn store(&self) -> &Arc<dyn MatchStore> {
        &self.store
    }

    /// Number of articles currently reserved.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Checks whether `id` is stored and, if not, claims it.
    ///
    /// The claim is taken before the lookup so two concurrent callers can never both see
    /// "not stored" for the same id.
    pub async fn reserve(&self, id: &ArticleId) -> Result<Reservation, StorageError> {
        if !self.in_flight.lock().insert(id.clone()) {
            debug!(article_id = %id, "Article already in flight");
            return Ok(Reservation::InFlight);
        }
        let guard = ReservationGuard {
            id: id.clone(),
            in_flight: Arc::clone(&self.in_flight),
        };

        let stored = self
            .retry
            .run("exists_article", || self.store.exists_article(id))
            .await?;

        if stored {
            Ok(Reservation::AlreadyStored)
        } else {
            Ok(Reservation::Acquired(guard))
        }
    }

    /// Atomically stores `article` with its confirmed `matches`.
    ///
    /// Requires the caller's reservation for the article.
    pub async fn commit(
        &self,
        guard: &ReservationGuard,
        article: &Article,
        matches: &[MatchRecord],
    ) -> Result<CommitReceipt, StorageError> {
        debug_assert_eq!(guard.article_id(), &article.id);
        self.retry
            .run("commit_article", || self.store.commit_article(article, matches))
            .await
    }

    pub async fn exists_article(&self, id: &ArticleId) -> Result<bool, StorageError> {
        self.retry
            .run("exists_article", || self.store.exists_article(id))
            .await
    }

    pub async fn get_article(&self, id: &ArticleId) -> Result<Option<Article>, StorageError> {
        self.retry
            .run("get_article", || self.store.get_article(id))
            .await
    }

    pub async fn query_matches(&self, filter: &MatchFilter) -> Result<Vec<MatchRecord>, StorageError> {
        self.retry
            .run("query_matches", || self.store.query_matches(filter))
            .await
    }

    pub async fn recent_articles(&self, limit: usize) -> Result<Vec<StoredArticle>, StorageError> {
        self.retry
            .run("recent_articles", || self.store.recent_articles(limit))
            .await
    }
}
