//! Persistence for articles and match records.
//!
//! [`MatchStore`] is the storage contract: idempotent upserts keyed on the article id and on
//! `(article id, interest id)`, an atomic per-article commit, and read queries for the UI
//! layer. [`PersistenceGateway`] wraps a store with the in-flight reservation that makes the
//! pipeline's dedup check atomic.

pub mod error;
mod gateway;
mod memory;
mod sqlite;
mod types;


pub use error::StorageError;
pub use gateway::{PersistenceGateway, Reservation, ReservationGuard};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use types::{CommitReceipt, MatchFilter, MatchRecord, StoredArticle, Upsert};

use async_trait::async_trait;

use crate::article::{Article, ArticleId};

#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Inserts `article` unless its id is already stored.
    async fn upsert_article(&self, article: &Article) -> Result<Upsert<Article>, StorageError>;

    /// Inserts `record` unless its `(article_id, interest_id)` is already stored.
    ///
    /// Fails with [`StorageError::OrphanMatch`] when the article is not stored.
    async fn upsert_match(&self, record: &MatchRecord)
    -> Result<Upsert<MatchRecord>, StorageError>;

    /// Upserts `article` and all of `matches` as one atomic unit.
    ///
    /// Every match must belong to `article`; on any error nothing is written.
    async fn commit_article(
        &self,
        article: &Article,
        matches: &[MatchRecord],
    ) -> Result<CommitReceipt, StorageError>;

    async fn exists_article(&self, id: &ArticleId) -> Result<bool, StorageError>;

    async fn get_article(&self, id: &ArticleId) -> Result<Option<Article>, StorageError>;

    async fn query_matches(&self, filter: &MatchFilter) -> Result<Vec<MatchRecord>, StorageError>;

    /// Most recently stored articles with their matches, newest first.
    async fn recent_articles(&self, limit: usize) -> Result<Vec<StoredArticle>, StorageError>;

    async fn article_count(&self) -> Result<usize, StorageError>;
}

/// Rejects matches that do not belong to `article`.
pub(crate) fn check_matches_belong(
    article: &Article,
    matches: &[MatchRecord],
) -> Result<(), StorageError> {
    match matches.iter().find(|m| m.article_id != article.id) {
        Some(stray) => Err(StorageError::OrphanMatch {
            article_id: stray.article_id.clone(),
            interest_id: stray.interest_id.clone(),
        }),
        None => Ok(()),
    }
}
