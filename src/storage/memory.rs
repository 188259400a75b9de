use std::collections::{BTreeMap, HashMap};
#[cfg(any(test, feature = "mock"))]
use std::sync::atomic::AtomicBool;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{
    CommitReceipt, MatchFilter, MatchRecord, MatchStore, StorageError, StoredArticle, Upsert,
    check_matches_belong,
};
use crate::article::{Article, ArticleId};

#[derive(Default)]
struct Tables {
    /// Article plus insertion sequence, for newest-first listing.
    articles: HashMap<ArticleId, (u64, Article)>,
    matches: BTreeMap<(ArticleId, String), MatchRecord>,
    next_seq: u64,
}

impl Tables {
    fn matches_for(&self, id: &ArticleId) -> Vec<MatchRecord> {
        let mut matches: Vec<_> = self
            .matches
            .values()
            .filter(|m| m.article_id == *id)
            .cloned()
            .collect();
        sort_newest_first(&mut matches);
        matches
    }
}

/// In-process [`MatchStore`].
///
/// Commits are staged and applied under one write lock, so a failed commit leaves nothing
/// behind. Test builds can inject failures.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    failing_commits: AtomicU32,
    #[cfg(any(test, feature = "mock"))]
    unavailable: AtomicBool,
    #[cfg(any(test, feature = "mock"))]
    crash_after_article: AtomicBool,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.tables.read();
        f.debug_struct("MemoryStore")
            .field("articles", &tables.articles.len())
            .field("matches", &tables.matches.len())
            .finish()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total stored match records.
    pub fn match_count(&self) -> usize {
        self.tables.read().matches.len()
    }

    /// Matches whose article is not stored. Always zero unless an invariant broke.
    pub fn orphan_count(&self) -> usize {
        let tables = self.tables.read();
        tables
            .matches
            .keys()
            .filter(|(article_id, _)| !tables.articles.contains_key(article_id))
            .count()
    }

    fn check_available(&self) -> Result<(), StorageError> {
        #[cfg(any(test, feature = "mock"))]
        {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(StorageError::Unavailable("memory store offline".to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(any(test, feature = "mock"))]
impl MemoryStore {
    /// The next `n` commits fail transiently before writing anything.
    pub fn fail_next_commits(&self, n: u32) {
        self.failing_commits.store(n, Ordering::SeqCst);
    }

    /// Every call fails transiently until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Commits fail between staging the article and staging its matches.
    pub fn set_crash_after_article(&self, crash: bool) {
        self.crash_after_article.store(crash, Ordering::SeqCst);
    }
}

#[async_trait]
impl MatchStore for MemoryStore {
    async fn upsert_article(&self, article: &Article) -> Result<Upsert<Article>, StorageError> {
        self.check_available()?;
        let mut tables = self.tables.write();
        if let Some((_, existing)) = tables.articles.get(&article.id) {
            return Ok(Upsert::Existing(existing.clone()));
        }
        let seq = tables.next_seq;
        tables.next_seq += 1;
        tables
            .articles
            .insert(article.id.clone(), (seq, article.clone()));
        Ok(Upsert::Inserted(article.clone()))
    }

    async fn upsert_match(
        &self,
        record: &MatchRecord,
    ) -> Result<Upsert<MatchRecord>, StorageError> {
        self.check_available()?;
        let mut tables = self.tables.write();
        if !tables.articles.contains_key(&record.article_id) {
            return Err(StorageError::OrphanMatch {
                article_id: record.article_id.clone(),
                interest_id: record.interest_id.clone(),
            });
        }
        let key = (record.article_id.clone(), record.interest_id.clone());
        if let Some(existing) = tables.matches.get(&key) {
            return Ok(Upsert::Existing(existing.clone()));
        }
        tables.matches.insert(key, record.clone());
        Ok(Upsert::Inserted(record.clone()))
    }

    async fn commit_article(
        &self,
        article: &Article,
        matches: &[MatchRecord],
    ) -> Result<CommitReceipt, StorageError> {
        self.check_available()?;
        check_matches_belong(article, matches)?;

        let pending = self.failing_commits.load(Ordering::SeqCst);
        if pending > 0 {
            self.failing_commits.store(pending - 1, Ordering::SeqCst);
            return Err(StorageError::Unavailable("injected commit failure".to_string()));
        }

        let mut tables = self.tables.write();

        // Stage first, apply only once every step succeeded.
        let article_inserted = !tables.articles.contains_key(&article.id);

        #[cfg(any(test, feature = "mock"))]
        {
            if self.crash_after_article.load(Ordering::SeqCst) {
                return Err(StorageError::Unavailable(
                    "simulated crash after article upsert".to_string(),
                ));
            }
        }

        let mut receipt = CommitReceipt {
            article_inserted,
            ..Default::default()
        };
        let mut staged = Vec::with_capacity(matches.len());
        for record in matches {
            let key = (record.article_id.clone(), record.interest_id.clone());
            if tables.matches.contains_key(&key) || staged.iter().any(|(k, _)| *k == key) {
                receipt.matches_existing += 1;
            } else {
                receipt.matches_inserted += 1;
                staged.push((key, record.clone()));
            }
        }

        if article_inserted {
            let seq = tables.next_seq;
            tables.next_seq += 1;
            tables
                .articles
                .insert(article.id.clone(), (seq, article.clone()));
        }
        tables.matches.extend(staged);
        Ok(receipt)
    }

    async fn exists_article(&self, id: &ArticleId) -> Result<bool, StorageError> {
        self.check_available()?;
        Ok(self.tables.read().articles.contains_key(id))
    }

    async fn get_article(&self, id: &ArticleId) -> Result<Option<Article>, StorageError> {
        self.check_available()?;
        Ok(self
            .tables
            .read()
            .articles
            .get(id)
            .map(|(_, article)| article.clone()))
    }

    async fn query_matches(&self, filter: &MatchFilter) -> Result<Vec<MatchRecord>, StorageError> {
        self.check_available()?;
        let tables = self.tables.read();
        let mut matches: Vec<_> = tables
            .matches
            .values()
            .filter(|m| filter.accepts(m))
            .cloned()
            .collect();
        sort_newest_first(&mut matches);
        if let Some(limit) = filter.limit {
            matches.truncate(limit);
        }
        Ok(matches)
    }

    async fn recent_articles(&self, limit: usize) -> Result<Vec<StoredArticle>, StorageError> {
        self.check_available()?;
        let tables = self.tables.read();
        let mut articles: Vec<_> = tables.articles.values().collect();
        articles.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(articles
            .into_iter()
            .take(limit)
            .map(|(_, article)| StoredArticle {
                article: article.clone(),
                matches: tables.matches_for(&article.id),
            })
            .collect())
    }

    async fn article_count(&self) -> Result<usize, StorageError> {
        self.check_available()?;
        Ok(self.tables.read().articles.len())
    }
}

fn sort_newest_first(matches: &mut [MatchRecord]) {
    matches.sort_by(|a, b| {
        b.decided_at
            .cmp(&a.decided_at)
            .then_with(|| a.article_id.cmp(&b.article_id))
            .then_with(|| a.interest_id.cmp(&b.interest_id))
    });
}
