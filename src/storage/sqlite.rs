use std::path::Path;
use std::sync::Arc;
#[cfg(any(test, feature = "mock"))]
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use tracing::{debug, info};

use super::{
    CommitReceipt, MatchFilter, MatchRecord, MatchStore, StorageError, StoredArticle, Upsert,
    check_matches_belong,
};
use crate::article::{Article, ArticleId};
use crate::interest::InterestKind;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS articles (
  id TEXT PRIMARY KEY,
  url TEXT,
  title TEXT NOT NULL,
  body TEXT NOT NULL,
  source TEXT NOT NULL,
  published_at INTEGER,
  fetched_at INTEGER NOT NULL,
  stored_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS matches (
  article_id TEXT NOT NULL,
  interest_id TEXT NOT NULL,
  interest_kind TEXT NOT NULL,
  interest_text TEXT NOT NULL,
  verified INTEGER NOT NULL,
  confidence REAL NOT NULL,
  explanation TEXT NOT NULL,
  similarity REAL NOT NULL,
  decided_at INTEGER NOT NULL,
  PRIMARY KEY(article_id, interest_id),
  FOREIGN KEY(article_id) REFERENCES articles(id)
);

CREATE INDEX IF NOT EXISTS idx_matches_interest ON matches(interest_id);
CREATE INDEX IF NOT EXISTS idx_matches_decided_at ON matches(decided_at);
CREATE INDEX IF NOT EXISTS idx_articles_stored_at ON articles(stored_at);
";

const ARTICLE_COLUMNS: &str = "id, url, title, body, source, published_at, fetched_at";
const MATCH_COLUMNS: &str = "article_id, interest_id, interest_kind, interest_text, verified, \
                             confidence, explanation, similarity, decided_at";

/// SQLite-backed [`MatchStore`].
///
/// One connection behind a mutex; every call runs on the blocking pool.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    #[cfg(any(test, feature = "mock"))]
    crash_after_article: Arc<AtomicBool>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Opens (or creates) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Unavailable(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        let store = Self::from_connection(conn)?;

        info!(path = %path.display(), "Opened SQLite store");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            #[cfg(any(test, feature = "mock"))]
            crash_after_article: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Makes the next commits fail after the article row was written, before any match.
    #[cfg(any(test, feature = "mock"))]
    pub fn set_crash_after_article(&self, crash: bool) {
        self.crash_after_article.store(crash, Ordering::SeqCst);
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut guard)
        })
        .await?
    }

    #[cfg(any(test, feature = "mock"))]
    fn crash_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.crash_after_article)
    }
}

#[async_trait]
impl MatchStore for SqliteStore {
    async fn upsert_article(&self, article: &Article) -> Result<Upsert<Article>, StorageError> {
        let article = article.clone();
        self.blocking(move |conn| insert_article(conn, &article))
            .await
    }

    async fn upsert_match(
        &self,
        record: &MatchRecord,
    ) -> Result<Upsert<MatchRecord>, StorageError> {
        let record = record.clone();
        self.blocking(move |conn| {
            if !article_exists(conn, &record.article_id)? {
                return Err(StorageError::OrphanMatch {
                    article_id: record.article_id.clone(),
                    interest_id: record.interest_id.clone(),
                });
            }
            insert_match(conn, &record)
        })
        .await
    }

    async fn commit_article(
        &self,
        article: &Article,
        matches: &[MatchRecord],
    ) -> Result<CommitReceipt, StorageError> {
        check_matches_belong(article, matches)?;

        let article = article.clone();
        let matches = matches.to_vec();
        #[cfg(any(test, feature = "mock"))]
        let crash = self.crash_flag();

        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            let mut receipt = CommitReceipt {
                article_inserted: insert_article(&tx, &article)?.is_inserted(),
                ..Default::default()
            };

            #[cfg(any(test, feature = "mock"))]
            {
                if crash.load(Ordering::SeqCst) {
                    // Dropping `tx` rolls the article row back.
                    return Err(StorageError::Unavailable(
                        "simulated crash after article upsert".to_string(),
                    ));
                }
            }

            for record in &matches {
                if insert_match(&tx, record)?.is_inserted() {
                    receipt.matches_inserted += 1;
                } else {
                    receipt.matches_existing += 1;
                }
            }
            tx.commit()?;

            debug!(
                article_id = %article.id,
                article_inserted = receipt.article_inserted,
                matches_inserted = receipt.matches_inserted,
                "Committed article"
            );
            Ok(receipt)
        })
        .await
    }

    async fn exists_article(&self, id: &ArticleId) -> Result<bool, StorageError> {
        let id = id.clone();
        self.blocking(move |conn| article_exists(conn, &id)).await
    }

    async fn get_article(&self, id: &ArticleId) -> Result<Option<Article>, StorageError> {
        let id = id.clone();
        self.blocking(move |conn| select_article(conn, &id)).await
    }

    async fn query_matches(&self, filter: &MatchFilter) -> Result<Vec<MatchRecord>, StorageError> {
        let filter = filter.clone();
        self.blocking(move |conn| select_matches(conn, &filter))
            .await
    }

    async fn recent_articles(&self, limit: usize) -> Result<Vec<StoredArticle>, StorageError> {
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ARTICLE_COLUMNS} FROM articles ORDER BY stored_at DESC, rowid DESC LIMIT ?1"
            ))?;
            let articles = stmt
                .query_map(params![limit as i64], |row| Ok(read_article(row)))?
                .collect::<Result<Vec<_>, _>>()?;

            articles
                .into_iter()
                .map(|article| -> Result<StoredArticle, StorageError> {
                    let article = article?;
                    let matches = select_matches(conn, &MatchFilter::for_article(article.id.clone()))?;
                    Ok(StoredArticle { article, matches })
                })
                .collect()
        })
        .await
    }

    async fn article_count(&self) -> Result<usize, StorageError> {
        self.blocking(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }
}

fn article_exists(conn: &Connection, id: &ArticleId) -> Result<bool, StorageError> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM articles WHERE id = ?1",
            params![id.as_str()],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

fn insert_article(conn: &Connection, article: &Article) -> Result<Upsert<Article>, StorageError> {
    let inserted = conn.execute(
        "INSERT INTO articles(id, url, title, body, source, published_at, fetched_at, stored_at)
         VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(id) DO NOTHING",
        params![
            article.id.as_str(),
            article.url,
            article.title,
            article.body,
            article.source,
            article.published_at.map(|t| t.timestamp_millis()),
            article.fetched_at.timestamp_millis(),
            Utc::now().timestamp_millis(),
        ],
    )?;

    if inserted == 1 {
        return Ok(Upsert::Inserted(article.clone()));
    }
    let existing = select_article(conn, &article.id)?.ok_or_else(|| {
        StorageError::Corrupt(format!("article {} vanished during upsert", article.id))
    })?;
    Ok(Upsert::Existing(existing))
}

fn insert_match(conn: &Connection, record: &MatchRecord) -> Result<Upsert<MatchRecord>, StorageError> {
    let inserted = conn.execute(
        "INSERT INTO matches(article_id, interest_id, interest_kind, interest_text, verified,
                             confidence, explanation, similarity, decided_at)
         VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(article_id, interest_id) DO NOTHING",
        params![
            record.article_id.as_str(),
            record.interest_id,
            record.interest_kind.as_str(),
            record.interest_text,
            record.verified,
            record.confidence as f64,
            record.explanation,
            record.similarity as f64,
            record.decided_at.timestamp_millis(),
        ],
    )?;

    if inserted == 1 {
        return Ok(Upsert::Inserted(record.clone()));
    }
    let existing = conn
        .query_row(
            &format!("SELECT {MATCH_COLUMNS} FROM matches WHERE article_id = ?1 AND interest_id = ?2"),
            params![record.article_id.as_str(), record.interest_id],
            |row| Ok(read_match(row)),
        )
        .optional()?
        .transpose()?
        .ok_or_else(|| {
            StorageError::Corrupt(format!(
                "match {}/{} vanished during upsert",
                record.article_id, record.interest_id
            ))
        })?;
    Ok(Upsert::Existing(existing))
}

fn select_article(conn: &Connection, id: &ArticleId) -> Result<Option<Article>, StorageError> {
    conn.query_row(
        &format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = ?1"),
        params![id.as_str()],
        |row| Ok(read_article(row)),
    )
    .optional()?
    .transpose()
}

fn select_matches(conn: &Connection, filter: &MatchFilter) -> Result<Vec<MatchRecord>, StorageError> {
    let mut sql = format!("SELECT {MATCH_COLUMNS} FROM matches WHERE 1 = 1");
    let mut values: Vec<Value> = Vec::new();

    if let Some(article_id) = &filter.article_id {
        values.push(Value::Text(article_id.as_str().to_string()));
        sql.push_str(&format!(" AND article_id = ?{}", values.len()));
    }
    if let Some(interest_id) = &filter.interest_id {
        values.push(Value::Text(interest_id.clone()));
        sql.push_str(&format!(" AND interest_id = ?{}", values.len()));
    }
    if let Some(since) = filter.since {
        values.push(Value::Integer(since.timestamp_millis()));
        sql.push_str(&format!(" AND decided_at >= ?{}", values.len()));
    }
    if let Some(until) = filter.until {
        values.push(Value::Integer(until.timestamp_millis()));
        sql.push_str(&format!(" AND decided_at < ?{}", values.len()));
    }
    sql.push_str(" ORDER BY decided_at DESC, article_id, interest_id");
    if let Some(limit) = filter.limit {
        values.push(Value::Integer(limit as i64));
        sql.push_str(&format!(" LIMIT ?{}", values.len()));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values), |row| Ok(read_match(row)))?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().collect()
}

// Row readers return a nested Result so conversion failures surface as `Corrupt` rather than
// being forced into a rusqlite error.
fn read_article(row: &Row<'_>) -> Result<Article, StorageError> {
    let published_at: Option<i64> = row.get(5)?;
    Ok(Article {
        id: ArticleId::new(row.get::<_, String>(0)?),
        url: row.get(1)?,
        title: row.get(2)?,
        body: row.get(3)?,
        source: row.get(4)?,
        published_at: published_at.map(millis_to_datetime).transpose()?,
        fetched_at: millis_to_datetime(row.get(6)?)?,
    })
}

fn read_match(row: &Row<'_>) -> Result<MatchRecord, StorageError> {
    let kind: String = row.get(2)?;
    let interest_kind = kind
        .parse::<InterestKind>()
        .map_err(StorageError::Corrupt)?;
    Ok(MatchRecord {
        article_id: ArticleId::new(row.get::<_, String>(0)?),
        interest_id: row.get(1)?,
        interest_kind,
        interest_text: row.get(3)?,
        verified: row.get(4)?,
        confidence: row.get::<_, f64>(5)? as f32,
        explanation: row.get(6)?,
        similarity: row.get::<_, f64>(7)? as f32,
        decided_at: millis_to_datetime(row.get(8)?)?,
    })
}

fn millis_to_datetime(millis: i64) -> Result<DateTime<Utc>, StorageError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StorageError::Corrupt(format!("timestamp out of range: {}", millis)))
}
