//! Fetch-source seam.
//!
//! A source yields a lazy, finite stream of article-shaped records each time it is fetched.
//! Network fetching and text extraction live outside this crate; [`JsonLinesSource`] reads
//! their output.

mod error;


pub use error::SourceError;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::ready;
use futures_util::stream::{self, BoxStream, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tracing::{debug, warn};

use crate::article::{Article, RawArticle};

pub trait ArticleSource: Send + Sync {
    /// Name recorded on articles that do not carry their own source.
    fn name(&self) -> &str;

    /// Starts a fresh pass over the source.
    fn fetch(&self) -> BoxStream<'static, Result<RawArticle, SourceError>>;
}

/// Reads one JSON article object per line. Blank lines are ignored.
#[derive(Debug, Clone)]
pub struct JsonLinesSource {
    name: String,
    path: PathBuf,
}

impl JsonLinesSource {
    pub fn new(name: impl Into<String>, path: impl AsRef<Path>) -> Self {
        Self {
            name: name.into(),
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ArticleSource for JsonLinesSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self) -> BoxStream<'static, Result<RawArticle, SourceError>> {
        let name = self.name.clone();
        let path = self.path.clone();

        stream::once(async move {
            let opened = tokio::fs::File::open(&path).await;
            (opened, name, path)
        })
        .flat_map(|(opened, name, path)| match opened {
            Ok(file) => LinesStream::new(BufReader::new(file).lines())
                .enumerate()
                .filter_map(move |(idx, line)| ready(parse_line(&name, &path, idx + 1, line)))
                .boxed(),
            Err(error) => stream::iter([Err(SourceError::Io {
                source_name: name,
                path,
                error,
            })])
            .boxed(),
        })
        .boxed()
    }
}

fn parse_line(
    name: &str,
    path: &Path,
    line_no: usize,
    line: std::io::Result<String>,
) -> Option<Result<RawArticle, SourceError>> {
    let line = match line {
        Ok(line) => line,
        Err(error) => {
            return Some(Err(SourceError::Io {
                source_name: name.to_string(),
                path: path.to_path_buf(),
                error,
            }));
        }
    };
    if line.trim().is_empty() {
        return None;
    }

    Some(
        serde_json::from_str::<RawArticle>(&line).map_err(|e| SourceError::Malformed {
            source_name: name.to_string(),
            line: line_no,
            reason: e.to_string(),
        }),
    )
}

/// In-memory source, mostly for tests and embedding callers.
#[derive(Debug, Clone)]
pub struct VecSource {
    name: String,
    articles: Vec<RawArticle>,
}

impl VecSource {
    pub fn new(name: impl Into<String>, articles: Vec<RawArticle>) -> Self {
        Self {
            name: name.into(),
            articles,
        }
    }
}

impl ArticleSource for VecSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self) -> BoxStream<'static, Result<RawArticle, SourceError>> {
        stream::iter(self.articles.clone().into_iter().map(Ok)).boxed()
    }
}

/// Articles gathered from all sources for one run.
#[derive(Debug, Default)]
pub struct FetchedBatch {
    pub articles: Vec<Article>,
    /// Records that could not be read and were skipped.
    pub malformed: usize,
    /// Records dropped because an earlier one had the same id.
    pub duplicates: usize,
}

/// Pulls up to `max_per_source` valid records from each source and dedups by article id.
///
/// Unreadable records are logged and skipped; they do not count toward the cap.
pub async fn collect_batch(
    sources: &[Arc<dyn ArticleSource>],
    max_per_source: usize,
    fetched_at: DateTime<Utc>,
) -> FetchedBatch {
    let mut batch = FetchedBatch::default();
    let mut seen = HashSet::new();

    for source in sources {
        let mut stream = source.fetch();
        let mut taken = 0usize;

        while taken < max_per_source {
            let Some(item) = stream.next().await else {
                break;
            };
            match item {
                Ok(raw) => {
                    taken += 1;
                    let article = Article::from_raw(raw, source.name(), fetched_at);
                    if seen.insert(article.id.clone()) {
                        batch.articles.push(article);
                    } else {
                        batch.duplicates += 1;
                    }
                }
                Err(e) => {
                    batch.malformed += 1;
                    warn!(source = source.name(), error = %e, "Skipping unreadable record");
                }
            }
        }

        debug!(source = source.name(), taken, "Source drained");
    }

    batch
}
