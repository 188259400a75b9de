use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::warn;

use super::InterestError;

/// Raw question and topic text, one interest per line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterestTexts {
    pub questions: String,
    pub topics: String,
}

#[async_trait]
/// Produces the current interest list as plain text.
pub trait InterestSource: Send + Sync {
    async fn read(&self) -> Result<InterestTexts, InterestError>;
}

/// Reads `question_list.md` / `topic_list.md` style files.
#[derive(Debug, Clone)]
pub struct FileInterestSource {
    questions_path: PathBuf,
    topics_path: PathBuf,
}

impl FileInterestSource {
    pub fn new(questions_path: PathBuf, topics_path: PathBuf) -> Self {
        Self {
            questions_path,
            topics_path,
        }
    }

    /// A missing file is an empty list; other I/O failures are errors.
    async fn read_optional(path: &Path) -> Result<String, InterestError> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Interest file not found; treating as empty");
                Ok(String::new())
            }
            Err(source) => Err(InterestError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

#[async_trait]
impl InterestSource for FileInterestSource {
    async fn read(&self) -> Result<InterestTexts, InterestError> {
        Ok(InterestTexts {
            questions: Self::read_optional(&self.questions_path).await?,
            topics: Self::read_optional(&self.topics_path).await?,
        })
    }
}

/// In-memory interest text, e.g. supplied by a UI form.
#[derive(Debug, Default)]
pub struct StaticInterestSource {
    texts: parking_lot::RwLock<InterestTexts>,
}

impl StaticInterestSource {
    pub fn new(questions: impl Into<String>, topics: impl Into<String>) -> Self {
        Self {
            texts: parking_lot::RwLock::new(InterestTexts {
                questions: questions.into(),
                topics: topics.into(),
            }),
        }
    }

    /// Replaces the text; takes effect on the next reload.
    pub fn set(&self, questions: impl Into<String>, topics: impl Into<String>) {
        *self.texts.write() = InterestTexts {
            questions: questions.into(),
            topics: topics.into(),
        };
    }
}

#[async_trait]
impl InterestSource for StaticInterestSource {
    async fn read(&self) -> Result<InterestTexts, InterestError> {
        Ok(self.texts.read().clone())
    }
}
