use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{info, warn};

use super::source::InterestSource;
use super::{Interest, InterestError, InterestKind, parse_interest_lines};

/// Immutable, versioned view of the interest list.
#[derive(Debug, Clone)]
pub struct InterestSnapshot {
    version: u64,
    loaded_at: DateTime<Utc>,
    interests: Vec<Arc<Interest>>,
}

impl InterestSnapshot {
    /// Builds a snapshot; later duplicates of an id are dropped.
    pub fn new(version: u64, interests: Vec<Interest>) -> Self {
        let mut seen = HashSet::new();
        let interests = interests
            .into_iter()
            .filter(|interest| seen.insert(interest.id.clone()))
            .map(Arc::new)
            .collect();
        Self {
            version,
            loaded_at: Utc::now(),
            interests,
        }
    }

    /// Empty snapshot (version 0).
    pub fn empty() -> Self {
        Self::new(0, Vec::new())
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn interests(&self) -> &[Arc<Interest>] {
        &self.interests
    }

    pub fn len(&self) -> usize {
        self.interests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interests.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Interest>> {
        self.interests.iter().find(|interest| interest.id == id)
    }

    pub fn count_of(&self, kind: InterestKind) -> usize {
        self.interests.iter().filter(|i| i.kind == kind).count()
    }
}

/// Holds the current interest snapshot and rebuilds it on explicit reload.
pub struct InterestStore {
    source: Box<dyn InterestSource>,
    current: RwLock<Arc<InterestSnapshot>>,
    next_version: AtomicU64,
}

impl std::fmt::Debug for InterestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterestStore")
            .field("version", &self.current.read().version())
            .field("interests", &self.current.read().len())
            .finish()
    }
}

impl InterestStore {
    /// Creates a store with an empty snapshot; call [`reload`](Self::reload) to populate it.
    pub fn new(source: Box<dyn InterestSource>) -> Self {
        Self {
            source,
            current: RwLock::new(Arc::new(InterestSnapshot::empty())),
            next_version: AtomicU64::new(1),
        }
    }

    /// Returns the current snapshot.
    pub fn snapshot(&self) -> Arc<InterestSnapshot> {
        Arc::clone(&self.current.read())
    }

    /// Re-reads the source and swaps in a new snapshot.
    ///
    /// Runs holding the previous snapshot are unaffected.
    pub async fn reload(&self) -> Result<Arc<InterestSnapshot>, InterestError> {
        let texts = self.source.read().await?;

        let mut interests = parse_interest_lines(&texts.questions, InterestKind::Question);
        interests.extend(parse_interest_lines(&texts.topics, InterestKind::Topic));

        let version = self.next_version.fetch_add(1, Ordering::Relaxed);
        let snapshot = Arc::new(InterestSnapshot::new(version, interests));

        if snapshot.is_empty() {
            warn!(version, "Interest list is empty; no articles can match");
        } else {
            info!(
                version,
                questions = snapshot.count_of(InterestKind::Question),
                topics = snapshot.count_of(InterestKind::Topic),
                "Loaded interest snapshot"
            );
        }

        *self.current.write() = Arc::clone(&snapshot);
        Ok(snapshot)
    }
}
