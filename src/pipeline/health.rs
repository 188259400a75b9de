use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use tracing::error;

use super::types::Dependency;

/// Consecutive exhausted failures per dependency; a success resets the count.
#[derive(Debug)]
pub(crate) struct DependencyHealth {
    budget: u32,
    embedding: AtomicU32,
    llm: AtomicU32,
    storage: AtomicU32,
    lost: Mutex<Option<(Dependency, u32)>>,
}

impl DependencyHealth {
    pub(crate) fn new(budget: u32) -> Self {
        Self {
            budget: budget.max(1),
            embedding: AtomicU32::new(0),
            llm: AtomicU32::new(0),
            storage: AtomicU32::new(0),
            lost: Mutex::new(None),
        }
    }

    fn counter(&self, dependency: Dependency) -> &AtomicU32 {
        match dependency {
            Dependency::Embedding => &self.embedding,
            Dependency::Llm => &self.llm,
            Dependency::Storage => &self.storage,
        }
    }

    pub(crate) fn success(&self, dependency: Dependency) {
        self.counter(dependency).store(0, Ordering::Release);
    }

    pub(crate) fn failure(&self, dependency: Dependency) {
        let failures = self.counter(dependency).fetch_add(1, Ordering::AcqRel) + 1;
        if failures < self.budget {
            return;
        }
        let mut lost = self.lost.lock();
        if lost.is_none() {
            error!(%dependency, failures, "Dependency lost, aborting run");
            *lost = Some((dependency, failures));
        }
    }

    /// First dependency that used up the budget.
    pub(crate) fn lost(&self) -> Option<(Dependency, u32)> {
        *self.lost.lock()
    }

    pub(crate) fn is_lost(&self) -> bool {
        self.lost.lock().is_some()
    }
}
