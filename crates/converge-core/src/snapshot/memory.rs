//! In-process snapshot store

use super::{Generation, RunLock, SnapshotStore};
use crate::{ConcurrentRunError, Error, Result};
use converge_model::ConfigTree;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Keeps generations in memory. Used by tests and embedding callers.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    generations: Mutex<Vec<Generation>>,
    running: Arc<AtomicBool>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn generations(&self) -> MutexGuard<'_, Vec<Generation>> {
        self.generations.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn latest(&self) -> Result<Option<Generation>> {
        Ok(self.generations().last().cloned())
    }

    fn get(&self, id: u64) -> Result<Generation> {
        self.generations()
            .iter()
            .find(|g| g.id() == id)
            .cloned()
            .ok_or(Error::GenerationNotFound { id })
    }

    fn list(&self) -> Result<Vec<Generation>> {
        Ok(self.generations().clone())
    }

    fn lock(&self) -> Result<RunLock> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ConcurrentRunError {
                resource: "the in-memory snapshot store".to_string(),
                holder: None,
            })?;
        Ok(RunLock::flag(Arc::clone(&self.running)))
    }

    fn record_locked(&self, lock: &RunLock, tree: ConfigTree) -> Result<Generation> {
        if !lock.holds_flag(&self.running) {
            return Err(Error::ForeignLock {
                resource: "the in-memory snapshot store".to_string(),
            });
        }
        let mut generations = self.generations();
        let id = generations.last().map_or(1, |g| g.id() + 1);
        let generation = Generation::new(id, tree)?;
        generations.push(generation.clone());
        tracing::debug!(id, "generation recorded in memory");
        Ok(generation)
    }
}
