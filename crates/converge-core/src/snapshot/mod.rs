//! Append-only history of applied generations
//!
//! Every successful run records the tree it left the system in as a new
//! [`Generation`]. Generations are never modified or deleted; rolling back
//! records a new generation holding an older tree.

mod file;
mod memory;

pub use file::FileSnapshotStore;
pub use memory::MemorySnapshotStore;

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use converge_fs::{RunLockFile, compute_checksum};
use converge_model::ConfigTree;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// An immutable, timestamped, sequentially numbered applied state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    id: u64,
    timestamp: DateTime<Utc>,
    checksum: String,
    tree: ConfigTree,
}

impl Generation {
    /// Fails for trees nested deeper than the store can read back.
    pub(crate) fn new(id: u64, tree: ConfigTree) -> Result<Self> {
        tree.check_depth().map_err(|source| Error::Schema {
            origin: format!("generation {id}"),
            source,
        })?;
        Ok(Self {
            id,
            timestamp: Utc::now(),
            checksum: tree_checksum(&tree)?,
            tree,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// `sha256:<hex>` over the canonical JSON encoding of the tree
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn tree(&self) -> &ConfigTree {
        &self.tree
    }

    pub fn into_tree(self) -> ConfigTree {
        self.tree
    }

    /// Check the stored checksum against the tree.
    pub fn verify(&self) -> Result<()> {
        let actual = tree_checksum(&self.tree)?;
        if actual != self.checksum {
            return Err(Error::CorruptGeneration {
                id: self.id,
                message: format!("checksum mismatch: recorded {}, computed {actual}", self.checksum),
            });
        }
        Ok(())
    }
}

fn tree_checksum(tree: &ConfigTree) -> Result<String> {
    Ok(compute_checksum(&serde_json::to_vec(tree)?))
}

/// Proof that the holder is the single writer of a store.
///
/// Only the store that issued it accepts it. Released on drop.
#[derive(Debug)]
pub struct RunLock {
    guard: LockGuard,
}

#[derive(Debug)]
enum LockGuard {
    File(RunLockFile),
    Flag(Arc<AtomicBool>),
}

impl RunLock {
    fn file(lock: RunLockFile) -> Self {
        Self {
            guard: LockGuard::File(lock),
        }
    }

    fn flag(flag: Arc<AtomicBool>) -> Self {
        Self {
            guard: LockGuard::Flag(flag),
        }
    }

    fn holds_file(&self, path: &Path) -> bool {
        matches!(&self.guard, LockGuard::File(lock) if lock.path() == path)
    }

    fn holds_flag(&self, flag: &Arc<AtomicBool>) -> bool {
        matches!(&self.guard, LockGuard::Flag(held) if Arc::ptr_eq(held, flag))
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        match self {
            Self::File(lock) => {
                tracing::trace!(path = %lock.path().display(), "releasing run lock");
            }
            Self::Flag(flag) => flag.store(false, Ordering::Release),
        }
    }
}

/// Result of walking a store's whole history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    /// Generations read
    pub checked: usize,
    /// One message per problem found
    pub problems: Vec<String>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Storage for generations.
pub trait SnapshotStore {
    /// The most recent generation, if any run has been recorded.
    fn latest(&self) -> Result<Option<Generation>>;

    /// Look up a generation by id.
    fn get(&self, id: u64) -> Result<Generation>;

    /// Every generation, oldest first.
    fn list(&self) -> Result<Vec<Generation>>;

    /// Take the single-writer lock without waiting.
    ///
    /// Fails with [`Error::ConcurrentRun`] while another holder exists.
    fn lock(&self) -> Result<RunLock>;

    /// Record `tree` as the next generation while holding `lock`.
    ///
    /// Fails with [`Error::ForeignLock`] if `lock` was issued by another
    /// store.
    fn record_locked(&self, lock: &RunLock, tree: ConfigTree) -> Result<Generation>;

    /// Take the lock and record `tree` as the next generation.
    fn record(&self, tree: ConfigTree) -> Result<Generation> {
        let lock = self.lock()?;
        self.record_locked(&lock, tree)
    }

    /// Walk the whole history, checking every checksum.
    fn verify(&self) -> Result<VerifyReport> {
        let mut report = VerifyReport::default();
        for generation in self.list()? {
            report.checked += 1;
            if let Err(e) = generation.verify() {
                report.problems.push(e.to_string());
            }
        }
        Ok(report)
    }
}

impl<S: SnapshotStore + ?Sized> SnapshotStore for &S {
    fn latest(&self) -> Result<Option<Generation>> {
        (**self).latest()
    }

    fn get(&self, id: u64) -> Result<Generation> {
        (**self).get(id)
    }

    fn list(&self) -> Result<Vec<Generation>> {
        (**self).list()
    }

    fn lock(&self) -> Result<RunLock> {
        (**self).lock()
    }

    fn record_locked(&self, lock: &RunLock, tree: ConfigTree) -> Result<Generation> {
        (**self).record_locked(lock, tree)
    }

    fn verify(&self) -> Result<VerifyReport> {
        (**self).verify()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge_model::Value;

    #[test]
    fn generation_checksum_covers_tree() {
        let tree = ConfigTree::from_iter([("user", Value::str("alice"))]);
        let generation = Generation::new(1, tree).unwrap();

        assert!(converge_fs::is_checksum(generation.checksum()));
        generation.verify().unwrap();

        let mut tampered = generation.clone();
        tampered.tree = ConfigTree::from_iter([("user", Value::str("mallory"))]);
        assert!(matches!(
            tampered.verify(),
            Err(Error::CorruptGeneration { id: 1, .. })
        ));
    }

    #[test]
    fn identical_trees_share_a_checksum() {
        let tree = ConfigTree::from_iter([("a", Value::int(1)), ("b", Value::int(2))]);
        let first = Generation::new(1, tree.clone()).unwrap();
        let second = Generation::new(2, tree).unwrap();
        assert_eq!(first.checksum(), second.checksum());
    }
}
