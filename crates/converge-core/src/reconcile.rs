//! Applying changesets
//!
//! A run holds the store's single-writer lock from start to finish:
//!
//! 1. read the latest generation and compute the target tree by applying
//!    the changeset to it in memory; a changeset that does not fit fails
//!    with [`Error::StalePlan`], and a target nested deeper than
//!    [`MAX_DEPTH`](converge_model::MAX_DEPTH) with [`Error::Schema`], before any side effect
//! 2. execute every operation in order through the [`Executor`]
//! 3. if operation k fails, compensate operations k-1..0 in reverse order
//!    and report an [`ApplyError`]; nothing is recorded
//! 4. otherwise record the target tree as a new generation; if that fails,
//!    compensate every operation and report [`Error::Record`]

use crate::snapshot::{Generation, RunLock, SnapshotStore};
use crate::{ChangeOp, Error, ExecError, Executor, Result, apply_op, diff};
use converge_model::ConfigTree;

/// An operation failed and the run was rolled back.
#[derive(Debug, thiserror::Error)]
#[error("Operation {index} ({failed_op}) failed: {cause}{}", compensation_note(.rolled_back, .compensation_failures))]
pub struct ApplyError {
    /// Position of the failed operation in the changeset
    pub index: usize,
    pub failed_op: ChangeOp,
    #[source]
    pub cause: ExecError,
    /// Operations successfully compensated
    pub rolled_back: usize,
    /// Compensations that failed; empty when rollback was clean
    pub compensation_failures: Vec<CompensationFailure>,
}

impl ApplyError {
    /// Whether every executed operation was undone.
    pub fn is_clean_rollback(&self) -> bool {
        self.compensation_failures.is_empty()
    }
}

pub(crate) fn compensation_note(rolled_back: &usize, failures: &[CompensationFailure]) -> String {
    if failures.is_empty() {
        format!("; rolled back {rolled_back} operation(s)")
    } else {
        let failed: Vec<String> = failures
            .iter()
            .map(|f| format!("{} ({})", f.op.path, f.error))
            .collect();
        format!(
            "; rolled back {rolled_back} operation(s), could not undo {}",
            failed.join(", ")
        )
    }
}

/// A compensating action that itself failed.
#[derive(Debug)]
pub struct CompensationFailure {
    /// The operation that could not be undone
    pub op: ChangeOp,
    pub error: ExecError,
}

/// What a [`Reconciler::reconcile`] run did.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    /// The generation the system is now in
    pub generation: Generation,
    /// Operations that were executed; empty when already converged
    pub changes: Vec<ChangeOp>,
}

/// Applies changesets through an executor and records the results.
pub struct Reconciler<S: SnapshotStore, E: Executor> {
    store: S,
    executor: E,
}

impl<S: SnapshotStore, E: Executor> Reconciler<S, E> {
    pub fn new(store: S, executor: E) -> Self {
        Self { store, executor }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn into_executor(self) -> E {
        self.executor
    }

    /// The tree of the latest generation, or an empty tree.
    pub fn current(&self) -> Result<ConfigTree> {
        Ok(self
            .store
            .latest()?
            .map(Generation::into_tree)
            .unwrap_or_default())
    }

    /// Operations that would bring the latest generation to `desired`.
    pub fn plan(&self, desired: &ConfigTree) -> Result<Vec<ChangeOp>> {
        Ok(diff(&self.current()?, desired))
    }

    /// Apply a precomputed changeset.
    ///
    /// An empty changeset returns the latest generation unchanged; against
    /// an empty store it records generation 1 holding the empty tree.
    pub fn apply(&mut self, ops: &[ChangeOp]) -> Result<Generation> {
        let lock = self.store.lock()?;
        let base = self.store.latest()?;
        self.apply_locked(&lock, base, ops)
    }

    /// Diff against the latest generation and apply, in one locked run.
    pub fn reconcile(&mut self, desired: &ConfigTree) -> Result<ReconcileOutcome> {
        let lock = self.store.lock()?;
        let base = self.store.latest()?;
        let changes = match &base {
            Some(generation) => diff(generation.tree(), desired),
            None => diff(&ConfigTree::new(), desired),
        };
        let generation = self.apply_locked(&lock, base, &changes)?;
        Ok(ReconcileOutcome {
            generation,
            changes,
        })
    }

    fn apply_locked(
        &mut self,
        lock: &RunLock,
        base: Option<Generation>,
        ops: &[ChangeOp],
    ) -> Result<Generation> {
        let base_id = base.as_ref().map(Generation::id);
        let mut target = match base {
            Some(generation) if ops.is_empty() => {
                tracing::info!(id = generation.id(), "already converged");
                return Ok(generation);
            }
            Some(generation) => generation.into_tree(),
            None => ConfigTree::new(),
        };

        for (index, op) in ops.iter().enumerate() {
            apply_op(&mut target, op).map_err(|source| Error::StalePlan {
                index,
                op: op.to_string(),
                source,
            })?;
        }

        target.check_depth().map_err(|source| Error::Schema {
            origin: "change set".to_string(),
            source,
        })?;

        tracing::info!(base = ?base_id, ops = ops.len(), "applying changeset");
        self.execute_all(ops)?;

        match self.store.record_locked(lock, target) {
            Ok(generation) => {
                tracing::info!(id = generation.id(), "run complete");
                Ok(generation)
            }
            Err(e) => {
                tracing::warn!(error = %e, "recording failed, rolling back");
                let compensation_failures = self.compensate(ops);
                Err(Error::Record {
                    source: Box::new(e),
                    rolled_back: ops.len() - compensation_failures.len(),
                    compensation_failures,
                })
            }
        }
    }

    fn execute_all(&mut self, ops: &[ChangeOp]) -> std::result::Result<(), ApplyError> {
        for (index, op) in ops.iter().enumerate() {
            tracing::debug!(index, path = %op.path, kind = %op.kind, "executing");
            if let Err(cause) = self.executor.execute(op) {
                tracing::warn!(index, path = %op.path, error = %cause, "operation failed, rolling back");
                let compensation_failures = self.compensate(&ops[..index]);
                return Err(ApplyError {
                    index,
                    failed_op: op.clone(),
                    cause,
                    rolled_back: index - compensation_failures.len(),
                    compensation_failures,
                });
            }
        }
        Ok(())
    }

    /// Undo `applied` in reverse order. Keeps going past failures.
    fn compensate(&mut self, applied: &[ChangeOp]) -> Vec<CompensationFailure> {
        let mut failures = Vec::new();
        for op in applied.iter().rev() {
            tracing::debug!(path = %op.path, kind = %op.kind, "compensating");
            if let Err(error) = self.executor.compensate(op) {
                tracing::warn!(path = %op.path, error = %error, "compensation failed");
                failures.push(CompensationFailure {
                    op: op.clone(),
                    error,
                });
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemorySnapshotStore, RecordingExecutor, TreeExecutor};
    use converge_model::Value;

    #[test]
    fn empty_changeset_on_empty_store_records_first_generation() {
        let store = MemorySnapshotStore::new();
        let mut reconciler = Reconciler::new(&store, RecordingExecutor::new());

        let generation = reconciler.apply(&[]).unwrap();

        assert_eq!(generation.id(), 1);
        assert!(generation.tree().is_empty());
    }

    #[test]
    fn empty_changeset_returns_latest_generation() {
        let store = MemorySnapshotStore::new();
        let first = store
            .record(ConfigTree::from_iter([("user", Value::str("alice"))]))
            .unwrap();
        let mut reconciler = Reconciler::new(&store, RecordingExecutor::new());

        let generation = reconciler.apply(&[]).unwrap();

        assert_eq!(generation, first);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn stale_changeset_fails_before_executing() {
        let store = MemorySnapshotStore::new();
        store
            .record(ConfigTree::from_iter([("user", Value::str("bob"))]))
            .unwrap();
        let mut reconciler = Reconciler::new(&store, RecordingExecutor::new());
        let ops = [ChangeOp::replace(
            "user".parse().unwrap(),
            Value::str("alice"),
            Value::str("carol"),
        )];

        let err = reconciler.apply(&ops).unwrap_err();

        assert!(matches!(err, Error::StalePlan { index: 0, .. }));
        assert!(reconciler.executor().executed().is_empty());
    }

    #[test]
    fn reconcile_records_desired_tree() {
        let store = MemorySnapshotStore::new();
        let mut reconciler = Reconciler::new(&store, TreeExecutor::default());
        let desired = ConfigTree::from_iter([("user", Value::str("alice"))]);

        let outcome = reconciler.reconcile(&desired).unwrap();

        assert_eq!(outcome.changes.len(), 1);
        assert_eq!(outcome.generation.tree(), &desired);
        assert_eq!(reconciler.executor().tree(), &desired);

        let again = reconciler.reconcile(&desired).unwrap();
        assert!(again.changes.is_empty());
        assert_eq!(again.generation.id(), outcome.generation.id());
    }

    #[test]
    fn run_holds_the_lock() {
        let store = MemorySnapshotStore::new();
        let _held = store.lock().unwrap();
        let mut reconciler = Reconciler::new(&store, RecordingExecutor::new());

        let err = reconciler.apply(&[]).unwrap_err();

        assert!(matches!(err, Error::ConcurrentRun(_)));
    }
}
