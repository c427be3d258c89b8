//! Core reconciliation layer for converge
//!
//! This crate turns desired-state fragments into applied generations:
//!
//! - **Loader**: parses fragments and merges them into one [`ConfigTree`]
//! - **Diff engine**: compares current and desired trees into an ordered
//!   list of [`ChangeOp`]s
//! - **Reconciler**: applies a changeset through an [`Executor`], rolling
//!   back with compensating actions when an operation fails
//! - **Snapshot store**: append-only history of applied [`Generation`]s
//!
//! # Architecture
//!
//! ```text
//!                 converge-cli
//!                      |
//!                converge-core
//!                      |
//!          +-----------+-----------+
//!          |                       |
//!    converge-model           converge-fs
//! ```
//!
//! # Example
//!
//! ```
//! use converge_core::{Fragment, Loader, MemorySnapshotStore, Reconciler, TreeExecutor};
//! use converge_model::{FieldSpec, MergePolicy, Schema};
//!
//! let schema = Schema::new()
//!     .field("pkg", FieldSpec::list(MergePolicy::Append))
//!     .field("user", FieldSpec::scalar());
//! let desired = Loader::new(schema)
//!     .load(&[Fragment::toml("host.toml", "pkg = [\"git\"]\nuser = \"alice\"\n")])
//!     .unwrap();
//!
//! let store = MemorySnapshotStore::new();
//! let mut reconciler = Reconciler::new(&store, TreeExecutor::default());
//! let outcome = reconciler.reconcile(&desired).unwrap();
//!
//! assert_eq!(outcome.generation.id(), 1);
//! assert_eq!(outcome.changes.len(), 2);
//! ```

pub mod change;
pub mod diff;
pub mod error;
pub mod executor;
pub mod loader;
pub mod reconcile;
pub mod snapshot;

pub use change::{ChangeKind, ChangeOp, OpError, Summary, apply_op};
pub use diff::diff;
pub use error::{ConcurrentRunError, Error, Result};
pub use executor::{ExecError, Executor, RecordingExecutor, TreeExecutor};
pub use loader::{Fragment, Loader, load_schema};
pub use reconcile::{ApplyError, CompensationFailure, ReconcileOutcome, Reconciler};
pub use snapshot::{
    FileSnapshotStore, Generation, MemorySnapshotStore, RunLock, SnapshotStore, VerifyReport,
};

pub use converge_model::{ConfigTree, Schema, TreePath, Value};
