//! Executors: the side-effecting half of reconciliation
//!
//! The reconciler decides *what* to change; an [`Executor`] performs each
//! [`ChangeOp`] against the real system and knows how to undo it.

use crate::{ChangeOp, apply_op};
use converge_model::ConfigTree;

/// An operation could not be carried out.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ExecError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ExecError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Performs and undoes change operations.
pub trait Executor {
    /// Carry out `op`.
    fn execute(&mut self, op: &ChangeOp) -> Result<(), ExecError>;

    /// Undo a previously executed `op`, using its recorded old value.
    fn compensate(&mut self, op: &ChangeOp) -> Result<(), ExecError>;
}

impl<E: Executor + ?Sized> Executor for &mut E {
    fn execute(&mut self, op: &ChangeOp) -> Result<(), ExecError> {
        (**self).execute(op)
    }

    fn compensate(&mut self, op: &ChangeOp) -> Result<(), ExecError> {
        (**self).compensate(op)
    }
}

impl<E: Executor + ?Sized> Executor for Box<E> {
    fn execute(&mut self, op: &ChangeOp) -> Result<(), ExecError> {
        (**self).execute(op)
    }

    fn compensate(&mut self, op: &ChangeOp) -> Result<(), ExecError> {
        (**self).compensate(op)
    }
}

/// Maintains a live in-memory tree.
///
/// Execution applies the operation to the tree; compensation applies its
/// inverse.
#[derive(Debug, Clone, Default)]
pub struct TreeExecutor {
    tree: ConfigTree,
}

impl TreeExecutor {
    pub fn new(tree: ConfigTree) -> Self {
        Self { tree }
    }

    pub fn tree(&self) -> &ConfigTree {
        &self.tree
    }

    pub fn into_tree(self) -> ConfigTree {
        self.tree
    }
}

impl Executor for TreeExecutor {
    fn execute(&mut self, op: &ChangeOp) -> Result<(), ExecError> {
        apply_op(&mut self.tree, op).map_err(|e| ExecError::with_source(format!("cannot apply {op}"), e))
    }

    fn compensate(&mut self, op: &ChangeOp) -> Result<(), ExecError> {
        apply_op(&mut self.tree, &op.inverse())
            .map_err(|e| ExecError::with_source(format!("cannot undo {op}"), e))
    }
}

/// Logs every operation and remembers it; never fails.
#[derive(Debug, Clone, Default)]
pub struct RecordingExecutor {
    executed: Vec<ChangeOp>,
    compensated: Vec<ChangeOp>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn executed(&self) -> &[ChangeOp] {
        &self.executed
    }

    pub fn compensated(&self) -> &[ChangeOp] {
        &self.compensated
    }
}

impl Executor for RecordingExecutor {
    fn execute(&mut self, op: &ChangeOp) -> Result<(), ExecError> {
        tracing::info!(path = %op.path, kind = %op.kind, "execute");
        self.executed.push(op.clone());
        Ok(())
    }

    fn compensate(&mut self, op: &ChangeOp) -> Result<(), ExecError> {
        tracing::info!(path = %op.path, kind = %op.kind, "compensate");
        self.compensated.push(op.clone());
        Ok(())
    }
}
