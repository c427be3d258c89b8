//! Executors that fail on demand.

use converge_core::{ChangeOp, ExecError, Executor, TreeExecutor};
use converge_model::ConfigTree;

/// A [`TreeExecutor`] whose `n`-th execution (0-based) fails.
///
/// Compensation can be made to fail too, for paths listed with
/// [`FailingExecutor::failing_compensation`].
#[derive(Debug, Clone)]
pub struct FailingExecutor {
    inner: TreeExecutor,
    fail_at: Option<usize>,
    executed: usize,
    stuck: Vec<String>,
    /// Paths compensated, in order
    pub compensated: Vec<String>,
}

impl FailingExecutor {
    /// Start from `tree`, failing the execution with index `fail_at`.
    pub fn new(tree: ConfigTree, fail_at: usize) -> Self {
        Self {
            inner: TreeExecutor::new(tree),
            fail_at: Some(fail_at),
            executed: 0,
            stuck: Vec::new(),
            compensated: Vec::new(),
        }
    }

    /// Never fail executions.
    pub fn succeeding(tree: ConfigTree) -> Self {
        Self {
            fail_at: None,
            ..Self::new(tree, 0)
        }
    }

    /// Refuse to compensate the operation at `path` (dotted form).
    pub fn failing_compensation(mut self, path: &str) -> Self {
        self.stuck.push(path.to_string());
        self
    }

    /// The live tree.
    pub fn tree(&self) -> &ConfigTree {
        self.inner.tree()
    }
}

impl Executor for FailingExecutor {
    fn execute(&mut self, op: &ChangeOp) -> Result<(), ExecError> {
        let index = self.executed;
        self.executed += 1;
        if self.fail_at == Some(index) {
            return Err(ExecError::new(format!("injected failure at operation {index}")));
        }
        self.inner.execute(op)
    }

    fn compensate(&mut self, op: &ChangeOp) -> Result<(), ExecError> {
        let path = op.path.to_string();
        if self.stuck.contains(&path) {
            return Err(ExecError::new(format!("injected compensation failure at {path}")));
        }
        self.compensated.push(path);
        self.inner.compensate(op)
    }
}
