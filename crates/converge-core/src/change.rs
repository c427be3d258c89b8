//! Change operations
//!
//! A [`ChangeOp`] is one unit of divergence between a current and a desired
//! tree. Every operation carries the values it needs to be undone, so the
//! reconciler can build compensating actions from the operation alone.

use converge_model::{ConfigTree, PathError, TreePath, Value, equals};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Add,
    Remove,
    Replace,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Replace => "replace",
        };
        f.write_str(name)
    }
}

/// One change to a configuration tree.
///
/// `Add` carries only `new_value`, `Remove` only `old_value`, `Replace`
/// both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeOp {
    pub path: TreePath,
    pub kind: ChangeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
}

impl ChangeOp {
    pub fn add(path: TreePath, value: Value) -> Self {
        Self {
            path,
            kind: ChangeKind::Add,
            old_value: None,
            new_value: Some(value),
        }
    }

    pub fn remove(path: TreePath, old: Value) -> Self {
        Self {
            path,
            kind: ChangeKind::Remove,
            old_value: Some(old),
            new_value: None,
        }
    }

    pub fn replace(path: TreePath, old: Value, new: Value) -> Self {
        Self {
            path,
            kind: ChangeKind::Replace,
            old_value: Some(old),
            new_value: Some(new),
        }
    }

    /// The compensating operation: applying `op` then `op.inverse()`
    /// leaves a tree unchanged.
    pub fn inverse(&self) -> Self {
        let kind = match self.kind {
            ChangeKind::Add => ChangeKind::Remove,
            ChangeKind::Remove => ChangeKind::Add,
            ChangeKind::Replace => ChangeKind::Replace,
        };
        Self {
            path: self.path.clone(),
            kind,
            old_value: self.new_value.clone(),
            new_value: self.old_value.clone(),
        }
    }

    fn required<'a>(&self, value: &'a Option<Value>, field: &'static str) -> Result<&'a Value, OpError> {
        value.as_ref().ok_or_else(|| OpError::Malformed {
            path: self.path.clone(),
            kind: self.kind,
            field,
        })
    }

    pub fn json(&self) -> serde_json::Value {
        let mut out = serde_json::json!({
            "path": self.path.segments(),
            "kind": self.kind,
        });
        if let Some(old) = &self.old_value {
            out["old_value"] = old.to_json();
        }
        if let Some(new) = &self.new_value {
            out["new_value"] = new.to_json();
        }
        out
    }

    /// Line diff of the rendered old and new values, for replacements of
    /// values too large to read on one line.
    pub fn detail(&self) -> Option<String> {
        let (old, new) = (self.old_value.as_ref()?, self.new_value.as_ref()?);
        let old = serde_json::to_string_pretty(&old.to_json()).ok()?;
        let new = serde_json::to_string_pretty(&new.to_json()).ok()?;
        if !old.contains('\n') && !new.contains('\n') {
            return None;
        }

        let diff = similar::TextDiff::from_lines(&old, &new);
        let mut out = String::new();
        for change in diff.iter_all_changes() {
            let sign = match change.tag() {
                similar::ChangeTag::Delete => '-',
                similar::ChangeTag::Insert => '+',
                similar::ChangeTag::Equal => ' ',
            };
            out.push(sign);
            out.push_str(change.value());
            if change.missing_newline() {
                out.push('\n');
            }
        }
        Some(out)
    }
}

impl fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: &Option<Value>| v.as_ref().map(ToString::to_string).unwrap_or_default();
        match self.kind {
            ChangeKind::Add => write!(f, "+ {} = {}", self.path, show(&self.new_value)),
            ChangeKind::Remove => write!(f, "- {} = {}", self.path, show(&self.old_value)),
            ChangeKind::Replace => write!(
                f,
                "~ {}: {} -> {}",
                self.path,
                show(&self.old_value),
                show(&self.new_value)
            ),
        }
    }
}

/// An operation does not fit the tree it is applied to.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OpError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error("{path} already holds a value")]
    Occupied { path: TreePath },

    #[error("{path} holds {actual}, expected {expected}")]
    Mismatch {
        path: TreePath,
        expected: Value,
        actual: Value,
    },

    #[error("{kind} operation at {path} has no {field}")]
    Malformed {
        path: TreePath,
        kind: ChangeKind,
        field: &'static str,
    },
}

/// Apply `op` to an in-memory tree.
///
/// The tree must be in the state the operation was computed against:
/// `Add` needs a free path, `Remove` and `Replace` need the recorded old
/// value to be present. On error the tree is unchanged.
pub fn apply_op(tree: &mut ConfigTree, op: &ChangeOp) -> Result<(), OpError> {
    match op.kind {
        ChangeKind::Add => {
            let new = op.required(&op.new_value, "new_value")?;
            if tree.get(&op.path).is_some() {
                return Err(OpError::Occupied {
                    path: op.path.clone(),
                });
            }
            tree.insert(&op.path, new.clone())?;
        }
        ChangeKind::Remove => {
            let old = op.required(&op.old_value, "old_value")?;
            expect_current(tree, &op.path, old)?;
            tree.remove(&op.path)?;
        }
        ChangeKind::Replace => {
            let old = op.required(&op.old_value, "old_value")?;
            let new = op.required(&op.new_value, "new_value")?;
            expect_current(tree, &op.path, old)?;
            tree.insert(&op.path, new.clone())?;
        }
    }
    Ok(())
}

fn expect_current(tree: &ConfigTree, path: &TreePath, expected: &Value) -> Result<(), OpError> {
    let actual = tree
        .get(path)
        .ok_or_else(|| PathError::NotFound { path: path.clone() })?;
    if !equals(actual, expected) {
        return Err(OpError::Mismatch {
            path: path.clone(),
            expected: expected.clone(),
            actual: actual.clone(),
        });
    }
    Ok(())
}

/// Counts of a changeset by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub added: usize,
    pub removed: usize,
    pub replaced: usize,
}

impl Summary {
    pub fn of(ops: &[ChangeOp]) -> Self {
        ops.iter().fold(Self::default(), |mut summary, op| {
            match op.kind {
                ChangeKind::Add => summary.added += 1,
                ChangeKind::Remove => summary.removed += 1,
                ChangeKind::Replace => summary.replaced += 1,
            }
            summary
        })
    }

    pub fn total(&self) -> usize {
        self.added + self.removed + self.replaced
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to add, {} to replace, {} to remove",
            self.added, self.replaced, self.removed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> ConfigTree {
        ConfigTree::from_iter([
            ("pkg", Value::list([Value::str("git")])),
            ("user", Value::str("alice")),
        ])
    }

    #[test]
    fn inverse_swaps_add_and_remove() {
        let op = ChangeOp::add("shell".parse().unwrap(), Value::str("zsh"));
        let inverse = op.inverse();

        assert_eq!(inverse.kind, ChangeKind::Remove);
        assert_eq!(inverse.old_value, Some(Value::str("zsh")));
        assert_eq!(inverse.new_value, None);
        assert_eq!(inverse.inverse(), op);
    }

    #[test]
    fn apply_then_inverse_restores_tree() {
        let mut live = tree();
        let op = ChangeOp::replace(
            "user".parse().unwrap(),
            Value::str("alice"),
            Value::str("bob"),
        );

        apply_op(&mut live, &op).unwrap();
        assert_eq!(live.get(&"user".parse().unwrap()), Some(&Value::str("bob")));

        apply_op(&mut live, &op.inverse()).unwrap();
        assert_eq!(live, tree());
    }

    #[test]
    fn add_over_existing_value_is_rejected() {
        let mut live = tree();
        let err = apply_op(
            &mut live,
            &ChangeOp::add("user".parse().unwrap(), Value::str("bob")),
        )
        .unwrap_err();

        assert!(matches!(err, OpError::Occupied { .. }));
        assert_eq!(live, tree());
    }

    #[test]
    fn replace_with_stale_old_value_is_rejected() {
        let mut live = tree();
        let err = apply_op(
            &mut live,
            &ChangeOp::replace(
                "user".parse().unwrap(),
                Value::str("root"),
                Value::str("bob"),
            ),
        )
        .unwrap_err();

        assert!(matches!(err, OpError::Mismatch { .. }));
    }

    #[test]
    fn malformed_op_names_missing_field() {
        let op = ChangeOp {
            path: "user".parse().unwrap(),
            kind: ChangeKind::Replace,
            old_value: Some(Value::str("alice")),
            new_value: None,
        };
        let err = apply_op(&mut tree(), &op).unwrap_err();
        assert_eq!(err.to_string(), "replace operation at user has no new_value");
    }

    #[test]
    fn display_uses_diff_markers() {
        let op = ChangeOp::replace(
            "pkg".parse().unwrap(),
            Value::list([Value::str("git")]),
            Value::list([Value::str("git"), Value::str("tmux")]),
        );
        assert_eq!(op.to_string(), "~ pkg: [\"git\"] -> [\"git\", \"tmux\"]");
    }

    #[test]
    fn summary_counts_by_kind() {
        let ops = vec![
            ChangeOp::add("a".parse().unwrap(), Value::int(1)),
            ChangeOp::add("b".parse().unwrap(), Value::int(2)),
            ChangeOp::remove("c".parse().unwrap(), Value::int(3)),
        ];
        let summary = Summary::of(&ops);
        assert_eq!(summary.total(), 3);
        assert_eq!(summary.to_string(), "2 to add, 0 to replace, 1 to remove");
    }
}
