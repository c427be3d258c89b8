//! Structural diff between configuration trees
//!
//! The walk is pre-order over mappings in lexicographic key order, so the
//! same inputs always produce the same operations, and an `Add` of a
//! subtree always precedes anything beneath it. Lists and sets are compared
//! as whole values, and maps nested below [`MAX_DEPTH`] are replaced
//! wholesale.

use crate::ChangeOp;
use converge_model::{ConfigTree, MAX_DEPTH, TreePath, Value, equals};
use std::collections::{BTreeMap, BTreeSet};

/// Compute the operations that turn `current` into `desired`.
pub fn diff(current: &ConfigTree, desired: &ConfigTree) -> Vec<ChangeOp> {
    let mut ops = Vec::new();
    diff_maps(
        current.as_map(),
        desired.as_map(),
        &mut TreePath::root(),
        &mut ops,
        0,
    );
    tracing::debug!(ops = ops.len(), "diff computed");
    ops
}

fn diff_maps(
    current: &BTreeMap<String, Value>,
    desired: &BTreeMap<String, Value>,
    path: &mut TreePath,
    ops: &mut Vec<ChangeOp>,
    depth: usize,
) {
    let keys: BTreeSet<&String> = current.keys().chain(desired.keys()).collect();

    for key in keys {
        path.push(key.clone());
        match (current.get(key), desired.get(key)) {
            (None, Some(new)) => ops.push(ChangeOp::add(path.clone(), new.clone())),
            (Some(old), None) => ops.push(ChangeOp::remove(path.clone(), old.clone())),
            (Some(old), Some(new)) => diff_values(old, new, path, ops, depth + 1),
            (None, None) => unreachable!("key {key} comes from one of the maps"),
        }
        path.pop();
    }
}

fn diff_values(old: &Value, new: &Value, path: &mut TreePath, ops: &mut Vec<ChangeOp>, depth: usize) {
    if equals(old, new) {
        return;
    }

    match (old.unforced(), new.unforced()) {
        (Value::Map(old_map), Value::Map(new_map)) if depth < MAX_DEPTH => {
            diff_maps(old_map, new_map, path, ops, depth);
        }
        _ => ops.push(ChangeOp::replace(path.clone(), old.clone(), new.clone())),
    }
}
