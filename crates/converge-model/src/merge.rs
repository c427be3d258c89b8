//! Merging configuration fragments
//!
//! Merge rules, checked in order at every path:
//!
//! 1. An override-marked right side wins. An override-marked left side is
//!    kept against an unmarked right side.
//! 2. Maps merge key-wise; keys present on one side pass through.
//! 3. Lists follow the field's [`MergePolicy`]; undeclared lists replace.
//! 4. Sets take the union.
//! 5. Equal values merge to themselves.
//! 6. Otherwise a field declared `overridable`, or nested in one, takes the
//!    right side; anything else is a conflict.

use crate::{ConfigTree, ConflictError, FieldSpec, MergePolicy, Schema, TreePath, Value, equals};
use std::collections::BTreeMap;

/// Merge `right` into `left`, following the declarations in `schema`.
pub fn merge(left: &ConfigTree, right: &ConfigTree, schema: &Schema) -> Result<ConfigTree, ConflictError> {
    let mut path = TreePath::root();
    let merged = merge_maps(left.as_map(), right.as_map(), Some(&schema.fields), false, &mut path)?;
    Ok(ConfigTree::from_map(merged))
}

/// Merge two values found at `path`, with `spec` as their declaration.
pub fn merge_value(
    left: &Value,
    right: &Value,
    spec: Option<&FieldSpec>,
    path: &mut TreePath,
) -> Result<Value, ConflictError> {
    merge_at(left, right, spec, false, path)
}

fn merge_at(
    left: &Value,
    right: &Value,
    spec: Option<&FieldSpec>,
    inherited: bool,
    path: &mut TreePath,
) -> Result<Value, ConflictError> {
    match (left, right) {
        (_, Value::Override(_)) => return Ok(right.clone()),
        (Value::Override(_), _) => return Ok(left.clone()),
        _ => {}
    }

    let overridable = inherited || spec.is_some_and(|s| s.overridable);
    match (left, right) {
        (Value::Map(l), Value::Map(r)) => {
            merge_maps(l, r, spec.map(|s| &s.fields), overridable, path).map(Value::Map)
        }
        (Value::List(l), Value::List(r)) => {
            match spec.map(|s| s.merge).unwrap_or_default() {
                MergePolicy::Append => Ok(Value::List(l.iter().chain(r).cloned().collect())),
                MergePolicy::Replace => Ok(right.clone()),
            }
        }
        (Value::Set(l), Value::Set(r)) => Ok(Value::Set(l.union(r).cloned().collect())),
        _ if equals(left, right) => Ok(left.clone()),
        _ if overridable => Ok(right.clone()),
        _ => Err(ConflictError {
            path: path.clone(),
            left: left.clone(),
            right: right.clone(),
        }),
    }
}

fn merge_maps(
    left: &BTreeMap<String, Value>,
    right: &BTreeMap<String, Value>,
    fields: Option<&BTreeMap<String, FieldSpec>>,
    overridable: bool,
    path: &mut TreePath,
) -> Result<BTreeMap<String, Value>, ConflictError> {
    let mut merged = left.clone();

    for (key, right_value) in right {
        let value = match left.get(key) {
            Some(left_value) => {
                path.push(key.clone());
                let spec = fields.and_then(|f| f.get(key));
                let result = merge_at(left_value, right_value, spec, overridable, path);
                path.pop();
                result?
            }
            None => right_value.clone(),
        };
        merged.insert(key.clone(), value);
    }

    Ok(merged)
}
