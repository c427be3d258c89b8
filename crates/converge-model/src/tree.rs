//! The configuration tree

use crate::{PathError, SchemaError, TreePath, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Deepest nesting a tree may hold. A top-level scalar is at depth 1, the
/// values of a top-level map at depth 2.
pub const MAX_DEPTH: usize = 32;

/// A desired or applied system state: a root mapping of values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigTree {
    root: BTreeMap<String, Value>,
}

impl ConfigTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(root: BTreeMap<String, Value>) -> Self {
        Self { root }
    }

    pub fn as_map(&self) -> &BTreeMap<String, Value> {
        &self.root
    }

    pub fn into_map(self) -> BTreeMap<String, Value> {
        self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn len(&self) -> usize {
        self.root.len()
    }

    /// Top-level keys in lexicographic order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.root.keys().map(String::as_str)
    }

    /// Look up the value at `path`. The root path has no value.
    pub fn get(&self, path: &TreePath) -> Option<&Value> {
        let (first, rest) = path.segments().split_first()?;
        let mut current = self.root.get(first)?;
        for key in rest {
            current = current.unforced().as_map()?.get(key)?;
        }
        Some(current)
    }

    /// Set the value at `path`, returning what was there before.
    ///
    /// The parent mapping must already exist; intermediate mappings are
    /// never created implicitly.
    pub fn insert(&mut self, path: &TreePath, value: Value) -> Result<Option<Value>, PathError> {
        let (parent, key) = path.split_last().ok_or(PathError::Root)?;
        let map = self.map_at_mut(parent)?;
        Ok(map.insert(key.to_string(), value))
    }

    /// Remove and return the value at `path`.
    pub fn remove(&mut self, path: &TreePath) -> Result<Value, PathError> {
        let (parent, key) = path.split_last().ok_or(PathError::Root)?;
        let map = self.map_at_mut(parent)?;
        map.remove(key)
            .ok_or_else(|| PathError::NotFound { path: path.clone() })
    }

    fn map_at_mut(&mut self, segments: &[String]) -> Result<&mut BTreeMap<String, Value>, PathError> {
        let mut current = &mut self.root;
        for (depth, key) in segments.iter().enumerate() {
            let prefix = || TreePath::new(segments[..=depth].iter().cloned());
            current = match current.get_mut(key) {
                Some(Value::Map(map)) => map,
                Some(other) => {
                    return Err(PathError::NotAMap {
                        path: prefix(),
                        found: other.kind_name(),
                    });
                }
                None => return Err(PathError::MissingParent { path: prefix() }),
            };
        }
        Ok(current)
    }

    /// Strip override markers left over from merging.
    pub fn resolved(self) -> Self {
        Self {
            root: self.root.into_iter().map(|(k, v)| (k, v.resolved())).collect(),
        }
    }

    /// Every non-map value (and every empty map) with its path, in
    /// lexicographic order.
    pub fn leaves(&self) -> Vec<(TreePath, &Value)> {
        fn walk<'a>(
            map: &'a BTreeMap<String, Value>,
            path: &mut TreePath,
            out: &mut Vec<(TreePath, &'a Value)>,
        ) {
            for (key, value) in map {
                path.push(key.clone());
                match value.unforced() {
                    Value::Map(inner) if !inner.is_empty() => walk(inner, path, out),
                    _ => out.push((path.clone(), value)),
                }
                path.pop();
            }
        }

        let mut out = Vec::new();
        walk(&self.root, &mut TreePath::root(), &mut out);
        out
    }

    /// Reject trees nested deeper than [`MAX_DEPTH`], naming the first
    /// path beyond it.
    pub fn check_depth(&self) -> Result<(), SchemaError> {
        fn walk(value: &Value, path: &mut TreePath) -> Result<(), SchemaError> {
            if path.len() > MAX_DEPTH {
                return Err(SchemaError::too_deep(path.clone()));
            }
            match value.unforced() {
                Value::Map(map) => {
                    for (key, child) in map {
                        path.push(key.clone());
                        walk(child, path)?;
                        path.pop();
                    }
                }
                Value::List(items) => {
                    for (i, child) in items.iter().enumerate() {
                        path.push(format!("[{i}]"));
                        walk(child, path)?;
                        path.pop();
                    }
                }
                Value::Set(items) => {
                    for (i, child) in items.iter().enumerate() {
                        path.push(format!("[{i}]"));
                        walk(child, path)?;
                        path.pop();
                    }
                }
                Value::Scalar(_) | Value::Override(_) => {}
            }
            Ok(())
        }

        let mut path = TreePath::root();
        for (key, value) in &self.root {
            path.push(key.clone());
            walk(value, &mut path)?;
            path.pop();
        }
        Ok(())
    }

    pub fn to_value(&self) -> Value {
        Value::Map(self.root.clone())
    }

    pub fn to_json(&self) -> serde_json::Value {
        self.to_value().to_json()
    }
}

impl TryFrom<Value> for ConfigTree {
    type Error = PathError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Map(root) => Ok(Self { root }),
            Value::Override(inner) => Self::try_from(*inner),
            other => Err(PathError::NotAMap {
                path: TreePath::root(),
                found: other.kind_name(),
            }),
        }
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for ConfigTree {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            root: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// One `path = value` line per leaf.
impl fmt::Display for ConfigTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (path, value) in self.leaves() {
            writeln!(f, "{path} = {value}")?;
        }
        Ok(())
    }
}
