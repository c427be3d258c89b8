//! Field declarations for configuration trees
//!
//! A schema names the fields a tree may contain, their shape, and how
//! values from different fragments merge. It is written in code or loaded
//! from a settings file:
//!
//! ```toml
//! [fields.pkg]
//! kind = "list"
//! merge = "append"
//!
//! [fields.user]
//! kind = "scalar"
//! overridable = true
//!
//! [fields.boot]
//! kind = "map"
//!
//! [fields.boot.fields.timeout]
//! kind = "scalar"
//! ```

use crate::TreePath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How two lists at the same path combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    /// The later list wins
    #[default]
    Replace,
    /// The later list is concatenated after the earlier one
    Append,
}

/// Declared shape of a field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Scalar,
    List,
    Set,
    Map,
    /// Any shape; nested values are typed by what they look like
    #[default]
    Any,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(default)]
    pub kind: FieldKind,

    /// List merge policy; only meaningful for `list` fields
    #[serde(default)]
    pub merge: MergePolicy,

    /// Where fragments disagree on this field or anything beneath it, the
    /// later one wins instead of conflicting
    #[serde(default)]
    pub overridable: bool,

    /// Declared children of a `map` field. A map without declared
    /// children is open and accepts any key.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, FieldSpec>,
}

impl FieldSpec {
    fn of_kind(kind: FieldKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn scalar() -> Self {
        Self::of_kind(FieldKind::Scalar)
    }

    pub fn list(merge: MergePolicy) -> Self {
        Self {
            merge,
            ..Self::of_kind(FieldKind::List)
        }
    }

    pub fn set() -> Self {
        Self::of_kind(FieldKind::Set)
    }

    pub fn map() -> Self {
        Self::of_kind(FieldKind::Map)
    }

    pub fn any() -> Self {
        Self::of_kind(FieldKind::Any)
    }

    pub fn overridable(mut self) -> Self {
        self.overridable = true;
        self
    }

    /// Declare a child field. Turns the spec into a closed `map`.
    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.kind = FieldKind::Map;
        self.fields.insert(name.into(), spec);
        self
    }

    /// The kind used for validation: an `any` field with declared
    /// children is a closed map.
    pub fn effective_kind(&self) -> FieldKind {
        if self.kind == FieldKind::Any && !self.fields.is_empty() {
            FieldKind::Map
        } else {
            self.kind
        }
    }

    pub fn child(&self, key: &str) -> Option<&FieldSpec> {
        self.fields.get(key)
    }

    /// Whether a map field accepts keys it does not declare
    pub fn is_open(&self) -> bool {
        self.fields.is_empty()
    }
}

/// The declared top level of a configuration tree.
///
/// Unlike nested maps, the top level is always closed: a key the schema
/// does not declare is rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub fields: BTreeMap<String, FieldSpec>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.insert(name.into(), spec);
        self
    }

    pub fn get(&self, key: &str) -> Option<&FieldSpec> {
        self.fields.get(key)
    }

    /// Find the declaration for `path`, if every segment is declared.
    pub fn lookup(&self, path: &TreePath) -> Option<&FieldSpec> {
        let (first, rest) = path.segments().split_first()?;
        let mut spec = self.fields.get(first)?;
        for key in rest {
            spec = spec.child(key)?;
        }
        Some(spec)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}
