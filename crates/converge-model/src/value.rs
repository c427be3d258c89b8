//! Typed configuration values

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A leaf value.
///
/// Scalars are totally ordered so they can live in sets; floats compare by
/// IEEE total order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    fn rank(&self) -> u8 {
        match self {
            Self::Bool(_) => 0,
            Self::Int(_) => 1,
            Self::Float(_) => 2,
            Self::Str(_) => 3,
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Str(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl Ord for Scalar {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Str(a), Self::Str(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Scalar {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scalar {}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Str(s) => write!(f, "{s:?}"),
        }
    }
}

/// A node of a configuration tree.
///
/// `Override` only appears while fragments are being merged: it marks a
/// value that takes precedence over conflicting values from other
/// fragments. [`Value::resolved`] strips it, and it is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Scalar(Scalar),
    List(Vec<Value>),
    Set(BTreeSet<Value>),
    Map(BTreeMap<String, Value>),
    #[serde(skip)]
    Override(Box<Value>),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Self::Scalar(Scalar::Str(s.into()))
    }

    pub fn int(i: i64) -> Self {
        Self::Scalar(Scalar::Int(i))
    }

    pub fn float(x: f64) -> Self {
        Self::Scalar(Scalar::Float(x))
    }

    pub fn bool(b: bool) -> Self {
        Self::Scalar(Scalar::Bool(b))
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Self::List(items.into_iter().collect())
    }

    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        Self::Set(items.into_iter().collect())
    }

    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Mark a value as taking precedence in merges.
    pub fn forced(value: Value) -> Self {
        Self::Override(Box::new(value))
    }

    /// Short name of the value's shape, for diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
            Self::Override(inner) => inner.kind_name(),
        }
    }

    pub fn is_map(&self) -> bool {
        matches!(self.unforced(), Self::Map(_))
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_override(&self) -> bool {
        matches!(self, Self::Override(_))
    }

    /// The value with any outer override markers peeled off.
    pub fn unforced(&self) -> &Value {
        let mut current = self;
        while let Self::Override(inner) = current {
            current = inner;
        }
        current
    }

    /// Strip override markers throughout the value.
    pub fn resolved(self) -> Value {
        match self {
            Self::Override(inner) => inner.resolved(),
            Self::List(items) => Self::List(items.into_iter().map(Value::resolved).collect()),
            Self::Set(items) => Self::Set(items.into_iter().map(Value::resolved).collect()),
            Self::Map(entries) => {
                Self::Map(entries.into_iter().map(|(k, v)| (k, v.resolved())).collect())
            }
            scalar @ Self::Scalar(_) => scalar,
        }
    }

    /// Plain JSON rendering. Sets become arrays, so this is for display and
    /// scripting output only.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Scalar(s) => s.to_json(),
            Self::List(items) => items.iter().map(Value::to_json).collect(),
            Self::Set(items) => items.iter().map(Value::to_json).collect(),
            Self::Map(entries) => serde_json::Value::Object(
                entries.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Self::Override(inner) => inner.to_json(),
        }
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Self::Scalar(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::bool(b)
    }
}

fn write_joined<'a>(
    f: &mut fmt::Formatter<'_>,
    items: impl Iterator<Item = &'a Value>,
) -> fmt::Result {
    for (i, item) in items.enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(s) => write!(f, "{s}"),
            Self::List(items) => {
                f.write_str("[")?;
                write_joined(f, items.iter())?;
                f.write_str("]")
            }
            Self::Set(items) => {
                f.write_str("set[")?;
                write_joined(f, items.iter())?;
                f.write_str("]")
            }
            Self::Map(entries) if entries.is_empty() => f.write_str("{}"),
            Self::Map(entries) => {
                f.write_str("{ ")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key} = {value}")?;
                }
                f.write_str(" }")
            }
            Self::Override(inner) => write!(f, "@override({inner})"),
        }
    }
}

/// Deep structural equality. Override markers are transparent.
pub fn equals(a: &Value, b: &Value) -> bool {
    match (a.unforced(), b.unforced()) {
        (Value::Scalar(x), Value::Scalar(y)) => x == y,
        (Value::List(x), Value::List(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| equals(l, r))
        }
        (Value::Set(x), Value::Set(y)) => x == y,
        (Value::Map(x), Value::Map(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .zip(y)
                    .all(|((kl, vl), (kr, vr))| kl == kr && equals(vl, vr))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_order_by_kind_then_value() {
        let mut items = vec![
            Scalar::Str("b".into()),
            Scalar::Int(2),
            Scalar::Bool(true),
            Scalar::Str("a".into()),
            Scalar::Float(0.5),
            Scalar::Int(-1),
        ];
        items.sort();
        assert_eq!(
            items,
            vec![
                Scalar::Bool(true),
                Scalar::Int(-1),
                Scalar::Int(2),
                Scalar::Float(0.5),
                Scalar::Str("a".into()),
                Scalar::Str("b".into()),
            ]
        );
    }

    #[test]
    fn nan_is_equal_to_itself() {
        assert_eq!(Scalar::Float(f64::NAN), Scalar::Float(f64::NAN));
    }

    #[test]
    fn equals_ignores_override_markers() {
        let plain = Value::map([("b", Value::int(2))]);
        let forced = Value::map([("b", Value::forced(Value::int(2)))]);
        assert!(equals(&plain, &forced));
        assert_ne!(plain, forced);
    }

    #[test]
    fn equals_distinguishes_list_from_set() {
        let list = Value::list([Value::str("git")]);
        let set = Value::set([Value::str("git")]);
        assert!(!equals(&list, &set));
    }

    #[test]
    fn resolved_strips_nested_overrides() {
        let value = Value::map([(
            "a",
            Value::forced(Value::map([("b", Value::forced(Value::int(1)))])),
        )]);
        assert_eq!(
            value.resolved(),
            Value::map([("a", Value::map([("b", Value::int(1))]))])
        );
    }

    #[test]
    fn display_renders_nested_values() {
        let value = Value::map([
            ("pkg", Value::list([Value::str("git"), Value::str("tmux")])),
            ("groups", Value::set([Value::str("wheel")])),
            ("uid", Value::int(1000)),
        ]);
        assert_eq!(
            value.to_string(),
            r#"{ groups = set["wheel"], pkg = ["git", "tmux"], uid = 1000 }"#
        );
    }

    #[test]
    fn serde_keeps_sets_distinct_from_lists() {
        let value = Value::map([
            ("a", Value::set([Value::int(1)])),
            ("b", Value::list([Value::int(1)])),
        ]);
        let json = serde_json::to_string(&value).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn to_json_is_plain() {
        let value = Value::map([("user", Value::str("alice")), ("uid", Value::int(1000))]);
        assert_eq!(
            value.to_json(),
            serde_json::json!({"user": "alice", "uid": 1000})
        );
    }
}
