//! Paths into a configuration tree

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// A sequence of mapping keys from the root of a tree.
///
/// Rendered with dots (`services.nginx.enable`); keys that themselves
/// contain a dot, or are empty, are quoted. The empty path is the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TreePath(Vec<String>);

impl TreePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn new<S: Into<String>>(segments: impl IntoIterator<Item = S>) -> Self {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// A new path one level below this one
    pub fn child(&self, key: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(key.into());
        Self(segments)
    }

    pub fn push(&mut self, key: impl Into<String>) {
        self.0.push(key.into());
    }

    pub fn pop(&mut self) -> Option<String> {
        self.0.pop()
    }

    pub fn parent(&self) -> Option<Self> {
        let (_, parent) = self.0.split_last()?;
        Some(Self(parent.to_vec()))
    }

    /// Split into the parent segments and the final key.
    pub fn split_last(&self) -> Option<(&[String], &str)> {
        let (last, parent) = self.0.split_last()?;
        Some((parent, last.as_str()))
    }

    /// Whether `prefix` is this path or one of its ancestors.
    pub fn starts_with(&self, prefix: &TreePath) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            if segment.is_empty() || segment.contains('.') {
                write!(f, "{segment:?}")?;
            } else {
                f.write_str(segment)?;
            }
        }
        Ok(())
    }
}

/// Parses dotted paths. Quoting is not interpreted; build paths with
/// [`TreePath::new`] when keys contain dots.
impl FromStr for TreePath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::root());
        }
        Ok(Self::new(s.split('.')))
    }
}

impl From<Vec<String>> for TreePath {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

impl<const N: usize> From<[&str; N]> for TreePath {
    fn from(segments: [&str; N]) -> Self {
        Self::new(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_with_dots() {
        let path: TreePath = "services.nginx.enable".parse().unwrap();
        assert_eq!(path.to_string(), "services.nginx.enable");
        assert_eq!(path.len(), 3);
    }

    #[test]
    fn display_quotes_dotted_keys() {
        let path = TreePath::new(["networking", "hosts", "127.0.0.1"]);
        assert_eq!(path.to_string(), r#"networking.hosts."127.0.0.1""#);
    }

    #[test]
    fn root_displays_marker() {
        assert_eq!(TreePath::root().to_string(), "<root>");
        assert!(TreePath::root().parent().is_none());
    }

    #[test]
    fn parent_and_child_are_inverse() {
        let path = TreePath::from(["boot", "loader"]);
        assert_eq!(path.child("timeout").parent(), Some(path.clone()));
        assert!(path.child("timeout").starts_with(&path));
        assert!(!path.starts_with(&path.child("timeout")));
    }

    #[test]
    fn serializes_as_key_list() {
        let path = TreePath::from(["bogusField"]);
        assert_eq!(serde_json::to_string(&path).unwrap(), r#"["bogusField"]"#);
    }
}
