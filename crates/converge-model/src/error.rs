//! Error types for converge-model

use crate::{MAX_DEPTH, TreePath, Value};

/// Two fragments assign different values to the same path and neither
/// side takes precedence.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Conflicting values at {path}: {left} vs {right} (mark one side with \"@override\" or declare the field overridable)")]
pub struct ConflictError {
    pub path: TreePath,
    pub left: Value,
    pub right: Value,
}

/// A fragment does not match the declared schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Schema violation at {path}: {message}")]
pub struct SchemaError {
    pub path: TreePath,
    pub message: String,
}

impl SchemaError {
    pub fn new(path: TreePath, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
        }
    }

    /// The path names a key the schema does not declare.
    pub fn unknown_key(path: TreePath) -> Self {
        Self::new(path, "unknown key")
    }

    /// The path lies deeper than [`MAX_DEPTH`].
    pub fn too_deep(path: TreePath) -> Self {
        Self::new(path, format!("nesting deeper than {MAX_DEPTH} levels is not supported"))
    }
}

/// A tree edit addressed a path that cannot hold it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("The root of a configuration tree cannot be replaced or removed")]
    Root,

    #[error("Parent mapping {path} does not exist")]
    MissingParent { path: TreePath },

    #[error("Expected a map at {path}, found a {found}")]
    NotAMap { path: TreePath, found: &'static str },

    #[error("Nothing at {path}")]
    NotFound { path: TreePath },
}
