//! Error types for converge-core

use crate::change::OpError;
use crate::reconcile::{ApplyError, CompensationFailure, compensation_note};
use converge_fs::Format;
use converge_model::{ConflictError, SchemaError};

/// Result type for converge-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Another run holds the snapshot store's single-writer lock.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Another reconciliation run holds {resource}{}", .holder.as_ref().map(|h| format!(" (pid {h})")).unwrap_or_default())]
pub struct ConcurrentRunError {
    /// What is locked, e.g. the lock file path
    pub resource: String,
    /// Identity of the current holder, when known
    pub holder: Option<String>,
}

/// Errors that can occur in converge-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A fragment is not valid text in its format
    #[error("Failed to parse {origin} as {format} at line {line}, column {column}: {message}")]
    Parse {
        origin: String,
        format: Format,
        line: usize,
        column: usize,
        message: String,
    },

    /// A fragment, or a tree about to be applied or recorded, does not fit
    /// the schema or the nesting limit
    #[error("{origin}: {source}")]
    Schema {
        origin: String,
        #[source]
        source: SchemaError,
    },

    /// A fragment conflicts with the fragments merged before it
    #[error("{origin}: {source}")]
    Conflict {
        origin: String,
        #[source]
        source: ConflictError,
    },

    /// An operation failed during apply; the run was rolled back
    #[error(transparent)]
    Apply(#[from] ApplyError),

    /// Every operation succeeded but the new generation could not be
    /// recorded; the run was rolled back
    #[error("Failed to record the new generation: {source}{}", compensation_note(.rolled_back, .compensation_failures))]
    Record {
        #[source]
        source: Box<Error>,
        /// Operations successfully compensated
        rolled_back: usize,
        compensation_failures: Vec<CompensationFailure>,
    },

    #[error(transparent)]
    ConcurrentRun(#[from] ConcurrentRunError),

    /// A store was handed a run lock it did not issue
    #[error("Run lock does not belong to {resource}")]
    ForeignLock { resource: String },

    /// A changeset does not fit the latest generation it is applied to
    #[error("Change set does not fit the latest generation at operation {index} ({op}): {source}")]
    StalePlan {
        index: usize,
        op: String,
        #[source]
        source: OpError,
    },

    #[error("Generation {id} is corrupt: {message}")]
    CorruptGeneration { id: u64, message: String },

    #[error("Generation not found: {id}")]
    GenerationNotFound { id: u64 },

    /// Filesystem error from converge-fs
    #[error(transparent)]
    Fs(#[from] converge_fs::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// The schema violation behind this error, if it is one.
    pub fn as_schema_error(&self) -> Option<&SchemaError> {
        match self {
            Self::Schema { source, .. } => Some(source),
            _ => None,
        }
    }

    /// The merge conflict behind this error, if it is one.
    pub fn as_conflict(&self) -> Option<&ConflictError> {
        match self {
            Self::Conflict { source, .. } => Some(source),
            _ => None,
        }
    }
}
