//! Error types for converge-fs

use std::path::PathBuf;

/// Result type for converge-fs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in converge-fs operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {format} config at {path}: {message}")]
    ConfigParse {
        path: PathBuf,
        format: String,
        message: String,
    },

    #[error("Unsupported config format: {extension}")]
    UnsupportedFormat { extension: String },

    #[error("Refusing to overwrite existing file {path}")]
    AlreadyExists { path: PathBuf },

    #[error("Lock at {path} is held by another run{}", .holder.as_ref().map(|h| format!(" (pid {h})")).unwrap_or_default())]
    LockHeld {
        path: PathBuf,
        holder: Option<String>,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
