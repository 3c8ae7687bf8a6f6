//! Error types for the conftree configuration store.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Backing store entry {path:?} is unusable: {reason}")]
    InvalidEntry { path: PathBuf, reason: String },
}

/// Build a [`StorageError::Io`] carrying the path that failed.
pub fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Store-level errors
#[derive(Debug, Error)]
pub enum ConfError {
    #[error("Parse error in {file} on line {line}: {message}")]
    Parse {
        file: String,
        line: usize,
        message: String,
    },

    #[error("Invalid path expression '{expr}': {reason}")]
    InvalidPath { expr: String, reason: String },

    #[error("No configuration document is loaded")]
    NoDocument,

    #[error("Nothing found at '{0}'")]
    NotFound(String),

    #[error("Section name '{0}' is reserved")]
    ReservedName(String),

    #[error("Invalid node: {0}")]
    InvalidNode(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Journal write failed: {0}")]
    Journal(#[source] std::io::Error),
}

impl From<config::ConfigError> for ConfError {
    fn from(err: config::ConfigError) -> Self {
        ConfError::ConfigError(err.to_string())
    }
}

impl ConfError {
    pub(crate) fn invalid_path(expr: &str, reason: impl Into<String>) -> Self {
        ConfError::InvalidPath {
            expr: expr.to_string(),
            reason: reason.into(),
        }
    }
}
