//! Storage error types
//!
//! Errors raised by storage backends. The synchronizer absorbs all of them;
//! they never reach callers of `read`/`write`.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in a storage backend
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Backing file exists but cannot be read as text
    #[error("Corrupt storage file {path:?}: {reason}")]
    Corruption { path: PathBuf, reason: String },

    /// Storage is unavailable (read-only medium, quota exceeded, disabled)
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Lock acquisition failed
    #[error("Lock error: {0}")]
    Lock(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for StorageError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        StorageError::Lock(err.to_string())
    }
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
