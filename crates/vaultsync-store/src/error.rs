//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Path is empty or otherwise unusable.
    #[error("invalid path {0}")]
    InvalidPath(String),

    /// `create` on a path that already holds a document.
    #[error("path already exists {0}")]
    AlreadyExists(String),

    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Stored value has the wrong shape for a typed accessor.
    #[error("invalid data at {path}: {reason}")]
    InvalidData { path: String, reason: String },

    /// Operation the backend does not support.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Blocking task panicked or was cancelled.
    #[error("store task failed: {0}")]
    Task(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
