//! Error types for the sync module.

use std::time::Duration;

use thiserror::Error;
use vaultsync_auth::AuthError;
use vaultsync_core::CoreError;
use vaultsync_store::StoreError;

/// Errors that can occur during sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Request could not be signed.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// Sealing or opening a record failed.
    #[error("crypto error: {0}")]
    Core(#[from] CoreError),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(String),

    /// Remote answered with a non-success status.
    #[error("remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    /// An event nonce was seen before: replay or corruption.
    #[error("nonce collision {0}")]
    NonceCollision(String),

    /// Stored or received data did not decode.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Log entry path is not `/<log>/<index>/<doc path>`.
    #[error("invalid log entry: {0}")]
    InvalidEntry(String),

    /// Remote call did not finish in time.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// Sync was cancelled.
    #[error("sync cancelled")]
    Cancelled,
}

impl SyncError {
    /// Failures a later sync may get past without intervention.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport(_) | SyncError::Timeout(_) | SyncError::Cancelled => true,
            SyncError::Remote { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
