//! Error types for the vault.

use thiserror::Error;
use vaultsync_store::StoreError;
use vaultsync_sync::SyncError;

/// Errors that can occur during vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// No master key loaded.
    #[error("vault is locked")]
    Locked,

    /// No remote configured.
    #[error("no remote configured")]
    NoRemote,

    /// The master key does not derive the configured remote key.
    #[error("master key does not match remote {0}")]
    KeyMismatch(String),

    #[error("failed to push vault: {0}")]
    Push(#[source] SyncError),

    #[error("failed to pull vault: {0}")]
    Pull(#[source] SyncError),

    /// Caller error: bad path, reserved collection, bad salt.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("sync error: {0}")]
    Sync(#[from] SyncError),
}

impl VaultError {
    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Push(e) | Self::Pull(e) | Self::Sync(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Result type for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
