//! Error types for vaultsync core.

use thiserror::Error;

/// Errors produced by the pure primitives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Malformed URL, path or other caller-supplied value.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Authorization header is not `<identity>:<signature>`.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// Identity does not decode to an Ed25519 public key.
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("invalid public key")]
    InvalidPublicKey,

    /// Signature did not verify, or was malformed.
    #[error("verify failed")]
    VerifyFailed,

    #[error("failed to seal payload")]
    SealFailed,

    /// Sealed payload is truncated or failed authentication.
    #[error("failed to open sealed payload")]
    OpenFailed,

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
