//! Error types for request authentication.

use thiserror::Error;
use vaultsync_core::CoreError;

/// Errors from signing or verifying a request.
///
/// Verification failures carry no detail; the reason is logged instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Malformed URL or other caller-supplied value.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Authorization header is not `<identity>:<signature>`.
    #[error("invalid auth header: {0}")]
    InvalidHeader(String),

    /// Header names a different signer than expected.
    #[error("invalid kid")]
    InvalidKid,

    /// Bad signature, stale timestamp, missing nonce, or replayed nonce.
    #[error("verify failed")]
    VerifyFailed,

    /// The replay guard could not be consulted.
    #[error("replay guard error: {0}")]
    ReplayGuard(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl From<CoreError> for AuthError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidInput(msg) | CoreError::DecodingError(msg) => {
                AuthError::InvalidInput(msg)
            }
            CoreError::InvalidHeader(msg) => AuthError::InvalidHeader(msg),
            CoreError::InvalidIdentity(_)
            | CoreError::InvalidPublicKey
            | CoreError::VerifyFailed => AuthError::VerifyFailed,
            CoreError::SealFailed | CoreError::OpenFailed => {
                AuthError::InvalidInput(err.to_string())
            }
        }
    }
}

/// Result type for auth operations.
pub type Result<T> = std::result::Result<T, AuthError>;
