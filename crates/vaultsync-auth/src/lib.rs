//! # Vaultsync Auth
//!
//! Request authentication for calls to the vault remote.
//!
//! Clients sign each request with [`new_request`]; the remote checks it with
//! [`check_authorization`] (or an [`Authenticator`]). A request is accepted
//! only if:
//!
//! 1. The `Authorization` header parses as `<identity>:<signature>`
//! 2. The identity is the one the remote expects for the resource
//! 3. The signature covers the method, URL and content digest as received
//! 4. The `ts` parameter is within the allowed clock skew
//! 5. The `nonce` parameter has not been seen from this signer before
//!
//! Seen nonces live in a [`ReplayGuard`], a shared capability with an atomic
//! check-and-set.

pub mod config;
pub mod error;
pub mod guard;
pub mod request;
pub mod verify;

pub use config::AuthConfig;
pub use error::{AuthError, Result};
pub use guard::{MemoryReplayGuard, ReplayGuard};
pub use request::{new_request, new_request_with_nonce, SignedRequest};
pub use verify::{check_authorization, AuthRequest, AuthResult, Authenticator};
