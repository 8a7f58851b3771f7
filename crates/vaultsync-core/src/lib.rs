//! # Vaultsync Core
//!
//! Pure primitives for vaultsync: identities, keys, nonces, the request
//! signing codec and sealed vault payloads.
//!
//! This crate contains no I/O, no storage, no networking. Components that
//! need the time take a [`Clock`] or an explicit timestamp.
//!
//! ## Key Types
//!
//! - [`Keypair`] - Ed25519 signing key; its public half is an [`Identity`]
//! - [`Identity`] - Base58 text form of a public key, used as the signer id
//! - [`Nonce`] - Per-request random value carried in the `nonce` query parameter
//! - [`SecretKey`] - Vault master key used to seal and open records
//! - [`Signable`] - Canonical URL and the exact bytes covered by a signature
//!
//! ## Signing
//!
//! See the [`signing`] module for the canonical form of a request.

pub mod clock;
pub mod crypto;
pub mod error;
pub mod nonce;
pub mod signing;

pub use clock::{Clock, SystemClock, TestClock};
pub use crypto::{Ed25519PublicKey, Ed25519Signature, EventNonce, Identity, Keypair, SecretKey};
pub use error::{CoreError, Result};
pub use nonce::Nonce;
pub use signing::{
    build_signable, content_digest, sign, signable_bytes, verify, AuthHeader, Signable,
};
