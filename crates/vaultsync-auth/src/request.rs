//! Client side: building signed requests.

use bytes::Bytes;
use vaultsync_core::{build_signable, sign, AuthHeader, Keypair, Nonce};

use crate::error::Result;

/// A request ready to hand to a transport.
///
/// `url` is the canonical URL; it must be sent exactly as built or the
/// signature will not verify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub method: String,
    pub url: String,
    pub body: Bytes,
    /// Value of the `Authorization` header.
    pub authorization: String,
    /// Digest of `body`; empty when there is no body.
    pub content_digest: String,
}

/// Sign a request with a fresh random nonce.
pub fn new_request(
    method: &str,
    url: &str,
    body: Bytes,
    content_digest: &str,
    now: i64,
    keypair: &Keypair,
) -> Result<SignedRequest> {
    new_request_with_nonce(method, url, body, content_digest, now, &Nonce::generate(), keypair)
}

/// Sign a request with an explicit nonce.
pub fn new_request_with_nonce(
    method: &str,
    url: &str,
    body: Bytes,
    content_digest: &str,
    now: i64,
    nonce: &Nonce,
    keypair: &Keypair,
) -> Result<SignedRequest> {
    let signable = build_signable(method, url, content_digest, now, nonce)?;
    let signature = sign(&signable.bytes, keypair);
    let header = AuthHeader::new(&keypair.identity(), &signature);

    Ok(SignedRequest {
        method: method.to_string(),
        url: signable.url.to_string(),
        body,
        authorization: header.to_string(),
        content_digest: content_digest.to_string(),
    })
}
