//! Request signing codec.
//!
//! A request is signed over its canonical form:
//!
//! ```text
//! {METHOD},{CANONICAL_URL},{CONTENT_DIGEST}
//! ```
//!
//! The canonical URL is the request URL with `nonce` and `ts` query
//! parameters appended and every query parameter stable-sorted by key. The
//! verifier does not re-sort: it recomputes the signable bytes from the URL
//! exactly as received, so reordering parameters on the wire breaks the
//! signature.
//!
//! The `Authorization` header carries `<identity>:<base64(signature)>`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fmt;
use url::Url;

use crate::crypto::{Ed25519Signature, Identity, Keypair};
use crate::error::{CoreError, Result};
use crate::nonce::Nonce;

/// Query parameter holding the request nonce.
pub const NONCE_PARAM: &str = "nonce";

/// Query parameter holding the request timestamp (Unix ms).
pub const TS_PARAM: &str = "ts";

/// The canonical URL of a request and the exact bytes a signature covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signable {
    /// URL with `nonce` and `ts` appended and parameters sorted by key.
    pub url: Url,
    /// `method,url,content_digest`.
    pub bytes: Vec<u8>,
}

/// Build the canonical signable form of a request.
///
/// Existing `nonce`/`ts` parameters are replaced. Parameters sharing a key
/// keep their relative order.
pub fn build_signable(
    method: &str,
    raw_url: &str,
    content_digest: &str,
    timestamp: i64,
    nonce: &Nonce,
) -> Result<Signable> {
    let mut url = Url::parse(raw_url)
        .map_err(|e| CoreError::InvalidInput(format!("url {}: {}", raw_url, e)))?;

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != NONCE_PARAM && k != TS_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.push((NONCE_PARAM.to_string(), nonce.encode()));
    pairs.push((TS_PARAM.to_string(), timestamp.to_string()));
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    url.query_pairs_mut().clear().extend_pairs(pairs.iter());

    let bytes = signable_bytes(method, url.as_str(), content_digest);
    Ok(Signable { url, bytes })
}

/// The bytes covered by a request signature.
pub fn signable_bytes(method: &str, url: &str, content_digest: &str) -> Vec<u8> {
    format!("{},{},{}", method, url, content_digest).into_bytes()
}

/// Sign signable bytes with the caller's key.
pub fn sign(bytes: &[u8], keypair: &Keypair) -> Ed25519Signature {
    keypair.sign(bytes)
}

/// Verify a signature against the public key named by `identity`.
pub fn verify(bytes: &[u8], signature: &Ed25519Signature, identity: &Identity) -> Result<()> {
    let public_key = identity.public_key()?;
    public_key.verify(bytes, signature)
}

/// Digest of a request body: `base64(blake3(body))`, empty for no body.
pub fn content_digest(body: &[u8]) -> String {
    if body.is_empty() {
        return String::new();
    }
    STANDARD.encode(blake3::hash(body).as_bytes())
}

/// Parsed `Authorization` header.
///
/// Parsing only splits the header; the identity is compared against the
/// expected signer before any signature math runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthHeader {
    /// Claimed signer identity, unvalidated.
    pub kid: String,
    /// Base64 signature, undecoded.
    pub signature: String,
}

impl AuthHeader {
    /// Header for a signature by `identity`.
    pub fn new(identity: &Identity, signature: &Ed25519Signature) -> Self {
        Self {
            kid: identity.to_string(),
            signature: STANDARD.encode(signature.as_bytes()),
        }
    }

    /// Split `<identity>:<signature>`.
    pub fn parse(header: &str) -> Result<Self> {
        let (kid, signature) = header
            .split_once(':')
            .ok_or_else(|| CoreError::InvalidHeader("missing separator".into()))?;
        if kid.is_empty() || signature.is_empty() {
            return Err(CoreError::InvalidHeader("empty field".into()));
        }
        Ok(Self {
            kid: kid.to_string(),
            signature: signature.to_string(),
        })
    }

    /// Decode the signature. Bad encoding or length fails verification.
    pub fn decode_signature(&self) -> Result<Ed25519Signature> {
        let bytes = STANDARD
            .decode(&self.signature)
            .map_err(|_| CoreError::VerifyFailed)?;
        Ed25519Signature::from_slice(&bytes)
    }
}

impl fmt::Display for AuthHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kid, self.signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TS: i64 = 1234567890001;

    fn nonce() -> Nonce {
        Nonce::from_bytes([0x01; 32])
    }

    #[test]
    fn test_canonical_url_appends_and_sorts() {
        let signable =
            build_signable("GET", "https://host/vault/ID?zeta=1&idx=123", "", TS, &nonce())
                .unwrap();
        let expected = format!(
            "https://host/vault/ID?idx=123&nonce={}&ts={}&zeta=1",
            nonce().encode(),
            TS
        );
        assert_eq!(signable.url.as_str(), expected);
        assert_eq!(
            signable.bytes,
            format!("GET,{},", expected).into_bytes()
        );
    }

    #[test]
    fn test_canonical_url_without_query() {
        let signable = build_signable("GET", "https://host/test", "", TS, &nonce()).unwrap();
        assert_eq!(
            signable.url.as_str(),
            format!("https://host/test?nonce={}&ts={}", nonce().encode(), TS)
        );
    }

    #[test]
    fn test_canonical_url_replaces_existing_nonce_and_ts() {
        let signable =
            build_signable("GET", "https://host/x?ts=1&nonce=abc&a=b", "", TS, &nonce()).unwrap();
        let pairs: Vec<(String, String)> = signable
            .url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("a".to_string(), "b".to_string()),
                ("nonce".to_string(), nonce().encode()),
                ("ts".to_string(), TS.to_string()),
            ]
        );
    }

    #[test]
    fn test_equal_keys_keep_order() {
        let signable =
            build_signable("GET", "https://host/x?k=2&k=1&a=0", "", TS, &nonce()).unwrap();
        let values: Vec<String> = signable
            .url
            .query_pairs()
            .filter(|(k, _)| k == "k")
            .map(|(_, v)| v.into_owned())
            .collect();
        assert_eq!(values, vec!["2".to_string(), "1".to_string()]);
    }

    #[test]
    fn test_malformed_url() {
        let err = build_signable("GET", "not a url", "", TS, &nonce()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[test]
    fn test_header_roundtrip() {
        let keypair = Keypair::from_seed(&[0x01; 32]);
        let signature = sign(b"message", &keypair);
        let header = AuthHeader::new(&keypair.identity(), &signature).to_string();

        let parsed = AuthHeader::parse(&header).unwrap();
        assert_eq!(parsed.kid, keypair.identity().as_str());
        assert_eq!(parsed.decode_signature().unwrap(), signature);
    }

    #[test]
    fn test_header_malformed() {
        assert!(matches!(
            AuthHeader::parse("no-separator"),
            Err(CoreError::InvalidHeader(_))
        ));
        assert!(matches!(
            AuthHeader::parse(":sig"),
            Err(CoreError::InvalidHeader(_))
        ));
        let bad_sig = AuthHeader::parse("kid:c2hvcnQ=").unwrap();
        assert_eq!(bad_sig.decode_signature(), Err(CoreError::VerifyFailed));
        let not_base64 = AuthHeader::parse("kid:!!!").unwrap();
        assert_eq!(not_base64.decode_signature(), Err(CoreError::VerifyFailed));
    }

    #[test]
    fn test_content_digest() {
        assert_eq!(content_digest(b""), "");
        let digest = content_digest(b"{\"test\": 1}");
        assert_eq!(STANDARD.decode(&digest).unwrap().len(), 32);
        assert_ne!(digest, content_digest(b"invalid"));
    }

    proptest! {
        #[test]
        fn signature_binds_method_url_and_digest(
            seed in any::<[u8; 32]>(),
            path in "[a-z]{1,8}",
            idx in 0u64..10_000,
            body in prop::collection::vec(any::<u8>(), 1..64),
        ) {
            let keypair = Keypair::from_seed(&seed);
            let identity = keypair.identity();
            let digest = content_digest(&body);
            let raw = format!("https://host/{}?idx={}", path, idx);
            let signable = build_signable("POST", &raw, &digest, TS, &nonce()).unwrap();
            let signature = sign(&signable.bytes, &keypair);

            let url = signable.url.as_str();
            prop_assert!(verify(&signable_bytes("POST", url, &digest), &signature, &identity).is_ok());
            prop_assert!(verify(&signable_bytes("PUT", url, &digest), &signature, &identity).is_err());
            prop_assert!(verify(&signable_bytes("POST", url, ""), &signature, &identity).is_err());

            let reordered = format!(
                "https://host/{}?nonce={}&ts={}&idx={}",
                path, nonce().encode(), TS, idx
            );
            prop_assert!(verify(&signable_bytes("POST", &reordered, &digest), &signature, &identity).is_err());
        }
    }
}
