//! Golden test vectors for request signing.
//!
//! Ed25519 signatures are deterministic, so a fixed seed, nonce and
//! timestamp pin down the canonical URL and the whole `Authorization`
//! header. Any implementation of the signing codec must reproduce them.

use serde::{Deserialize, Serialize};

use vaultsync_auth::{check_authorization, new_request_with_nonce, AuthConfig, AuthRequest, MemoryReplayGuard};
use vaultsync_core::{Keypair, Nonce};

/// A single golden vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningVector {
    pub name: String,

    // Inputs
    /// Signing key seed, 32 bytes hex.
    pub seed: String,
    pub method: String,
    pub url: String,
    /// Request nonce, 32 bytes hex.
    pub nonce: String,
    pub timestamp: i64,
    pub content_digest: String,

    // Outputs
    pub identity: String,
    pub canonical_url: String,
    pub authorization: String,
}

struct Inputs {
    name: &'static str,
    seed: u8,
    method: &'static str,
    url: &'static str,
    nonce: u8,
    timestamp: i64,
    content_digest: &'static str,
    identity: &'static str,
    canonical_url: &'static str,
    authorization: &'static str,
}

const VECTORS: &[Inputs] = &[
    Inputs {
        name: "get with query",
        seed: 0x01,
        method: "GET",
        url: "https://keys.pub/vault/AKnL4NNf3DGWZJS6cPknBuEGnVsV4A4m5tgebLHaRSZ9?idx=123",
        nonce: 0x03,
        timestamp: 1234567890001,
        content_digest: "",
        identity: "AKnL4NNf3DGWZJS6cPknBuEGnVsV4A4m5tgebLHaRSZ9",
        canonical_url: "https://keys.pub/vault/AKnL4NNf3DGWZJS6cPknBuEGnVsV4A4m5tgebLHaRSZ9?idx=123&nonce=CktRuQ2mttgRGkXJtyksdKHjUdc2C4TgDzyB98oEzy8&ts=1234567890001",
        authorization: "AKnL4NNf3DGWZJS6cPknBuEGnVsV4A4m5tgebLHaRSZ9:AS4wBNOscsMaMlG/WjEJn8CpY3i9FeW1CSAzNt8wzqY3QWRjEVV+mVB0hNKl7iLmqOfKvbchCBeoQKIW0UYkDg==",
    },
    Inputs {
        name: "post with digest",
        seed: 0x02,
        method: "POST",
        url: "https://keys.pub/vault/9hSR6S7WPtxmTojgo6GG3k4yDPecgJY292j7xrsUGWBu",
        nonce: 0x04,
        timestamp: 1700000000000,
        content_digest: "q83vEjRWeJCrze8SNFZ4kKvN7xI0VniQq83vEjRWeJA=",
        identity: "9hSR6S7WPtxmTojgo6GG3k4yDPecgJY292j7xrsUGWBu",
        canonical_url: "https://keys.pub/vault/9hSR6S7WPtxmTojgo6GG3k4yDPecgJY292j7xrsUGWBu?nonce=GgBaCs3NCBuZN12kCJgAW63ydqohFkHEdfdEXBPzLHq&ts=1700000000000",
        authorization: "9hSR6S7WPtxmTojgo6GG3k4yDPecgJY292j7xrsUGWBu:RGw16mQjqjLWFx7s4Vuv/C1D0Y1pL51S2i6JfDa9f7dJ+xbw1xqvySj48ZZ4aGCNirXYz0WPHxtU1UZ2FNPYDA==",
    },
    Inputs {
        name: "delete replaces stale nonce",
        seed: 0x05,
        method: "DELETE",
        url: "https://keys.pub/vault/8SFqwqnq4whPhs8icwHA2hQg3hUoN1qrCLK1SBx3WKwe?ts=1&nonce=old",
        nonce: 0x06,
        timestamp: 1736870400000,
        content_digest: "",
        identity: "8SFqwqnq4whPhs8icwHA2hQg3hUoN1qrCLK1SBx3WKwe",
        canonical_url: "https://keys.pub/vault/8SFqwqnq4whPhs8icwHA2hQg3hUoN1qrCLK1SBx3WKwe?nonce=QWmroo4YnnMqYW3cnxWkFdaTxGD3P7vMSzwMHGbUzwF&ts=1736870400000",
        authorization: "8SFqwqnq4whPhs8icwHA2hQg3hUoN1qrCLK1SBx3WKwe:uWa7bLuoXA/fBf5wUsX3aOYlWQtQBhVRUPEmrkUCUfSkSBhPLu3g9CaqLUebTyMa4Hn5vVzP/bHOCch5jQRDAA==",
    },
    Inputs {
        name: "params sorted by key",
        seed: 0x07,
        method: "GET",
        url: "https://keys.pub/vault/GmaDrppBC7P5ARKV8g3djiwP89vz1jLK23V2GBjuAEGB?limit=10&idx=0",
        nonce: 0x08,
        timestamp: 1736870400000,
        content_digest: "",
        identity: "GmaDrppBC7P5ARKV8g3djiwP89vz1jLK23V2GBjuAEGB",
        canonical_url: "https://keys.pub/vault/GmaDrppBC7P5ARKV8g3djiwP89vz1jLK23V2GBjuAEGB?idx=0&limit=10&nonce=YMN9Qj5jPNp7j14VPcML1B6xGgcPWVZUGLFU3Mnyfaf&ts=1736870400000",
        authorization: "GmaDrppBC7P5ARKV8g3djiwP89vz1jLK23V2GBjuAEGB:XkH3Rjc2bDliRzulGSopZrcQhMKjff8oD5B2n8POwHBeqMBiY4i6HFws3LcHAsav/87pLqVq6bF03mI9q/brDw==",
    },
];

/// Get all golden vectors.
pub fn all_vectors() -> Vec<SigningVector> {
    VECTORS
        .iter()
        .map(|v| SigningVector {
            name: v.name.to_string(),
            seed: hex::encode([v.seed; 32]),
            method: v.method.to_string(),
            url: v.url.to_string(),
            nonce: hex::encode([v.nonce; 32]),
            timestamp: v.timestamp,
            content_digest: v.content_digest.to_string(),
            identity: v.identity.to_string(),
            canonical_url: v.canonical_url.to_string(),
            authorization: v.authorization.to_string(),
        })
        .collect()
}

/// Serialize vectors for other implementations.
pub fn to_json(vectors: &[SigningVector]) -> String {
    serde_json::to_string_pretty(vectors).unwrap()
}

pub fn from_json(json: &str) -> serde_json::Result<Vec<SigningVector>> {
    serde_json::from_str(json)
}

fn decode32(field: &str, s: &str) -> Result<[u8; 32], String> {
    let bytes = hex::decode(s).map_err(|e| format!("{}: {}", field, e))?;
    bytes
        .try_into()
        .map_err(|_| format!("{}: expected 32 bytes", field))
}

/// Sign the vector's request and compare every output, then check the
/// signed request verifies.
pub fn verify_vector(vector: &SigningVector) -> Result<(), String> {
    let keypair = Keypair::from_seed(&decode32("seed", &vector.seed)?);
    let nonce = Nonce::from_bytes(decode32("nonce", &vector.nonce)?);

    let identity = keypair.identity();
    if identity.as_str() != vector.identity {
        return Err(format!("{}: identity {} != {}", vector.name, identity, vector.identity));
    }

    let req = new_request_with_nonce(
        &vector.method,
        &vector.url,
        bytes::Bytes::new(),
        &vector.content_digest,
        vector.timestamp,
        &nonce,
        &keypair,
    )
    .map_err(|e| format!("{}: {}", vector.name, e))?;

    if req.url != vector.canonical_url {
        return Err(format!("{}: url {} != {}", vector.name, req.url, vector.canonical_url));
    }
    if req.authorization != vector.authorization {
        return Err(format!(
            "{}: authorization {} != {}",
            vector.name, req.authorization, vector.authorization
        ));
    }

    let guard = MemoryReplayGuard::new();
    let auth = AuthRequest {
        method: &vector.method,
        url: &vector.canonical_url,
        authorization: &vector.authorization,
        content_digest: &vector.content_digest,
    };
    let config = AuthConfig::default();
    let check = check_authorization(&auth, &identity, &guard, vector.timestamp, &config);
    block_on(check).map_err(|e| format!("{}: {}", vector.name, e))?;
    Ok(())
}

/// Verify all golden vectors.
pub fn verify_all_vectors() -> Result<(), String> {
    all_vectors().iter().try_for_each(verify_vector)
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_golden_vectors() {
        verify_all_vectors().unwrap();
    }

    #[test]
    fn test_vectors_json() {
        let vectors = all_vectors();
        let json = to_json(&vectors);
        assert!(json.contains("\"canonical_url\""));
        assert_eq!(from_json(&json).unwrap(), vectors);
    }

    #[test]
    fn test_tampered_vector_fails() {
        let mut vector = all_vectors().remove(0);
        vector.method = "HEAD".into();
        assert!(verify_vector(&vector).is_err());
    }
}
