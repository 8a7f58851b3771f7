//! Request nonces.
//!
//! Every signed request carries a fresh 32-byte nonce in its `nonce` query
//! parameter. The verifier records it per signer for the skew window, so a
//! captured request cannot be replayed.

use rand::RngCore;
use std::fmt;

use crate::error::{CoreError, Result};

/// Size of a request nonce in bytes.
pub const NONCE_SIZE: usize = 32;

/// A single-use random value bound into a request signature.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nonce(pub [u8; NONCE_SIZE]);

impl Nonce {
    /// Generate a fresh random nonce.
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Base58 encoding used on the wire.
    pub fn encode(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    /// Decode the wire form.
    pub fn decode(s: &str) -> Result<Self> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| CoreError::DecodingError(format!("nonce: {}", e)))?;
        let arr: [u8; NONCE_SIZE] = bytes
            .try_into()
            .map_err(|_| CoreError::DecodingError("nonce: wrong length".into()))?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce({})", self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonce_encode_decode() {
        let nonce = Nonce::from_bytes([0x01; NONCE_SIZE]);
        let encoded = nonce.encode();
        assert_eq!(Nonce::decode(&encoded).unwrap(), nonce);
    }

    #[test]
    fn test_nonce_decode_wrong_length() {
        let short = bs58::encode([0x01u8; 8]).into_string();
        assert!(Nonce::decode(&short).is_err());
    }

    #[test]
    fn test_generated_nonces_differ() {
        assert_ne!(Nonce::generate(), Nonce::generate());
    }
}
