//! Cryptographic primitives for vaultsync.
//!
//! Wraps Ed25519 signing, XChaCha20-Poly1305 sealing and Blake3 key
//! derivation with strong types.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};

/// A 32-byte Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ed25519PublicKey(pub [u8; 32]);

impl Ed25519PublicKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// The identity string for this key.
    pub fn identity(&self) -> Identity {
        Identity(bs58::encode(self.0).into_string())
    }

    /// Verify a signature over a message.
    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> Result<()> {
        let verifying_key =
            VerifyingKey::from_bytes(&self.0).map_err(|_| CoreError::InvalidPublicKey)?;

        let sig = Signature::from_bytes(&signature.0);

        verifying_key
            .verify(message, &sig)
            .map_err(|_| CoreError::VerifyFailed)
    }
}

impl fmt::Debug for Ed25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Pub({})", &self.to_hex()[..16])
    }
}

impl From<[u8; 32]> for Ed25519PublicKey {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// A 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Ed25519Signature(pub [u8; 64]);

impl Ed25519Signature {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Parse from a byte slice; anything but 64 bytes fails verification.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 64] = bytes.try_into().map_err(|_| CoreError::VerifyFailed)?;
        Ok(Self(arr))
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Ed25519Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Sig({}...)", &self.to_hex()[..16])
    }
}

/// Signer identity: the base58 encoding of an Ed25519 public key.
///
/// Identities appear in authorization headers and as the vault id on the
/// remote, so they are plain URL-safe strings.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    /// Parse and validate an identity string.
    pub fn parse(s: &str) -> Result<Self> {
        let identity = Self(s.to_string());
        identity.public_key()?;
        Ok(identity)
    }

    /// Decode the public key this identity names.
    pub fn public_key(&self) -> Result<Ed25519PublicKey> {
        let bytes = bs58::decode(&self.0)
            .into_vec()
            .map_err(|e| CoreError::InvalidIdentity(format!("{}: {}", self.0, e)))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidIdentity(format!("{}: wrong length", self.0)))?;
        VerifyingKey::from_bytes(&arr).map_err(|_| CoreError::InvalidPublicKey)?;
        Ok(Ed25519PublicKey(arr))
    }

    /// Borrow the identity string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self.0)
    }
}

impl TryFrom<String> for Identity {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.0
    }
}

/// An Ed25519 keypair used to sign requests.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let signing_key = SigningKey::generate(&mut rng);
        Self { signing_key }
    }

    /// Create from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        Self { signing_key }
    }

    /// Get the public key.
    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Get the identity of this keypair.
    pub fn identity(&self) -> Identity {
        self.public_key().identity()
    }

    /// Sign a message. Ed25519 signatures are deterministic.
    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        let sig = self.signing_key.sign(message);
        Ed25519Signature(sig.to_bytes())
    }

    /// Get the raw seed bytes (secret key material).
    pub fn seed(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({})", self.identity())
    }
}

/// Size of the XChaCha20-Poly1305 nonce prefixed to every sealed payload.
pub const SEAL_NONCE_SIZE: usize = 24;

/// Per-event nonce: the AEAD nonce of a sealed record.
///
/// Used by the sync engine to detect replayed or duplicated events.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventNonce(pub [u8; SEAL_NONCE_SIZE]);

impl EventNonce {
    /// Extract the nonce prefix of a sealed payload.
    pub fn from_sealed(sealed: &[u8]) -> Option<Self> {
        let prefix = sealed.get(..SEAL_NONCE_SIZE)?;
        let arr: [u8; SEAL_NONCE_SIZE] = prefix.try_into().ok()?;
        Some(Self(arr))
    }

    /// Base58 text form, used as a store path component.
    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }
}

impl fmt::Debug for EventNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventNonce({})", self.to_base58())
    }
}

/// A 256-bit vault master key.
///
/// Seals records with XChaCha20-Poly1305; sealed layout is
/// `nonce(24) || ciphertext`.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey([u8; 32]);

impl SecretKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Seal a plaintext under a fresh random nonce.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut nonce = [0u8; SEAL_NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce);
        self.seal_with_nonce(plaintext, &EventNonce(nonce))
    }

    /// Seal with an explicit nonce. Never reuse a nonce under the same key.
    pub fn seal_with_nonce(&self, plaintext: &[u8], nonce: &EventNonce) -> Result<Vec<u8>> {
        let cipher =
            XChaCha20Poly1305::new_from_slice(&self.0).map_err(|_| CoreError::SealFailed)?;
        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&nonce.0), plaintext)
            .map_err(|_| CoreError::SealFailed)?;

        let mut sealed = Vec::with_capacity(SEAL_NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce.0);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Open a sealed payload.
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < SEAL_NONCE_SIZE {
            return Err(CoreError::OpenFailed);
        }
        let (nonce, ciphertext) = sealed.split_at(SEAL_NONCE_SIZE);
        let cipher =
            XChaCha20Poly1305::new_from_slice(&self.0).map_err(|_| CoreError::OpenFailed)?;
        cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| CoreError::OpenFailed)
    }

    /// Derive a signing keypair bound to this key, a context and a salt.
    ///
    /// The same (key, context, salt) always yields the same keypair.
    pub fn derive_keypair(&self, context: &str, salt: &[u8]) -> Keypair {
        let mut hasher = blake3::Hasher::new_derive_key(context);
        hasher.update(&self.0);
        hasher.update(salt);
        Keypair::from_seed(hasher.finalize().as_bytes())
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_sign_verify() {
        let keypair = Keypair::generate();
        let message = b"GET,https://example.com/vault,";
        let signature = keypair.sign(message);

        keypair
            .public_key()
            .verify(message, &signature)
            .expect("valid signature should verify");

        let tampered = b"HEAD,https://example.com/vault,";
        assert_eq!(
            keypair.public_key().verify(tampered, &signature),
            Err(CoreError::VerifyFailed)
        );
    }

    #[test]
    fn test_identity_roundtrip() {
        let keypair = Keypair::from_seed(&[0x01; 32]);
        let identity = keypair.identity();
        let parsed = Identity::parse(identity.as_str()).unwrap();
        assert_eq!(parsed, identity);
        assert_eq!(parsed.public_key().unwrap(), keypair.public_key());
    }

    #[test]
    fn test_identity_rejects_garbage() {
        assert!(Identity::parse("not-base58-0OIl").is_err());
        // Valid base58, wrong length
        assert!(Identity::parse("abc").is_err());
    }

    #[test]
    fn test_seal_open() {
        let key = SecretKey::generate();
        let sealed = key.seal(b"secret record").unwrap();
        assert_eq!(key.open(&sealed).unwrap(), b"secret record");

        let other = SecretKey::generate();
        assert_eq!(other.open(&sealed), Err(CoreError::OpenFailed));
        assert_eq!(key.open(&sealed[..10]), Err(CoreError::OpenFailed));
    }

    #[test]
    fn test_sealed_nonce_prefix() {
        let key = SecretKey::from_bytes([0x07; 32]);
        let nonce = EventNonce([0x09; SEAL_NONCE_SIZE]);
        let sealed = key.seal_with_nonce(b"x", &nonce).unwrap();
        assert_eq!(EventNonce::from_sealed(&sealed), Some(nonce));
        assert_eq!(EventNonce::from_sealed(&[0u8; 3]), None);
    }

    #[test]
    fn test_derive_keypair_deterministic() {
        let key = SecretKey::from_bytes([0x42; 32]);
        let a = key.derive_keypair("test context", b"salt");
        let b = key.derive_keypair("test context", b"salt");
        let c = key.derive_keypair("test context", b"other salt");
        assert_eq!(a.public_key(), b.public_key());
        assert_ne!(a.public_key(), c.public_key());
    }
}
