//! Key management for quarknet accounts
//!
//! Both ledgers share the same ed25519 key material; only the encoding of
//! transactions differs. Public keys are rendered in base58 for display and
//! cache keying.

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of an ed25519 public key in bytes.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Length of an ed25519 signature in bytes.
pub const SIGNATURE_LEN: usize = 64;

#[derive(Debug, Clone, Error)]
pub enum KeyError {
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid base58 encoding: {0}")]
    InvalidEncoding(String),

    #[error("invalid key material: {0}")]
    InvalidKey(String),
}

/// A 32-byte ed25519 public key identifying an account on either ledger.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicKey([u8; PUBLIC_KEY_LEN]);

impl PublicKey {
    /// Const constructor for well-known program identifiers.
    pub const fn new(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != PUBLIC_KEY_LEN {
            return Err(KeyError::InvalidLength {
                expected: PUBLIC_KEY_LEN,
                actual: bytes.len(),
            });
        }
        let mut buf = [0u8; PUBLIC_KEY_LEN];
        buf.copy_from_slice(bytes);
        Ok(Self(buf))
    }

    pub fn from_base58(s: &str) -> Result<Self, KeyError> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| KeyError::InvalidEncoding(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    /// Canonical string encoding, used as the token-account cache key.
    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    /// Verify an ed25519 signature over `message`.
    pub fn verify(&self, message: &[u8], signature: &[u8; SIGNATURE_LEN]) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        let sig = ed25519_dalek::Signature::from_bytes(signature);
        key.verify(message, &sig).is_ok()
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", self.to_base58())
    }
}

/// An ed25519 signing key.
///
/// Key custody is the caller's problem; this type only holds material the
/// caller supplied. Debug output never includes the seed.
#[derive(Clone)]
pub struct PrivateKey(SigningKey);

impl PrivateKey {
    /// Generate a fresh random key.
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        rand::Rng::fill(&mut rand::thread_rng(), &mut seed);
        Self(SigningKey::from_bytes(&seed))
    }

    /// Construct from a 32-byte seed.
    pub fn from_seed(seed: &[u8]) -> Result<Self, KeyError> {
        if seed.len() != 32 {
            return Err(KeyError::InvalidLength {
                expected: 32,
                actual: seed.len(),
            });
        }
        if seed.iter().all(|&b| b == 0) {
            return Err(KeyError::InvalidKey("all-zero seed rejected".to_string()));
        }
        let mut buf = [0u8; 32];
        buf.copy_from_slice(seed);
        Ok(Self(SigningKey::from_bytes(&buf)))
    }

    pub fn from_base58(s: &str) -> Result<Self, KeyError> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| KeyError::InvalidEncoding(e.to_string()))?;
        Self::from_seed(&bytes)
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LEN] {
        self.0.sign(message).to_bytes()
    }

    pub fn to_seed_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bytes() == other.0.to_bytes()
    }
}

impl Eq for PrivateKey {}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PrivateKey({})", self.public_key().to_base58())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base58_round_trip() {
        let key = PrivateKey::generate().public_key();
        let decoded = PublicKey::from_base58(&key.to_base58()).unwrap();
        assert_eq!(key, decoded);
    }

    #[test]
    fn test_sign_and_verify() {
        let key = PrivateKey::generate();
        let sig = key.sign(b"payload");
        assert!(key.public_key().verify(b"payload", &sig));
        assert!(!key.public_key().verify(b"other payload", &sig));
    }

    #[test]
    fn test_rejects_bad_lengths() {
        assert!(PublicKey::from_bytes(&[0u8; 31]).is_err());
        assert!(PrivateKey::from_seed(&[1u8; 33]).is_err());
    }

    #[test]
    fn test_rejects_zero_seed() {
        assert!(PrivateKey::from_seed(&[0u8; 32]).is_err());
    }

    #[test]
    fn test_debug_hides_seed() {
        let key = PrivateKey::generate();
        let rendered = format!("{:?}", key);
        assert!(!rendered.contains(&bs58::encode(key.to_seed_bytes()).into_string()));
    }
}
