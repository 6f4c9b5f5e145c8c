//! ECDSA signing primitives
//!
//! Key pair generation, signing and verification over secp256k1 with a
//! SHA-256 signing digest. Curve and digest are process-wide constants of
//! the protocol, not configurable per instruction.

use rand::rngs::OsRng;
use rand::RngCore;
use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

use super::hash::sha256;

/// Length of the random per-signing origin key in bytes
pub const ORIGIN_KEY_LEN: usize = 16;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid signature encoding")]
    InvalidSignature,
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a hex-encoded private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key = SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Ok(Self {
            secret_key,
            public_key,
        })
    }

    /// Get the public key as a hex string (compressed format)
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    /// Sign a message, hashing it with the protocol digest first
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, KeyError> {
        let secp = Secp256k1::new();
        let digest: [u8; 32] = sha256(message)
            .try_into()
            .map_err(|_| KeyError::InvalidSignature)?;
        let msg = Message::from_digest(digest);
        let sig = secp.sign_ecdsa(&msg, &self.secret_key);
        Ok(sig.serialize_compact().to_vec())
    }
}

/// Generate a fresh random origin key
pub fn random_origin_key() -> Vec<u8> {
    let mut key = vec![0u8; ORIGIN_KEY_LEN];
    OsRng.fill_bytes(&mut key);
    key
}

/// Verify a compact ECDSA signature over a message against a public key
pub fn verify_signature(
    public_key: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<bool, KeyError> {
    let secp = Secp256k1::verification_only();
    let pubkey = PublicKey::from_slice(public_key).map_err(|_| KeyError::InvalidPublicKey)?;
    let digest: [u8; 32] = sha256(message)
        .try_into()
        .map_err(|_| KeyError::InvalidSignature)?;
    let msg = Message::from_digest(digest);
    let sig = Signature::from_compact(signature).map_err(|_| KeyError::InvalidSignature)?;
    Ok(secp.verify_ecdsa(&msg, &sig, &pubkey).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let keys = KeyPair::generate();
        let message = b"transfer all the things";

        let sig = keys.sign(message).unwrap();
        let ok = verify_signature(&keys.public_key.serialize(), message, &sig).unwrap();
        assert!(ok);
    }

    #[test]
    fn test_tampered_message_fails() {
        let keys = KeyPair::generate();
        let sig = keys.sign(b"original").unwrap();

        let ok = verify_signature(&keys.public_key.serialize(), b"tampered", &sig).unwrap();
        assert!(!ok);
    }

    #[test]
    fn test_wrong_key_fails() {
        let keys = KeyPair::generate();
        let other = KeyPair::generate();
        let sig = keys.sign(b"message").unwrap();

        let ok = verify_signature(&other.public_key.serialize(), b"message", &sig).unwrap();
        assert!(!ok);
    }

    #[test]
    fn test_key_roundtrip_from_hex() {
        let keys = KeyPair::generate();
        let restored =
            KeyPair::from_private_key_hex(&hex::encode(keys.secret_key.secret_bytes())).unwrap();
        assert_eq!(restored.public_key_hex(), keys.public_key_hex());
    }

    #[test]
    fn test_origin_keys_are_random() {
        assert_ne!(random_origin_key(), random_origin_key());
        assert_eq!(random_origin_key().len(), ORIGIN_KEY_LEN);
    }
}
