//! Cryptographic primitives for the turret DAO contract
//!
//! Ledger identities are ed25519 public keys rendered as strkeys (`G...`),
//! secrets are strkey seeds (`S...`). Proposal documents are bound to the
//! ledger through SHA-256 digests.

pub mod hash;
pub mod keys;

use ed25519_dalek::{Signature, Signer, Verifier};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub use hash::Hash;
pub use keys::{AccountId, KeyPair, SecretSeed};

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Verification error: {0}")]
    VerificationError(String),

    #[error("Hashing error: {0}")]
    HashingError(String),
}

pub type CryptoResult<T> = Result<T, CryptoError>;

/// General cryptographic utilities
pub struct CryptoUtils;

impl CryptoUtils {
    /// Sign a message with the given key pair
    pub fn sign(keypair: &KeyPair, message: &[u8]) -> Vec<u8> {
        keypair.inner().sign(message).to_bytes().to_vec()
    }

    /// Verify a detached ed25519 signature made by `signer` over `message`
    pub fn verify(signer: &AccountId, message: &[u8], signature: &[u8]) -> CryptoResult<()> {
        let public_key = signer.to_public_key()?;
        let signature = Signature::try_from(signature)
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;

        public_key
            .verify(message, &signature)
            .map_err(|e| CryptoError::VerificationError(e.to_string()))
    }

    /// Verify a base64 encoded detached signature
    pub fn verify_base64(signer: &AccountId, message: &[u8], signature_b64: &str) -> CryptoResult<()> {
        use base64::Engine as _;

        let signature = base64::engine::general_purpose::STANDARD
            .decode(signature_b64.trim())
            .map_err(|e| CryptoError::InvalidSignature(format!("not base64: {}", e)))?;
        Self::verify(signer, message, &signature)
    }

    /// Calculate SHA-256 hash of data
    pub fn sha256(data: &[u8]) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Hash::from_digest(hasher.finalize().into())
    }

    /// Compare two digests in constant time
    pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
        if a.len() != b.len() {
            return false;
        }

        let mut result = 0;
        for (x, y) in a.iter().zip(b.iter()) {
            result |= x ^ y;
        }

        result == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypair(seed: u8) -> KeyPair {
        KeyPair::from_seed_bytes([seed; 32]).unwrap()
    }

    #[test]
    fn test_sign_verify() {
        let keypair = keypair(7);
        let message = b"test message";

        let signature = CryptoUtils::sign(&keypair, message);
        assert!(CryptoUtils::verify(&keypair.account_id(), message, &signature).is_ok());
    }

    #[test]
    fn test_sign_verify_wrong_message() {
        let keypair = keypair(7);
        let signature = CryptoUtils::sign(&keypair, b"test message");

        let result = CryptoUtils::verify(&keypair.account_id(), b"wrong message", &signature);
        assert!(matches!(result, Err(CryptoError::VerificationError(_))));
    }

    #[test]
    fn test_verify_wrong_signer() {
        let signature = CryptoUtils::sign(&keypair(7), b"test message");

        let result = CryptoUtils::verify(&keypair(8).account_id(), b"test message", &signature);
        assert!(result.is_err());
    }

    #[test]
    fn test_verify_truncated_signature() {
        let keypair = keypair(7);
        let signature = CryptoUtils::sign(&keypair, b"test message");

        let result = CryptoUtils::verify(&keypair.account_id(), b"test message", &signature[..63]);
        assert!(matches!(result, Err(CryptoError::InvalidSignature(_))));
    }

    #[test]
    fn test_verify_base64_garbage() {
        let keypair = keypair(7);
        let result = CryptoUtils::verify_base64(&keypair.account_id(), b"msg", "%%%not-base64");
        assert!(matches!(result, Err(CryptoError::InvalidSignature(_))));
    }

    #[test]
    fn test_sha256() {
        let hash = CryptoUtils::sha256(b"test data");

        // Known SHA-256 hash of "test data"
        let expected_hex = "916f0027a575074ce72a331777c3478d6513f786a591bd892da1a577bf2335f9";
        assert_eq!(hash.to_hex(), expected_hex);
    }

    #[test]
    fn test_constant_time_eq() {
        let a = vec![1, 2, 3, 4];
        let b = vec![1, 2, 3, 4];
        let c = vec![1, 2, 3, 5];

        assert!(CryptoUtils::constant_time_eq(&a, &b));
        assert!(!CryptoUtils::constant_time_eq(&a, &c));
        assert!(!CryptoUtils::constant_time_eq(&a, &c[..3]));
    }
}
