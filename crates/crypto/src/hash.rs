//! SHA-256 digests used to bind off-ledger documents to ledger state

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{CryptoError, CryptoResult, CryptoUtils};

/// A SHA-256 digest
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Hash([u8; 32]);

impl Hash {
    /// Wrap raw digest bytes
    pub fn from_digest(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Digest of the given document bytes
    pub fn of(data: &[u8]) -> Self {
        CryptoUtils::sha256(data)
    }

    /// Get the bytes of the hash
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Convert hash to lowercase hex (64 characters)
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Create a hash from a hex string
    pub fn from_hex(hex_str: &str) -> CryptoResult<Self> {
        let bytes = hex::decode(hex_str.trim())
            .map_err(|e| CryptoError::HashingError(format!("Invalid hex: {}", e)))?;
        let digest: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            CryptoError::HashingError(format!("expected 32 bytes, got {}", b.len()))
        })?;
        Ok(Self(digest))
    }

    /// Constant time equality against another digest
    pub fn matches(&self, other: &Hash) -> bool {
        CryptoUtils::constant_time_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl TryFrom<String> for Hash {
    type Error = CryptoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Hash> for String {
    fn from(hash: Hash) -> Self {
        hash.to_hex()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_round_trip() {
        let hash = Hash::of(b"proposal");
        assert_eq!(Hash::from_hex(&hash.to_hex()).unwrap(), hash);
        assert_eq!(hash.to_hex().len(), 64);
    }

    #[test]
    fn test_from_hex_rejects_short_input() {
        assert!(Hash::from_hex("abcd").is_err());
        assert!(Hash::from_hex("zz").is_err());
    }

    #[test]
    fn test_single_byte_mutation_changes_digest() {
        let original = b"VOTING_DURATION_SECONDS = 3600".to_vec();
        let digest = Hash::of(&original);

        for i in 0..original.len() {
            let mut mutated = original.clone();
            mutated[i] ^= 0x01;
            assert!(!Hash::of(&mutated).matches(&digest), "mutation at {} not detected", i);
        }
    }
}
