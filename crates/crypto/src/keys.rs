//! Ledger identities and secret seeds
//!
//! Public keys are encoded as `G...` strkeys and secret seeds as `S...`
//! strkeys (base32 with a version byte and CRC16 checksum).

use std::fmt;
use std::str::FromStr;

use ed25519_dalek::{Keypair, PublicKey, SecretKey};
use serde::{Deserialize, Serialize};
use stellar_strkey::ed25519;

use crate::{CryptoError, CryptoResult};

/// A ledger account identity (ed25519 public key)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId([u8; 32]);

impl AccountId {
    /// Build an account id from raw public key bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse a `G...` strkey
    pub fn from_strkey(value: &str) -> CryptoResult<Self> {
        let key = ed25519::PublicKey::from_string(value.trim())
            .map_err(|e| CryptoError::InvalidKey(format!("{}: {:?}", value.trim(), e)))?;
        Ok(Self(key.0))
    }

    /// Whether `value` is a syntactically valid account strkey
    pub fn is_valid(value: &str) -> bool {
        Self::from_strkey(value).is_ok()
    }

    /// The raw public key bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Render as a `G...` strkey
    pub fn to_strkey(&self) -> String {
        ed25519::PublicKey(self.0).to_string()
    }

    /// Convert to an ed25519 verification key
    pub fn to_public_key(&self) -> CryptoResult<PublicKey> {
        PublicKey::from_bytes(&self.0).map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_strkey())
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self.to_strkey())
    }
}

impl FromStr for AccountId {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_strkey(s)
    }
}

impl TryFrom<String> for AccountId {
    type Error = CryptoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_strkey(&value)
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.to_strkey()
    }
}

/// A secret seed (`S...` strkey). Never printed.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SecretSeed([u8; 32]);

impl SecretSeed {
    /// Parse an `S...` strkey
    pub fn from_strkey(value: &str) -> CryptoResult<Self> {
        let key = ed25519::PrivateKey::from_string(value.trim())
            .map_err(|_| CryptoError::InvalidKey("malformed secret seed".to_string()))?;
        Ok(Self(key.0))
    }

    /// Render as an `S...` strkey
    pub fn to_strkey(&self) -> String {
        ed25519::PrivateKey(self.0).to_string()
    }

    /// Derive the key pair for this seed
    pub fn keypair(&self) -> CryptoResult<KeyPair> {
        KeyPair::from_seed_bytes(self.0)
    }
}

impl TryFrom<String> for SecretSeed {
    type Error = CryptoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_strkey(&value)
    }
}

impl From<SecretSeed> for String {
    fn from(seed: SecretSeed) -> Self {
        seed.to_strkey()
    }
}

impl fmt::Debug for SecretSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretSeed(..)")
    }
}

/// An ed25519 key pair bound to a ledger identity
pub struct KeyPair {
    inner: Keypair,
}

impl KeyPair {
    /// Derive a key pair from 32 seed bytes
    pub fn from_seed_bytes(seed: [u8; 32]) -> CryptoResult<Self> {
        let secret = SecretKey::from_bytes(&seed).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let public = PublicKey::from(&secret);
        Ok(Self {
            inner: Keypair { secret, public },
        })
    }

    /// The ledger identity of this key pair
    pub fn account_id(&self) -> AccountId {
        AccountId(self.inner.public.to_bytes())
    }

    /// The seed this key pair was derived from
    pub fn secret_seed(&self) -> SecretSeed {
        SecretSeed(self.inner.secret.to_bytes())
    }

    pub(crate) fn inner(&self) -> &Keypair {
        &self.inner
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyPair({})", self.account_id())
    }
}
