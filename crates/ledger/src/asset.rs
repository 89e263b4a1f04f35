//! Ledger assets

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use turret_crypto::AccountId;

use crate::{LedgerError, LedgerResult};

/// Prefix of the per-option vote tokens issued by a proposal account
pub const OPTION_CODE_PREFIX: &str = "OPTION";

/// An asset held or traded on the ledger
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Asset {
    /// The ledger's native asset
    Native,
    /// An issued asset identified by code and issuer
    Credit { code: String, issuer: AccountId },
}

impl Asset {
    /// Create an issued asset, validating the code
    pub fn credit(code: &str, issuer: AccountId) -> LedgerResult<Self> {
        validate_code(code)?;
        Ok(Self::Credit {
            code: code.to_string(),
            issuer,
        })
    }

    /// The vote token for option `index` (1-based) issued by `issuer`
    pub fn option(index: usize, issuer: AccountId) -> LedgerResult<Self> {
        Self::credit(&format!("{}{}", OPTION_CODE_PREFIX, index), issuer)
    }

    /// Parse `CODE:ISSUER` (whitespace around either part is ignored)
    pub fn parse(input: &str) -> LedgerResult<Self> {
        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case("native") {
            return Ok(Self::Native);
        }

        let parts: Vec<&str> = trimmed.split(':').map(str::trim).collect();
        if parts.len() != 2 {
            return Err(LedgerError::InvalidAsset(format!(
                "expected CODE:ISSUER, got {:?}",
                input
            )));
        }
        let issuer = AccountId::from_strkey(parts[1])
            .map_err(|e| LedgerError::InvalidAsset(format!("bad issuer: {}", e)))?;
        Self::credit(parts[0], issuer)
    }

    /// Asset code, if issued
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Native => None,
            Self::Credit { code, .. } => Some(code),
        }
    }

    /// Issuer, if issued
    pub fn issuer(&self) -> Option<&AccountId> {
        match self {
            Self::Native => None,
            Self::Credit { issuer, .. } => Some(issuer),
        }
    }

    /// Ledger asset type name
    pub fn asset_type(&self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Credit { code, .. } if code.len() <= 4 => "credit_alphanum4",
            Self::Credit { .. } => "credit_alphanum12",
        }
    }
}

/// Parse the 1-based option index out of an `OPTION<n>` code
pub fn option_index(code: &str) -> Option<usize> {
    let digits = code.strip_prefix(OPTION_CODE_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) || digits.starts_with('0') {
        return None;
    }
    digits.parse().ok()
}

fn validate_code(code: &str) -> LedgerResult<()> {
    if code.is_empty() || code.len() > 12 {
        return Err(LedgerError::InvalidAsset(format!(
            "asset code {:?} must be 1 to 12 characters",
            code
        )));
    }
    if !code.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(LedgerError::InvalidAsset(format!(
            "asset code {:?} must be alphanumeric",
            code
        )));
    }
    Ok(())
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::Credit { code, issuer } => write!(f, "{}:{}", code, issuer),
        }
    }
}

impl fmt::Debug for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Asset({})", self)
    }
}

impl FromStr for Asset {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Asset {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Asset> for String {
    fn from(asset: Asset) -> Self {
        asset.to_string()
    }
}
