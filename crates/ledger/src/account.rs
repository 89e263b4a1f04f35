//! Ledger account snapshots

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use turret_crypto::AccountId;

use crate::{Amount, Asset, LedgerError, LedgerResult};

/// A balance line of an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// The asset held
    pub asset: Asset,
    /// The amount held
    pub amount: Amount,
}

/// A signer attached to an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signer {
    /// Signer key as rendered by the ledger (a strkey)
    pub key: String,
    /// Signing weight
    pub weight: u8,
}

/// Low, medium and high operation thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Thresholds {
    pub low: u8,
    pub medium: u8,
    pub high: u8,
}

impl Thresholds {
    /// All three thresholds set to `value`
    pub fn uniform(value: u8) -> Self {
        Self {
            low: value,
            medium: value,
            high: value,
        }
    }
}

/// A snapshot of a ledger account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    /// The account identity
    pub id: AccountId,
    /// Current sequence number
    pub sequence: i64,
    /// Balance lines, native included
    pub balances: Vec<Balance>,
    /// Signers, including the master key
    pub signers: Vec<Signer>,
    /// Operation thresholds
    pub thresholds: Thresholds,
    /// Decoded data entries
    pub data: BTreeMap<String, Vec<u8>>,
}

impl AccountRecord {
    /// A fresh account with a master key of weight 1 and no thresholds
    pub fn new(id: AccountId, sequence: i64) -> Self {
        Self {
            id,
            sequence,
            balances: Vec::new(),
            signers: vec![Signer {
                key: id.to_strkey(),
                weight: 1,
            }],
            thresholds: Thresholds::default(),
            data: BTreeMap::new(),
        }
    }

    /// Balance held of `asset`; zero when there is no trustline
    pub fn balance_of(&self, asset: &Asset) -> Amount {
        self.balances
            .iter()
            .find(|b| &b.asset == asset)
            .map(|b| b.amount)
            .unwrap_or_else(Amount::zero)
    }

    /// Weight of the account's own key
    pub fn master_weight(&self) -> u8 {
        self.signer_weight(&self.id.to_strkey()).unwrap_or(0)
    }

    /// Weight of `key` if it is a signer
    pub fn signer_weight(&self, key: &str) -> Option<u8> {
        self.signers.iter().find(|s| s.key == key).map(|s| s.weight)
    }

    /// Signers other than the master key
    pub fn extra_signers(&self) -> impl Iterator<Item = &Signer> {
        let master = self.id.to_strkey();
        self.signers.iter().filter(move |s| s.key != master)
    }

    /// Raw value of a data entry
    pub fn data_entry(&self, name: &str) -> Option<&[u8]> {
        self.data.get(name).map(Vec::as_slice)
    }

    /// A data entry decoded as UTF-8
    pub fn data_str(&self, name: &str) -> LedgerResult<Option<String>> {
        match self.data.get(name) {
            None => Ok(None),
            Some(raw) => String::from_utf8(raw.clone())
                .map(Some)
                .map_err(|_| LedgerError::InvalidData(format!("data entry {} is not UTF-8", name))),
        }
    }
}
