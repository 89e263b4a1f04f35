//! Ledger operations
//!
//! Only the operations the proposal lifecycle needs are modelled. Each
//! operation may name its own source account; otherwise the transaction
//! source applies.

use serde::{Deserialize, Serialize};
use turret_crypto::AccountId;

use crate::{Amount, Asset, LedgerError, LedgerResult};

/// Maximum length of a data entry name or value, in bytes
pub const MAX_DATA_ENTRY_LEN: usize = 64;

/// Price of an offer as a fraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub n: i32,
    pub d: i32,
}

impl Price {
    /// One unit for one unit
    pub fn one() -> Self {
        Self { n: 1, d: 1 }
    }
}

/// A signer to add, update or (with weight 0) remove
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerSpec {
    pub key: AccountId,
    pub weight: u8,
}

/// Operation payloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationBody {
    CreateAccount {
        destination: AccountId,
        starting_balance: Amount,
    },
    Payment {
        destination: AccountId,
        asset: Asset,
        amount: Amount,
    },
    ManageData {
        name: String,
        /// `None` deletes the entry
        value: Option<String>,
    },
    ChangeTrust {
        asset: Asset,
        /// `None` means the maximum limit
        limit: Option<Amount>,
    },
    ManageSellOffer {
        selling: Asset,
        buying: Asset,
        amount: Amount,
        price: Price,
        /// 0 creates a new offer
        offer_id: u64,
    },
    SetOptions {
        master_weight: Option<u8>,
        low_threshold: Option<u8>,
        med_threshold: Option<u8>,
        high_threshold: Option<u8>,
        signer: Option<SignerSpec>,
    },
    BeginSponsoringFutureReserves {
        sponsored_id: AccountId,
    },
    EndSponsoringFutureReserves,
    AccountMerge {
        destination: AccountId,
    },
}

/// An operation with an optional source account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub source: Option<AccountId>,
    #[serde(flatten)]
    pub body: OperationBody,
}

impl Operation {
    fn with(source: Option<AccountId>, body: OperationBody) -> Self {
        Self { source, body }
    }

    pub fn create_account(source: AccountId, destination: AccountId, starting_balance: Amount) -> Self {
        Self::with(
            Some(source),
            OperationBody::CreateAccount {
                destination,
                starting_balance,
            },
        )
    }

    pub fn payment(source: AccountId, destination: AccountId, asset: Asset, amount: Amount) -> Self {
        Self::with(
            Some(source),
            OperationBody::Payment {
                destination,
                asset,
                amount,
            },
        )
    }

    /// Set a UTF-8 data entry, enforcing the 64 byte limits
    pub fn manage_data(source: AccountId, name: &str, value: &str) -> LedgerResult<Self> {
        if name.is_empty() || name.len() > MAX_DATA_ENTRY_LEN {
            return Err(LedgerError::InvalidOperation(format!(
                "data entry name {:?} must be 1 to {} bytes",
                name, MAX_DATA_ENTRY_LEN
            )));
        }
        if value.len() > MAX_DATA_ENTRY_LEN {
            return Err(LedgerError::InvalidOperation(format!(
                "data entry {} value is {} bytes, limit is {}",
                name,
                value.len(),
                MAX_DATA_ENTRY_LEN
            )));
        }
        Ok(Self::with(
            Some(source),
            OperationBody::ManageData {
                name: name.to_string(),
                value: Some(value.to_string()),
            },
        ))
    }

    pub fn change_trust(source: AccountId, asset: Asset) -> Self {
        Self::with(Some(source), OperationBody::ChangeTrust { asset, limit: None })
    }

    /// A new sell order at price 1
    pub fn sell_offer(source: AccountId, selling: Asset, buying: Asset, amount: Amount) -> Self {
        Self::with(
            Some(source),
            OperationBody::ManageSellOffer {
                selling,
                buying,
                amount,
                price: Price::one(),
                offer_id: 0,
            },
        )
    }

    /// Delete an existing sell order by setting its amount to zero
    pub fn cancel_offer(source: AccountId, offer_id: u64, selling: Asset, buying: Asset) -> Self {
        Self::with(
            Some(source),
            OperationBody::ManageSellOffer {
                selling,
                buying,
                amount: Amount::zero(),
                price: Price::one(),
                offer_id,
            },
        )
    }

    pub fn add_signer(source: AccountId, key: AccountId, weight: u8) -> Self {
        Self::with(
            Some(source),
            OperationBody::SetOptions {
                master_weight: None,
                low_threshold: None,
                med_threshold: None,
                high_threshold: None,
                signer: Some(SignerSpec { key, weight }),
            },
        )
    }

    pub fn remove_signer(source: AccountId, key: AccountId) -> Self {
        Self::add_signer(source, key, 0)
    }

    /// Set the master key weight and all three thresholds
    pub fn lock_thresholds(source: AccountId, master_weight: u8, threshold: u8) -> Self {
        Self::with(
            Some(source),
            OperationBody::SetOptions {
                master_weight: Some(master_weight),
                low_threshold: Some(threshold),
                med_threshold: Some(threshold),
                high_threshold: Some(threshold),
                signer: None,
            },
        )
    }

    pub fn begin_sponsoring(source: AccountId, sponsored_id: AccountId) -> Self {
        Self::with(Some(source), OperationBody::BeginSponsoringFutureReserves { sponsored_id })
    }

    pub fn end_sponsoring(source: AccountId) -> Self {
        Self::with(Some(source), OperationBody::EndSponsoringFutureReserves)
    }

    pub fn account_merge(source: AccountId, destination: AccountId) -> Self {
        Self::with(Some(source), OperationBody::AccountMerge { destination })
    }

    /// Whether this operation changes signers, weights or thresholds
    pub fn is_signer_related(&self) -> bool {
        matches!(self.body, OperationBody::SetOptions { .. })
    }
}
