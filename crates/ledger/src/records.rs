//! Records returned by ledger queries

use serde::{Deserialize, Serialize};
use turret_crypto::AccountId;

use crate::{Amount, Asset};

/// A standing sell order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferRecord {
    /// Ledger offer id
    pub id: u64,
    /// The account that placed the order
    pub seller: AccountId,
    /// Asset being sold
    pub selling: Asset,
    /// Asset being bought
    pub buying: Asset,
    /// Remaining amount of `selling` on offer
    pub amount: Amount,
}

/// Circulation statistics of an issued asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Asset code
    pub code: String,
    /// Issuing account
    pub issuer: AccountId,
    /// Amount held by authorized trustlines
    pub amount: Amount,
}

/// Payment-like operations touching an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentRecord {
    /// A plain payment
    Payment {
        from: AccountId,
        to: AccountId,
        asset: Asset,
        amount: Amount,
    },
    /// Account creation
    CreateAccount {
        funder: AccountId,
        account: AccountId,
        starting_balance: Amount,
    },
    /// Any other payment-like operation (path payments, merges, ...)
    Other { kind: String },
}

/// Metadata of the latest finalized ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerInfo {
    /// Ledger sequence
    pub sequence: u32,
    /// Close time, seconds since the unix epoch
    pub closed_at: u64,
}

/// Fee statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeStats {
    /// Highest fee charged per operation in recent ledgers, in stroops
    pub max_fee_charged: u32,
}
