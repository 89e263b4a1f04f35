//! Ledger model and client for the turret DAO contract
//!
//! This crate describes the slice of the Stellar ledger the proposal lifecycle
//! works with: accounts, assets, standing offers, payment history and the
//! operations that change them. State is read through the [`LedgerClient`]
//! trait and changes are expressed as unsigned [`Transaction`]s.

pub mod account;
pub mod amount;
pub mod asset;
pub mod client;
pub mod horizon;
pub mod memory;
pub mod operation;
pub mod pagination;
pub mod records;
pub mod transaction;

use thiserror::Error;
use turret_crypto::CryptoError;

pub use account::{AccountRecord, Balance, Signer, Thresholds};
pub use amount::{Amount, AMOUNT_SCALE};
pub use asset::{option_index, Asset, OPTION_CODE_PREFIX};
pub use client::{LedgerClient, Page};
pub use horizon::HorizonClient;
pub use memory::MemoryLedger;
pub use operation::{Operation, OperationBody, Price, SignerSpec, MAX_DATA_ENTRY_LEN};
pub use records::{AssetRecord, FeeStats, LedgerInfo, OfferRecord, PaymentRecord};
pub use transaction::{EnvelopeEncoder, JsonEnvelopeEncoder, Transaction, TransactionBuilder, MAX_OPERATIONS};

/// Error types for ledger operations
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Amount out of range or with too many decimal places
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Malformed asset
    #[error("Invalid asset: {0}")]
    InvalidAsset(String),

    /// Data entry that cannot be decoded
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Operation that violates ledger limits
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Transaction that cannot be built or decoded
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Account not found
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Insufficient balance
    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Cursor that does not advance
    #[error("Pagination error: {0}")]
    Pagination(String),

    /// Transport failure talking to the ledger
    #[error("Network error: {0}")]
    Network(String),

    /// Response that does not match the expected shape
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Key or signature error
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
