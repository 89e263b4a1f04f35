//! Unsigned transactions and envelope encoding
//!
//! Transactions are built against a loaded source account and carry no time
//! bounds: expiry is left to whoever signs and submits them.

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::debug;
use turret_crypto::AccountId;

use crate::{AccountRecord, LedgerError, LedgerResult, Operation};

/// Maximum operations per transaction
pub const MAX_OPERATIONS: usize = 100;

/// An unsigned transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Account paying the fee and consuming the sequence number
    pub source_account: AccountId,
    /// Sequence number this transaction consumes
    pub sequence: i64,
    /// Total fee in stroops (base fee times operation count)
    pub fee: u32,
    /// Network the transaction is bound to
    pub network_passphrase: String,
    /// Always `None`: no expiration
    pub time_bounds: Option<(u64, u64)>,
    /// Operations, applied in order
    pub operations: Vec<Operation>,
}

/// Builds a transaction the way the ledger SDKs do: bump the source
/// sequence, scale the base fee by operation count
pub struct TransactionBuilder {
    source_account: AccountId,
    sequence: i64,
    base_fee: u32,
    network_passphrase: String,
    operations: Vec<Operation>,
}

impl TransactionBuilder {
    /// Start a transaction for `source`
    pub fn new(source: &AccountRecord, base_fee: u32, network_passphrase: &str) -> Self {
        Self {
            source_account: source.id,
            sequence: source.sequence,
            base_fee,
            network_passphrase: network_passphrase.to_string(),
            operations: Vec::new(),
        }
    }

    /// Append an operation
    pub fn add_operation(mut self, operation: Operation) -> Self {
        self.operations.push(operation);
        self
    }

    /// Append several operations, keeping their order
    pub fn add_operations(mut self, operations: impl IntoIterator<Item = Operation>) -> Self {
        self.operations.extend(operations);
        self
    }

    /// Number of operations added so far
    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }

    /// Finish the transaction
    pub fn build(self) -> LedgerResult<Transaction> {
        if self.operations.is_empty() {
            return Err(LedgerError::InvalidTransaction("transaction has no operations".to_string()));
        }
        if self.operations.len() > MAX_OPERATIONS {
            return Err(LedgerError::InvalidTransaction(format!(
                "{} operations exceed the limit of {}",
                self.operations.len(),
                MAX_OPERATIONS
            )));
        }

        let sequence = self.sequence.checked_add(1).ok_or_else(|| {
            LedgerError::InvalidTransaction("source sequence number overflow".to_string())
        })?;
        let fee = self
            .base_fee
            .checked_mul(self.operations.len() as u32)
            .ok_or_else(|| LedgerError::InvalidTransaction("fee overflow".to_string()))?;

        debug!(
            "Built transaction for {} with {} operations, fee {}",
            self.source_account,
            self.operations.len(),
            fee
        );

        Ok(Transaction {
            source_account: self.source_account,
            sequence,
            fee,
            network_passphrase: self.network_passphrase,
            time_bounds: None,
            operations: self.operations,
        })
    }
}

/// Serializes an unsigned transaction into a transportable envelope
pub trait EnvelopeEncoder: Send + Sync {
    /// Encode the transaction envelope
    fn encode(&self, transaction: &Transaction) -> LedgerResult<String>;

    /// Decode an envelope produced by `encode`
    fn decode(&self, envelope: &str) -> LedgerResult<Transaction>;
}

/// Base64 over canonical JSON. Signing hosts that need the binary wire
/// format plug in their own encoder.
#[derive(Debug, Clone, Default)]
pub struct JsonEnvelopeEncoder;

impl EnvelopeEncoder for JsonEnvelopeEncoder {
    fn encode(&self, transaction: &Transaction) -> LedgerResult<String> {
        let json = serde_json::to_vec(transaction)
            .map_err(|e| LedgerError::SerializationError(e.to_string()))?;
        Ok(base64::engine::general_purpose::STANDARD.encode(json))
    }

    fn decode(&self, envelope: &str) -> LedgerResult<Transaction> {
        let json = base64::engine::general_purpose::STANDARD
            .decode(envelope.trim())
            .map_err(|e| LedgerError::SerializationError(e.to_string()))?;
        serde_json::from_slice(&json).map_err(|e| LedgerError::SerializationError(e.to_string()))
    }
}
