//! The ledger client seam
//!
//! Everything the proposal lifecycle knows about ledger state comes through
//! this trait. Implementations: [`crate::HorizonClient`] for a live network
//! and [`crate::MemoryLedger`] for tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use turret_crypto::AccountId;

use crate::{AccountRecord, AssetRecord, FeeStats, LedgerInfo, LedgerResult, OfferRecord, PaymentRecord};

/// One page of a paginated query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Records on this page, in ledger order
    pub records: Vec<T>,
    /// Cursor for the next page, `None` on the last page
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// A final page
    pub fn last(records: Vec<T>) -> Self {
        Self {
            records,
            next_cursor: None,
        }
    }
}

/// Read access to ledger state
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Load an account, `None` when it does not exist
    async fn get_account(&self, id: &AccountId) -> LedgerResult<Option<AccountRecord>>;

    /// Standing sell orders placed by `account`
    async fn offers_for_account(
        &self,
        account: &AccountId,
        cursor: Option<String>,
    ) -> LedgerResult<Page<OfferRecord>>;

    /// Assets issued by `issuer` with their circulating amounts
    async fn assets_for_issuer(
        &self,
        issuer: &AccountId,
        cursor: Option<String>,
    ) -> LedgerResult<Page<AssetRecord>>;

    /// Payment-like operations touching `account`, oldest first
    async fn payments_for_account(
        &self,
        account: &AccountId,
        cursor: Option<String>,
    ) -> LedgerResult<Page<PaymentRecord>>;

    /// The most recently closed ledger
    async fn latest_ledger(&self) -> LedgerResult<LedgerInfo>;

    /// Recent fee statistics
    async fn fee_stats(&self) -> LedgerResult<FeeStats>;
}
