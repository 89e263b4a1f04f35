//! In-memory ledger for tests and dry runs
//!
//! Holds accounts, offers and payment history, serves them through
//! [`LedgerClient`] with configurable page sizes, and can apply the subset of
//! operations the proposal lifecycle emits. Signatures are not checked.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use turret_crypto::AccountId;

use crate::{
    AccountRecord, Amount, Asset, AssetRecord, Balance, FeeStats, LedgerClient, LedgerError, LedgerInfo,
    LedgerResult, OfferRecord, OperationBody, Page, PaymentRecord, Signer, Transaction,
};

#[derive(Debug, Clone, Default)]
struct State {
    accounts: BTreeMap<AccountId, AccountRecord>,
    offers: BTreeMap<u64, OfferRecord>,
    payments: Vec<PaymentRecord>,
    next_offer_id: u64,
    latest_ledger: Option<LedgerInfo>,
    fee_stats: Option<FeeStats>,
}

/// In-memory ledger implementation for testing
#[derive(Debug, Clone)]
pub struct MemoryLedger {
    state: Arc<RwLock<State>>,
    page_size: usize,
}

impl MemoryLedger {
    /// Create an empty ledger serving pages of up to 200 records
    pub fn new() -> Self {
        Self::with_page_size(200)
    }

    /// Create an empty ledger with a custom page size
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(State {
                next_offer_id: 1,
                ..State::default()
            })),
            page_size: page_size.max(1),
        }
    }

    /// Insert or replace an account
    pub async fn put_account(&self, account: AccountRecord) {
        let mut state = self.state.write().await;
        state.accounts.insert(account.id, account);
    }

    /// Set the latest closed ledger
    pub async fn set_latest_ledger(&self, sequence: u32, closed_at: u64) {
        let mut state = self.state.write().await;
        state.latest_ledger = Some(LedgerInfo { sequence, closed_at });
    }

    /// Set fee statistics; `None` makes `fee_stats` fail
    pub async fn set_fee_stats(&self, stats: Option<FeeStats>) {
        let mut state = self.state.write().await;
        state.fee_stats = stats;
    }

    /// Place a sell order directly, returning its id
    pub async fn put_offer(&self, seller: AccountId, selling: Asset, buying: Asset, amount: Amount) -> u64 {
        let mut state = self.state.write().await;
        let id = state.next_offer_id;
        state.next_offer_id += 1;
        state.offers.insert(
            id,
            OfferRecord {
                id,
                seller,
                selling,
                buying,
                amount,
            },
        );
        id
    }

    /// Append a record to payment history
    pub async fn push_payment(&self, payment: PaymentRecord) {
        let mut state = self.state.write().await;
        state.payments.push(payment);
    }

    /// Snapshot of an account
    pub async fn account(&self, id: &AccountId) -> Option<AccountRecord> {
        self.state.read().await.accounts.get(id).cloned()
    }

    /// Snapshot of all standing orders
    pub async fn offers(&self) -> Vec<OfferRecord> {
        self.state.read().await.offers.values().cloned().collect()
    }

    /// Take `amount` of an order: the taker pays the order's buying asset and
    /// receives its selling asset at price 1 (how a vote is cast)
    pub async fn fill_offer(&self, offer_id: u64, taker: &AccountId, amount: Amount) -> LedgerResult<()> {
        let mut guard = self.state.write().await;
        let mut state = guard.clone();
        let offer = state
            .offers
            .get(&offer_id)
            .cloned()
            .ok_or_else(|| LedgerError::InvalidOperation(format!("offer {} does not exist", offer_id)))?;
        let remaining = offer.amount.checked_sub(amount).ok_or_else(|| {
            LedgerError::InvalidOperation(format!("offer {} holds only {}", offer_id, offer.amount))
        })?;

        transfer(&mut state, taker, &offer.seller, &offer.buying, amount)?;
        transfer(&mut state, &offer.seller, taker, &offer.selling, amount)?;

        if remaining.is_zero() {
            state.offers.remove(&offer_id);
        } else if let Some(stored) = state.offers.get_mut(&offer_id) {
            stored.amount = remaining;
        }
        *guard = state;
        Ok(())
    }

    /// Apply a transaction's operations in order. All or nothing.
    pub async fn apply(&self, transaction: &Transaction) -> LedgerResult<()> {
        let mut state = self.state.write().await;
        let mut working = state.clone();

        let source = working.accounts.get_mut(&transaction.source_account).ok_or_else(|| {
            LedgerError::AccountNotFound(transaction.source_account.to_strkey())
        })?;
        if transaction.sequence != source.sequence + 1 {
            return Err(LedgerError::InvalidTransaction(format!(
                "bad sequence {}, account is at {}",
                transaction.sequence, source.sequence
            )));
        }
        source.sequence = transaction.sequence;

        for operation in &transaction.operations {
            let op_source = operation.source.unwrap_or(transaction.source_account);
            apply_operation(&mut working, &op_source, &operation.body)?;
        }

        *state = working;
        Ok(())
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

fn account_mut<'a>(state: &'a mut State, id: &AccountId) -> LedgerResult<&'a mut AccountRecord> {
    state
        .accounts
        .get_mut(id)
        .ok_or_else(|| LedgerError::AccountNotFound(id.to_strkey()))
}

fn adjust_balance(account: &mut AccountRecord, asset: &Asset, delta: Amount, credit: bool) -> LedgerResult<()> {
    // issuers hold unlimited supply of their own assets
    if asset.issuer() == Some(&account.id) {
        return Ok(());
    }
    let line = match account.balances.iter_mut().find(|b| &b.asset == asset) {
        Some(line) => line,
        None if *asset == Asset::Native => {
            account.balances.push(Balance {
                asset: Asset::Native,
                amount: Amount::zero(),
            });
            account.balances.last_mut().ok_or_else(|| LedgerError::InvalidData("empty".to_string()))?
        }
        None => {
            return Err(LedgerError::InvalidOperation(format!(
                "{} has no trustline for {}",
                account.id, asset
            )))
        }
    };
    line.amount = if credit {
        line.amount + delta
    } else {
        line.amount.checked_sub(delta).ok_or_else(|| {
            LedgerError::InsufficientBalance(format!("{} holds {} of {}", account.id, line.amount, asset))
        })?
    };
    Ok(())
}

fn transfer(state: &mut State, from: &AccountId, to: &AccountId, asset: &Asset, amount: Amount) -> LedgerResult<()> {
    adjust_balance(account_mut(state, from)?, asset, amount, false)?;
    adjust_balance(account_mut(state, to)?, asset, amount, true)
}

fn apply_operation(state: &mut State, source: &AccountId, body: &OperationBody) -> LedgerResult<()> {
    match body {
        OperationBody::CreateAccount {
            destination,
            starting_balance,
        } => {
            if state.accounts.contains_key(destination) {
                return Err(LedgerError::InvalidOperation(format!("{} already exists", destination)));
            }
            adjust_balance(account_mut(state, source)?, &Asset::Native, *starting_balance, false)?;
            let mut account = AccountRecord::new(*destination, 0);
            account.balances.push(Balance {
                asset: Asset::Native,
                amount: *starting_balance,
            });
            state.accounts.insert(*destination, account);
            state.payments.push(PaymentRecord::CreateAccount {
                funder: *source,
                account: *destination,
                starting_balance: *starting_balance,
            });
        }
        OperationBody::Payment {
            destination,
            asset,
            amount,
        } => {
            transfer(state, source, destination, asset, *amount)?;
            state.payments.push(PaymentRecord::Payment {
                from: *source,
                to: *destination,
                asset: asset.clone(),
                amount: *amount,
            });
        }
        OperationBody::ManageData { name, value } => {
            let account = account_mut(state, source)?;
            match value {
                Some(value) => {
                    account.data.insert(name.clone(), value.as_bytes().to_vec());
                }
                None => {
                    account.data.remove(name);
                }
            }
        }
        OperationBody::ChangeTrust { asset, .. } => {
            let account = account_mut(state, source)?;
            if !account.balances.iter().any(|b| &b.asset == asset) {
                account.balances.push(Balance {
                    asset: asset.clone(),
                    amount: Amount::zero(),
                });
            }
        }
        OperationBody::ManageSellOffer {
            selling,
            buying,
            amount,
            offer_id,
            ..
        } => {
            if *offer_id == 0 {
                let id = state.next_offer_id;
                state.next_offer_id += 1;
                state.offers.insert(
                    id,
                    OfferRecord {
                        id,
                        seller: *source,
                        selling: selling.clone(),
                        buying: buying.clone(),
                        amount: *amount,
                    },
                );
            } else {
                let offer = state.offers.get_mut(offer_id).ok_or_else(|| {
                    LedgerError::InvalidOperation(format!("offer {} does not exist", offer_id))
                })?;
                if offer.seller != *source {
                    return Err(LedgerError::InvalidOperation(format!("offer {} not owned by {}", offer_id, source)));
                }
                if amount.is_zero() {
                    state.offers.remove(offer_id);
                } else {
                    offer.amount = *amount;
                }
            }
        }
        OperationBody::SetOptions {
            master_weight,
            low_threshold,
            med_threshold,
            high_threshold,
            signer,
        } => {
            let account = account_mut(state, source)?;
            let master = account.id.to_strkey();
            if let Some(weight) = master_weight {
                set_signer(account, &master, *weight);
            }
            if let Some(spec) = signer {
                set_signer(account, &spec.key.to_strkey(), spec.weight);
            }
            if let Some(low) = low_threshold {
                account.thresholds.low = *low;
            }
            if let Some(medium) = med_threshold {
                account.thresholds.medium = *medium;
            }
            if let Some(high) = high_threshold {
                account.thresholds.high = *high;
            }
        }
        OperationBody::BeginSponsoringFutureReserves { .. } | OperationBody::EndSponsoringFutureReserves => {}
        OperationBody::AccountMerge { destination } => {
            let merging = state
                .accounts
                .get(source)
                .ok_or_else(|| LedgerError::AccountNotFound(source.to_strkey()))?;
            let subentries = merging.extra_signers().count()
                + merging.balances.iter().filter(|b| b.asset != Asset::Native).count()
                + merging.data.len()
                + state.offers.values().filter(|o| o.seller == *source).count();
            if subentries > 0 {
                return Err(LedgerError::InvalidOperation(format!(
                    "{} cannot be merged with {} subentries",
                    source, subentries
                )));
            }
            let merged = state
                .accounts
                .remove(source)
                .ok_or_else(|| LedgerError::AccountNotFound(source.to_strkey()))?;
            let native = merged.balance_of(&Asset::Native);
            adjust_balance(account_mut(state, destination)?, &Asset::Native, native, true)?;
            state.payments.push(PaymentRecord::Other {
                kind: "account_merge".to_string(),
            });
        }
    }
    Ok(())
}

fn set_signer(account: &mut AccountRecord, key: &str, weight: u8) {
    let is_master = key == account.id.to_strkey();
    match account.signers.iter_mut().find(|s| s.key == key) {
        Some(signer) => signer.weight = weight,
        None => account.signers.push(Signer {
            key: key.to_string(),
            weight,
        }),
    }
    // the ledger drops non-master signers set to weight zero
    if !is_master {
        account.signers.retain(|s| s.key != key || s.weight > 0);
    }
}

fn paginate<T: Clone>(records: &[T], cursor: Option<String>, page_size: usize) -> LedgerResult<Page<T>> {
    let start = match cursor {
        None => 0,
        Some(c) => c
            .parse::<usize>()
            .map_err(|_| LedgerError::Pagination(format!("invalid cursor {}", c)))?,
    };
    let end = (start + page_size).min(records.len());
    let page = records.get(start..end).map(<[T]>::to_vec).unwrap_or_default();
    let next_cursor = if page.is_empty() { None } else { Some(end.to_string()) };
    Ok(Page {
        records: page,
        next_cursor,
    })
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    async fn get_account(&self, id: &AccountId) -> LedgerResult<Option<AccountRecord>> {
        Ok(self.state.read().await.accounts.get(id).cloned())
    }

    async fn offers_for_account(
        &self,
        account: &AccountId,
        cursor: Option<String>,
    ) -> LedgerResult<Page<OfferRecord>> {
        let state = self.state.read().await;
        let offers: Vec<OfferRecord> = state.offers.values().filter(|o| &o.seller == account).cloned().collect();
        paginate(&offers, cursor, self.page_size)
    }

    async fn assets_for_issuer(
        &self,
        issuer: &AccountId,
        cursor: Option<String>,
    ) -> LedgerResult<Page<AssetRecord>> {
        let state = self.state.read().await;
        let mut circulation: BTreeMap<String, Amount> = BTreeMap::new();
        for account in state.accounts.values() {
            for balance in &account.balances {
                if let Asset::Credit { code, issuer: asset_issuer } = &balance.asset {
                    if asset_issuer == issuer {
                        *circulation.entry(code.clone()).or_insert_with(Amount::zero) += balance.amount;
                    }
                }
            }
        }
        let assets: Vec<AssetRecord> = circulation
            .into_iter()
            .map(|(code, amount)| AssetRecord {
                code,
                issuer: *issuer,
                amount,
            })
            .collect();
        paginate(&assets, cursor, self.page_size)
    }

    async fn payments_for_account(
        &self,
        account: &AccountId,
        cursor: Option<String>,
    ) -> LedgerResult<Page<PaymentRecord>> {
        let state = self.state.read().await;
        let payments: Vec<PaymentRecord> = state
            .payments
            .iter()
            .filter(|p| match p {
                PaymentRecord::Payment { from, to, .. } => from == account || to == account,
                PaymentRecord::CreateAccount { funder, account: created, .. } => {
                    funder == account || created == account
                }
                PaymentRecord::Other { .. } => false,
            })
            .cloned()
            .collect();
        paginate(&payments, cursor, self.page_size)
    }

    async fn latest_ledger(&self) -> LedgerResult<LedgerInfo> {
        self.state
            .read()
            .await
            .latest_ledger
            .clone()
            .ok_or_else(|| LedgerError::Network("no ledger has closed yet".to_string()))
    }

    async fn fee_stats(&self) -> LedgerResult<FeeStats> {
        self.state
            .read()
            .await
            .fee_stats
            .ok_or_else(|| LedgerError::Network("fee stats unavailable".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{pagination, Operation, TransactionBuilder};
    use turret_crypto::KeyPair;

    fn id(seed: u8) -> AccountId {
        KeyPair::from_seed_bytes([seed; 32]).unwrap().account_id()
    }

    fn funded(seed: u8, native: i64) -> AccountRecord {
        let mut account = AccountRecord::new(id(seed), 100);
        account.balances.push(Balance {
            asset: Asset::Native,
            amount: Amount::new(native),
        });
        account
    }

    #[tokio::test]
    async fn test_apply_create_account_and_data() {
        let ledger = MemoryLedger::new();
        ledger.put_account(funded(1, 50)).await;

        let source = ledger.account(&id(1)).await.unwrap();
        let tx = TransactionBuilder::new(&source, 100, "Test")
            .add_operation(Operation::create_account(id(1), id(2), Amount::new(10)))
            .add_operation(Operation::manage_data(id(2), "status", "active").unwrap())
            .build()
            .unwrap();
        ledger.apply(&tx).await.unwrap();

        let created = ledger.account(&id(2)).await.unwrap();
        assert_eq!(created.balance_of(&Asset::Native), Amount::new(10));
        assert_eq!(created.data_str("status").unwrap().as_deref(), Some("active"));
        assert_eq!(ledger.account(&id(1)).await.unwrap().sequence, 101);

        let payments = pagination::all_payments(&ledger, &id(2)).await.unwrap();
        assert!(matches!(payments[0], PaymentRecord::CreateAccount { .. }));
    }

    #[tokio::test]
    async fn test_apply_is_all_or_nothing() {
        let ledger = MemoryLedger::new();
        ledger.put_account(funded(1, 50)).await;

        let source = ledger.account(&id(1)).await.unwrap();
        let tx = TransactionBuilder::new(&source, 100, "Test")
            .add_operation(Operation::manage_data(id(1), "note", "kept?").unwrap())
            .add_operation(Operation::payment(id(1), id(9), Asset::Native, Amount::new(1)))
            .build()
            .unwrap();
        assert!(ledger.apply(&tx).await.is_err());

        let untouched = ledger.account(&id(1)).await.unwrap();
        assert!(untouched.data_entry("note").is_none());
        assert_eq!(untouched.sequence, 100);
    }

    #[tokio::test]
    async fn test_fill_offer_moves_assets() {
        let ledger = MemoryLedger::new();
        let issuer = id(1);
        let vote = Asset::credit("VOTE", id(5)).unwrap();
        let option = Asset::option(1, issuer).unwrap();

        let mut seller = funded(1, 10);
        seller.balances.push(Balance {
            asset: vote.clone(),
            amount: Amount::zero(),
        });
        ledger.put_account(seller).await;

        let mut voter = funded(2, 10);
        voter.balances.push(Balance {
            asset: vote.clone(),
            amount: Amount::new(40),
        });
        voter.balances.push(Balance {
            asset: option.clone(),
            amount: Amount::zero(),
        });
        ledger.put_account(voter).await;

        let offer = ledger.put_offer(issuer, option.clone(), vote.clone(), Amount::new(100)).await;
        ledger.fill_offer(offer, &id(2), Amount::new(30)).await.unwrap();

        assert_eq!(ledger.account(&id(1)).await.unwrap().balance_of(&vote), Amount::new(30));
        assert_eq!(ledger.account(&id(2)).await.unwrap().balance_of(&option), Amount::new(30));
        assert_eq!(ledger.offers().await[0].amount, Amount::new(70));

        let assets = pagination::all_assets(&ledger, &issuer).await.unwrap();
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].code, "OPTION1");
        assert_eq!(assets[0].amount, Amount::new(30));

        assert!(ledger.fill_offer(offer, &id(2), Amount::new(20)).await.is_err());
    }

    #[tokio::test]
    async fn test_small_pages_are_drained() {
        let ledger = MemoryLedger::with_page_size(2);
        let vote = Asset::credit("VOTE", id(5)).unwrap();
        for n in 1..=5 {
            ledger
                .put_offer(id(1), Asset::option(n, id(1)).unwrap(), vote.clone(), Amount::new(1))
                .await;
        }

        let first = ledger.offers_for_account(&id(1), None).await.unwrap();
        assert_eq!(first.records.len(), 2);
        assert!(first.next_cursor.is_some());

        let all = pagination::all_offers(&ledger, &id(1)).await.unwrap();
        assert_eq!(all.len(), 5);
    }

    #[tokio::test]
    async fn test_missing_fee_stats_and_ledger() {
        let ledger = MemoryLedger::default();
        assert!(ledger.fee_stats().await.is_err());
        assert!(ledger.latest_ledger().await.is_err());

        ledger.set_fee_stats(Some(FeeStats { max_fee_charged: 250 })).await;
        ledger.set_latest_ledger(7, 1_700_000_000).await;
        assert_eq!(ledger.fee_stats().await.unwrap().max_fee_charged, 250);
        assert_eq!(ledger.latest_ledger().await.unwrap().closed_at, 1_700_000_000);
    }
}
