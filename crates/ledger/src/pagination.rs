//! Drain-to-completion pagination
//!
//! Decisions are only ever made on fully materialized result sets.

use std::collections::HashSet;
use std::future::Future;

use tracing::debug;
use turret_crypto::AccountId;

use crate::{AssetRecord, LedgerClient, LedgerError, LedgerResult, OfferRecord, Page, PaymentRecord};

/// Follow cursors until a page is empty or has no successor. A cursor that
/// repeats is treated as a broken server rather than looped on.
pub async fn drain<T, F, Fut>(what: &str, mut fetch: F) -> LedgerResult<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = LedgerResult<Page<T>>>,
{
    let mut records = Vec::new();
    let mut cursor: Option<String> = None;
    let mut seen = HashSet::new();
    let mut pages = 0usize;

    loop {
        let page = fetch(cursor.take()).await?;
        pages += 1;
        if page.records.is_empty() {
            break;
        }
        records.extend(page.records);

        match page.next_cursor {
            None => break,
            Some(next) => {
                if !seen.insert(next.clone()) {
                    return Err(LedgerError::Pagination(format!(
                        "{} query returned cursor {} twice",
                        what, next
                    )));
                }
                cursor = Some(next);
            }
        }
    }

    debug!("Drained {} {} records over {} pages", records.len(), what, pages);
    Ok(records)
}

/// Every standing order of `account`
pub async fn all_offers(client: &dyn LedgerClient, account: &AccountId) -> LedgerResult<Vec<OfferRecord>> {
    drain("offer", move |cursor| client.offers_for_account(account, cursor)).await
}

/// Every asset issued by `issuer`
pub async fn all_assets(client: &dyn LedgerClient, issuer: &AccountId) -> LedgerResult<Vec<AssetRecord>> {
    drain("asset", move |cursor| client.assets_for_issuer(issuer, cursor)).await
}

/// Every payment-like operation touching `account`
pub async fn all_payments(client: &dyn LedgerClient, account: &AccountId) -> LedgerResult<Vec<PaymentRecord>> {
    drain("payment", move |cursor| client.payments_for_account(account, cursor)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages() -> Vec<Page<u32>> {
        vec![
            Page {
                records: vec![1, 2],
                next_cursor: Some("a".to_string()),
            },
            Page {
                records: vec![3],
                next_cursor: Some("b".to_string()),
            },
            Page {
                records: vec![],
                next_cursor: None,
            },
        ]
    }

    #[tokio::test]
    async fn test_drain_follows_cursors() {
        let pages = pages();
        let mut calls = Vec::new();
        let records = drain("number", |cursor| {
            let index = match cursor.as_deref() {
                None => 0,
                Some("a") => 1,
                _ => 2,
            };
            calls.push(cursor);
            let page = pages[index].clone();
            async move { Ok(page) }
        })
        .await
        .unwrap();

        assert_eq!(records, vec![1, 2, 3]);
        assert_eq!(calls, vec![None, Some("a".to_string()), Some("b".to_string())]);
    }

    #[tokio::test]
    async fn test_drain_rejects_repeating_cursor() {
        let result = drain("number", |_cursor| async {
            Ok(Page {
                records: vec![1u32],
                next_cursor: Some("same".to_string()),
            })
        })
        .await;

        assert!(matches!(result, Err(LedgerError::Pagination(_))));
    }

    #[tokio::test]
    async fn test_drain_propagates_errors() {
        let result: LedgerResult<Vec<u32>> =
            drain("number", |_cursor| async { Err(LedgerError::Network("down".to_string())) }).await;
        assert!(matches!(result, Err(LedgerError::Network(_))));
    }
}
