//! Horizon REST client
//!
//! Maps Horizon's JSON resources onto the ledger records. Paged resources use
//! the `paging_token` of the last record as the next cursor.

use std::collections::BTreeMap;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::DateTime;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use turret_crypto::AccountId;

use crate::{
    AccountRecord, Amount, Asset, AssetRecord, Balance, FeeStats, LedgerClient, LedgerError, LedgerInfo,
    LedgerResult, OfferRecord, Page, PaymentRecord, Signer, Thresholds,
};

/// Records requested per page
const PAGE_LIMIT: u32 = 200;

/// A [`LedgerClient`] backed by a Horizon server
#[derive(Debug, Clone)]
pub struct HorizonClient {
    base_url: String,
    http: reqwest::Client,
}

impl HorizonClient {
    /// Create a client for the Horizon server at `base_url`
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Base URL requests are made against
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> LedgerResult<Option<T>> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {} {:?}", url, query);
        let response = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| LedgerError::Network(format!("{}: {}", url, e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(LedgerError::Network(format!("{} returned {}", url, response.status())));
        }
        response
            .json::<T>()
            .await
            .map(Some)
            .map_err(|e| LedgerError::UnexpectedResponse(format!("{}: {}", url, e)))
    }

    async fn get_page<R, T>(
        &self,
        path: &str,
        mut query: Vec<(&str, String)>,
        cursor: Option<String>,
        convert: impl Fn(R) -> LedgerResult<Option<T>>,
    ) -> LedgerResult<Page<T>>
    where
        R: DeserializeOwned + Paged,
    {
        query.push(("limit", PAGE_LIMIT.to_string()));
        query.push(("order", "asc".to_string()));
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor));
        }
        let collection: Collection<R> = self
            .get_json(path, &query)
            .await?
            .ok_or_else(|| LedgerError::UnexpectedResponse(format!("{} not found", path)))?;

        let next_cursor = collection.embedded.records.last().map(|r| r.paging_token().to_string());
        let mut records = Vec::with_capacity(collection.embedded.records.len());
        for raw in collection.embedded.records {
            if let Some(record) = convert(raw)? {
                records.push(record);
            }
        }
        Ok(Page { records, next_cursor })
    }
}

trait Paged {
    fn paging_token(&self) -> &str;
}

#[derive(Debug, Deserialize)]
struct Collection<R> {
    #[serde(rename = "_embedded")]
    embedded: Embedded<R>,
}

#[derive(Debug, Deserialize)]
struct Embedded<R> {
    records: Vec<R>,
}

#[derive(Debug, Deserialize)]
struct AssetFields {
    asset_type: String,
    asset_code: Option<String>,
    asset_issuer: Option<String>,
}

impl AssetFields {
    fn to_asset(&self) -> LedgerResult<Asset> {
        if self.asset_type == "native" {
            return Ok(Asset::Native);
        }
        match (&self.asset_code, &self.asset_issuer) {
            (Some(code), Some(issuer)) => Asset::credit(code, parse_account(issuer)?),
            _ => Err(LedgerError::UnexpectedResponse(format!(
                "{} asset without code or issuer",
                self.asset_type
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct HorizonBalance {
    balance: String,
    #[serde(flatten)]
    asset: AssetFields,
}

#[derive(Debug, Deserialize)]
struct HorizonSigner {
    key: String,
    weight: u8,
}

#[derive(Debug, Deserialize)]
struct HorizonThresholds {
    low_threshold: u8,
    med_threshold: u8,
    high_threshold: u8,
}

#[derive(Debug, Deserialize)]
struct HorizonAccount {
    account_id: String,
    sequence: String,
    balances: Vec<HorizonBalance>,
    signers: Vec<HorizonSigner>,
    thresholds: HorizonThresholds,
    #[serde(default)]
    data: BTreeMap<String, String>,
}

impl HorizonAccount {
    fn into_record(self) -> LedgerResult<AccountRecord> {
        let sequence = self
            .sequence
            .parse::<i64>()
            .map_err(|_| LedgerError::UnexpectedResponse(format!("bad sequence {}", self.sequence)))?;
        let balances = self
            .balances
            .iter()
            .map(|b| {
                Ok(Balance {
                    asset: b.asset.to_asset()?,
                    amount: Amount::parse(&b.balance)?,
                })
            })
            .collect::<LedgerResult<Vec<_>>>()?;
        let data = self
            .data
            .into_iter()
            .map(|(name, value)| {
                STANDARD
                    .decode(value.as_bytes())
                    .map(|raw| (name.clone(), raw))
                    .map_err(|e| LedgerError::InvalidData(format!("data entry {}: {}", name, e)))
            })
            .collect::<LedgerResult<BTreeMap<_, _>>>()?;

        Ok(AccountRecord {
            id: parse_account(&self.account_id)?,
            sequence,
            balances,
            signers: self
                .signers
                .into_iter()
                .map(|s| Signer {
                    key: s.key,
                    weight: s.weight,
                })
                .collect(),
            thresholds: Thresholds {
                low: self.thresholds.low_threshold,
                medium: self.thresholds.med_threshold,
                high: self.thresholds.high_threshold,
            },
            data,
        })
    }
}

#[derive(Debug, Deserialize)]
struct HorizonOffer {
    id: String,
    paging_token: String,
    seller: String,
    selling: AssetFields,
    buying: AssetFields,
    amount: String,
}

impl Paged for HorizonOffer {
    fn paging_token(&self) -> &str {
        &self.paging_token
    }
}

#[derive(Debug, Deserialize)]
struct HorizonAssetBalances {
    authorized: String,
}

#[derive(Debug, Deserialize)]
struct HorizonAsset {
    paging_token: String,
    asset_code: String,
    asset_issuer: String,
    /// Present on older servers, replaced by `balances.authorized`
    amount: Option<String>,
    balances: Option<HorizonAssetBalances>,
}

impl Paged for HorizonAsset {
    fn paging_token(&self) -> &str {
        &self.paging_token
    }
}

#[derive(Debug, Deserialize)]
struct HorizonPayment {
    paging_token: String,
    #[serde(rename = "type")]
    kind: String,
    from: Option<String>,
    to: Option<String>,
    amount: Option<String>,
    asset_type: Option<String>,
    asset_code: Option<String>,
    asset_issuer: Option<String>,
    funder: Option<String>,
    account: Option<String>,
    starting_balance: Option<String>,
}

impl Paged for HorizonPayment {
    fn paging_token(&self) -> &str {
        &self.paging_token
    }
}

impl HorizonPayment {
    fn into_record(self) -> LedgerResult<PaymentRecord> {
        let missing = |field: &str| LedgerError::UnexpectedResponse(format!("{} record without {}", self.kind, field));
        match self.kind.as_str() {
            "payment" => {
                let asset = AssetFields {
                    asset_type: self.asset_type.clone().ok_or_else(|| missing("asset_type"))?,
                    asset_code: self.asset_code.clone(),
                    asset_issuer: self.asset_issuer.clone(),
                }
                .to_asset()?;
                Ok(PaymentRecord::Payment {
                    from: parse_account(self.from.as_deref().ok_or_else(|| missing("from"))?)?,
                    to: parse_account(self.to.as_deref().ok_or_else(|| missing("to"))?)?,
                    asset,
                    amount: Amount::parse(self.amount.as_deref().ok_or_else(|| missing("amount"))?)?,
                })
            }
            "create_account" => Ok(PaymentRecord::CreateAccount {
                funder: parse_account(self.funder.as_deref().ok_or_else(|| missing("funder"))?)?,
                account: parse_account(self.account.as_deref().ok_or_else(|| missing("account"))?)?,
                starting_balance: Amount::parse(
                    self.starting_balance.as_deref().ok_or_else(|| missing("starting_balance"))?,
                )?,
            }),
            other => Ok(PaymentRecord::Other { kind: other.to_string() }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct HorizonLedger {
    sequence: u32,
    closed_at: String,
}

#[derive(Debug, Deserialize)]
struct HorizonFeeCharged {
    max: String,
}

#[derive(Debug, Deserialize)]
struct HorizonFeeStats {
    fee_charged: HorizonFeeCharged,
}

fn parse_account(value: &str) -> LedgerResult<AccountId> {
    AccountId::from_strkey(value).map_err(LedgerError::from)
}

#[async_trait]
impl LedgerClient for HorizonClient {
    async fn get_account(&self, id: &AccountId) -> LedgerResult<Option<AccountRecord>> {
        let account: Option<HorizonAccount> = self.get_json(&format!("/accounts/{}", id), &[]).await?;
        account.map(HorizonAccount::into_record).transpose()
    }

    async fn offers_for_account(
        &self,
        account: &AccountId,
        cursor: Option<String>,
    ) -> LedgerResult<Page<OfferRecord>> {
        self.get_page("/offers", vec![("seller", account.to_strkey())], cursor, |o: HorizonOffer| {
            Ok(Some(OfferRecord {
                id: o
                    .id
                    .parse()
                    .map_err(|_| LedgerError::UnexpectedResponse(format!("bad offer id {}", o.id)))?,
                seller: parse_account(&o.seller)?,
                selling: o.selling.to_asset()?,
                buying: o.buying.to_asset()?,
                amount: Amount::parse(&o.amount)?,
            }))
        })
        .await
    }

    async fn assets_for_issuer(
        &self,
        issuer: &AccountId,
        cursor: Option<String>,
    ) -> LedgerResult<Page<AssetRecord>> {
        self.get_page("/assets", vec![("asset_issuer", issuer.to_strkey())], cursor, |a: HorizonAsset| {
            let amount = match (&a.amount, &a.balances) {
                (Some(amount), _) => amount.clone(),
                (None, Some(balances)) => balances.authorized.clone(),
                (None, None) => {
                    return Err(LedgerError::UnexpectedResponse(format!("asset {} without amount", a.asset_code)))
                }
            };
            Ok(Some(AssetRecord {
                code: a.asset_code,
                issuer: parse_account(&a.asset_issuer)?,
                amount: Amount::parse(&amount)?,
            }))
        })
        .await
    }

    async fn payments_for_account(
        &self,
        account: &AccountId,
        cursor: Option<String>,
    ) -> LedgerResult<Page<PaymentRecord>> {
        let path = format!("/accounts/{}/payments", account);
        self.get_page(&path, Vec::new(), cursor, |p: HorizonPayment| p.into_record().map(Some))
            .await
    }

    async fn latest_ledger(&self) -> LedgerResult<LedgerInfo> {
        let query = [("order", "desc".to_string()), ("limit", "1".to_string())];
        let collection: Collection<HorizonLedger> = self
            .get_json("/ledgers", &query)
            .await?
            .ok_or_else(|| LedgerError::UnexpectedResponse("ledgers not found".to_string()))?;
        let ledger = collection
            .embedded
            .records
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::UnexpectedResponse("no ledgers returned".to_string()))?;
        let closed_at = DateTime::parse_from_rfc3339(&ledger.closed_at)
            .map_err(|e| LedgerError::UnexpectedResponse(format!("bad closed_at {}: {}", ledger.closed_at, e)))?;
        Ok(LedgerInfo {
            sequence: ledger.sequence,
            closed_at: closed_at.timestamp().max(0) as u64,
        })
    }

    async fn fee_stats(&self) -> LedgerResult<FeeStats> {
        let stats: HorizonFeeStats = self
            .get_json("/fee_stats", &[])
            .await?
            .ok_or_else(|| LedgerError::UnexpectedResponse("fee_stats not found".to_string()))?;
        let max_fee_charged = stats
            .fee_charged
            .max
            .parse()
            .map_err(|_| LedgerError::UnexpectedResponse(format!("bad fee {}", stats.fee_charged.max)))?;
        Ok(FeeStats { max_fee_charged })
    }
}
