//! Charter and proposal documents
//!
//! Both are TOML. Fields are read through [`FieldReader`], which records every
//! problem it meets so a document is rejected once with the full list.

pub mod charter;
pub mod proposal;

use turret_crypto::AccountId;
use turret_ledger::{Amount, Asset};

use crate::{DocumentKind, FieldIssue, GovernanceError, GovernanceResult};

pub use charter::GovernanceCharter;
pub use proposal::{ProposalDocument, VotingOption};

/// Parse raw TOML into a table, reporting syntax errors as a validation issue
pub(crate) fn parse_table(raw: &str, document: DocumentKind) -> GovernanceResult<toml::Table> {
    toml::from_str::<toml::Table>(raw)
        .map_err(|e| GovernanceError::validation(document, vec![FieldIssue::new("<document>", e.message())]))
}

/// Typed access to TOML fields that collects issues instead of failing fast
pub(crate) struct FieldReader<'a> {
    table: &'a toml::Table,
    issues: Vec<FieldIssue>,
}

impl<'a> FieldReader<'a> {
    pub(crate) fn new(table: &'a toml::Table) -> Self {
        Self {
            table,
            issues: Vec::new(),
        }
    }

    pub(crate) fn issue(&mut self, field: &str, message: impl Into<String>) {
        self.issues.push(FieldIssue::new(field, message));
    }

    pub(crate) fn has(&self, field: &str) -> bool {
        self.table.contains_key(field)
    }

    pub(crate) fn value(&self, field: &str) -> Option<&'a toml::Value> {
        self.table.get(field)
    }

    fn required(&mut self, field: &str) -> Option<&'a toml::Value> {
        let value = self.table.get(field);
        if value.is_none() {
            self.issue(field, "missing");
        }
        value
    }

    /// A required string
    pub(crate) fn string(&mut self, field: &str) -> Option<String> {
        match self.required(field)? {
            toml::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            toml::Value::String(_) => {
                self.issue(field, "empty");
                None
            }
            other => {
                self.issue(field, format!("expected a string, found {}", other.type_str()));
                None
            }
        }
    }

    /// A required amount, written as a string or an integer
    pub(crate) fn amount(&mut self, field: &str) -> Option<Amount> {
        let value = self.required(field)?;
        self.amount_value(field, value)
    }

    /// An optional amount
    pub(crate) fn optional_amount(&mut self, field: &str) -> Option<Amount> {
        let value = self.value(field)?;
        self.amount_value(field, value)
    }

    fn amount_value(&mut self, field: &str, value: &toml::Value) -> Option<Amount> {
        let parsed = match value {
            toml::Value::String(s) => Amount::parse(s.trim()),
            toml::Value::Integer(i) => Amount::from_units(*i),
            other => {
                self.issue(field, format!("expected an amount, found {}", other.type_str()));
                return None;
            }
        };
        match parsed {
            Ok(amount) if amount.is_positive() => Some(amount),
            Ok(_) => {
                self.issue(field, "must be positive");
                None
            }
            Err(e) => {
                self.issue(field, e.to_string());
                None
            }
        }
    }

    /// A required positive number of seconds, written as an integer or a string
    pub(crate) fn seconds(&mut self, field: &str) -> Option<u64> {
        let parsed = match self.required(field)? {
            toml::Value::Integer(i) => u64::try_from(*i).ok(),
            toml::Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        match parsed {
            Some(seconds) if seconds > 0 => Some(seconds),
            _ => {
                self.issue(field, "must be a positive number of seconds");
                None
            }
        }
    }

    /// A required ledger identity
    pub(crate) fn account(&mut self, field: &str) -> Option<AccountId> {
        let raw = self.string(field)?;
        match AccountId::from_strkey(&raw) {
            Ok(id) => Some(id),
            Err(_) => {
                self.issue(field, format!("{} is not a valid account id", raw));
                None
            }
        }
    }

    /// A required list of ledger identities
    pub(crate) fn accounts(&mut self, field: &str) -> Option<Vec<AccountId>> {
        let items = match self.required(field)? {
            toml::Value::Array(items) => items,
            other => {
                self.issue(field, format!("expected a list, found {}", other.type_str()));
                return None;
            }
        };
        let mut accounts = Vec::with_capacity(items.len());
        let mut valid = true;
        for item in items {
            match item.as_str().map(|s| AccountId::from_strkey(s.trim())) {
                Some(Ok(id)) => accounts.push(id),
                _ => {
                    self.issue(field, format!("{} is not a valid account id", item));
                    valid = false;
                }
            }
        }
        valid.then_some(accounts)
    }

    /// A required credit asset written as `CODE:ISSUER`
    pub(crate) fn asset(&mut self, field: &str) -> Option<Asset> {
        let raw = self.string(field)?;
        match Asset::parse(&raw) {
            Ok(asset @ Asset::Credit { .. }) => Some(asset),
            Ok(Asset::Native) => {
                self.issue(field, "the native asset cannot be a voting token");
                None
            }
            Err(e) => {
                self.issue(field, e.to_string());
                None
            }
        }
    }

    /// Fail with every collected issue, if any
    pub(crate) fn finish(self, document: DocumentKind) -> GovernanceResult<()> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(GovernanceError::validation(document, self.issues))
        }
    }
}
