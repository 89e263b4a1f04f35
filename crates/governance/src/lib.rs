//! Proposal lifecycle for ledger-native DAO governance
//!
//! A proposal lives in its own ledger account. Data entries on that account
//! record its status and policy, standing offers sell one `OPTION<n>` asset
//! per voting option for the DAO's voting token, and the circulating supply of
//! each option asset is its tally. This crate validates the governing charter
//! and proposal documents, plans the account, and assembles the unsigned
//! transaction for each stage of `create -> close -> tally -> execute`.

pub mod bond;
pub mod documents;
pub mod fetch;
pub mod lifecycle;
pub mod planner;
pub mod status;
pub mod tally;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use turret_crypto::AccountId;
use turret_ledger::{Amount, Asset, LedgerError};

pub use documents::{GovernanceCharter, ProposalDocument, VotingOption};
pub use fetch::{charter_url, DocumentFetcher, HttpDocumentFetcher, MemoryFetcher};
pub use lifecycle::{CreateRequest, ProposalLifecycle, SignerList, StageOutput, StageRequest, StageTarget};
pub use status::ProposalStatus;
pub use tally::{NoQuorum, OptionTally, StaticQuorum, TallyRule};

/// Lifecycle stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Create,
    Close,
    Tally,
    Execute,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Create => "create",
            Stage::Close => "close",
            Stage::Tally => "tally",
            Stage::Execute => "execute",
        };
        f.write_str(name)
    }
}

/// Documents subject to validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// The DAO charter (`dao.toml`)
    Charter,
    /// A proposal document
    Proposal,
    /// A stage request
    Request,
    /// The contract configuration
    Config,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocumentKind::Charter => "charter",
            DocumentKind::Proposal => "proposal",
            DocumentKind::Request => "request",
            DocumentKind::Config => "configuration",
        };
        f.write_str(name)
    }
}

/// One problem found while validating a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    /// The offending field
    pub field: String,
    /// What is wrong with it
    pub message: String,
}

impl FieldIssue {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn join_issues(issues: &[FieldIssue]) -> String {
    issues.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Error types for governance operations
#[derive(Error, Debug)]
pub enum GovernanceError {
    /// A document or request failed validation; every issue is listed
    #[error("Invalid {document}: {}", join_issues(.issues))]
    ConfigValidation {
        document: DocumentKind,
        issues: Vec<FieldIssue>,
    },

    /// Ledger state does not allow the requested stage
    #[error("Precondition failed for {stage}: {reason}")]
    Precondition { stage: Stage, reason: String },

    /// The funder cannot cover the proposal bond
    #[error("Insufficient funds: {account} holds {available} {asset}, {required} required")]
    InsufficientFunds {
        account: AccountId,
        asset: Asset,
        required: Amount,
        available: Amount,
    },

    /// The tally cannot be computed or applied
    #[error("Tally error: {reason}")]
    Tally { reason: String },

    /// A collaborator (ledger, document host) failed
    #[error("External service error ({service}): {message}")]
    ExternalService { service: String, message: String },
}

impl GovernanceError {
    pub fn precondition(stage: Stage, reason: impl Into<String>) -> Self {
        GovernanceError::Precondition {
            stage,
            reason: reason.into(),
        }
    }

    pub fn tally(reason: impl Into<String>) -> Self {
        GovernanceError::Tally { reason: reason.into() }
    }

    pub fn external(service: &str, message: impl Into<String>) -> Self {
        GovernanceError::ExternalService {
            service: service.to_string(),
            message: message.into(),
        }
    }

    pub fn validation(document: DocumentKind, issues: Vec<FieldIssue>) -> Self {
        GovernanceError::ConfigValidation { document, issues }
    }
}

impl From<LedgerError> for GovernanceError {
    fn from(error: LedgerError) -> Self {
        GovernanceError::external("ledger", error.to_string())
    }
}

/// Result type for governance operations
pub type GovernanceResult<T> = Result<T, GovernanceError>;
