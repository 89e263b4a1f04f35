//! Proposal documents
//!
//! A proposal is addressed by the SHA-256 digest of its raw bytes. The digest
//! is written to the proposal account at creation and every later stage
//! refetches the document and checks it against that digest.

use serde::{Deserialize, Serialize};
use turret_crypto::Hash;
use turret_ledger::{Amount, Asset};

use super::{parse_table, FieldReader, GovernanceCharter};
use crate::{DocumentKind, FieldIssue, GovernanceError, GovernanceResult};

pub const VOTING_TOKEN: &str = "VOTING_TOKEN";
pub const VOTING_DURATION_SECONDS: &str = "VOTING_DURATION_SECONDS";
pub const QUORUM: &str = "QUORUM";
pub const PROPOSAL_VOTING_OPTIONS: &str = "PROPOSAL_VOTING_OPTIONS";

/// Fewest options a proposal may offer
pub const MIN_OPTIONS: usize = 2;

/// One choice voters can back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingOption {
    pub name: String,
    pub description: Option<String>,
    /// Returned by `execute` when this option wins
    pub payload: String,
}

/// A parsed proposal document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalDocument {
    /// Token votes are cast with
    pub voting_token: Asset,
    /// Length of the voting period
    pub voting_duration: u64,
    /// Declared quorum, if any
    pub quorum: Option<Amount>,
    /// Options in document order; option `n` is `options[n - 1]`
    pub options: Vec<VotingOption>,
    /// SHA-256 of the raw document
    pub digest: Hash,
}

impl ProposalDocument {
    /// Parse a proposal from its raw bytes
    pub fn parse(raw: &[u8]) -> GovernanceResult<Self> {
        let text = std::str::from_utf8(raw).map_err(|_| {
            GovernanceError::validation(DocumentKind::Proposal, vec![FieldIssue::new("<document>", "not UTF-8")])
        })?;
        let table = parse_table(text, DocumentKind::Proposal)?;
        let mut fields = FieldReader::new(&table);

        let voting_token = fields.asset(VOTING_TOKEN);
        let voting_duration = fields.seconds(VOTING_DURATION_SECONDS);
        let quorum = fields.optional_amount(QUORUM);
        let options = read_options(&mut fields);

        fields.finish(DocumentKind::Proposal)?;

        let incomplete = || {
            GovernanceError::validation(DocumentKind::Proposal, vec![FieldIssue::new("<document>", "incomplete")])
        };
        Ok(Self {
            voting_token: voting_token.ok_or_else(incomplete)?,
            voting_duration: voting_duration.ok_or_else(incomplete)?,
            quorum,
            options,
            digest: Hash::of(raw),
        })
    }

    /// Cross-check the proposal against the charter governing it
    pub fn check_against(&self, charter: &GovernanceCharter) -> GovernanceResult<()> {
        let mut issues = Vec::new();

        if self.voting_token != charter.voting_token {
            issues.push(FieldIssue::new(
                VOTING_TOKEN,
                format!("{} is not the DAO voting token {}", self.voting_token, charter.voting_token),
            ));
        }
        if self.voting_duration < charter.min_voting_duration {
            issues.push(FieldIssue::new(
                VOTING_DURATION_SECONDS,
                format!("{} is below the minimum of {}", self.voting_duration, charter.min_voting_duration),
            ));
        }
        if let Some(quorum) = self.quorum {
            if quorum != charter.quorum {
                issues.push(FieldIssue::new(
                    QUORUM,
                    format!("{} differs from the DAO quorum {}", quorum, charter.quorum),
                ));
            }
        }
        if self.options.len() < MIN_OPTIONS {
            issues.push(FieldIssue::new(
                PROPOSAL_VOTING_OPTIONS,
                format!("{} options given, at least {} required", self.options.len(), MIN_OPTIONS),
            ));
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(GovernanceError::validation(DocumentKind::Proposal, issues))
        }
    }

    /// Payload of option `index` (1-based)
    pub fn payload(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.options.get(i))
            .map(|o| o.payload.as_str())
    }
}

fn read_options(fields: &mut FieldReader<'_>) -> Vec<VotingOption> {
    let entries = match fields.value(PROPOSAL_VOTING_OPTIONS) {
        Some(toml::Value::Array(entries)) => entries,
        Some(other) => {
            fields.issue(
                PROPOSAL_VOTING_OPTIONS,
                format!("expected an array of tables, found {}", other.type_str()),
            );
            return Vec::new();
        }
        None => {
            fields.issue(PROPOSAL_VOTING_OPTIONS, "missing");
            return Vec::new();
        }
    };

    let mut options = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let field = |name: &str| format!("{}[{}].{}", PROPOSAL_VOTING_OPTIONS, i + 1, name);
        let Some(table) = entry.as_table() else {
            fields.issue(&field("*"), "expected a table");
            continue;
        };
        let text = |key: &str| table.get(key).and_then(toml::Value::as_str).map(str::to_string);

        let name = text("NAME").filter(|n| !n.trim().is_empty());
        let payload = text("PAYLOAD");
        if name.is_none() {
            fields.issue(&field("NAME"), "missing");
        }
        if payload.is_none() {
            fields.issue(&field("PAYLOAD"), "missing");
        }
        if let (Some(name), Some(payload)) = (name, payload) {
            options.push(VotingOption {
                name,
                description: text("DESCRIPTION"),
                payload,
            });
        }
    }
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use turret_crypto::KeyPair;

    fn token() -> String {
        format!("VOTE:{}", KeyPair::from_seed_bytes([20; 32]).unwrap().account_id())
    }

    fn document(options: usize) -> String {
        let mut doc = format!("VOTING_TOKEN = \"{}\"\nVOTING_DURATION_SECONDS = 7200\nQUORUM = \"1000\"\n", token());
        for n in 1..=options {
            doc.push_str(&format!(
                "\n[[PROPOSAL_VOTING_OPTIONS]]\nNAME = \"Option {n}\"\nPAYLOAD = \"payload-{n}\"\n"
            ));
        }
        doc
    }

    #[test]
    fn test_parse_proposal() {
        let raw = document(3);
        let proposal = ProposalDocument::parse(raw.as_bytes()).unwrap();
        assert_eq!(proposal.voting_duration, 7200);
        assert_eq!(proposal.quorum, Some(Amount::new(1000)));
        assert_eq!(proposal.options.len(), 3);
        assert_eq!(proposal.payload(2), Some("payload-2"));
        assert_eq!(proposal.payload(0), None);
        assert_eq!(proposal.payload(4), None);
        assert_eq!(proposal.digest, Hash::of(raw.as_bytes()));
    }

    #[test]
    fn test_digest_changes_with_any_byte() {
        let raw = document(2).into_bytes();
        let original = ProposalDocument::parse(&raw).unwrap().digest;
        let mut mutated = raw.clone();
        let last = mutated.len() - 2;
        mutated[last] = b'X';
        assert!(!original.matches(&Hash::of(&mutated)));
        assert!(original.matches(&ProposalDocument::parse(&raw).unwrap().digest));
    }

    #[test]
    fn test_option_issues_are_located() {
        let raw = format!("{}\n[[PROPOSAL_VOTING_OPTIONS]]\nNAME = \"No payload\"\n", document(1));
        match ProposalDocument::parse(raw.as_bytes()) {
            Err(GovernanceError::ConfigValidation { issues, .. }) => {
                assert_eq!(issues[0].field, "PROPOSAL_VOTING_OPTIONS[2].PAYLOAD");
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
