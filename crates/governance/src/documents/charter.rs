//! The DAO charter (`dao.toml`)
//!
//! The charter is published by the DAO and signed with its authority key. The
//! signature covers every line of the document except the `SIGNATURE` line
//! itself, joined with `\n`.

use std::collections::BTreeSet;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::debug;
use turret_config::TurretConfig;
use turret_crypto::{AccountId, CryptoUtils, KeyPair};
use turret_ledger::{Amount, Asset};

use super::{parse_table, FieldReader};
use crate::{DocumentKind, FieldIssue, GovernanceError, GovernanceResult};

pub const DAO_VOTING_TOKEN: &str = "DAO_VOTING_TOKEN";
pub const MIN_VOTING_POWER_CREATE_PROPOSAL: &str = "MIN_VOTING_POWER_CREATE_PROPOSAL";
pub const MIN_VOTING_POWER_CREATE_QUORUM: &str = "MIN_VOTING_POWER_CREATE_QUORUM";
pub const MIN_VOTING_QUORUM_PERCENTAGE: &str = "MIN_VOTING_QUORUM_PERCENTAGE";
pub const MIN_VOTING_DURATION_SECONDS: &str = "MIN_VOTING_DURATION_SECONDS";
pub const PROPOSAL_ACCOUNT_RESCUE_SIGNERS: &str = "PROPOSAL_ACCOUNT_RESCUE_SIGNERS";
pub const DAO_PUBLIC_KEY: &str = "DAO_PUBLIC_KEY";
pub const SIGNATURE: &str = "SIGNATURE";

/// A validated, signature-checked DAO charter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceCharter {
    /// Token votes are cast with
    pub voting_token: Asset,
    /// Voting token a proposer must put up to create a proposal
    pub proposal_bond: Amount,
    /// Circulation an option needs to win
    pub quorum: Amount,
    /// Shortest allowed voting period
    pub min_voting_duration: u64,
    /// Keys that can recover a proposal account
    pub rescue_signers: Vec<AccountId>,
    /// The DAO authority key
    pub public_key: AccountId,
}

impl GovernanceCharter {
    /// Parse and verify a charter. Every missing or invalid field is reported,
    /// and a signature that fails to verify for any reason rejects the document.
    pub fn parse(raw: &str, config: &TurretConfig) -> GovernanceResult<Self> {
        let table = parse_table(raw, DocumentKind::Charter)?;
        let mut fields = FieldReader::new(&table);

        let voting_token = fields.asset(DAO_VOTING_TOKEN);
        let proposal_bond = fields.amount(MIN_VOTING_POWER_CREATE_PROPOSAL);
        let quorum = fields.amount(MIN_VOTING_POWER_CREATE_QUORUM);
        if fields.has(MIN_VOTING_QUORUM_PERCENTAGE) {
            fields.issue(MIN_VOTING_QUORUM_PERCENTAGE, "percentage quorums are not supported");
        }
        let min_voting_duration = fields.seconds(MIN_VOTING_DURATION_SECONDS);

        let rescue_signers = fields.accounts(PROPOSAL_ACCOUNT_RESCUE_SIGNERS);
        if let Some(signers) = &rescue_signers {
            if signers.len() != config.rescue_signer_count {
                fields.issue(
                    PROPOSAL_ACCOUNT_RESCUE_SIGNERS,
                    format!("expected {} rescue signers, found {}", config.rescue_signer_count, signers.len()),
                );
            }
            if signers.iter().collect::<BTreeSet<_>>().len() != signers.len() {
                fields.issue(PROPOSAL_ACCOUNT_RESCUE_SIGNERS, "rescue signers contain duplicates");
            }
        }

        let public_key = fields.account(DAO_PUBLIC_KEY);
        let signature = fields.string(SIGNATURE);
        if let (Some(key), Some(signature)) = (&public_key, &signature) {
            let body = Self::canonical_body(raw);
            if let Err(e) = CryptoUtils::verify_base64(key, body.as_bytes(), signature) {
                debug!("Charter signature rejected: {}", e);
                fields.issue(SIGNATURE, format!("does not verify against {}", DAO_PUBLIC_KEY));
            }
        }

        fields.finish(DocumentKind::Charter)?;

        let incomplete = || {
            GovernanceError::validation(DocumentKind::Charter, vec![FieldIssue::new("<document>", "incomplete")])
        };
        Ok(Self {
            voting_token: voting_token.ok_or_else(incomplete)?,
            proposal_bond: proposal_bond.ok_or_else(incomplete)?,
            quorum: quorum.ok_or_else(incomplete)?,
            min_voting_duration: min_voting_duration.ok_or_else(incomplete)?,
            rescue_signers: rescue_signers.ok_or_else(incomplete)?,
            public_key: public_key.ok_or_else(incomplete)?,
        })
    }

    /// The signed content: every line except `SIGNATURE` lines, joined with `\n`
    pub fn canonical_body(raw: &str) -> String {
        raw.lines()
            .filter(|line| {
                line.split_once('=')
                    .map(|(key, _)| key.trim() != SIGNATURE)
                    .unwrap_or(true)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Sign a charter body, returning the document with its `SIGNATURE` line
    pub fn sign(body: &str, authority: &KeyPair) -> String {
        let canonical = Self::canonical_body(body);
        let signature = STANDARD.encode(CryptoUtils::sign(authority, canonical.as_bytes()));
        format!("{}\n{} = \"{}\"\n", canonical, SIGNATURE, signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    fn config() -> TurretConfig {
        TurretConfig {
            horizon_url: "https://horizon-testnet.stellar.org".to_string(),
            network_passphrase: "Test SDF Network ; September 2015".to_string(),
            reserve_unit: Amount::parse("0.5").unwrap(),
            max_tradable_amount: Amount::max_tradable(),
            fallback_base_fee: 100,
            ipfs_gateway: "https://ipfs.io".to_string(),
            oracle_signer_count: 5,
            rescue_signer_count: 3,
            signer_threshold: 3,
            log_level: "info".to_string(),
        }
    }

    fn key(seed: u8) -> KeyPair {
        KeyPair::from_seed_bytes([seed; 32]).unwrap()
    }

    fn body(authority: &KeyPair) -> String {
        format!(
            "DAO_VOTING_TOKEN = \"VOTE:{issuer}\"\n\
             MIN_VOTING_POWER_CREATE_PROPOSAL = \"100\"\n\
             MIN_VOTING_POWER_CREATE_QUORUM = \"1000\"\n\
             MIN_VOTING_DURATION_SECONDS = 3600\n\
             PROPOSAL_ACCOUNT_RESCUE_SIGNERS = [\"{r1}\", \"{r2}\", \"{r3}\"]\n\
             DAO_PUBLIC_KEY = \"{dao}\"",
            issuer = key(20).account_id(),
            r1 = key(21).account_id(),
            r2 = key(22).account_id(),
            r3 = key(23).account_id(),
            dao = authority.account_id(),
        )
    }

    fn issues(result: GovernanceResult<GovernanceCharter>) -> Vec<String> {
        match result {
            Err(GovernanceError::ConfigValidation { issues, .. }) => issues.into_iter().map(|i| i.field).collect(),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_signed_charter_parses() {
        let authority = key(1);
        let raw = GovernanceCharter::sign(&body(&authority), &authority);
        let charter = GovernanceCharter::parse(&raw, &config()).unwrap();

        assert_eq!(charter.proposal_bond, Amount::new(100));
        assert_eq!(charter.quorum, Amount::new(1000));
        assert_eq!(charter.min_voting_duration, 3600);
        assert_eq!(charter.rescue_signers.len(), 3);
        assert_eq!(charter.public_key, authority.account_id());
        assert_eq!(charter.voting_token.code(), Some("VOTE"));
    }

    #[test]
    fn test_signature_line_can_appear_anywhere() {
        let authority = key(1);
        let signed = GovernanceCharter::sign(&body(&authority), &authority);
        let signature_line = signed.lines().last().unwrap().to_string();
        let reordered = format!("{}\n{}", signature_line, body(&authority));
        assert!(GovernanceCharter::parse(&reordered, &config()).is_ok());
    }

    #[test]
    fn test_tampered_charter_is_rejected() {
        let authority = key(1);
        let raw = GovernanceCharter::sign(&body(&authority), &authority).replace("\"1000\"", "\"1\"");
        assert_eq!(issues(GovernanceCharter::parse(&raw, &config())), vec![SIGNATURE]);
    }

    #[test]
    fn test_wrong_authority_is_rejected() {
        let raw = GovernanceCharter::sign(&body(&key(1)), &key(2));
        assert_eq!(issues(GovernanceCharter::parse(&raw, &config())), vec![SIGNATURE]);

        let garbage = format!("{}\nSIGNATURE = \"not base64!\"", body(&key(1)));
        assert_eq!(issues(GovernanceCharter::parse(&garbage, &config())), vec![SIGNATURE]);
    }

    #[test]
    fn test_all_issues_are_reported() {
        let authority = key(1);
        let raw = body(&authority)
            .replace("MIN_VOTING_DURATION_SECONDS = 3600\n", "MIN_VOTING_QUORUM_PERCENTAGE = 10\n")
            .replace(&format!(", \"{}\"]", key(23).account_id()), "]");
        let raw = GovernanceCharter::sign(&raw, &authority);

        assert_eq!(
            issues(GovernanceCharter::parse(&raw, &config())),
            vec![
                MIN_VOTING_QUORUM_PERCENTAGE,
                MIN_VOTING_DURATION_SECONDS,
                PROPOSAL_ACCOUNT_RESCUE_SIGNERS
            ]
        );
    }

    #[test]
    fn test_flipped_signature_byte_is_rejected() {
        let authority = key(1);
        let signed = GovernanceCharter::sign(&body(&authority), &authority);
        let (body_part, signature_line) = signed.trim_end().rsplit_once('\n').unwrap();
        let encoded = signature_line.split('"').nth(1).unwrap();

        for index in [0, 31, 63] {
            let mut signature = STANDARD.decode(encoded).unwrap();
            signature[index] ^= 0x01;
            let raw = format!("{}\nSIGNATURE = \"{}\"\n", body_part, STANDARD.encode(&signature));
            assert_eq!(issues(GovernanceCharter::parse(&raw, &config())), vec![SIGNATURE]);
        }
    }

    #[test]
    fn test_duplicate_rescue_signers_are_rejected() {
        let authority = key(1);
        let raw = body(&authority)
            .replace(&key(22).account_id().to_strkey(), &key(21).account_id().to_strkey())
            .replace(&key(23).account_id().to_strkey(), &key(21).account_id().to_strkey());
        let raw = GovernanceCharter::sign(&raw, &authority);
        assert_eq!(
            issues(GovernanceCharter::parse(&raw, &config())),
            vec![PROPOSAL_ACCOUNT_RESCUE_SIGNERS]
        );
    }

    #[test]
    fn test_missing_signature() {
        let raw = body(&key(1));
        assert_eq!(issues(GovernanceCharter::parse(&raw, &config())), vec![SIGNATURE]);
    }
}
