//! Proposal account data entries
//!
//! Everything the lifecycle knows about a proposal between stages is kept in
//! data entries on the proposal account. [`ProposalData`] reads them back with
//! errors attributed to the stage doing the reading.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use turret_crypto::{AccountId, Hash};
use turret_ledger::{AccountRecord, Amount, Asset};

use crate::{GovernanceError, GovernanceResult, Stage};

pub const STATUS: &str = "status";
pub const CREATE_TIME: &str = "createTime";
pub const END_TIME: &str = "endTime";
pub const CLOSE_TIME: &str = "closeTime";
pub const FINISH_TIME: &str = "finishTime";
pub const VOTING_TOKEN: &str = "votingToken";
pub const QUORUM: &str = "quorum";
pub const PROPOSAL_DATA: &str = "proposalData";
pub const PROPOSAL_HASH: &str = "proposalHash";
pub const NONCE_ACCOUNT: &str = "nonceAccount";
pub const PROPOSER: &str = "proposer";
pub const WINNER_OPTION: &str = "winnerOption";

/// Status of a proposal; transitions only move forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    /// Accepting votes
    Active,
    /// Voting has ended, offers withdrawn
    Closed,
    /// Tallied with a winning option
    Finished,
    /// Tallied without any option reaching quorum
    Failed,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Active => "active",
            ProposalStatus::Closed => "closed",
            ProposalStatus::Finished => "finished",
            ProposalStatus::Failed => "failed",
        }
    }

    /// Whether the lifecycle may move from `self` to `next`
    pub fn can_transition_to(&self, next: ProposalStatus) -> bool {
        matches!(
            (self, next),
            (ProposalStatus::Active, ProposalStatus::Closed)
                | (ProposalStatus::Closed, ProposalStatus::Finished)
                | (ProposalStatus::Closed, ProposalStatus::Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProposalStatus::Finished | ProposalStatus::Failed)
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProposalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ProposalStatus::Active),
            "closed" => Ok(ProposalStatus::Closed),
            "finished" => Ok(ProposalStatus::Finished),
            "failed" => Ok(ProposalStatus::Failed),
            other => Err(format!("unknown proposal status {:?}", other)),
        }
    }
}

/// Read access to a proposal account's data entries
pub struct ProposalData<'a> {
    account: &'a AccountRecord,
    stage: Stage,
}

impl<'a> ProposalData<'a> {
    pub fn new(account: &'a AccountRecord, stage: Stage) -> Self {
        Self { account, stage }
    }

    /// The stage reading the data
    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn invalid(&self, reason: String) -> GovernanceError {
        GovernanceError::precondition(self.stage, reason)
    }

    /// A data entry as text, `None` when absent
    pub fn optional(&self, key: &str) -> GovernanceResult<Option<String>> {
        self.account
            .data_str(key)
            .map_err(|e| self.invalid(format!("proposal account {}: {}", self.account.id, e)))
    }

    /// A data entry that must be present
    pub fn required(&self, key: &str) -> GovernanceResult<String> {
        self.optional(key)?.ok_or_else(|| {
            self.invalid(format!("proposal account {} has no {} entry", self.account.id, key))
        })
    }

    fn parsed<T: FromStr>(&self, key: &str) -> GovernanceResult<T> {
        let raw = self.required(key)?;
        raw.trim()
            .parse()
            .map_err(|_| self.invalid(format!("invalid {} entry {:?}", key, raw)))
    }

    pub fn status(&self) -> GovernanceResult<ProposalStatus> {
        let raw = self.required(STATUS)?;
        raw.parse().map_err(|e: String| self.invalid(e))
    }

    /// Fail unless the proposal is in `expected` status
    pub fn expect_status(&self, expected: ProposalStatus) -> GovernanceResult<()> {
        let status = self.status()?;
        if status == expected {
            Ok(())
        } else {
            Err(self.invalid(format!("proposal is {}, expected {}", status, expected)))
        }
    }

    pub fn create_time(&self) -> GovernanceResult<u64> {
        self.parsed(CREATE_TIME)
    }

    pub fn end_time(&self) -> GovernanceResult<u64> {
        self.parsed(END_TIME)
    }

    pub fn voting_token(&self) -> GovernanceResult<Asset> {
        let raw = self.required(VOTING_TOKEN)?;
        Asset::parse(&raw).map_err(|e| self.invalid(format!("invalid {} entry: {}", VOTING_TOKEN, e)))
    }

    /// The recorded quorum. A missing or non-positive quorum cannot be tallied.
    pub fn quorum(&self) -> GovernanceResult<Amount> {
        let raw = self
            .optional(QUORUM)?
            .ok_or_else(|| GovernanceError::tally("proposal account has no quorum entry"))?;
        match Amount::parse(&raw) {
            Ok(quorum) if quorum.is_positive() => Ok(quorum),
            _ => Err(GovernanceError::tally(format!("invalid quorum entry {:?}", raw))),
        }
    }

    pub fn proposal_location(&self) -> GovernanceResult<String> {
        self.required(PROPOSAL_DATA)
    }

    pub fn proposal_hash(&self) -> GovernanceResult<Hash> {
        let raw = self.required(PROPOSAL_HASH)?;
        Hash::from_hex(raw.trim()).map_err(|e| self.invalid(format!("invalid {} entry: {}", PROPOSAL_HASH, e)))
    }

    pub fn nonce_account(&self) -> GovernanceResult<Option<AccountId>> {
        self.optional_account(NONCE_ACCOUNT)
    }

    pub fn proposer(&self) -> GovernanceResult<Option<AccountId>> {
        self.optional_account(PROPOSER)
    }

    fn optional_account(&self, key: &str) -> GovernanceResult<Option<AccountId>> {
        match self.optional(key)? {
            None => Ok(None),
            Some(raw) => AccountId::from_strkey(raw.trim())
                .map(Some)
                .map_err(|e| self.invalid(format!("invalid {} entry: {}", key, e))),
        }
    }

    /// The winning option. Absent or below 1 means there is nothing to execute.
    pub fn winner_option(&self) -> GovernanceResult<usize> {
        let raw = self
            .optional(WINNER_OPTION)?
            .ok_or_else(|| GovernanceError::tally("proposal account has no winnerOption entry"))?;
        match raw.trim().parse::<i64>() {
            Ok(winner) if winner >= 1 => Ok(winner as usize),
            _ => Err(GovernanceError::tally(format!("invalid winnerOption entry {:?}", raw))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turret_crypto::KeyPair;

    fn account(entries: &[(&str, &str)]) -> AccountRecord {
        let mut account = AccountRecord::new(KeyPair::from_seed_bytes([3; 32]).unwrap().account_id(), 1);
        for (key, value) in entries {
            account.data.insert(key.to_string(), value.as_bytes().to_vec());
        }
        account
    }

    #[test]
    fn test_transitions_move_forward() {
        use ProposalStatus::*;
        assert!(Active.can_transition_to(Closed));
        assert!(Closed.can_transition_to(Finished));
        assert!(Closed.can_transition_to(Failed));
        assert!(!Closed.can_transition_to(Active));
        assert!(!Finished.can_transition_to(Closed));
        assert!(!Active.can_transition_to(Finished));
        assert!(Failed.is_terminal());
    }

    #[test]
    fn test_status_checks() {
        let record = account(&[(STATUS, "closed")]);
        let data = ProposalData::new(&record, Stage::Tally);
        assert!(data.expect_status(ProposalStatus::Closed).is_ok());
        assert!(matches!(
            data.expect_status(ProposalStatus::Active),
            Err(GovernanceError::Precondition { stage: Stage::Tally, .. })
        ));

        let record = account(&[]);
        assert!(ProposalData::new(&record, Stage::Close).status().is_err());
        let record = account(&[(STATUS, "archived")]);
        assert!(ProposalData::new(&record, Stage::Close).status().is_err());
    }

    #[test]
    fn test_quorum_must_be_positive() {
        for bad in [&[][..], &[(QUORUM, "0")][..], &[(QUORUM, "-5")][..], &[(QUORUM, "lots")][..]] {
            let record = account(bad);
            assert!(matches!(
                ProposalData::new(&record, Stage::Tally).quorum(),
                Err(GovernanceError::Tally { .. })
            ));
        }
        let record = account(&[(QUORUM, "250")]);
        assert_eq!(ProposalData::new(&record, Stage::Tally).quorum().unwrap(), Amount::new(250));
    }

    #[test]
    fn test_winner_option() {
        let record = account(&[(WINNER_OPTION, "2")]);
        assert_eq!(ProposalData::new(&record, Stage::Execute).winner_option().unwrap(), 2);
        for bad in ["0", "-1", "two"] {
            let record = account(&[(WINNER_OPTION, bad)]);
            assert!(ProposalData::new(&record, Stage::Execute).winner_option().is_err());
        }
    }
}
