//! Account provisioning planner
//!
//! Computes the operations that turn a fresh identity into a proposal
//! account. The order is fixed: account creation, data entries, trustline,
//! bond, option offers, signers, and last the lock-down of the master key.

use tracing::debug;
use turret_config::TurretConfig;
use turret_crypto::AccountId;
use turret_ledger::{Amount, Asset, Operation};

use crate::bond::{minimum_reserve, offer_amount};
use crate::status::{
    CREATE_TIME, END_TIME, NONCE_ACCOUNT, PROPOSAL_DATA, PROPOSAL_HASH, PROPOSER, QUORUM, STATUS, VOTING_TOKEN,
};
use crate::{GovernanceCharter, GovernanceError, GovernanceResult, ProposalDocument, ProposalStatus, Stage};

/// Trustlines a proposal account holds: the voting token
pub const TRUSTLINES: usize = 1;

/// Everything needed to plan a proposal account
#[derive(Debug, Clone)]
pub struct AccountPlan<'a> {
    pub config: &'a TurretConfig,
    pub charter: &'a GovernanceCharter,
    pub proposal: &'a ProposalDocument,
    /// The identity that becomes the proposal account
    pub proposal_account: AccountId,
    /// The pre-provisioned account paying the reserve
    pub nonce_account: AccountId,
    /// The proposer, paying the bond
    pub funder: AccountId,
    pub oracle_signers: &'a [AccountId],
    pub proposal_location: &'a str,
    /// Ledger close time the proposal is created at
    pub create_time: u64,
}

impl<'a> AccountPlan<'a> {
    /// Data entries written at creation, in order
    pub fn data_entries(&self) -> GovernanceResult<Vec<(&'static str, String)>> {
        let end_time = self
            .create_time
            .checked_add(self.proposal.voting_duration)
            .ok_or_else(|| GovernanceError::precondition(Stage::Create, "voting end time overflows"))?;
        Ok(vec![
            (STATUS, ProposalStatus::Active.as_str().to_string()),
            (CREATE_TIME, self.create_time.to_string()),
            (END_TIME, end_time.to_string()),
            (VOTING_TOKEN, self.charter.voting_token.to_string()),
            (QUORUM, self.charter.quorum.to_string()),
            (PROPOSAL_DATA, self.proposal_location.to_string()),
            (PROPOSAL_HASH, self.proposal.digest.to_hex()),
            (NONCE_ACCOUNT, self.nonce_account.to_strkey()),
            (PROPOSER, self.funder.to_strkey()),
        ])
    }

    /// Signers added to the proposal account: oracles first, then rescuers
    pub fn signers(&self) -> Vec<AccountId> {
        self.oracle_signers
            .iter()
            .chain(self.charter.rescue_signers.iter())
            .copied()
            .collect()
    }

    pub fn starting_balance(&self) -> GovernanceResult<Amount> {
        minimum_reserve(
            self.config.reserve_unit,
            self.signers().len(),
            TRUSTLINES,
            self.data_entries()?.len(),
        )
    }

    /// `1 + data entries + trustlines + 1 + options + signers + 1`
    pub fn operation_count(&self) -> GovernanceResult<usize> {
        Ok(1 + self.data_entries()?.len() + TRUSTLINES + 1 + self.proposal.options.len() + self.signers().len() + 1)
    }

    /// The full, ordered operation list
    pub fn operations(&self) -> GovernanceResult<Vec<Operation>> {
        let proposal = self.proposal_account;
        let token = &self.charter.voting_token;
        let bond = self.charter.proposal_bond;
        let entries = self.data_entries()?;
        let starting_balance = self.starting_balance()?;
        let per_option = offer_amount(self.config.max_tradable_amount, bond, self.proposal.options.len())?;

        let mut operations = Vec::with_capacity(self.operation_count()?);
        operations.push(Operation::create_account(self.nonce_account, proposal, starting_balance));

        for (name, value) in &entries {
            let op = Operation::manage_data(proposal, name, value)
                .map_err(|e| GovernanceError::precondition(Stage::Create, e.to_string()))?;
            operations.push(op);
        }

        operations.push(Operation::change_trust(proposal, token.clone()));
        operations.push(Operation::payment(self.funder, proposal, token.clone(), bond));

        for index in 1..=self.proposal.options.len() {
            let option = Asset::option(index, proposal)
                .map_err(|e| GovernanceError::precondition(Stage::Create, e.to_string()))?;
            operations.push(Operation::sell_offer(proposal, option, token.clone(), per_option));
        }

        for signer in self.signers() {
            operations.push(Operation::add_signer(proposal, signer, 1));
        }
        operations.push(Operation::lock_thresholds(proposal, 0, self.config.signer_threshold));

        debug!(
            "Planned {} operations for proposal account {}, starting balance {}, {} per option",
            operations.len(),
            proposal,
            starting_balance,
            per_option
        );
        Ok(operations)
    }
}
