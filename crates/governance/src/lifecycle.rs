//! Proposal lifecycle state machine
//!
//! Each stage reads a snapshot of ledger state, checks its preconditions and
//! returns one unsigned transaction (or, for `execute`, the winning payload).
//! Nothing is submitted and nothing is retried; the caller signs and submits.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use turret_config::{ConfigError, TurretConfig};
use turret_crypto::{AccountId, SecretSeed};
use turret_ledger::{
    pagination, AccountRecord, Asset, EnvelopeEncoder, LedgerClient, Operation, Thresholds, Transaction,
    TransactionBuilder, MAX_DATA_ENTRY_LEN,
};

use crate::bond::{account_creator, bond_payment, check_bond};
use crate::planner::AccountPlan;
use crate::status::{ProposalData, CLOSE_TIME, FINISH_TIME, STATUS, WINNER_OPTION};
use crate::tally::{collect_tallies, StaticQuorum, TallyRule};
use crate::{
    charter_url, DocumentFetcher, DocumentKind, FieldIssue, GovernanceCharter, GovernanceError, GovernanceResult,
    ProposalDocument, ProposalStatus, Stage,
};

/// Oracle signers given either as a comma-separated string or a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignerList {
    Csv(String),
    List(Vec<String>),
}

impl SignerList {
    /// Parse every entry, reporting all malformed ones
    pub fn accounts(&self) -> GovernanceResult<Vec<AccountId>> {
        let raw: Vec<String> = match self {
            SignerList::Csv(csv) => csv.split(',').map(|s| s.trim().to_string()).collect(),
            SignerList::List(list) => list.iter().map(|s| s.trim().to_string()).collect(),
        };

        let mut accounts = Vec::with_capacity(raw.len());
        let mut issues = Vec::new();
        for entry in raw.iter().filter(|s| !s.is_empty()) {
            match AccountId::from_strkey(entry) {
                Ok(id) => accounts.push(id),
                Err(_) => issues.push(FieldIssue::new("oracleSigners", format!("{} is not a valid account id", entry))),
            }
        }
        if issues.is_empty() {
            Ok(accounts)
        } else {
            Err(GovernanceError::validation(DocumentKind::Request, issues))
        }
    }
}

/// Parameters of the `create` stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    /// Proposer: funds the bond and is the transaction source
    pub source: AccountId,
    /// Seed of the identity that becomes the proposal account
    pub proposal_secret: SecretSeed,
    /// Pre-provisioned account paying the proposal account's reserve
    pub nonce_account: AccountId,
    pub oracle_signers: SignerList,
    /// DAO host or charter URL
    pub charter_location: String,
    pub proposal_location: String,
}

/// Parameters of the `close`, `tally` and `execute` stages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTarget {
    /// Submitter: transaction source and sponsor of new entries
    pub source: AccountId,
    pub proposal_account: AccountId,
    pub proposal_location: String,
}

/// A request routed by its `action` field
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum StageRequest {
    Create(CreateRequest),
    Close(StageTarget),
    Tally(StageTarget),
    Execute(StageTarget),
}

impl StageRequest {
    pub fn stage(&self) -> Stage {
        match self {
            StageRequest::Create(_) => Stage::Create,
            StageRequest::Close(_) => Stage::Close,
            StageRequest::Tally(_) => Stage::Tally,
            StageRequest::Execute(_) => Stage::Execute,
        }
    }
}

/// What a stage produces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum StageOutput {
    /// Base64 unsigned transaction envelope
    Envelope(String),
    /// The winning option's payload
    Payload(String),
}

impl StageOutput {
    pub fn as_str(&self) -> &str {
        match self {
            StageOutput::Envelope(value) | StageOutput::Payload(value) => value,
        }
    }
}

/// Drives a proposal through `create -> close -> tally -> execute`
pub struct ProposalLifecycle {
    config: TurretConfig,
    ledger: Arc<dyn LedgerClient>,
    fetcher: Arc<dyn DocumentFetcher>,
    encoder: Arc<dyn EnvelopeEncoder>,
}

impl ProposalLifecycle {
    /// Create a lifecycle over the given collaborators. The configuration is
    /// validated up front.
    pub fn new(
        config: TurretConfig,
        ledger: Arc<dyn LedgerClient>,
        fetcher: Arc<dyn DocumentFetcher>,
        encoder: Arc<dyn EnvelopeEncoder>,
    ) -> GovernanceResult<Self> {
        config.validate().map_err(|e| {
            let issues = match e {
                ConfigError::Invalid(problems) => problems.into_iter().map(|p| FieldIssue::new("config", p)).collect(),
                other => vec![FieldIssue::new("config", other.to_string())],
            };
            GovernanceError::validation(DocumentKind::Config, issues)
        })?;

        Ok(Self {
            config,
            ledger,
            fetcher,
            encoder,
        })
    }

    pub fn config(&self) -> &TurretConfig {
        &self.config
    }

    /// Parse a JSON request and run the stage it names
    pub async fn handle_json(&self, body: &str) -> GovernanceResult<StageOutput> {
        let request: StageRequest = serde_json::from_str(body).map_err(|e| {
            GovernanceError::validation(DocumentKind::Request, vec![FieldIssue::new("<request>", e.to_string())])
        })?;
        self.dispatch(request).await
    }

    /// Run the stage a request names
    pub async fn dispatch(&self, request: StageRequest) -> GovernanceResult<StageOutput> {
        debug!("Dispatching {} request", request.stage());
        match request {
            StageRequest::Create(request) => self.create(&request).await.map(StageOutput::Envelope),
            StageRequest::Close(target) => self.close(&target).await.map(StageOutput::Envelope),
            StageRequest::Tally(target) => self.tally(&target).await.map(StageOutput::Envelope),
            StageRequest::Execute(target) => self.execute(&target).await.map(StageOutput::Payload),
        }
    }

    /// Per-operation fee: the highest recently charged fee, or the configured
    /// fallback when fee stats are unavailable
    pub async fn estimate_fee(&self) -> u32 {
        let fallback = self.config.fallback_base_fee;
        match self.ledger.fee_stats().await {
            Ok(stats) if stats.max_fee_charged > 0 => stats.max_fee_charged,
            Ok(_) => {
                warn!("Fee stats report no charged fee, using fallback base fee {}", fallback);
                fallback
            }
            Err(e) => {
                warn!("Fee stats unavailable ({}), using fallback base fee {}", e, fallback);
                fallback
            }
        }
    }

    /// `create`, encoded
    pub async fn create(&self, request: &CreateRequest) -> GovernanceResult<String> {
        let transaction = self.build_create(request).await?;
        self.encode(&transaction)
    }

    /// `close`, encoded
    pub async fn close(&self, target: &StageTarget) -> GovernanceResult<String> {
        let transaction = self.build_close(target).await?;
        self.encode(&transaction)
    }

    /// `tally`, encoded
    pub async fn tally(&self, target: &StageTarget) -> GovernanceResult<String> {
        let transaction = self.build_tally(target).await?;
        self.encode(&transaction)
    }

    /// Instantiate a proposal account
    pub async fn build_create(&self, request: &CreateRequest) -> GovernanceResult<Transaction> {
        let stage = Stage::Create;
        info!("Creating proposal {}", request.proposal_location);

        let oracle_signers = request.oracle_signers.accounts()?;
        if oracle_signers.len() != self.config.oracle_signer_count {
            return Err(GovernanceError::precondition(
                stage,
                format!(
                    "{} oracle signers given, {} required",
                    oracle_signers.len(),
                    self.config.oracle_signer_count
                ),
            ));
        }
        if oracle_signers.iter().collect::<HashSet<_>>().len() != oracle_signers.len() {
            return Err(GovernanceError::precondition(stage, "oracle signers contain duplicates"));
        }
        if request.proposal_location.len() > MAX_DATA_ENTRY_LEN {
            return Err(GovernanceError::precondition(
                stage,
                format!(
                    "proposal location is {} bytes, a data entry holds {}",
                    request.proposal_location.len(),
                    MAX_DATA_ENTRY_LEN
                ),
            ));
        }

        let charter = self.fetch_charter(&request.charter_location).await?;
        let proposal = self.fetch_proposal(&request.proposal_location).await?;
        proposal.check_against(&charter)?;

        let proposal_account = request
            .proposal_secret
            .keypair()
            .map_err(|e| {
                GovernanceError::validation(DocumentKind::Request, vec![FieldIssue::new("proposalSecret", e.to_string())])
            })?
            .account_id();
        if proposal_account == request.nonce_account || proposal_account == request.source {
            return Err(GovernanceError::precondition(
                stage,
                "proposal account must be a fresh identity",
            ));
        }
        let rescue: HashSet<_> = charter.rescue_signers.iter().collect();
        if let Some(shared) = oracle_signers.iter().find(|o| rescue.contains(o)) {
            return Err(GovernanceError::precondition(
                stage,
                format!("{} is both an oracle and a rescue signer", shared),
            ));
        }
        if rescue.contains(&proposal_account) || oracle_signers.contains(&proposal_account) {
            return Err(GovernanceError::precondition(
                stage,
                "proposal account cannot sign for itself",
            ));
        }
        if self.ledger.get_account(&proposal_account).await?.is_some() {
            return Err(GovernanceError::precondition(
                stage,
                format!("proposal account {} already exists", proposal_account),
            ));
        }

        let funder = self.require_account(&request.source, stage, "funder").await?;
        check_bond(&funder, &charter.voting_token, charter.proposal_bond)?;

        let nonce = self.require_account(&request.nonce_account, stage, "nonce").await?;
        self.check_nonce(&nonce, &oracle_signers)?;

        let create_time = self.ledger.latest_ledger().await?.closed_at;
        let plan = AccountPlan {
            config: &self.config,
            charter: &charter,
            proposal: &proposal,
            proposal_account,
            nonce_account: nonce.id,
            funder: funder.id,
            oracle_signers: &oracle_signers,
            proposal_location: &request.proposal_location,
            create_time,
        };
        let operations = plan.operations()?;

        let transaction = self.build(&funder, operations, stage).await?;
        info!(
            "Proposal account {} planned with {} operations, voting ends at {}",
            proposal_account,
            transaction.operations.len(),
            create_time + proposal.voting_duration
        );
        Ok(transaction)
    }

    /// End voting: mark closed, withdraw offers, merge the nonce back and
    /// refund the bond
    pub async fn build_close(&self, target: &StageTarget) -> GovernanceResult<Transaction> {
        let stage = Stage::Close;
        info!("Closing proposal {}", target.proposal_account);

        let account = self.require_account(&target.proposal_account, stage, "proposal").await?;
        let data = ProposalData::new(&account, stage);
        let next = ProposalStatus::Closed;
        self.expect_transition(&data, next)?;
        let proposal = self.verify_document(&data, stage, &target.proposal_location).await?;

        let create_time = data.create_time()?;
        let end_time = data.end_time()?;
        let deadline = create_time
            .checked_add(proposal.voting_duration)
            .ok_or_else(|| GovernanceError::precondition(stage, "voting end time overflows"))?;
        if end_time != deadline {
            return Err(GovernanceError::precondition(
                stage,
                format!("recorded endTime {} disagrees with createTime + duration {}", end_time, deadline),
            ));
        }
        let now = self.ledger.latest_ledger().await?.closed_at;
        if now < deadline {
            return Err(GovernanceError::precondition(
                stage,
                format!("voting runs until {}, ledger time is {}", deadline, now),
            ));
        }

        let token = data.voting_token()?;
        let offers = pagination::all_offers(self.ledger.as_ref(), &account.id).await?;
        if let Some(offer) = offers.iter().find(|o| o.buying != token) {
            return Err(GovernanceError::precondition(
                stage,
                format!("offer {} buys {} instead of the voting token {}", offer.id, offer.buying, token),
            ));
        }

        let submitter = self.require_account(&target.source, stage, "submitter").await?;
        let mut operations = self.sponsored_entries(
            &submitter.id,
            &account.id,
            &[(STATUS, next.as_str().to_string()), (CLOSE_TIME, now.to_string())],
            stage,
        )?;
        for offer in &offers {
            operations.push(Operation::cancel_offer(account.id, offer.id, offer.selling.clone(), offer.buying.clone()));
        }
        operations.extend(self.nonce_merge(&data).await?);
        if let Some(refund) = self.bond_refund(&data, &account.id, &token).await? {
            operations.push(refund);
        }

        debug!("Closing {} cancels {} offers", account.id, offers.len());
        self.build(&submitter, operations, stage).await
    }

    /// Count votes, record the outcome and post redemption offers
    pub async fn build_tally(&self, target: &StageTarget) -> GovernanceResult<Transaction> {
        let stage = Stage::Tally;
        info!("Tallying proposal {}", target.proposal_account);

        let account = self.require_account(&target.proposal_account, stage, "proposal").await?;
        let data = ProposalData::new(&account, stage);
        self.expect_transition(&data, ProposalStatus::Finished)?;
        let proposal = self.verify_document(&data, stage, &target.proposal_location).await?;

        let quorum = data.quorum()?;
        let token = data.voting_token()?;
        let assets = pagination::all_assets(self.ledger.as_ref(), &account.id).await?;
        let tallies = collect_tallies(&assets, proposal.options.len())?;

        let rule = StaticQuorum::new(quorum);
        let (status, winner) = match rule.decide(&tallies) {
            Ok(winner) => {
                info!("Proposal {} finished, option {} wins", account.id, winner);
                (ProposalStatus::Finished, Some(winner))
            }
            Err(no_quorum) => {
                info!("Proposal {} failed: {}", account.id, no_quorum);
                (ProposalStatus::Failed, None)
            }
        };

        let now = self.ledger.latest_ledger().await?.closed_at;
        let submitter = self.require_account(&target.source, stage, "submitter").await?;
        let mut entries = vec![(STATUS, status.as_str().to_string()), (FINISH_TIME, now.to_string())];
        if let Some(winner) = winner {
            entries.push((WINNER_OPTION, winner.to_string()));
        }
        let mut operations = self.sponsored_entries(&submitter.id, &account.id, &entries, stage)?;

        for tally in tallies.iter().filter(|t| t.amount.is_positive()) {
            let option = Asset::option(tally.index, account.id).map_err(|e| GovernanceError::tally(e.to_string()))?;
            operations.push(Operation::sell_offer(account.id, token.clone(), option, tally.amount));
        }

        self.build(&submitter, operations, stage).await
    }

    /// The winning option's payload
    pub async fn execute(&self, target: &StageTarget) -> GovernanceResult<String> {
        let stage = Stage::Execute;
        info!("Executing proposal {}", target.proposal_account);

        let account = self.require_account(&target.proposal_account, stage, "proposal").await?;
        let data = ProposalData::new(&account, stage);
        data.expect_status(ProposalStatus::Finished)?;
        let winner = data.winner_option()?;
        let proposal = self.verify_document(&data, stage, &target.proposal_location).await?;

        proposal.payload(winner).map(str::to_string).ok_or_else(|| {
            GovernanceError::tally(format!(
                "winning option {} is out of range, proposal has {} options",
                winner,
                proposal.options.len()
            ))
        })
    }

    fn encode(&self, transaction: &Transaction) -> GovernanceResult<String> {
        self.encoder
            .encode(transaction)
            .map_err(|e| GovernanceError::external("envelope", e.to_string()))
    }

    async fn build(
        &self,
        source: &AccountRecord,
        operations: Vec<Operation>,
        stage: Stage,
    ) -> GovernanceResult<Transaction> {
        let fee = self.estimate_fee().await;
        TransactionBuilder::new(source, fee, &self.config.network_passphrase)
            .add_operations(operations)
            .build()
            .map_err(|e| GovernanceError::precondition(stage, e.to_string()))
    }

    async fn require_account(&self, id: &AccountId, stage: Stage, role: &str) -> GovernanceResult<AccountRecord> {
        self.ledger
            .get_account(id)
            .await?
            .ok_or_else(|| GovernanceError::precondition(stage, format!("{} account {} does not exist", role, id)))
    }

    async fn fetch_charter(&self, location: &str) -> GovernanceResult<GovernanceCharter> {
        let url = charter_url(location);
        let raw = self.fetcher.fetch(&url).await?;
        let text = String::from_utf8(raw).map_err(|_| {
            GovernanceError::validation(DocumentKind::Charter, vec![FieldIssue::new("<document>", "not UTF-8")])
        })?;
        let charter = GovernanceCharter::parse(&text, &self.config)?;
        debug!("Charter from {} verified against {}", url, charter.public_key);
        Ok(charter)
    }

    async fn fetch_proposal(&self, location: &str) -> GovernanceResult<ProposalDocument> {
        let raw = self.fetcher.fetch(location).await?;
        ProposalDocument::parse(&raw)
    }

    /// Refetch the proposal and check it against the recorded location and digest
    async fn verify_document(
        &self,
        data: &ProposalData<'_>,
        stage: Stage,
        location: &str,
    ) -> GovernanceResult<ProposalDocument> {
        let recorded = data.proposal_location()?;
        if recorded != location {
            return Err(GovernanceError::precondition(
                stage,
                format!("proposal location {} differs from the recorded {}", location, recorded),
            ));
        }
        let expected = data.proposal_hash()?;
        let proposal = self.fetch_proposal(location).await?;
        if !proposal.digest.matches(&expected) {
            return Err(GovernanceError::precondition(
                stage,
                format!("proposal digest {} does not match the recorded {}", proposal.digest, expected),
            ));
        }
        Ok(proposal)
    }

    fn expect_transition(&self, data: &ProposalData<'_>, next: ProposalStatus) -> GovernanceResult<()> {
        let current = data.status()?;
        if current.can_transition_to(next) {
            Ok(())
        } else {
            Err(GovernanceError::precondition(
                data.stage(),
                format!("proposal is {}, cannot become {}", current, next),
            ))
        }
    }

    /// The nonce must already carry exactly the oracle signers at weight 1,
    /// no usable master key, and the configured thresholds
    fn check_nonce(&self, nonce: &AccountRecord, oracle_signers: &[AccountId]) -> GovernanceResult<()> {
        let stage = Stage::Create;
        let expected: HashSet<String> = oracle_signers.iter().map(AccountId::to_strkey).collect();
        let actual: HashSet<String> = nonce.extra_signers().map(|s| s.key.clone()).collect();

        if nonce.master_weight() != 0 {
            return Err(GovernanceError::precondition(stage, format!("nonce account {} has an active master key", nonce.id)));
        }
        if actual != expected || nonce.extra_signers().any(|s| s.weight != 1) {
            return Err(GovernanceError::precondition(
                stage,
                format!("nonce account {} is not held by the oracle signers at weight 1", nonce.id),
            ));
        }
        if nonce.thresholds != Thresholds::uniform(self.config.signer_threshold) {
            return Err(GovernanceError::precondition(
                stage,
                format!("nonce account {} thresholds are not {}", nonce.id, self.config.signer_threshold),
            ));
        }
        Ok(())
    }

    /// Data entries written with reserves sponsored by the submitter
    fn sponsored_entries(
        &self,
        sponsor: &AccountId,
        proposal: &AccountId,
        entries: &[(&str, String)],
        stage: Stage,
    ) -> GovernanceResult<Vec<Operation>> {
        let mut operations = vec![Operation::begin_sponsoring(*sponsor, *proposal)];
        for (name, value) in entries {
            let op = Operation::manage_data(*proposal, name, value)
                .map_err(|e| GovernanceError::precondition(stage, e.to_string()))?;
            operations.push(op);
        }
        operations.push(Operation::end_sponsoring(*proposal));
        Ok(operations)
    }

    /// Merge the nonce account into its creator when both still exist
    async fn nonce_merge(&self, data: &ProposalData<'_>) -> GovernanceResult<Vec<Operation>> {
        let Some(nonce) = data.nonce_account()? else {
            warn!("Proposal records no nonce account, skipping merge");
            return Ok(Vec::new());
        };
        let Some(record) = self.ledger.get_account(&nonce).await? else {
            debug!("Nonce account {} already merged", nonce);
            return Ok(Vec::new());
        };
        let history = pagination::all_payments(self.ledger.as_ref(), &nonce).await?;
        let Some(creator) = account_creator(&history, &nonce) else {
            warn!("Creator of nonce account {} not found, skipping merge", nonce);
            return Ok(Vec::new());
        };
        if self.ledger.get_account(&creator).await?.is_none() {
            warn!("Creator {} of nonce account {} no longer exists, skipping merge", creator, nonce);
            return Ok(Vec::new());
        }
        if record.balances.iter().any(|b| b.asset != Asset::Native) || !record.data.is_empty() {
            warn!("Nonce account {} holds trustlines or data, skipping merge", nonce);
            return Ok(Vec::new());
        }

        // signers are subentries and must go before the merge
        let mut operations = Vec::new();
        for signer in record.extra_signers() {
            match AccountId::from_strkey(&signer.key) {
                Ok(key) => operations.push(Operation::remove_signer(nonce, key)),
                Err(_) => {
                    warn!("Nonce account {} has non-account signer {}, skipping merge", nonce, signer.key);
                    return Ok(Vec::new());
                }
            }
        }
        operations.push(Operation::account_merge(nonce, creator));
        Ok(operations)
    }

    /// Return the bond to the recorded proposer
    async fn bond_refund(
        &self,
        data: &ProposalData<'_>,
        proposal: &AccountId,
        token: &Asset,
    ) -> GovernanceResult<Option<Operation>> {
        let Some(proposer) = data.proposer()? else {
            warn!("Proposal {} records no proposer, bond not refunded", proposal);
            return Ok(None);
        };
        let history = pagination::all_payments(self.ledger.as_ref(), proposal).await?;
        match bond_payment(&history, &proposer, proposal, token) {
            Some(amount) => {
                debug!("Refunding bond of {} to {}", amount, proposer);
                Ok(Some(Operation::payment(*proposal, proposer, token.clone(), amount)))
            }
            None => {
                warn!("No bond payment from {} found for {}, bond not refunded", proposer, proposal);
                Ok(None)
            }
        }
    }
}
