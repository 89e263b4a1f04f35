// Turret DAO command line entry point

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use turret_config::{init_logging, TurretConfig};
use turret_crypto::{AccountId, SecretSeed};
use turret_governance::{
    CreateRequest, HttpDocumentFetcher, ProposalLifecycle, SignerList, StageOutput, StageRequest, StageTarget,
};
use turret_ledger::{HorizonClient, JsonEnvelopeEncoder};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Turret DAO proposal lifecycle")]
struct Cli {
    /// Verbose mode (-v, -vv)
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// YAML configuration file (defaults to the TURRET_* environment)
    #[clap(short, long)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the transaction that opens a proposal
    Create {
        /// Proposer account, funds the bond
        #[clap(long)]
        source: AccountId,

        /// Secret seed of the new proposal account
        #[clap(long)]
        proposal_secret: String,

        /// Nonce account paying the proposal account's reserve
        #[clap(long)]
        nonce_account: AccountId,

        /// Comma-separated oracle signer accounts
        #[clap(long)]
        oracle_signers: String,

        /// DAO host or charter URL
        #[clap(long)]
        charter_location: String,

        /// Proposal document location
        #[clap(long)]
        proposal_location: String,
    },

    /// Build the transaction that ends voting
    Close {
        #[clap(flatten)]
        target: TargetArgs,
    },

    /// Build the transaction that records the result
    Tally {
        #[clap(flatten)]
        target: TargetArgs,
    },

    /// Print the winning option's payload
    Execute {
        #[clap(flatten)]
        target: TargetArgs,
    },

    /// Read a JSON request from stdin and run the stage it names
    Run {},
}

#[derive(clap::Args, Debug)]
struct TargetArgs {
    /// Transaction source and sponsor of new entries
    #[clap(long)]
    source: AccountId,

    /// The proposal account
    #[clap(long)]
    proposal_account: AccountId,

    /// Proposal document location recorded at creation
    #[clap(long)]
    proposal_location: String,
}

impl From<TargetArgs> for StageTarget {
    fn from(args: TargetArgs) -> Self {
        StageTarget {
            source: args.source,
            proposal_account: args.proposal_account,
            proposal_location: args.proposal_location,
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<TurretConfig> {
    let config = match path {
        Some(path) => TurretConfig::from_file(path)?,
        None => TurretConfig::from_env().context("no --config given and the TURRET_* environment is incomplete")?,
    };
    config.validate()?;
    Ok(config)
}

fn log_level(verbose: u8, config: &TurretConfig) -> &str {
    match verbose {
        0 => config.log_level.as_str(),
        1 => "debug",
        _ => "trace",
    }
}

fn request_from(command: Commands) -> Result<StageRequest> {
    let request = match command {
        Commands::Create {
            source,
            proposal_secret,
            nonce_account,
            oracle_signers,
            charter_location,
            proposal_location,
        } => StageRequest::Create(CreateRequest {
            source,
            proposal_secret: SecretSeed::from_strkey(&proposal_secret).context("invalid --proposal-secret")?,
            nonce_account,
            oracle_signers: SignerList::Csv(oracle_signers),
            charter_location,
            proposal_location,
        }),
        Commands::Close { target } => StageRequest::Close(target.into()),
        Commands::Tally { target } => StageRequest::Tally(target.into()),
        Commands::Execute { target } => StageRequest::Execute(target.into()),
        Commands::Run {} => {
            let mut body = String::new();
            std::io::stdin().read_to_string(&mut body)?;
            serde_json::from_str(&body).context("malformed request")?
        }
    };
    Ok(request)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    init_logging(log_level(cli.verbose, &config))?;
    debug!("Using Horizon at {}", config.horizon_url);

    let ledger = Arc::new(HorizonClient::new(&config.horizon_url));
    let fetcher = Arc::new(HttpDocumentFetcher::new(&config.ipfs_gateway));
    let lifecycle = ProposalLifecycle::new(config, ledger, fetcher, Arc::new(JsonEnvelopeEncoder))?;

    let request = request_from(cli.command)?;
    let stage = request.stage();
    let output = lifecycle.dispatch(request).await?;
    info!("{} finished", stage);

    match output {
        StageOutput::Envelope(envelope) => println!("{}", envelope),
        StageOutput::Payload(payload) => println!("{}", payload),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CONFIG: &str = "\
horizon_url: https://horizon-testnet.stellar.org
network_passphrase: Test SDF Network ; September 2015
reserve_unit: \"0.5\"
max_tradable_amount: \"922337203685.4775807\"
fallback_base_fee: 100
ipfs_gateway: https://ipfs.io
oracle_signer_count: 5
rescue_signer_count: 3
signer_threshold: 3
log_level: info
";

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.fallback_base_fee, 100);
        assert_eq!(log_level(0, &config), "info");
        assert_eq!(log_level(2, &config), "trace");

        let fetcher = HttpDocumentFetcher::new(&config.ipfs_gateway);
        assert_eq!(fetcher.resolve("ipfs://QmProposal"), "https://ipfs.io/ipfs/QmProposal");
    }

    #[test]
    fn test_load_config_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CONFIG.replace("signer_threshold: 3", "signer_threshold: 0").as_bytes())
            .unwrap();
        assert!(load_config(Some(file.path())).is_err());
    }

    #[test]
    fn test_target_commands_map_to_requests() {
        let account = turret_crypto::KeyPair::from_seed_bytes([9; 32]).unwrap().account_id();
        let cli = Cli::parse_from([
            "turret-dao",
            "tally",
            "--source",
            &account.to_strkey(),
            "--proposal-account",
            &account.to_strkey(),
            "--proposal-location",
            "ipfs://QmProposal",
        ]);
        match request_from(cli.command).unwrap() {
            StageRequest::Tally(target) => assert_eq!(target.proposal_location, "ipfs://QmProposal"),
            other => panic!("expected a tally request, got {:?}", other),
        }
    }

    #[test]
    fn test_create_rejects_bad_secret() {
        let account = turret_crypto::KeyPair::from_seed_bytes([9; 32]).unwrap().account_id();
        let cli = Cli::parse_from([
            "turret-dao",
            "create",
            "--source",
            &account.to_strkey(),
            "--proposal-secret",
            "SNOTASEED",
            "--nonce-account",
            &account.to_strkey(),
            "--oracle-signers",
            &account.to_strkey(),
            "--charter-location",
            "dao.example.org",
            "--proposal-location",
            "ipfs://QmProposal",
        ]);
        assert!(request_from(cli.command).is_err());
    }
}
