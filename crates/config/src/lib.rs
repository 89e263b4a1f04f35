//! Configuration for the turret DAO contract
//!
//! Every stage receives a fully populated [`TurretConfig`]. Nothing here has a
//! compiled-in default: a value missing from the file or the environment is
//! an error.

pub mod logging;

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use turret_ledger::Amount;

pub use logging::init_logging;

/// Environment variable naming a YAML configuration file
pub const CONFIG_FILE_VAR: &str = "TURRET_CONFIG_FILE";

/// Oracle signers every proposal account carries
pub const ORACLE_SIGNERS: usize = 5;

/// Rescue signers every charter names
pub const RESCUE_SIGNERS: usize = 3;

/// Low, medium and high threshold of proposal and nonce accounts
pub const SIGNER_THRESHOLD: u8 = 3;

/// Log levels accepted in `log_level`
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Errors that can occur in configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidEnvVar(String, String),

    #[error("Failed to read file: {0}")]
    FileReadError(String),

    #[error("Failed to parse YAML: {0}")]
    YamlParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),

    #[error("Logging error: {0}")]
    Logging(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Contract configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TurretConfig {
    /// Horizon server base URL
    pub horizon_url: String,
    /// Network passphrase transactions are built for
    pub network_passphrase: String,
    /// Reserve held per ledger entry (base reserve)
    pub reserve_unit: Amount,
    /// Largest amount a single order may carry
    pub max_tradable_amount: Amount,
    /// Base fee per operation, in stroops, when fee stats are unavailable
    pub fallback_base_fee: u32,
    /// HTTP gateway `ipfs://` document locations are fetched through
    pub ipfs_gateway: String,
    /// Oracle signers a proposal account must carry
    pub oracle_signer_count: usize,
    /// Rescue signers a charter must name
    pub rescue_signer_count: usize,
    /// Low, medium and high threshold of a proposal account
    pub signer_threshold: u8,
    /// Default log filter
    pub log_level: String,
}

impl TurretConfig {
    /// Load configuration from the environment: the file named by
    /// `TURRET_CONFIG_FILE` when set, otherwise one `TURRET_*` variable per field
    pub fn from_env() -> ConfigResult<Self> {
        if let Ok(path) = env::var(CONFIG_FILE_VAR) {
            return Self::from_file(&path);
        }
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Load configuration from `TURRET_*` variables supplied by `lookup`
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let required = |name: &str| lookup(name).ok_or_else(|| ConfigError::EnvVarNotFound(name.to_string()));
        let parsed = |name: &str| -> ConfigResult<Amount> {
            let raw = required(name)?;
            Amount::parse(&raw).map_err(|e| ConfigError::InvalidEnvVar(name.to_string(), e.to_string()))
        };

        let config = TurretConfig {
            horizon_url: required("TURRET_HORIZON_URL")?,
            network_passphrase: required("TURRET_NETWORK_PASSPHRASE")?,
            reserve_unit: parsed("TURRET_RESERVE_UNIT")?,
            max_tradable_amount: parsed("TURRET_MAX_TRADABLE_AMOUNT")?,
            fallback_base_fee: parse_var(&lookup, "TURRET_FALLBACK_BASE_FEE")?,
            ipfs_gateway: required("TURRET_IPFS_GATEWAY")?,
            oracle_signer_count: parse_var(&lookup, "TURRET_ORACLE_SIGNER_COUNT")?,
            rescue_signer_count: parse_var(&lookup, "TURRET_RESCUE_SIGNER_COUNT")?,
            signer_threshold: parse_var(&lookup, "TURRET_SIGNER_THRESHOLD")?,
            log_level: required("TURRET_LOG_LEVEL")?,
        };
        debug!("Loaded configuration from environment");
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| ConfigError::FileReadError(format!("Failed to read {}: {}", path.display(), e)))?;

        let config = Self::from_yaml(&contents)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml(contents: &str) -> ConfigResult<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Reject inconsistent values, reporting every problem at once
    pub fn validate(&self) -> ConfigResult<()> {
        let mut issues = Vec::new();

        if !(self.horizon_url.starts_with("http://") || self.horizon_url.starts_with("https://")) {
            issues.push(format!("horizon_url {:?} is not an http(s) URL", self.horizon_url));
        }
        if self.network_passphrase.trim().is_empty() {
            issues.push("network_passphrase is empty".to_string());
        }
        if !self.reserve_unit.is_positive() {
            issues.push("reserve_unit must be positive".to_string());
        }
        if !self.max_tradable_amount.is_positive() {
            issues.push("max_tradable_amount must be positive".to_string());
        }
        if self.fallback_base_fee == 0 {
            issues.push("fallback_base_fee must be positive".to_string());
        }
        if !(self.ipfs_gateway.starts_with("http://") || self.ipfs_gateway.starts_with("https://")) {
            issues.push(format!("ipfs_gateway {:?} is not an http(s) URL", self.ipfs_gateway));
        }
        // proposal accounts are always 3-of-8: five oracles and three rescuers
        if self.oracle_signer_count != ORACLE_SIGNERS {
            issues.push(format!("oracle_signer_count must be {}", ORACLE_SIGNERS));
        }
        if self.rescue_signer_count != RESCUE_SIGNERS {
            issues.push(format!("rescue_signer_count must be {}", RESCUE_SIGNERS));
        }
        if self.signer_threshold != SIGNER_THRESHOLD {
            issues.push(format!("signer_threshold must be {}", SIGNER_THRESHOLD));
        }
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            issues.push(format!("log_level {:?} is not one of {}", self.log_level, LOG_LEVELS.join(", ")));
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(issues))
        }
    }

    /// Total signers on a proposal account, master key excluded
    pub fn signer_count(&self) -> usize {
        self.oracle_signer_count + self.rescue_signer_count
    }

    /// The configuration as `TURRET_*` variables, the inverse of [`Self::from_vars`]
    pub fn to_vars(&self) -> HashMap<String, String> {
        [
            ("TURRET_HORIZON_URL", self.horizon_url.clone()),
            ("TURRET_NETWORK_PASSPHRASE", self.network_passphrase.clone()),
            ("TURRET_RESERVE_UNIT", self.reserve_unit.to_string()),
            ("TURRET_MAX_TRADABLE_AMOUNT", self.max_tradable_amount.to_string()),
            ("TURRET_FALLBACK_BASE_FEE", self.fallback_base_fee.to_string()),
            ("TURRET_IPFS_GATEWAY", self.ipfs_gateway.clone()),
            ("TURRET_ORACLE_SIGNER_COUNT", self.oracle_signer_count.to_string()),
            ("TURRET_RESCUE_SIGNER_COUNT", self.rescue_signer_count.to_string()),
            ("TURRET_SIGNER_THRESHOLD", self.signer_threshold.to_string()),
            ("TURRET_LOG_LEVEL", self.log_level.clone()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> ConfigResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(name).ok_or_else(|| ConfigError::EnvVarNotFound(name.to_string()))?;
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(name.to_string(), e.to_string()))
}
