//! Environment-based Configuration for Veil
//!
//! Configuration is an explicit value handed to `PrivacyProtocol` at
//! construction. Nothing here is global.
//!
//! # Environment Variables
//!
//! ## Network Configuration
//! - `VEIL_NETWORK` - "mainnet", "testnet", "devnet" or "localnet" (default: "devnet")
//! - `VEIL_RPC_URL` - Solana RPC endpoint URL
//! - `VEIL_COMMITMENT` - "processed", "confirmed" or "finalized" (default: "confirmed")
//! - `VEIL_RPC_TIMEOUT_SECS` - Timeout for each ledger call (default: 30)
//!
//! ## Program
//! - `VEIL_PROGRAM_ID` - Privacy pool program ID (required outside devnet/localnet)
//!
//! ## Proofs
//! - `VEIL_PROOF_SCHEME` - "signature" (MVP) or "zk"
//!
//! ## Optional Settings
//! - `VEIL_KEYPAIR` - Path to a JSON keypair file (used by the CLI)
//! - `VEIL_LOG_LEVEL` - Logging level (trace, debug, info, warn, error)
//! - `VEIL_LOG_JSON` - Set to "1" for JSON log output

use std::env;
use std::str::FromStr;
use std::time::Duration;

use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey};
use thiserror::Error;

use crate::proof::ProofScheme;

/// Placeholder program ID used by local and devnet deployments
pub const DEFAULT_PROGRAM_ID: &str = "Vei1111111111111111111111111111111111111111";

/// Default timeout for a single ledger call
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 30;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("network mismatch: expected {0}, got {1}")]
    NetworkMismatch(String, String),

    #[error("proof scheme {0} provides no sender privacy and is not allowed on {1}")]
    InsecureProofScheme(String, String),
}

/// Network environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
    Devnet,
    Localnet,
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" | "mainnet-beta" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            "devnet" | "dev" => Ok(Network::Devnet),
            "localnet" | "local" | "localhost" => Ok(Network::Localnet),
            _ => Err(ConfigError::InvalidValue(
                "VEIL_NETWORK".to_string(),
                format!("unknown network: {}", s),
            )),
        }
    }
}

impl Network {
    /// Get default Solana RPC for this network
    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://api.mainnet-beta.solana.com",
            Network::Testnet => "https://api.testnet.solana.com",
            Network::Devnet => "https://api.devnet.solana.com",
            Network::Localnet => "http://127.0.0.1:8899",
        }
    }

    /// Whether the placeholder program ID may be used
    pub fn allows_default_program(&self) -> bool {
        matches!(self, Network::Devnet | Network::Localnet)
    }
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct VeilConfig {
    /// Network environment
    pub network: Network,

    /// Solana RPC endpoint
    pub rpc_url: String,

    /// Privacy pool program ID
    pub program_id: Pubkey,

    /// Proof scheme selected at construction
    pub proof_scheme: ProofScheme,

    /// Commitment level for reads and confirmations
    pub commitment: CommitmentConfig,

    /// Timeout applied to each ledger call
    pub rpc_timeout: Duration,

    /// Keypair file for the CLI
    pub keypair_path: Option<String>,

    /// Log level
    pub log_level: String,

    /// Emit JSON logs
    pub log_json: bool,
}

impl Default for VeilConfig {
    fn default() -> Self {
        Self::for_network(Network::Devnet)
    }
}

impl VeilConfig {
    /// Defaults for a network, using the placeholder program ID
    pub fn for_network(network: Network) -> Self {
        Self {
            network,
            rpc_url: network.default_rpc_url().to_string(),
            program_id: Pubkey::from_str(DEFAULT_PROGRAM_ID).unwrap_or_default(),
            proof_scheme: ProofScheme::Signature,
            commitment: CommitmentConfig::confirmed(),
            rpc_timeout: Duration::from_secs(DEFAULT_RPC_TIMEOUT_SECS),
            keypair_path: None,
            log_level: "info".to_string(),
            log_json: network == Network::Mainnet,
        }
    }

    /// Override the program ID
    pub fn with_program_id(mut self, program_id: Pubkey) -> Self {
        self.program_id = program_id;
        self
    }

    /// Override the RPC timeout
    pub fn with_rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = timeout;
        self
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let network: Network = env::var("VEIL_NETWORK")
            .unwrap_or_else(|_| "devnet".to_string())
            .parse()?;

        let rpc_url =
            env::var("VEIL_RPC_URL").unwrap_or_else(|_| network.default_rpc_url().to_string());

        let program_id = match env::var("VEIL_PROGRAM_ID") {
            Ok(value) => parse_pubkey_var("VEIL_PROGRAM_ID", &value)?,
            Err(_) if network.allows_default_program() => {
                parse_pubkey_var("VEIL_PROGRAM_ID", DEFAULT_PROGRAM_ID)?
            }
            Err(_) => return Err(ConfigError::MissingEnvVar("VEIL_PROGRAM_ID".to_string())),
        };

        let proof_scheme = match env::var("VEIL_PROOF_SCHEME") {
            Ok(value) => value.parse().map_err(|e: crate::proof::ProofError| {
                ConfigError::InvalidValue("VEIL_PROOF_SCHEME".to_string(), e.to_string())
            })?,
            Err(_) => ProofScheme::Signature,
        };

        let commitment = match env::var("VEIL_COMMITMENT") {
            Ok(value) => parse_commitment(&value)?,
            Err(_) => CommitmentConfig::confirmed(),
        };

        let rpc_timeout = match env::var("VEIL_RPC_TIMEOUT_SECS") {
            Ok(value) => {
                let secs: u64 = value.parse().map_err(|_| {
                    ConfigError::InvalidValue(
                        "VEIL_RPC_TIMEOUT_SECS".to_string(),
                        "must be a number of seconds".to_string(),
                    )
                })?;
                if secs == 0 {
                    return Err(ConfigError::InvalidValue(
                        "VEIL_RPC_TIMEOUT_SECS".to_string(),
                        "must be greater than zero".to_string(),
                    ));
                }
                Duration::from_secs(secs)
            }
            Err(_) => Duration::from_secs(DEFAULT_RPC_TIMEOUT_SECS),
        };

        let keypair_path = env::var("VEIL_KEYPAIR").ok();
        let log_level = env::var("VEIL_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_json = env::var("VEIL_LOG_JSON")
            .map(|v| v == "1")
            .unwrap_or(network == Network::Mainnet);

        Ok(Self {
            network,
            rpc_url,
            program_id,
            proof_scheme,
            commitment,
            rpc_timeout,
            keypair_path,
            log_level,
            log_json,
        })
    }

    /// Validate configuration for production readiness
    pub fn validate_for_production(&self) -> Result<(), ConfigError> {
        if self.network != Network::Mainnet {
            return Err(ConfigError::NetworkMismatch(
                "mainnet".to_string(),
                format!("{:?}", self.network),
            ));
        }

        if self.proof_scheme == ProofScheme::Signature {
            return Err(ConfigError::InsecureProofScheme(
                self.proof_scheme.to_string(),
                "mainnet".to_string(),
            ));
        }

        if self.program_id.to_string() == DEFAULT_PROGRAM_ID {
            return Err(ConfigError::InvalidValue(
                "VEIL_PROGRAM_ID".to_string(),
                "placeholder program ID not allowed on mainnet".to_string(),
            ));
        }

        Ok(())
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("=== Veil Configuration ===");
        println!("Network: {:?}", self.network);
        println!("RPC: {}", self.rpc_url);
        println!("Program ID: {}", self.program_id);
        println!("Proof Scheme: {}", self.proof_scheme);
        println!("Commitment: {:?}", self.commitment.commitment);
        println!("RPC Timeout: {}s", self.rpc_timeout.as_secs());
        println!("Log Level: {}", self.log_level);
        println!("==========================");
    }
}

fn parse_pubkey_var(var_name: &str, value: &str) -> Result<Pubkey, ConfigError> {
    Pubkey::from_str(value)
        .map_err(|e| ConfigError::InvalidValue(var_name.to_string(), e.to_string()))
}

fn parse_commitment(value: &str) -> Result<CommitmentConfig, ConfigError> {
    match value.to_lowercase().as_str() {
        "processed" => Ok(CommitmentConfig::processed()),
        "confirmed" => Ok(CommitmentConfig::confirmed()),
        "finalized" => Ok(CommitmentConfig::finalized()),
        other => Err(ConfigError::InvalidValue(
            "VEIL_COMMITMENT".to_string(),
            format!("unknown commitment level: {}", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_parsing() {
        assert!(matches!("mainnet".parse::<Network>(), Ok(Network::Mainnet)));
        assert!(matches!("testnet".parse::<Network>(), Ok(Network::Testnet)));
        assert!(matches!("devnet".parse::<Network>(), Ok(Network::Devnet)));
        assert!(matches!("localnet".parse::<Network>(), Ok(Network::Localnet)));
        assert!("invalid".parse::<Network>().is_err());
    }

    #[test]
    fn test_default_program_restrictions() {
        assert!(Network::Devnet.allows_default_program());
        assert!(Network::Localnet.allows_default_program());
        assert!(!Network::Mainnet.allows_default_program());
        assert!(!Network::Testnet.allows_default_program());
    }

    #[test]
    fn test_default_config_uses_placeholder_program() {
        let config = VeilConfig::default();
        assert_eq!(config.program_id.to_string(), DEFAULT_PROGRAM_ID);
        assert_eq!(config.proof_scheme, ProofScheme::Signature);
        assert_eq!(config.rpc_timeout, Duration::from_secs(DEFAULT_RPC_TIMEOUT_SECS));
    }

    #[test]
    fn test_production_rejects_signature_proofs() {
        let config = VeilConfig::for_network(Network::Mainnet)
            .with_program_id(Pubkey::new_unique());
        assert!(matches!(
            config.validate_for_production(),
            Err(ConfigError::InsecureProofScheme(_, _))
        ));

        let mut config = config;
        config.proof_scheme = ProofScheme::ZeroKnowledge;
        assert!(config.validate_for_production().is_ok());
    }

    #[test]
    fn test_commitment_parsing() {
        assert_eq!(parse_commitment("finalized").unwrap(), CommitmentConfig::finalized());
        assert!(parse_commitment("eventually").is_err());
    }
}
