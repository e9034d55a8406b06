//! Veil CLI
//!
//! Shield, transfer and unshield against a deployed privacy pool.
//!
//! Configuration comes from `VEIL_*` environment variables (a `.env` file is
//! honored). Results are printed as JSON; secrets in the output are the
//! only copy, so store them.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use solana_sdk::signature::{Keypair, Signer};
use veil::common::{init_from_config, Operation};
use veil::ledger::{load_keypair_from_file, RpcLedger};
use veil::proof::{ProofScheme, SignatureProofAdapter};
use veil::types::{validate_commitment, validate_nullifier, validate_secret, AssetId};
use veil::{
    PrivacyProtocol, Secret, ShieldRequest, TransferRequest, UnshieldRequest, VeilConfig,
};

#[derive(Parser)]
#[command(name = "veil")]
#[command(about = "Privacy pool client for Solana")]
struct Cli {
    /// Keypair file paying fees and authorizing spends
    #[arg(short, long, global = true, env = "VEIL_KEYPAIR")]
    keypair: Option<String>,

    /// Print the loaded configuration before running
    #[arg(long, global = true)]
    show_config: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the pool account (authority = keypair)
    InitPool,

    /// Deposit public assets into the pool
    Shield {
        #[arg(short, long)]
        amount: u64,

        /// SOL, a known symbol (USDC, USDT) or a mint address
        #[arg(short, long, default_value = "SOL")]
        token: String,

        /// Secret for the new commitment; generated when omitted
        #[arg(short, long, env = "VEIL_SECRET", hide_env_values = true)]
        secret: Option<String>,
    },

    /// Move a shielded amount to a new commitment
    Transfer {
        #[arg(short, long)]
        recipient: String,

        #[arg(short, long)]
        amount: u64,

        /// Secret of the commitment being spent
        #[arg(short, long, env = "VEIL_SECRET", hide_env_values = true)]
        secret: String,

        /// Commitment being spent (hex); recomputed when omitted
        #[arg(short, long)]
        commitment: Option<String>,
    },

    /// Withdraw a shielded amount to a public address
    Unshield {
        #[arg(short, long)]
        amount: u64,

        #[arg(short, long)]
        destination: String,

        #[arg(short, long, env = "VEIL_SECRET", hide_env_values = true)]
        secret: String,

        #[arg(short, long)]
        commitment: Option<String>,

        #[arg(short, long, default_value = "SOL")]
        token: String,
    },

    /// Print the current Merkle root
    Root,

    /// Print the pool account summary
    Pool,

    /// Check whether a nullifier has been spent
    NullifierStatus {
        /// Nullifier (hex)
        #[arg(short, long, conflicts_with_all = ["commitment", "secret"])]
        nullifier: Option<String>,

        /// Commitment (hex), used with --secret
        #[arg(short, long, requires = "secret")]
        commitment: Option<String>,

        #[arg(short, long, requires = "commitment")]
        secret: Option<String>,
    },

    /// Print the pool, vault and optional marker addresses
    Derive {
        /// Nullifier (hex) whose marker address to derive
        #[arg(short, long)]
        nullifier: Option<String>,
    },

    /// Print the asset id for a token
    AssetId { token: String },

    /// Print a fresh random secret
    GenerateSecret,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = VeilConfig::from_env()?;
    if cli.keypair.is_some() {
        config.keypair_path = cli.keypair.clone();
    }
    init_from_config(&config)?;
    if cli.show_config {
        config.print_summary();
    }

    match cli.command {
        Commands::AssetId { token } => {
            let id = AssetId::from_token(&token);
            println!("{}", serde_json::json!({ "token": token, "asset_id": id.0 }));
        }
        Commands::GenerateSecret => {
            let secret = Secret::generate();
            println!("{}", secret.expose_str().unwrap_or_default());
        }
        Commands::Derive { nullifier } => {
            let protocol = build_protocol(&config)?;
            let encoder = protocol.encoder();
            let mut out = serde_json::json!({
                "program_id": encoder.program_id().to_string(),
                "pool": encoder.pool().to_string(),
                "vault": encoder.vault().to_string(),
            });
            if let Some(hex) = nullifier {
                let nullifier = validate_nullifier(Operation::Derive, "nullifier", &hex)?;
                out["nullifier_marker"] = encoder.nullifier_marker(&nullifier)?.to_string().into();
            }
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Commands::Root => {
            let protocol = build_protocol(&config)?;
            let root = protocol.get_merkle_root().await?;
            println!("{}", hex::encode(root));
        }
        Commands::Pool => {
            let protocol = build_protocol(&config)?;
            let state = protocol.pool_state().await?;
            println!("{}", serde_json::to_string_pretty(&state.summary())?);
        }
        Commands::NullifierStatus {
            nullifier,
            commitment,
            secret,
        } => {
            let protocol = build_protocol(&config)?;
            let op = Operation::Query;
            let nullifier = match (nullifier, commitment, secret) {
                (Some(hex), _, _) => validate_nullifier(op, "nullifier", &hex)?,
                (None, Some(commitment), Some(secret)) => {
                    let commitment = validate_commitment(op, "commitment", &commitment)?;
                    let secret = validate_secret(op, "secret", &secret)?;
                    protocol.derive_nullifier(op, &commitment, &secret)?
                }
                _ => return Err("pass --nullifier, or --commitment with --secret".into()),
            };
            let spent = protocol.is_nullifier_spent(&nullifier).await?;
            println!(
                "{}",
                serde_json::json!({ "nullifier": nullifier.to_hex(), "spent": spent })
            );
        }
        Commands::InitPool => {
            let protocol = build_protocol(&config)?;
            let authority = load_signer(&config)?;
            let signature = protocol.initialize_pool(&authority).await?;
            println!(
                "{}",
                serde_json::json!({
                    "signature": signature.to_string(),
                    "pool": protocol.pool_address().to_string(),
                    "authority": authority.pubkey().to_string(),
                })
            );
        }
        Commands::Shield {
            amount,
            token,
            secret,
        } => {
            let protocol = build_protocol(&config)?;
            let depositor = load_signer(&config)?;
            let request = ShieldRequest {
                amount,
                token,
                secret,
            };
            let tx = protocol.shield(&request, &depositor).await?;
            println!("{}", tx.to_json());
        }
        Commands::Transfer {
            recipient,
            amount,
            secret,
            commitment,
        } => {
            let protocol = build_protocol(&config)?;
            let sender = load_signer(&config)?;
            let request = TransferRequest {
                recipient,
                amount,
                sender_secret: secret,
                sender_commitment: commitment,
            };
            let tx = protocol.transfer(&request, &sender).await?;
            println!("{}", tx.to_json());
        }
        Commands::Unshield {
            amount,
            destination,
            secret,
            commitment,
            token,
        } => {
            let protocol = build_protocol(&config)?;
            let owner = load_signer(&config)?;
            let request = UnshieldRequest {
                amount,
                destination,
                owner_secret: secret,
                commitment,
                token,
            };
            let tx = protocol.unshield(&request, &owner).await?;
            println!("{}", tx.to_json());
        }
    }

    Ok(())
}

/// Protocol over the configured RPC endpoint
fn build_protocol(config: &VeilConfig) -> Result<PrivacyProtocol, Box<dyn std::error::Error>> {
    let ledger = Arc::new(RpcLedger::from_config(config));
    let prover = match config.proof_scheme {
        ProofScheme::Signature => Arc::new(SignatureProofAdapter::new()),
        ProofScheme::ZeroKnowledge => {
            return Err(
                "the zk scheme needs a proving backend; the CLI only ships the signature scheme"
                    .into(),
            )
        }
    };
    Ok(PrivacyProtocol::new(config.clone(), ledger, prover)?)
}

fn load_signer(config: &VeilConfig) -> Result<Keypair, Box<dyn std::error::Error>> {
    let path = config
        .keypair_path
        .as_deref()
        .ok_or("no keypair: pass --keypair or set VEIL_KEYPAIR")?;
    Ok(load_keypair_from_file(path)?)
}
