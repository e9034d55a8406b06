//! Spend Proofs
//!
//! A proof authorizes spending a nullifier against a Merkle root. The
//! protocol layer only depends on [`ProofAdapter`]; the scheme is chosen
//! when the protocol is constructed.
//!
//! | Scheme | Adapter | Proof |
//! |--------|---------|-------|
//! | `signature` (MVP) | [`SignatureProofAdapter`] | `signature(64) \|\| pubkey(32)` |
//! | `zk` | [`ZkProofAdapter`] | backend defined (Groth16: 256 bytes) |

pub mod signature;
pub mod zk;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use solana_sdk::{pubkey::Pubkey, signature::Keypair};
use thiserror::Error;

use crate::types::{Commitment, Nullifier, Secret};

pub use signature::{MvpProof, SignatureProofAdapter};
pub use zk::{ProvingBackend, ZkProofAdapter};

/// Signature proof size: signature(64) + pubkey(32)
pub const MVP_PROOF_SIZE: usize = 96;

/// Groth16 proof size: a(64) + b(128) + c(64)
pub const GROTH16_PROOF_SIZE: usize = 256;

/// Proof errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProofError {
    #[error("invalid proof format: expected {expected} bytes, got {actual}")]
    InvalidFormat { expected: usize, actual: usize },

    #[error("unknown proof scheme: {0}")]
    UnknownScheme(String),

    #[error("witness does not match public inputs: {0}")]
    WitnessMismatch(String),

    #[error("proving backend error: {0}")]
    Backend(String),
}

/// Proof scheme selected at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofScheme {
    /// Ed25519 signature over the public inputs; reveals the signer
    Signature,
    /// Zero-knowledge proof from a proving backend
    ZeroKnowledge,
}

impl fmt::Display for ProofScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProofScheme::Signature => f.write_str("signature"),
            ProofScheme::ZeroKnowledge => f.write_str("zk"),
        }
    }
}

impl FromStr for ProofScheme {
    type Err = ProofError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "signature" | "mvp" => Ok(ProofScheme::Signature),
            "zk" | "groth16" | "zero_knowledge" => Ok(ProofScheme::ZeroKnowledge),
            other => Err(ProofError::UnknownScheme(other.to_string())),
        }
    }
}

// ============================================================================
// Witnesses and public inputs
// ============================================================================

/// Private and public inputs of a transfer proof
#[derive(Debug, Clone)]
pub struct TransferWitness {
    pub nullifier: Nullifier,
    pub new_commitment: Commitment,
    pub root: [u8; 32],
    /// Commitment being spent
    pub commitment: Commitment,
    pub amount: u64,
    pub secret: Secret,
}

/// Private and public inputs of an unshield proof
#[derive(Debug, Clone)]
pub struct UnshieldWitness {
    pub nullifier: Nullifier,
    pub recipient: Pubkey,
    pub amount: u64,
    pub root: [u8; 32],
    /// Commitment being spent
    pub commitment: Commitment,
    pub secret: Secret,
}

/// Witness for one spend
#[derive(Debug, Clone)]
pub enum SpendWitness {
    Transfer(TransferWitness),
    Unshield(UnshieldWitness),
}

impl SpendWitness {
    /// The public half of the witness
    pub fn public_inputs(&self) -> PublicInputs {
        match self {
            SpendWitness::Transfer(w) => PublicInputs::Transfer {
                nullifier: w.nullifier,
                new_commitment: w.new_commitment,
                root: w.root,
            },
            SpendWitness::Unshield(w) => PublicInputs::Unshield {
                nullifier: w.nullifier,
                recipient: w.recipient,
                amount: w.amount,
                root: w.root,
            },
        }
    }
}

/// Public inputs a proof is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicInputs {
    Transfer {
        nullifier: Nullifier,
        new_commitment: Commitment,
        root: [u8; 32],
    },
    Unshield {
        nullifier: Nullifier,
        recipient: Pubkey,
        amount: u64,
        root: [u8; 32],
    },
}

impl PublicInputs {
    pub fn nullifier(&self) -> &Nullifier {
        match self {
            PublicInputs::Transfer { nullifier, .. } | PublicInputs::Unshield { nullifier, .. } => {
                nullifier
            }
        }
    }

    pub fn root(&self) -> &[u8; 32] {
        match self {
            PublicInputs::Transfer { root, .. } | PublicInputs::Unshield { root, .. } => root,
        }
    }
}

// ============================================================================
// Adapter
// ============================================================================

/// Builds and checks spend proofs
///
/// `authority` is the key authorizing the spend. Schemes that do not sign
/// ignore it.
#[cfg_attr(test, mockall::automock)]
pub trait ProofAdapter: Send + Sync {
    fn scheme(&self) -> ProofScheme;

    fn prove(&self, witness: &SpendWitness, authority: &Keypair) -> Result<Vec<u8>, ProofError>;

    fn verify(&self, proof: &[u8], inputs: &PublicInputs) -> Result<bool, ProofError>;
}
