//! Veil - Privacy Pool Client for Solana
//!
//! Client-side protocol for a shielded pool program. Public assets are
//! shielded into hiding commitments, moved privately by spending a
//! nullifier, and unshielded back to public addresses.
//!
//! ## Operations
//!
//! 1. **Shield** - commit `(amount, secret)` and deposit into the pool vault
//! 2. **Transfer** - spend a commitment into a fresh one for the recipient
//! 3. **Unshield** - spend a commitment to a public destination
//!
//! ## Layout
//!
//! - `crypto` - commitment and nullifier derivation, plus a Poseidon hash
//!   for backends that must match a circuit
//! - `pda` - program-derived addresses
//! - `instructions` - wire encoding of the six pool instructions
//! - `proof` - signature (MVP) and zero-knowledge proof adapters
//! - `ledger` - chain access (RPC and in-memory)
//! - `protocol` - the orchestrator tying these together

pub mod common;
pub mod crypto;
pub mod instructions;
pub mod ledger;
pub mod pda;
pub mod proof;
pub mod protocol;
pub mod types;

// Re-exports: errors and config
pub use common::{Network, Operation, Result, VeilConfig, VeilError};

// Re-exports: protocol
pub use protocol::{PreparedTransaction, PrivacyProtocol, ShieldStage, TransferStage, UnshieldStage};

// Re-exports: primitives
pub use crypto::{poseidon_hash, Blake3Primitives, CryptoError, CryptoPrimitives};
pub use instructions::{InstructionEncoder, PoolInstruction};
pub use pda::{AddressDeriver, ProgramAddress};

// Re-exports: proofs
pub use proof::{
    ProofAdapter, ProofError, ProofScheme, PublicInputs, SignatureProofAdapter, SpendWitness,
    ZkProofAdapter,
};

// Re-exports: ledger
pub use ledger::{load_keypair_from_file, Ledger, LedgerError, MemoryLedger, PoolState, RpcLedger};

// Re-exports: types
pub use types::{
    Asset, AssetId, Commitment, Nullifier, PrivateTransaction, Secret, ShieldRequest,
    TransactionStatus, TransferRequest, UnshieldRequest,
};
