//! Ledger Boundary
//!
//! Everything that reads from or writes to the chain goes through
//! [`Ledger`]. Implementations:
//! - `RpcLedger` - Solana JSON-RPC (production)
//! - `MemoryLedger` - in-process emulation of the pool program (testing)

pub mod memory;
pub mod rpc;
pub mod state;

use async_trait::async_trait;
use solana_sdk::{
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
};
use thiserror::Error;

pub use memory::MemoryLedger;
pub use rpc::{load_keypair_from_file, RpcLedger};
pub use state::{NullifierMarker, PoolState, PoolSummary};

/// Ledger errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("ledger call timed out after {0}s")]
    Timeout(u64),

    #[error("transaction rejected: {0}")]
    Rejected(String),

    #[error("account already in use: {0}")]
    AccountInUse(String),

    #[error("privacy pool is not initialized")]
    PoolNotInitialized,

    #[error("invalid account data: {0}")]
    InvalidAccountData(String),
}

impl LedgerError {
    /// Whether the same call might succeed if repeated
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Rpc(_) | LedgerError::Timeout(_))
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Chain access used by the protocol
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Raw account data, `None` if the account does not exist
    async fn get_account(&self, address: &Pubkey) -> LedgerResult<Option<Vec<u8>>>;

    /// Current Merkle root stored in the pool account
    async fn get_latest_root(&self, pool: &Pubkey) -> LedgerResult<[u8; 32]>;

    /// Sign with `signer` as fee payer, submit and wait for confirmation
    async fn submit(&self, instruction: Instruction, signer: &Keypair) -> LedgerResult<Signature>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(LedgerError::Rpc("connection reset".into()).is_transient());
        assert!(LedgerError::Timeout(30).is_transient());
        assert!(!LedgerError::AccountInUse("marker".into()).is_transient());
        assert!(!LedgerError::Rejected("invalid proof".into()).is_transient());
        assert!(!LedgerError::PoolNotInitialized.is_transient());
    }
}
