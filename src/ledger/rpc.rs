//! Solana RPC Ledger
//!
//! Reads accounts and submits single-instruction transactions through the
//! nonblocking JSON-RPC client. Confirmation is left to the client at the
//! configured commitment level.

use std::time::Duration;

use async_trait::async_trait;
use solana_client::{client_error::ClientError, nonblocking::rpc_client::RpcClient};
use solana_sdk::{
    commitment_config::CommitmentConfig,
    instruction::{Instruction, InstructionError},
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::{Transaction, TransactionError},
};

use super::state::root_from_account_data;
use super::{Ledger, LedgerError, LedgerResult};
use crate::common::config::{ConfigError, VeilConfig};

/// System program error code for creating an existing account
const ACCOUNT_ALREADY_IN_USE: u32 = 0;

/// Ledger backed by a Solana RPC node
pub struct RpcLedger {
    rpc: RpcClient,
    commitment: CommitmentConfig,
}

impl RpcLedger {
    pub fn new(
        rpc_url: impl Into<String>,
        commitment: CommitmentConfig,
        timeout: Duration,
    ) -> Self {
        let rpc = RpcClient::new_with_timeout_and_commitment(rpc_url.into(), timeout, commitment);
        Self { rpc, commitment }
    }

    pub fn from_config(config: &VeilConfig) -> Self {
        Self::new(config.rpc_url.clone(), config.commitment, config.rpc_timeout)
    }

    pub fn url(&self) -> String {
        self.rpc.url()
    }
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn get_account(&self, address: &Pubkey) -> LedgerResult<Option<Vec<u8>>> {
        let response = self
            .rpc
            .get_account_with_commitment(address, self.commitment)
            .await
            .map_err(|e| LedgerError::Rpc(e.to_string()))?;
        Ok(response.value.map(|account| account.data))
    }

    async fn get_latest_root(&self, pool: &Pubkey) -> LedgerResult<[u8; 32]> {
        let data = self
            .get_account(pool)
            .await?
            .ok_or(LedgerError::PoolNotInitialized)?;
        root_from_account_data(&data)
    }

    async fn submit(&self, instruction: Instruction, signer: &Keypair) -> LedgerResult<Signature> {
        let recent_blockhash = self
            .rpc
            .get_latest_blockhash()
            .await
            .map_err(|e| LedgerError::Rpc(e.to_string()))?;

        let tx = Transaction::new_signed_with_payer(
            &[instruction],
            Some(&signer.pubkey()),
            &[signer],
            recent_blockhash,
        );

        let signature = self
            .rpc
            .send_and_confirm_transaction(&tx)
            .await
            .map_err(map_client_error)?;

        tracing::debug!(signature = %signature, "transaction confirmed");
        Ok(signature)
    }
}

fn map_client_error(err: ClientError) -> LedgerError {
    match err.get_transaction_error() {
        Some(TransactionError::InstructionError(
            _,
            InstructionError::Custom(ACCOUNT_ALREADY_IN_USE),
        )) => LedgerError::AccountInUse(err.to_string()),
        Some(tx_err) => {
            let message = tx_err.to_string();
            if message.contains("already in use") {
                LedgerError::AccountInUse(message)
            } else {
                LedgerError::Rejected(message)
            }
        }
        None if err.to_string().contains("already in use") => {
            LedgerError::AccountInUse(err.to_string())
        }
        None => LedgerError::Rpc(err.to_string()),
    }
}

/// Load a keypair from a JSON byte-array file (Solana CLI format)
pub fn load_keypair_from_file(path: &str) -> Result<Keypair, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::InvalidValue(path.to_string(), e.to_string()))?;
    let bytes: Vec<u8> = serde_json::from_str(&content)
        .map_err(|e| ConfigError::InvalidValue(path.to_string(), e.to_string()))?;
    Keypair::from_bytes(bytes.as_slice())
        .map_err(|e| ConfigError::InvalidValue(path.to_string(), e.to_string()))
}
