//! In-Memory Ledger
//!
//! Emulates the pool program for tests and local development. Each
//! submission is applied under a single write lock, so creating a nullifier
//! marker is atomic: the second of two racing spends sees the marker and
//! fails with `AccountInUse`.
//!
//! Custody is tracked as plain balances keyed by account address. Token
//! accounts of recipients must be registered with
//! [`MemoryLedger::create_token_account`] before an SPL unshield, the same
//! way they must exist on chain.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use solana_sdk::{
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
};
use tokio::sync::RwLock;

use super::state::{root_from_account_data, NullifierMarker, PoolState};
use super::{Ledger, LedgerError, LedgerResult};
use crate::instructions::PoolInstruction;
use crate::pda::{associated_token_address, AddressDeriver};
use crate::proof::{ProofAdapter, PublicInputs, MVP_PROOF_SIZE};
use crate::types::Nullifier;

#[derive(Default)]
struct LedgerInner {
    /// Program-owned account data
    accounts: HashMap<Pubkey, Vec<u8>>,
    /// Balances of vaults, recipients and token accounts
    balances: HashMap<Pubkey, u64>,
    /// Registered token accounts: address -> owner
    token_owners: HashMap<Pubkey, Pubkey>,
    slot: u64,
}

/// In-process pool program
#[derive(Clone)]
pub struct MemoryLedger {
    deriver: AddressDeriver,
    verifier: Option<Arc<dyn ProofAdapter>>,
    inner: Arc<RwLock<LedgerInner>>,
}

impl MemoryLedger {
    /// Ledger that checks proof sizes but not proof contents
    pub fn new(program_id: Pubkey) -> Self {
        Self {
            deriver: AddressDeriver::new(program_id),
            verifier: None,
            inner: Arc::new(RwLock::new(LedgerInner::default())),
        }
    }

    /// Ledger that also verifies every proof against the current root
    pub fn with_verifier(program_id: Pubkey, verifier: Arc<dyn ProofAdapter>) -> Self {
        Self {
            verifier: Some(verifier),
            ..Self::new(program_id)
        }
    }

    /// Register a token account for `owner` and `mint`, returning its address
    pub async fn create_token_account(&self, owner: &Pubkey, mint: &Pubkey) -> Pubkey {
        let address = associated_token_address(owner, mint);
        let mut inner = self.inner.write().await;
        inner.token_owners.insert(address, *owner);
        inner.balances.entry(address).or_insert(0);
        address
    }

    /// Balance held by an account (vault, recipient or token account)
    pub async fn balance(&self, address: &Pubkey) -> u64 {
        self.inner.read().await.balances.get(address).copied().unwrap_or(0)
    }

    /// Number of confirmed transactions
    pub async fn slot(&self) -> u64 {
        self.inner.read().await.slot
    }

    fn rejected(reason: impl Into<String>) -> LedgerError {
        LedgerError::Rejected(reason.into())
    }

    fn expect_account(
        instruction: &Instruction,
        index: usize,
        expected: &Pubkey,
        name: &str,
    ) -> LedgerResult<()> {
        match instruction.accounts.get(index) {
            Some(meta) if meta.pubkey == *expected => Ok(()),
            _ => Err(Self::rejected(format!("account {} must be the {}", index, name))),
        }
    }

    fn account_at(instruction: &Instruction, index: usize) -> LedgerResult<Pubkey> {
        instruction
            .accounts
            .get(index)
            .map(|meta| meta.pubkey)
            .ok_or_else(|| Self::rejected(format!("missing account {}", index)))
    }

    fn load_pool(inner: &LedgerInner, pool: &Pubkey) -> LedgerResult<PoolState> {
        let data = inner.accounts.get(pool).ok_or(LedgerError::PoolNotInitialized)?;
        PoolState::from_account_data(data)
    }

    fn check_proof(&self, proof: &[u8], inputs: &PublicInputs) -> LedgerResult<()> {
        if proof.len() < MVP_PROOF_SIZE {
            return Err(Self::rejected(format!("proof too short: {} bytes", proof.len())));
        }
        if let Some(verifier) = &self.verifier {
            let valid = verifier
                .verify(proof, inputs)
                .map_err(|e| Self::rejected(e.to_string()))?;
            if !valid {
                return Err(Self::rejected("proof verification failed"));
            }
        }
        Ok(())
    }

    /// Marker must not exist yet; returns its address
    fn check_marker(
        &self,
        inner: &LedgerInner,
        instruction: &Instruction,
        pool: &Pubkey,
        nullifier: &Nullifier,
    ) -> LedgerResult<Pubkey> {
        let marker = self
            .deriver
            .nullifier_marker(pool, nullifier)
            .map_err(|e| Self::rejected(e.to_string()))?
            .address;
        Self::expect_account(instruction, 1, &marker, "nullifier marker")?;
        if inner.accounts.contains_key(&marker) {
            return Err(LedgerError::AccountInUse(marker.to_string()));
        }
        Ok(marker)
    }

    fn debit(inner: &mut LedgerInner, account: &Pubkey, amount: u64) -> LedgerResult<()> {
        let balance = inner.balances.entry(*account).or_insert(0);
        if *balance < amount {
            return Err(Self::rejected(format!(
                "insufficient funds in {}: {} < {}",
                account, balance, amount
            )));
        }
        *balance -= amount;
        Ok(())
    }

    fn credit(inner: &mut LedgerInner, account: &Pubkey, amount: u64) {
        let balance = inner.balances.entry(*account).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    /// Apply one instruction; all checks run before any write
    fn apply(
        &self,
        inner: &mut LedgerInner,
        instruction: &Instruction,
        signer: &Pubkey,
    ) -> LedgerResult<()> {
        let pool_pda = self.deriver.pool().map_err(|e| Self::rejected(e.to_string()))?;
        let pool = pool_pda.address;
        let vault = self
            .deriver
            .vault(&pool)
            .map_err(|e| Self::rejected(e.to_string()))?
            .address;

        let data = PoolInstruction::unpack(&instruction.data)
            .map_err(|e| Self::rejected(e.to_string()))?;
        Self::expect_account(instruction, 0, &pool, "pool")?;
        inner.slot += 1;
        let slot = inner.slot;

        match data {
            PoolInstruction::Initialize => {
                if inner.accounts.contains_key(&pool) {
                    return Err(LedgerError::AccountInUse(pool.to_string()));
                }
                let state = PoolState::new(*signer, pool_pda.bump);
                inner.accounts.insert(pool, state.to_account_data()?);
            }

            PoolInstruction::ShieldNative { commitment, amount } => {
                let mut state = Self::load_pool(inner, &pool)?;
                if amount == 0 {
                    return Err(Self::rejected("invalid amount"));
                }
                Self::expect_account(instruction, 1, &vault, "vault")?;
                state.add_commitment(commitment.to_bytes())?;
                inner.accounts.insert(pool, state.to_account_data()?);
                Self::credit(inner, &vault, amount);
            }

            PoolInstruction::ShieldAsset { commitment, amount } => {
                let mut state = Self::load_pool(inner, &pool)?;
                if amount == 0 {
                    return Err(Self::rejected("invalid amount"));
                }
                Self::expect_account(instruction, 1, &vault, "vault authority")?;
                let vault_token_account = Self::account_at(instruction, 2)?;
                state.add_commitment(commitment.to_bytes())?;
                inner.accounts.insert(pool, state.to_account_data()?);
                Self::credit(inner, &vault_token_account, amount);
            }

            PoolInstruction::Transfer {
                nullifier,
                new_commitment,
                proof,
            } => {
                let mut state = Self::load_pool(inner, &pool)?;
                let marker = self.check_marker(inner, instruction, &pool, &nullifier)?;
                let inputs = PublicInputs::Transfer {
                    nullifier,
                    new_commitment,
                    root: state.current_root(),
                };
                self.check_proof(&proof, &inputs)?;

                state.record_nullifier_spent();
                state.add_commitment(new_commitment.to_bytes())?;
                let marker_data = spent_marker(&pool, &nullifier, slot).to_account_data()?;
                inner.accounts.insert(marker, marker_data);
                inner.accounts.insert(pool, state.to_account_data()?);
            }

            PoolInstruction::UnshieldNative {
                nullifier,
                amount,
                proof,
            } => {
                let mut state = Self::load_pool(inner, &pool)?;
                if amount == 0 {
                    return Err(Self::rejected("invalid amount"));
                }
                let marker = self.check_marker(inner, instruction, &pool, &nullifier)?;
                Self::expect_account(instruction, 2, &vault, "vault")?;
                let recipient = Self::account_at(instruction, 3)?;
                let inputs = PublicInputs::Unshield {
                    nullifier,
                    recipient,
                    amount,
                    root: state.current_root(),
                };
                self.check_proof(&proof, &inputs)?;

                Self::debit(inner, &vault, amount)?;
                Self::credit(inner, &recipient, amount);
                state.record_nullifier_spent();
                let marker_data = spent_marker(&pool, &nullifier, slot).to_account_data()?;
                inner.accounts.insert(marker, marker_data);
                inner.accounts.insert(pool, state.to_account_data()?);
            }

            PoolInstruction::UnshieldAsset {
                nullifier,
                amount,
                proof,
            } => {
                let mut state = Self::load_pool(inner, &pool)?;
                if amount == 0 {
                    return Err(Self::rejected("invalid amount"));
                }
                let marker = self.check_marker(inner, instruction, &pool, &nullifier)?;
                Self::expect_account(instruction, 2, &vault, "vault authority")?;
                let vault_token_account = Self::account_at(instruction, 3)?;
                let recipient_token_account = Self::account_at(instruction, 4)?;
                let recipient = *inner
                    .token_owners
                    .get(&recipient_token_account)
                    .ok_or_else(|| Self::rejected("recipient token account does not exist"))?;
                let inputs = PublicInputs::Unshield {
                    nullifier,
                    recipient,
                    amount,
                    root: state.current_root(),
                };
                self.check_proof(&proof, &inputs)?;

                Self::debit(inner, &vault_token_account, amount)?;
                Self::credit(inner, &recipient_token_account, amount);
                state.record_nullifier_spent();
                let marker_data = spent_marker(&pool, &nullifier, slot).to_account_data()?;
                inner.accounts.insert(marker, marker_data);
                inner.accounts.insert(pool, state.to_account_data()?);
            }
        }

        Ok(())
    }
}

fn spent_marker(pool: &Pubkey, nullifier: &Nullifier, slot: u64) -> NullifierMarker {
    NullifierMarker {
        pool: pool.to_bytes(),
        nullifier: nullifier.to_bytes(),
        spent_at: slot,
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn get_account(&self, address: &Pubkey) -> LedgerResult<Option<Vec<u8>>> {
        Ok(self.inner.read().await.accounts.get(address).cloned())
    }

    async fn get_latest_root(&self, pool: &Pubkey) -> LedgerResult<[u8; 32]> {
        let inner = self.inner.read().await;
        let data = inner.accounts.get(pool).ok_or(LedgerError::PoolNotInitialized)?;
        root_from_account_data(data)
    }

    async fn submit(&self, instruction: Instruction, signer: &Keypair) -> LedgerResult<Signature> {
        if instruction.program_id != *self.deriver.program_id() {
            return Err(Self::rejected(format!(
                "unknown program {}",
                instruction.program_id
            )));
        }
        let payer = signer.pubkey();
        let signed = instruction
            .accounts
            .iter()
            .any(|meta| meta.pubkey == payer && meta.is_signer);
        if !signed {
            return Err(Self::rejected(format!("missing signature for {}", payer)));
        }

        let mut inner = self.inner.write().await;
        let slot_before = inner.slot;
        if let Err(e) = self.apply(&mut inner, &instruction, &payer) {
            inner.slot = slot_before;
            return Err(e);
        }

        let mut message = instruction.data.clone();
        message.extend_from_slice(&inner.slot.to_le_bytes());
        Ok(signer.sign_message(&message))
    }
}
