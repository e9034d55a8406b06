//! Privacy Protocol Orchestrator
//!
//! Drives the shield, transfer and unshield state machines:
//!
//! ```text
//! shield:   draft -> commitment_computed -> submitted -> confirmed | failed
//! transfer: draft -> sender_commitment_resolved -> nullifier_computed
//!           -> recipient_commitment_computed -> root_fetched -> proof_computed
//!           -> submitted -> confirmed | failed
//! unshield: draft -> nullifier_computed -> root_fetched -> proof_computed
//!           -> submitted -> confirmed | failed
//! ```
//!
//! Requests are validated before any crypto or ledger call. Only ledger
//! calls are bounded by the configured timeout, and nothing is retried
//! here. A spent nullifier is reported as `VeilError::Conflict`, whether it
//! is caught by the marker check before submission or by the ledger itself.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use solana_sdk::{
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
};

use crate::common::config::{ConfigError, Network, VeilConfig};
use crate::common::error::{Operation, Result, VeilError};
use crate::common::logging::{
    generate_correlation_id, log_operation_event, log_security_event, short_hex,
};
use crate::crypto::{Blake3Primitives, CryptoPrimitives};
use crate::instructions::InstructionEncoder;
use crate::ledger::{Ledger, LedgerError, LedgerResult, PoolState};
use crate::proof::{
    ProofAdapter, ProofScheme, PublicInputs, SpendWitness, TransferWitness, UnshieldWitness,
};
use crate::types::{
    Asset, Commitment, Nullifier, PrivateTransaction, Secret, ShieldRequest, TransactionStatus,
    TransferRequest, UnshieldRequest,
};

// ============================================================================
// Stages
// ============================================================================

macro_rules! stage_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $($variant),*
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label),*
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

stage_enum!(
    /// Shield state machine
    ShieldStage {
        Draft => "draft",
        CommitmentComputed => "commitment_computed",
        Submitted => "submitted",
        Confirmed => "confirmed",
        Failed => "failed",
    }
);

stage_enum!(
    /// Private transfer state machine
    TransferStage {
        Draft => "draft",
        SenderCommitmentResolved => "sender_commitment_resolved",
        NullifierComputed => "nullifier_computed",
        RecipientCommitmentComputed => "recipient_commitment_computed",
        RootFetched => "root_fetched",
        ProofComputed => "proof_computed",
        Submitted => "submitted",
        Confirmed => "confirmed",
        Failed => "failed",
    }
);

stage_enum!(
    /// Unshield state machine
    UnshieldStage {
        Draft => "draft",
        NullifierComputed => "nullifier_computed",
        RootFetched => "root_fetched",
        ProofComputed => "proof_computed",
        Submitted => "submitted",
        Confirmed => "confirmed",
        Failed => "failed",
    }
);

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Submitted,
    Confirmed,
    Failed,
}

fn outcome_stage(operation: Operation, outcome: Outcome) -> &'static str {
    match (operation, outcome) {
        (Operation::Shield, Outcome::Submitted) => ShieldStage::Submitted.as_str(),
        (Operation::Shield, Outcome::Confirmed) => ShieldStage::Confirmed.as_str(),
        (Operation::Shield, Outcome::Failed) => ShieldStage::Failed.as_str(),
        (Operation::Transfer, Outcome::Submitted) => TransferStage::Submitted.as_str(),
        (Operation::Transfer, Outcome::Confirmed) => TransferStage::Confirmed.as_str(),
        (Operation::Transfer, Outcome::Failed) => TransferStage::Failed.as_str(),
        (_, Outcome::Submitted) => UnshieldStage::Submitted.as_str(),
        (_, Outcome::Confirmed) => UnshieldStage::Confirmed.as_str(),
        (_, Outcome::Failed) => UnshieldStage::Failed.as_str(),
    }
}

fn trace_stage(operation: Operation, correlation_id: &str, stage: impl fmt::Display) {
    tracing::debug!(
        operation = %operation,
        correlation_id = %correlation_id,
        stage = %stage,
        "stage transition"
    );
}

// ============================================================================
// Prepared transactions
// ============================================================================

/// Fully built instruction that has not been submitted
#[derive(Debug, Clone)]
pub struct PreparedTransaction {
    pub operation: Operation,
    pub correlation_id: String,
    pub instruction: Instruction,
    /// Result fields known before submission; status is `Pending`
    pub transaction: PrivateTransaction,
}

// ============================================================================
// Protocol
// ============================================================================

/// Client-side privacy pool protocol
///
/// Holds no mutable state; share it behind an `Arc` to run operations
/// concurrently.
pub struct PrivacyProtocol {
    config: VeilConfig,
    encoder: InstructionEncoder,
    ledger: Arc<dyn Ledger>,
    prover: Arc<dyn ProofAdapter>,
    crypto: Arc<dyn CryptoPrimitives>,
}

impl PrivacyProtocol {
    /// Create a protocol over a ledger and a proof adapter
    ///
    /// The adapter's scheme must match `config.proof_scheme`. Mainnet
    /// configurations must also pass `VeilConfig::validate_for_production`.
    pub fn new(
        config: VeilConfig,
        ledger: Arc<dyn Ledger>,
        prover: Arc<dyn ProofAdapter>,
    ) -> Result<Self> {
        if prover.scheme() != config.proof_scheme {
            return Err(ConfigError::InvalidValue(
                "VEIL_PROOF_SCHEME".to_string(),
                format!(
                    "configured {} but adapter provides {}",
                    config.proof_scheme,
                    prover.scheme()
                ),
            )
            .into());
        }
        if config.network == Network::Mainnet {
            config.validate_for_production()?;
        }
        let encoder = InstructionEncoder::new(config.program_id)?;

        Ok(Self {
            config,
            encoder,
            ledger,
            prover,
            crypto: Arc::new(Blake3Primitives::new()),
        })
    }

    /// Replace the commitment backend
    pub fn with_crypto(mut self, crypto: Arc<dyn CryptoPrimitives>) -> Self {
        self.crypto = crypto;
        self
    }

    pub fn config(&self) -> &VeilConfig {
        &self.config
    }

    pub fn encoder(&self) -> &InstructionEncoder {
        &self.encoder
    }

    pub fn pool_address(&self) -> &Pubkey {
        self.encoder.pool()
    }

    pub fn scheme(&self) -> ProofScheme {
        self.prover.scheme()
    }

    // ========================================================================
    // Primitives
    // ========================================================================

    /// Commitment for `(amount, secret)`
    pub fn commit(&self, operation: Operation, amount: u64, secret: &Secret) -> Result<Commitment> {
        self.crypto
            .commit(amount, secret)
            .map_err(|e| VeilError::crypto(operation, "commitment", e))
    }

    /// Nullifier for a commitment and its secret
    pub fn derive_nullifier(
        &self,
        operation: Operation,
        commitment: &Commitment,
        secret: &Secret,
    ) -> Result<Nullifier> {
        self.crypto
            .derive_nullifier(commitment, secret)
            .map_err(|e| VeilError::crypto(operation, "nullifier", e))
    }

    /// Run a ledger call under the configured timeout
    async fn bounded<T, F>(
        &self,
        operation: Operation,
        nullifier: Option<&Nullifier>,
        call: F,
    ) -> Result<T>
    where
        F: Future<Output = LedgerResult<T>>,
    {
        match tokio::time::timeout(self.config.rpc_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(VeilError::ledger(operation, e, nullifier)),
            Err(_) => Err(VeilError::Transport {
                operation,
                source: LedgerError::Timeout(self.config.rpc_timeout.as_secs()),
            }),
        }
    }

    fn report_failure(&self, operation: Operation, correlation_id: &str, error: &VeilError) {
        if let VeilError::Conflict { nullifier, .. } = error {
            log_security_event(
                "nullifier_conflict",
                false,
                serde_json::json!({
                    "operation": operation.as_str(),
                    "nullifier": &nullifier[..nullifier.len().min(16)],
                }),
                Some(correlation_id),
            );
        }
        log_operation_event(
            operation,
            correlation_id,
            serde_json::json!({ "field": error.field() }),
            Some((error.error_code(), &error.to_string())),
        );
    }

    // ========================================================================
    // Pool
    // ========================================================================

    /// Create the pool account with `authority` as its authority
    pub async fn initialize_pool(&self, authority: &Keypair) -> Result<Signature> {
        let correlation_id = generate_correlation_id();
        let instruction = self.encoder.initialize(&authority.pubkey());

        let result = self
            .bounded(
                Operation::Initialize,
                None,
                self.ledger.submit(instruction, authority),
            )
            .await;

        match &result {
            Ok(signature) => log_operation_event(
                Operation::Initialize,
                &correlation_id,
                serde_json::json!({
                    "pool": self.pool_address().to_string(),
                    "signature": signature.to_string(),
                }),
                None,
            ),
            Err(e) => self.report_failure(Operation::Initialize, &correlation_id, e),
        }
        result
    }

    // ========================================================================
    // Shield
    // ========================================================================

    /// Build a shield instruction without submitting it
    pub fn prepare_shield(
        &self,
        request: &ShieldRequest,
        depositor: &Pubkey,
    ) -> Result<PreparedTransaction> {
        let correlation_id = generate_correlation_id();
        let op = Operation::Shield;
        trace_stage(op, &correlation_id, ShieldStage::Draft);

        let result = self.build_shield(request, depositor, &correlation_id);
        if let Err(e) = &result {
            trace_stage(op, &correlation_id, ShieldStage::Failed);
            self.report_failure(op, &correlation_id, e);
        }
        let (instruction, transaction) = result?;

        Ok(PreparedTransaction {
            operation: op,
            correlation_id,
            instruction,
            transaction,
        })
    }

    fn build_shield(
        &self,
        request: &ShieldRequest,
        depositor: &Pubkey,
        correlation_id: &str,
    ) -> Result<(Instruction, PrivateTransaction)> {
        let op = Operation::Shield;
        let params = request.validate()?;

        let secret = params.secret.unwrap_or_else(Secret::generate);
        let commitment = self.commit(op, params.amount, &secret)?;
        trace_stage(op, correlation_id, ShieldStage::CommitmentComputed);

        let instruction = match params.asset {
            Asset::Native => self.encoder.shield_native(depositor, commitment, params.amount),
            Asset::Token(mint) => {
                self.encoder
                    .shield_asset(depositor, &mint, commitment, params.amount)
            }
        };

        let mut transaction = PrivateTransaction::new(String::new(), TransactionStatus::Pending);
        transaction.commitment = Some(commitment);
        transaction.secret = secret.expose_str().map(str::to_string);
        Ok((instruction, transaction))
    }

    /// Shield assets into the pool
    pub async fn shield(
        &self,
        request: &ShieldRequest,
        depositor: &Keypair,
    ) -> Result<PrivateTransaction> {
        let prepared = self.prepare_shield(request, &depositor.pubkey())?;
        self.submit_prepared(prepared, depositor).await
    }

    // ========================================================================
    // Transfer
    // ========================================================================

    /// Build a transfer instruction without submitting it
    ///
    /// Reads the current root, so this still needs the ledger.
    pub async fn prepare_transfer(
        &self,
        request: &TransferRequest,
        sender: &Keypair,
    ) -> Result<PreparedTransaction> {
        let correlation_id = generate_correlation_id();
        let op = Operation::Transfer;
        trace_stage(op, &correlation_id, TransferStage::Draft);

        let result = self.build_transfer(request, sender, &correlation_id).await;
        if let Err(e) = &result {
            trace_stage(op, &correlation_id, TransferStage::Failed);
            self.report_failure(op, &correlation_id, e);
        }
        let (instruction, transaction) = result?;

        Ok(PreparedTransaction {
            operation: op,
            correlation_id,
            instruction,
            transaction,
        })
    }

    async fn build_transfer(
        &self,
        request: &TransferRequest,
        sender: &Keypair,
        correlation_id: &str,
    ) -> Result<(Instruction, PrivateTransaction)> {
        let op = Operation::Transfer;
        let params = request.validate()?;

        let sender_commitment = match params.sender_commitment {
            Some(commitment) => commitment,
            None => self.commit(op, params.amount, &params.sender_secret)?,
        };
        trace_stage(op, correlation_id, TransferStage::SenderCommitmentResolved);

        let nullifier = self.derive_nullifier(op, &sender_commitment, &params.sender_secret)?;
        trace_stage(op, correlation_id, TransferStage::NullifierComputed);

        let recipient_secret = Secret::generate();
        let new_commitment = self.commit(op, params.amount, &recipient_secret)?;
        trace_stage(op, correlation_id, TransferStage::RecipientCommitmentComputed);

        let root = self
            .bounded(op, None, self.ledger.get_latest_root(self.encoder.pool()))
            .await?;
        trace_stage(op, correlation_id, TransferStage::RootFetched);

        let witness = SpendWitness::Transfer(TransferWitness {
            nullifier,
            new_commitment,
            root,
            commitment: sender_commitment,
            amount: params.amount,
            secret: params.sender_secret,
        });
        let proof = self
            .prover
            .prove(&witness, sender)
            .map_err(|e| VeilError::proof(op, e))?;
        trace_stage(op, correlation_id, TransferStage::ProofComputed);

        let instruction = self
            .encoder
            .transfer(&sender.pubkey(), nullifier, new_commitment, proof.clone())?;

        let mut transaction = PrivateTransaction::new(String::new(), TransactionStatus::Pending);
        transaction.nullifier = Some(nullifier);
        transaction.commitment = Some(new_commitment);
        transaction.proof = Some(proof);
        transaction.recipient_secret = recipient_secret.expose_str().map(str::to_string);
        Ok((instruction, transaction))
    }

    /// Spend a commitment into a fresh commitment for the recipient
    ///
    /// The recipient secret in the result is the only way to spend the new
    /// commitment; the caller must hand it to the recipient.
    pub async fn transfer(
        &self,
        request: &TransferRequest,
        sender: &Keypair,
    ) -> Result<PrivateTransaction> {
        let prepared = self.prepare_transfer(request, sender).await?;
        self.submit_prepared(prepared, sender).await
    }

    // ========================================================================
    // Unshield
    // ========================================================================

    /// Build an unshield instruction without submitting it
    pub async fn prepare_unshield(
        &self,
        request: &UnshieldRequest,
        owner: &Keypair,
    ) -> Result<PreparedTransaction> {
        let correlation_id = generate_correlation_id();
        let op = Operation::Unshield;
        trace_stage(op, &correlation_id, UnshieldStage::Draft);

        let result = self.build_unshield(request, owner, &correlation_id).await;
        if let Err(e) = &result {
            trace_stage(op, &correlation_id, UnshieldStage::Failed);
            self.report_failure(op, &correlation_id, e);
        }
        let (instruction, transaction) = result?;

        Ok(PreparedTransaction {
            operation: op,
            correlation_id,
            instruction,
            transaction,
        })
    }

    async fn build_unshield(
        &self,
        request: &UnshieldRequest,
        owner: &Keypair,
        correlation_id: &str,
    ) -> Result<(Instruction, PrivateTransaction)> {
        let op = Operation::Unshield;
        let params = request.validate()?;

        let commitment = match params.commitment {
            Some(commitment) => commitment,
            None => self.commit(op, params.amount, &params.owner_secret)?,
        };
        let nullifier = self.derive_nullifier(op, &commitment, &params.owner_secret)?;
        trace_stage(op, correlation_id, UnshieldStage::NullifierComputed);

        let root = self
            .bounded(op, None, self.ledger.get_latest_root(self.encoder.pool()))
            .await?;
        trace_stage(op, correlation_id, UnshieldStage::RootFetched);

        let witness = SpendWitness::Unshield(UnshieldWitness {
            nullifier,
            recipient: params.destination,
            amount: params.amount,
            root,
            commitment,
            secret: params.owner_secret,
        });
        let proof = self
            .prover
            .prove(&witness, owner)
            .map_err(|e| VeilError::proof(op, e))?;
        trace_stage(op, correlation_id, UnshieldStage::ProofComputed);

        let relayer = owner.pubkey();
        let instruction = match params.asset {
            Asset::Native => self.encoder.unshield_native(
                &relayer,
                &params.destination,
                nullifier,
                params.amount,
                proof.clone(),
            )?,
            Asset::Token(mint) => self.encoder.unshield_asset(
                &relayer,
                &params.destination,
                &mint,
                nullifier,
                params.amount,
                proof.clone(),
            )?,
        };

        let mut transaction = PrivateTransaction::new(String::new(), TransactionStatus::Pending);
        transaction.nullifier = Some(nullifier);
        transaction.proof = Some(proof);
        Ok((instruction, transaction))
    }

    /// Withdraw to a public destination
    pub async fn unshield(
        &self,
        request: &UnshieldRequest,
        owner: &Keypair,
    ) -> Result<PrivateTransaction> {
        let prepared = self.prepare_unshield(request, owner).await?;
        self.submit_prepared(prepared, owner).await
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Submit a prepared transaction with `signer` as fee payer
    ///
    /// Spends are checked against the nullifier marker first; an existing
    /// marker is a conflict and nothing is sent.
    pub async fn submit_prepared(
        &self,
        prepared: PreparedTransaction,
        signer: &Keypair,
    ) -> Result<PrivateTransaction> {
        let PreparedTransaction {
            operation,
            correlation_id,
            instruction,
            mut transaction,
        } = prepared;

        let result = self
            .send(operation, &correlation_id, instruction, transaction.nullifier.as_ref(), signer)
            .await;

        match result {
            Ok(signature) => {
                let stage = outcome_stage(operation, Outcome::Confirmed);
                trace_stage(operation, &correlation_id, stage);
                transaction.signature = signature.to_string();
                transaction.status = TransactionStatus::Confirmed;
                log_operation_event(
                    operation,
                    &correlation_id,
                    serde_json::json!({
                        "signature": transaction.signature,
                        "commitment": transaction.commitment.map(|c| short_hex(c.as_bytes())),
                        "nullifier": transaction.nullifier.map(|n| short_hex(n.as_bytes())),
                    }),
                    None,
                );
                Ok(transaction)
            }
            Err(e) => {
                trace_stage(operation, &correlation_id, outcome_stage(operation, Outcome::Failed));
                self.report_failure(operation, &correlation_id, &e);
                Err(e)
            }
        }
    }

    async fn send(
        &self,
        operation: Operation,
        correlation_id: &str,
        instruction: Instruction,
        nullifier: Option<&Nullifier>,
        signer: &Keypair,
    ) -> Result<Signature> {
        if let Some(nullifier) = nullifier {
            if self.marker_exists(operation, nullifier).await? {
                return Err(VeilError::conflict(operation, nullifier));
            }
        }

        trace_stage(operation, correlation_id, outcome_stage(operation, Outcome::Submitted));
        self.bounded(operation, nullifier, self.ledger.submit(instruction, signer))
            .await
    }

    async fn marker_exists(&self, operation: Operation, nullifier: &Nullifier) -> Result<bool> {
        let marker = self.encoder.nullifier_marker(nullifier)?;
        let account = self
            .bounded(operation, None, self.ledger.get_account(&marker))
            .await?;
        Ok(account.is_some())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Whether the nullifier's marker exists on the ledger
    pub async fn is_nullifier_spent(&self, nullifier: &Nullifier) -> Result<bool> {
        self.marker_exists(Operation::Query, nullifier).await
    }

    /// Current Merkle root of the pool
    pub async fn get_merkle_root(&self) -> Result<[u8; 32]> {
        self.bounded(
            Operation::Query,
            None,
            self.ledger.get_latest_root(self.encoder.pool()),
        )
        .await
    }

    /// Parsed pool account
    pub async fn pool_state(&self) -> Result<PoolState> {
        let op = Operation::Query;
        let data = self
            .bounded(op, None, self.ledger.get_account(self.encoder.pool()))
            .await?
            .ok_or(VeilError::Transport {
                operation: op,
                source: LedgerError::PoolNotInitialized,
            })?;
        PoolState::from_account_data(&data).map_err(|source| VeilError::Transport {
            operation: op,
            source,
        })
    }

    /// Check a proof against public inputs with the configured scheme
    pub fn verify_proof(&self, proof: &[u8], inputs: &PublicInputs) -> Result<bool> {
        let valid = self
            .prover
            .verify(proof, inputs)
            .map_err(|e| VeilError::proof(Operation::Query, e))?;
        if !valid {
            log_security_event(
                "proof_rejected",
                false,
                serde_json::json!({
                    "scheme": self.prover.scheme().to_string(),
                    "nullifier": short_hex(inputs.nullifier().as_bytes()),
                }),
                None,
            );
        }
        Ok(valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MockLedger;
    use crate::proof::{MockProofAdapter, ProofError, SignatureProofAdapter};
    use std::time::Duration;

    const SECRET: &str = "my_super_secret_key_32_bytes_long!!";

    fn protocol(ledger: MockLedger) -> PrivacyProtocol {
        PrivacyProtocol::new(
            VeilConfig::default().with_program_id(Pubkey::new_unique()),
            Arc::new(ledger),
            Arc::new(SignatureProofAdapter::new()),
        )
        .unwrap()
    }

    fn transfer_request(amount: u64) -> TransferRequest {
        TransferRequest {
            recipient: Pubkey::new_unique().to_string(),
            amount,
            sender_secret: SECRET.to_string(),
            sender_commitment: None,
        }
    }

    #[test]
    fn test_scheme_must_match_config() {
        let mut config = VeilConfig::default();
        config.proof_scheme = ProofScheme::ZeroKnowledge;
        let result = PrivacyProtocol::new(
            config,
            Arc::new(MockLedger::new()),
            Arc::new(SignatureProofAdapter::new()),
        );
        assert!(matches!(result, Err(VeilError::Config(_))));
    }

    #[test]
    fn test_mainnet_refuses_signature_scheme() {
        let config =
            VeilConfig::for_network(Network::Mainnet).with_program_id(Pubkey::new_unique());
        let result = PrivacyProtocol::new(
            config.clone(),
            Arc::new(MockLedger::new()),
            Arc::new(SignatureProofAdapter::new()),
        );
        assert!(matches!(
            result,
            Err(VeilError::Config(ConfigError::InsecureProofScheme(_, _)))
        ));

        let mut config = config;
        config.proof_scheme = ProofScheme::ZeroKnowledge;
        let mut prover = MockProofAdapter::new();
        prover.expect_scheme().return_const(ProofScheme::ZeroKnowledge);
        let result = PrivacyProtocol::new(config, Arc::new(MockLedger::new()), Arc::new(prover));
        assert!(result.is_ok());
    }

    #[test]
    fn test_prepare_shield_layout_and_secret() {
        let protocol = protocol(MockLedger::new());
        let depositor = Pubkey::new_unique();
        let prepared = protocol
            .prepare_shield(&ShieldRequest::native(1000).with_secret(SECRET), &depositor)
            .unwrap();

        let commitment = prepared.transaction.commitment.unwrap();
        assert_eq!(
            commitment,
            protocol.commit(Operation::Shield, 1000, &SECRET.parse().unwrap()).unwrap()
        );
        assert_eq!(prepared.instruction.data.len(), 48);
        assert_eq!(&prepared.instruction.data[8..40], commitment.as_bytes());
        assert_eq!(prepared.transaction.secret.as_deref(), Some(SECRET));
        assert_eq!(prepared.transaction.status, TransactionStatus::Pending);

        // Secrets never reach the instruction payload
        let data = &prepared.instruction.data;
        assert!(!data.windows(SECRET.len()).any(|w| w == SECRET.as_bytes()));
    }

    #[test]
    fn test_shield_generates_secret_when_absent() {
        let protocol = protocol(MockLedger::new());
        let prepared = protocol
            .prepare_shield(&ShieldRequest::native(5), &Pubkey::new_unique())
            .unwrap();
        assert_eq!(prepared.transaction.secret.as_ref().map(String::len), Some(64));
    }

    #[tokio::test]
    async fn test_validation_precedes_ledger_calls() {
        // No expectations: any ledger call would panic
        let protocol = protocol(MockLedger::new());
        let sender = Keypair::new();

        let err = protocol.transfer(&transfer_request(0), &sender).await.unwrap_err();
        assert_eq!(err.field(), Some("amount"));

        let mut request = transfer_request(10);
        request.recipient = "0OIl".to_string();
        let err = protocol.transfer(&request, &sender).await.unwrap_err();
        assert_eq!(err.field(), Some("recipient"));

        let err = protocol
            .shield(&ShieldRequest::native(10).with_secret("short"), &sender)
            .await
            .unwrap_err();
        assert!(matches!(err, VeilError::Validation { operation: Operation::Shield, .. }));
    }

    #[tokio::test]
    async fn test_transfer_happy_path() {
        let mut ledger = MockLedger::new();
        ledger.expect_get_latest_root().times(1).returning(|_| Ok([7u8; 32]));
        ledger.expect_get_account().times(1).returning(|_| Ok(None));
        ledger
            .expect_submit()
            .times(1)
            .returning(|_, _| Ok(Signature::default()));

        let protocol = protocol(ledger);
        let sender = Keypair::new();
        let tx = protocol.transfer(&transfer_request(500), &sender).await.unwrap();

        assert_eq!(tx.status, TransactionStatus::Confirmed);
        let inputs = PublicInputs::Transfer {
            nullifier: tx.nullifier.unwrap(),
            new_commitment: tx.commitment.unwrap(),
            root: [7u8; 32],
        };
        assert!(protocol.verify_proof(tx.proof.as_ref().unwrap(), &inputs).unwrap());
        assert_eq!(tx.recipient_secret.as_ref().map(String::len), Some(64));
    }

    #[tokio::test]
    async fn test_existing_marker_is_conflict_without_submit() {
        let mut ledger = MockLedger::new();
        ledger.expect_get_latest_root().returning(|_| Ok([1u8; 32]));
        ledger.expect_get_account().returning(|_| Ok(Some(vec![0u8; 80])));
        ledger.expect_submit().times(0);

        let protocol = protocol(ledger);
        let err = protocol
            .transfer(&transfer_request(500), &Keypair::new())
            .await
            .unwrap_err();
        assert!(matches!(err, VeilError::Conflict { operation: Operation::Transfer, .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_account_in_use_on_submit_is_conflict() {
        let mut ledger = MockLedger::new();
        ledger.expect_get_latest_root().returning(|_| Ok([1u8; 32]));
        ledger.expect_get_account().returning(|_| Ok(None));
        ledger
            .expect_submit()
            .returning(|_, _| Err(LedgerError::AccountInUse("marker".into())));

        let protocol = protocol(ledger);
        let request = UnshieldRequest {
            amount: 100,
            destination: Pubkey::new_unique().to_string(),
            owner_secret: SECRET.to_string(),
            commitment: None,
            token: "SOL".to_string(),
        };
        let err = protocol.unshield(&request, &Keypair::new()).await.unwrap_err();
        assert_eq!(err.error_code(), "NULLIFIER_CONFLICT");
    }

    #[tokio::test]
    async fn test_transport_errors_are_retryable() {
        let mut ledger = MockLedger::new();
        ledger
            .expect_get_latest_root()
            .returning(|_| Err(LedgerError::Rpc("connection refused".into())));

        let protocol = protocol(ledger);
        let err = protocol
            .transfer(&transfer_request(500), &Keypair::new())
            .await
            .unwrap_err();
        assert!(matches!(err, VeilError::Transport { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_ledger_calls_time_out() {
        struct StalledLedger;

        #[async_trait::async_trait]
        impl Ledger for StalledLedger {
            async fn get_account(&self, _: &Pubkey) -> LedgerResult<Option<Vec<u8>>> {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(None)
            }

            async fn get_latest_root(&self, _: &Pubkey) -> LedgerResult<[u8; 32]> {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok([0u8; 32])
            }

            async fn submit(&self, _: Instruction, _: &Keypair) -> LedgerResult<Signature> {
                Ok(Signature::default())
            }
        }

        let config = VeilConfig::default().with_rpc_timeout(Duration::from_millis(20));
        let protocol = PrivacyProtocol::new(
            config,
            Arc::new(StalledLedger),
            Arc::new(SignatureProofAdapter::new()),
        )
        .unwrap();

        let err = protocol.get_merkle_root().await.unwrap_err();
        assert!(matches!(
            err,
            VeilError::Transport {
                source: LedgerError::Timeout(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_proof_errors_propagate() {
        let mut ledger = MockLedger::new();
        ledger.expect_get_latest_root().returning(|_| Ok([1u8; 32]));
        ledger.expect_submit().times(0);

        let mut prover = MockProofAdapter::new();
        prover.expect_scheme().return_const(ProofScheme::Signature);
        prover
            .expect_prove()
            .returning(|_, _| Err(ProofError::Backend("prover offline".into())));

        let protocol = PrivacyProtocol::new(
            VeilConfig::default(),
            Arc::new(ledger),
            Arc::new(prover),
        )
        .unwrap();
        let err = protocol
            .transfer(&transfer_request(5), &Keypair::new())
            .await
            .unwrap_err();
        assert!(matches!(err, VeilError::Proof { operation: Operation::Transfer, .. }));
    }

    #[tokio::test]
    async fn test_pool_state_missing_pool() {
        let mut ledger = MockLedger::new();
        ledger.expect_get_account().returning(|_| Ok(None));
        let protocol = protocol(ledger);
        assert!(matches!(
            protocol.pool_state().await,
            Err(VeilError::Transport {
                source: LedgerError::PoolNotInitialized,
                ..
            })
        ));
    }

    #[test]
    fn test_stage_labels() {
        assert_eq!(
            TransferStage::RecipientCommitmentComputed.to_string(),
            "recipient_commitment_computed"
        );
        assert_eq!(outcome_stage(Operation::Unshield, Outcome::Failed), "failed");
        assert_eq!(ShieldStage::CommitmentComputed.as_str(), "commitment_computed");
    }
}
