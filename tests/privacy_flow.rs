//! End-to-end flows against the in-memory pool program
//!
//! The ledger verifies every proof against its current root, so these runs
//! exercise the same checks the deployed program performs.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use veil::proof::{ProvingBackend, GROTH16_PROOF_SIZE};
use veil::{
    Commitment, Ledger, MemoryLedger, Operation, PrivacyProtocol, ProofAdapter, ProofError,
    ProofScheme, PublicInputs, ShieldRequest, SignatureProofAdapter, SpendWitness,
    TransactionStatus, TransferRequest, UnshieldRequest, VeilConfig, VeilError, ZkProofAdapter,
};

const SENDER_SECRET: &str = "my_super_secret_key_32_bytes_long!!";

struct Harness {
    ledger: MemoryLedger,
    protocol: Arc<PrivacyProtocol>,
    payer: Keypair,
}

async fn harness_with(config: VeilConfig, prover: Arc<dyn ProofAdapter>) -> Harness {
    let ledger = MemoryLedger::with_verifier(config.program_id, prover.clone());
    let protocol = PrivacyProtocol::new(config, Arc::new(ledger.clone()), prover).unwrap();
    let payer = Keypair::new();
    protocol.initialize_pool(&payer).await.unwrap();
    Harness {
        ledger,
        protocol: Arc::new(protocol),
        payer,
    }
}

async fn harness() -> Harness {
    let config = VeilConfig::default().with_program_id(Pubkey::new_unique());
    harness_with(config, Arc::new(SignatureProofAdapter::new())).await
}

fn transfer_request(amount: u64, secret: &str) -> TransferRequest {
    TransferRequest {
        recipient: Pubkey::new_unique().to_string(),
        amount,
        sender_secret: secret.to_string(),
        sender_commitment: None,
    }
}

#[tokio::test]
async fn test_shield_transfer_unshield() {
    let h = harness().await;
    let vault = *h.protocol.encoder().vault();

    // Shield 1000 lamports
    let shield = h
        .protocol
        .shield(&ShieldRequest::native(1000).with_secret(SENDER_SECRET), &h.payer)
        .await
        .unwrap();
    assert_eq!(shield.status, TransactionStatus::Confirmed);
    let c1 = shield.commitment.unwrap();
    assert_eq!(h.ledger.balance(&vault).await, 1000);

    let state = h.protocol.pool_state().await.unwrap();
    assert_eq!(state.commitment_count(), 1);
    let root_after_shield = h.protocol.get_merkle_root().await.unwrap();
    assert_eq!(root_after_shield, state.current_root());

    // Transfer 500 to a fresh commitment
    let mut request = transfer_request(500, SENDER_SECRET);
    request.sender_commitment = Some(c1.to_hex());
    let transfer = h.protocol.transfer(&request, &h.payer).await.unwrap();
    let n1 = transfer.nullifier.unwrap();
    let c2 = transfer.commitment.unwrap();
    let s2 = transfer.recipient_secret.clone().unwrap();
    assert_ne!(c1, c2);

    let inputs = PublicInputs::Transfer {
        nullifier: n1,
        new_commitment: c2,
        root: root_after_shield,
    };
    assert!(h
        .protocol
        .verify_proof(transfer.proof.as_ref().unwrap(), &inputs)
        .unwrap());
    assert!(h.protocol.is_nullifier_spent(&n1).await.unwrap());

    let state = h.protocol.pool_state().await.unwrap();
    assert_eq!(state.commitment_count(), 2);
    assert_eq!(state.nullifier_count, 1);

    // The recipient unshields with the secret handed over
    let destination = Pubkey::new_unique();
    let unshield = h
        .protocol
        .unshield(
            &UnshieldRequest {
                amount: 500,
                destination: destination.to_string(),
                owner_secret: s2,
                commitment: Some(c2.to_hex()),
                token: "SOL".to_string(),
            },
            &h.payer,
        )
        .await
        .unwrap();
    let n2 = unshield.nullifier.unwrap();
    assert_ne!(n1, n2);
    assert!(unshield.is_confirmed());
    assert_eq!(h.ledger.balance(&destination).await, 500);
    assert_eq!(h.ledger.balance(&vault).await, 500);
}

#[tokio::test]
async fn test_replayed_transfer_is_conflict() {
    let h = harness().await;
    h.protocol
        .shield(&ShieldRequest::native(1000).with_secret(SENDER_SECRET), &h.payer)
        .await
        .unwrap();

    let request = transfer_request(1000, SENDER_SECRET);
    let first = h.protocol.transfer(&request, &h.payer).await.unwrap();
    let slot = h.ledger.slot().await;

    let err = h.protocol.transfer(&request, &h.payer).await.unwrap_err();
    match &err {
        VeilError::Conflict {
            operation,
            nullifier,
        } => {
            assert_eq!(*operation, Operation::Transfer);
            assert_eq!(*nullifier, first.nullifier.unwrap().to_hex());
        }
        other => panic!("expected conflict, got {:?}", other),
    }
    assert!(!err.is_retryable());
    // Nothing was submitted for the replay
    assert_eq!(h.ledger.slot().await, slot);
}

#[tokio::test]
async fn test_invalid_requests_leave_ledger_untouched() {
    let h = harness().await;
    let slot = h.ledger.slot().await;

    let err = h
        .protocol
        .shield(&ShieldRequest::native(0), &h.payer)
        .await
        .unwrap_err();
    assert_eq!(err.field(), Some("amount"));

    let err = h
        .protocol
        .shield(&ShieldRequest::native(10).with_secret("too short"), &h.payer)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "VALIDATION_ERROR");

    let mut request = transfer_request(10, SENDER_SECRET);
    request.recipient = "not-an-address".to_string();
    let err = h.protocol.transfer(&request, &h.payer).await.unwrap_err();
    assert_eq!(err.field(), Some("recipient"));

    let err = h
        .protocol
        .unshield(
            &UnshieldRequest {
                amount: 10,
                destination: Pubkey::new_unique().to_string(),
                owner_secret: SENDER_SECRET.to_string(),
                commitment: Some("abcd".to_string()),
                token: "SOL".to_string(),
            },
            &h.payer,
        )
        .await
        .unwrap_err();
    assert_eq!(err.field(), Some("commitment"));

    let err = h
        .protocol
        .unshield(
            &UnshieldRequest {
                amount: 10,
                destination: "not-an-address".to_string(),
                owner_secret: SENDER_SECRET.to_string(),
                commitment: None,
                token: "SOL".to_string(),
            },
            &h.payer,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        VeilError::Validation {
            operation: Operation::Unshield,
            field: "destination",
            ..
        }
    ));

    assert_eq!(h.ledger.slot().await, slot);
}

#[tokio::test]
async fn test_unshield_more_than_vault_is_rejected() {
    let h = harness().await;
    h.protocol
        .shield(&ShieldRequest::native(100).with_secret(SENDER_SECRET), &h.payer)
        .await
        .unwrap();

    let request = UnshieldRequest {
        amount: 5000,
        destination: Pubkey::new_unique().to_string(),
        owner_secret: SENDER_SECRET.to_string(),
        commitment: None,
        token: "SOL".to_string(),
    };
    let err = h.protocol.unshield(&request, &h.payer).await.unwrap_err();
    assert!(matches!(err, VeilError::Transport { .. }));
    assert!(!err.is_retryable());

    // A rejected spend leaves no marker behind
    let commitment: Commitment = h
        .protocol
        .commit(Operation::Unshield, 5000, &SENDER_SECRET.parse().unwrap())
        .unwrap();
    let nullifier = h
        .protocol
        .derive_nullifier(Operation::Unshield, &commitment, &SENDER_SECRET.parse().unwrap())
        .unwrap();
    assert!(!h.protocol.is_nullifier_spent(&nullifier).await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_spends_of_one_nullifier() {
    let h = harness().await;
    h.protocol
        .shield(&ShieldRequest::native(1000).with_secret(SENDER_SECRET), &h.payer)
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let protocol = h.protocol.clone();
        handles.push(tokio::spawn(async move {
            let relayer = Keypair::new();
            protocol
                .transfer(&transfer_request(1000, SENDER_SECRET), &relayer)
                .await
        }));
    }

    let mut confirmed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(tx) => {
                assert!(tx.is_confirmed());
                confirmed += 1;
            }
            Err(VeilError::Conflict { .. }) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
    assert_eq!(confirmed, 1);

    let state = h.protocol.pool_state().await.unwrap();
    assert_eq!(state.nullifier_count, 1);
    assert_eq!(state.commitment_count(), 2);
}

#[tokio::test]
async fn test_token_shield_and_unshield() {
    let h = harness().await;
    let mint = Pubkey::new_unique();
    let destination = Keypair::new().pubkey();

    let shield = h
        .protocol
        .shield(
            &ShieldRequest {
                amount: 2_000_000,
                token: mint.to_string(),
                secret: Some(SENDER_SECRET.to_string()),
            },
            &h.payer,
        )
        .await
        .unwrap();

    let request = UnshieldRequest {
        amount: 2_000_000,
        destination: destination.to_string(),
        owner_secret: SENDER_SECRET.to_string(),
        commitment: Some(shield.commitment.unwrap().to_hex()),
        token: mint.to_string(),
    };

    // The recipient's token account must exist first
    let err = h.protocol.unshield(&request, &h.payer).await.unwrap_err();
    assert!(matches!(err, VeilError::Transport { .. }));

    let token_account = h.ledger.create_token_account(&destination, &mint).await;
    let tx = h.protocol.unshield(&request, &h.payer).await.unwrap();
    assert!(tx.is_confirmed());
    assert_eq!(h.ledger.balance(&token_account).await, 2_000_000);
}

#[tokio::test]
async fn test_spend_before_initialize_fails() {
    let config = VeilConfig::default().with_program_id(Pubkey::new_unique());
    let ledger = MemoryLedger::new(config.program_id);
    let protocol = PrivacyProtocol::new(
        config,
        Arc::new(ledger.clone()),
        Arc::new(SignatureProofAdapter::new()),
    )
    .unwrap();

    let err = protocol
        .transfer(&transfer_request(10, SENDER_SECRET), &Keypair::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        VeilError::Transport {
            source: veil::LedgerError::PoolNotInitialized,
            ..
        }
    ));
    assert!(ledger.get_account(protocol.pool_address()).await.unwrap().is_none());
}

/// Stand-in prover binding a fixed-size digest to the public inputs
struct DigestBackend;

fn digest(inputs: &PublicInputs) -> Vec<u8> {
    let mut hasher = Sha256::new();
    match inputs {
        PublicInputs::Transfer {
            nullifier,
            new_commitment,
            root,
        } => {
            hasher.update(nullifier.as_bytes());
            hasher.update(new_commitment.as_bytes());
            hasher.update(root);
        }
        PublicInputs::Unshield {
            nullifier,
            recipient,
            amount,
            root,
        } => {
            hasher.update(nullifier.as_bytes());
            hasher.update(recipient.as_ref());
            hasher.update(amount.to_le_bytes());
            hasher.update(root);
        }
    }
    hasher.finalize().repeat(GROTH16_PROOF_SIZE / 32)
}

impl ProvingBackend for DigestBackend {
    fn prove(&self, witness: &SpendWitness) -> Result<Vec<u8>, ProofError> {
        Ok(digest(&witness.public_inputs()))
    }

    fn verify(&self, proof: &[u8], inputs: &PublicInputs) -> Result<bool, ProofError> {
        Ok(proof == digest(inputs).as_slice())
    }
}

#[tokio::test]
async fn test_zero_knowledge_scheme_flow() {
    let mut config = VeilConfig::default().with_program_id(Pubkey::new_unique());
    config.proof_scheme = ProofScheme::ZeroKnowledge;
    let h = harness_with(config, Arc::new(ZkProofAdapter::groth16(DigestBackend))).await;
    assert_eq!(h.protocol.scheme(), ProofScheme::ZeroKnowledge);

    h.protocol
        .shield(&ShieldRequest::native(300).with_secret(SENDER_SECRET), &h.payer)
        .await
        .unwrap();
    let tx = h
        .protocol
        .transfer(&transfer_request(300, SENDER_SECRET), &h.payer)
        .await
        .unwrap();

    let proof = tx.proof.unwrap();
    assert_eq!(proof.len(), GROTH16_PROOF_SIZE);
    // No signer key is embedded in a zk proof
    let payer = h.payer.pubkey();
    assert!(!proof.windows(32).any(|w| w == payer.as_ref()));
}
