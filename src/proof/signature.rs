//! Signature (MVP) Proofs
//!
//! The authority signs a Keccak-256 digest of the public inputs:
//!
//! - transfer: `keccak256(nullifier || new_commitment || root)`
//! - unshield: `keccak256(nullifier || recipient || amount_le || root)`
//!
//! The proof is `signature(64) || pubkey(32)`. It reveals the signer's key
//! and gives no sender anonymity.

use sha3::{Digest, Keccak256};
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
};

use super::{ProofAdapter, ProofError, ProofScheme, PublicInputs, SpendWitness, MVP_PROOF_SIZE};
use crate::types::{Commitment, Nullifier};

/// Digest signed for a transfer
pub fn transfer_message(
    nullifier: &Nullifier,
    new_commitment: &Commitment,
    root: &[u8; 32],
) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(nullifier.as_bytes());
    hasher.update(new_commitment.as_bytes());
    hasher.update(root);
    hasher.finalize().into()
}

/// Digest signed for an unshield
pub fn unshield_message(
    nullifier: &Nullifier,
    recipient: &Pubkey,
    amount: u64,
    root: &[u8; 32],
) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(nullifier.as_bytes());
    hasher.update(recipient.as_ref());
    hasher.update(amount.to_le_bytes());
    hasher.update(root);
    hasher.finalize().into()
}

fn message(inputs: &PublicInputs) -> [u8; 32] {
    match inputs {
        PublicInputs::Transfer {
            nullifier,
            new_commitment,
            root,
        } => transfer_message(nullifier, new_commitment, root),
        PublicInputs::Unshield {
            nullifier,
            recipient,
            amount,
            root,
        } => unshield_message(nullifier, recipient, *amount, root),
    }
}

/// Parsed signature proof
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MvpProof {
    pub signature: Signature,
    pub signer: Pubkey,
}

impl MvpProof {
    pub const SIZE: usize = MVP_PROOF_SIZE;

    pub fn from_bytes(proof: &[u8]) -> Result<Self, ProofError> {
        if proof.len() != Self::SIZE {
            return Err(ProofError::InvalidFormat {
                expected: Self::SIZE,
                actual: proof.len(),
            });
        }
        let mut signature = [0u8; 64];
        signature.copy_from_slice(&proof[..64]);
        let mut signer = [0u8; 32];
        signer.copy_from_slice(&proof[64..]);
        Ok(Self {
            signature: Signature::from(signature),
            signer: Pubkey::new_from_array(signer),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::SIZE);
        out.extend_from_slice(self.signature.as_ref());
        out.extend_from_slice(self.signer.as_ref());
        out
    }
}

/// Ed25519 signature proofs
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureProofAdapter;

impl SignatureProofAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl ProofAdapter for SignatureProofAdapter {
    fn scheme(&self) -> ProofScheme {
        ProofScheme::Signature
    }

    fn prove(&self, witness: &SpendWitness, authority: &Keypair) -> Result<Vec<u8>, ProofError> {
        let digest = message(&witness.public_inputs());
        let proof = MvpProof {
            signature: authority.sign_message(&digest),
            signer: authority.pubkey(),
        };
        Ok(proof.to_bytes())
    }

    fn verify(&self, proof: &[u8], inputs: &PublicInputs) -> Result<bool, ProofError> {
        let proof = MvpProof::from_bytes(proof)?;
        let digest = message(inputs);
        Ok(proof.signature.verify(proof.signer.as_ref(), &digest))
    }
}
