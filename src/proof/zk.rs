//! Zero-Knowledge Proofs
//!
//! The circuit and prover live outside this crate. [`ZkProofAdapter`]
//! forwards to a [`ProvingBackend`] and checks proof sizes at the boundary.
//! No signer key is embedded in a zk proof.

use solana_sdk::signature::Keypair;

use super::{ProofAdapter, ProofError, ProofScheme, PublicInputs, SpendWitness, GROTH16_PROOF_SIZE};

/// External prover/verifier
pub trait ProvingBackend: Send + Sync {
    fn prove(&self, witness: &SpendWitness) -> Result<Vec<u8>, ProofError>;

    fn verify(&self, proof: &[u8], inputs: &PublicInputs) -> Result<bool, ProofError>;
}

/// Adapter over a proving backend
pub struct ZkProofAdapter<B: ProvingBackend> {
    backend: B,
    proof_len: Option<usize>,
}

impl<B: ProvingBackend> ZkProofAdapter<B> {
    /// Accept proofs of any size
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            proof_len: None,
        }
    }

    /// Require Groth16-sized proofs
    pub fn groth16(backend: B) -> Self {
        Self::with_proof_len(backend, GROTH16_PROOF_SIZE)
    }

    pub fn with_proof_len(backend: B, proof_len: usize) -> Self {
        Self {
            backend,
            proof_len: Some(proof_len),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn check_len(&self, proof: &[u8]) -> Result<(), ProofError> {
        match self.proof_len {
            Some(expected) if proof.len() != expected => Err(ProofError::InvalidFormat {
                expected,
                actual: proof.len(),
            }),
            _ => Ok(()),
        }
    }
}

impl<B: ProvingBackend> ProofAdapter for ZkProofAdapter<B> {
    fn scheme(&self) -> ProofScheme {
        ProofScheme::ZeroKnowledge
    }

    fn prove(&self, witness: &SpendWitness, _authority: &Keypair) -> Result<Vec<u8>, ProofError> {
        let proof = self.backend.prove(witness)?;
        self.check_len(&proof)?;
        Ok(proof)
    }

    fn verify(&self, proof: &[u8], inputs: &PublicInputs) -> Result<bool, ProofError> {
        self.check_len(proof)?;
        self.backend.verify(proof, inputs)
    }
}
