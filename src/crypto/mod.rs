//! Commitment and Nullifier Primitives
//!
//! | Item | Purpose |
//! |------|---------|
//! | `CryptoPrimitives` | Boundary used by the protocol for `commit` / `derive_nullifier` |
//! | `Blake3Primitives` | Default backend, domain-separated BLAKE3 key derivation |
//! | `poseidon_hash` | BN254 Poseidon over 32-byte field elements |
//!
//! Both primitives are pure: the same inputs always give the same output.

use thiserror::Error;

use crate::types::{Commitment, Nullifier, Secret, MIN_SECRET_LEN};

/// BLAKE3 context for commitments
pub const COMMITMENT_CONTEXT: &str = "veil 2024 commitment v1";

/// BLAKE3 context for nullifiers
pub const NULLIFIER_CONTEXT: &str = "veil 2024 nullifier v1";

/// Crypto primitive errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("secret must be at least {MIN_SECRET_LEN} bytes, got {0}")]
    InvalidSecretLength(usize),

    #[error("poseidon hash failed: {0}")]
    Poseidon(String),

    #[error("crypto backend error: {0}")]
    Backend(String),
}

/// Commitment scheme used by the protocol
///
/// Implementations must be deterministic. `commit` must differ whenever the
/// amount or the secret differs, and so must `derive_nullifier` for the
/// commitment or the secret.
pub trait CryptoPrimitives: Send + Sync {
    fn commit(&self, amount: u64, secret: &Secret) -> Result<Commitment, CryptoError>;

    fn derive_nullifier(&self, commitment: &Commitment, secret: &Secret)
        -> Result<Nullifier, CryptoError>;
}

/// BLAKE3 keyed derivation, one context per value kind
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Primitives;

impl Blake3Primitives {
    pub fn new() -> Self {
        Self
    }
}

fn check_secret(secret: &Secret) -> Result<(), CryptoError> {
    if secret.len() < MIN_SECRET_LEN {
        return Err(CryptoError::InvalidSecretLength(secret.len()));
    }
    Ok(())
}

impl CryptoPrimitives for Blake3Primitives {
    fn commit(&self, amount: u64, secret: &Secret) -> Result<Commitment, CryptoError> {
        check_secret(secret)?;
        let mut material = Vec::with_capacity(8 + secret.len());
        material.extend_from_slice(&amount.to_le_bytes());
        material.extend_from_slice(secret.as_bytes());
        Ok(Commitment(blake3::derive_key(COMMITMENT_CONTEXT, &material)))
    }

    fn derive_nullifier(
        &self,
        commitment: &Commitment,
        secret: &Secret,
    ) -> Result<Nullifier, CryptoError> {
        check_secret(secret)?;
        let mut material = Vec::with_capacity(32 + secret.len());
        material.extend_from_slice(commitment.as_bytes());
        material.extend_from_slice(secret.as_bytes());
        Ok(Nullifier(blake3::derive_key(NULLIFIER_CONTEXT, &material)))
    }
}

/// Poseidon hash over BN254 (x5, big-endian)
///
/// Not used by `Blake3Primitives`; it is exported for commitment backends
/// and provers that must match a circuit's field hash.
///
/// Each input must be a canonical field element; values at or above the
/// BN254 scalar modulus are rejected.
pub fn poseidon_hash(inputs: &[[u8; 32]]) -> Result<[u8; 32], CryptoError> {
    use solana_poseidon::{hashv, Endianness, Parameters};

    let slices: Vec<&[u8]> = inputs.iter().map(|input| input.as_slice()).collect();
    hashv(Parameters::Bn254X5, Endianness::BigEndian, &slices)
        .map(|hash| hash.to_bytes())
        .map_err(|e| CryptoError::Poseidon(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(s: &str) -> Secret {
        s.parse().unwrap()
    }

    const S1: &str = "my_super_secret_key_32_bytes_long!!";
    const S2: &str = "another_secret_key_that_is_32_bytes";

    #[test]
    fn test_commit_deterministic() {
        let crypto = Blake3Primitives::new();
        let a = crypto.commit(1000, &secret(S1)).unwrap();
        let b = crypto.commit(1000, &secret(S1)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_commit_binds_amount_and_secret() {
        let crypto = Blake3Primitives::new();
        let base = crypto.commit(1000, &secret(S1)).unwrap();
        assert_ne!(base, crypto.commit(1001, &secret(S1)).unwrap());
        assert_ne!(base, crypto.commit(1000, &secret(S2)).unwrap());
    }

    #[test]
    fn test_nullifier_deterministic_and_sensitive() {
        let crypto = Blake3Primitives::new();
        let c1 = crypto.commit(1000, &secret(S1)).unwrap();
        let c2 = crypto.commit(2000, &secret(S1)).unwrap();

        let n = crypto.derive_nullifier(&c1, &secret(S1)).unwrap();
        assert_eq!(n, crypto.derive_nullifier(&c1, &secret(S1)).unwrap());
        assert_ne!(n, crypto.derive_nullifier(&c2, &secret(S1)).unwrap());
        assert_ne!(n, crypto.derive_nullifier(&c1, &secret(S2)).unwrap());
    }

    #[test]
    fn test_nullifier_differs_from_commitment() {
        let crypto = Blake3Primitives::new();
        let c = crypto.commit(1000, &secret(S1)).unwrap();
        let n = crypto.derive_nullifier(&c, &secret(S1)).unwrap();
        assert_ne!(c.to_bytes(), n.to_bytes());
    }

    #[test]
    fn test_poseidon_deterministic_and_ordered() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        let ab = poseidon_hash(&[a, b]).unwrap();
        assert_eq!(ab, poseidon_hash(&[a, b]).unwrap());
        assert_ne!(ab, poseidon_hash(&[b, a]).unwrap());
    }

    #[test]
    fn test_poseidon_rejects_out_of_field_input() {
        let too_big = [0xff; 32];
        assert!(matches!(
            poseidon_hash(&[too_big, [0u8; 32]]),
            Err(CryptoError::Poseidon(_))
        ));
    }
}
