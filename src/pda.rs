//! Program-Derived Addresses
//!
//! Key-less account addresses for the privacy pool program:
//!
//! | Account | Seeds |
//! |---------|-------|
//! | pool | `["privacy_pool"]` |
//! | vault | `["vault", pool]` |
//! | nullifier marker | `["nullifier", pool, nullifier]` |
//!
//! The vault PDA is also the authority over per-asset custody, which is the
//! SPL associated token account of the vault for each mint.

use solana_sdk::pubkey::{Pubkey, MAX_SEEDS, MAX_SEED_LEN};

use crate::common::error::{Operation, Result, VeilError};
use crate::types::Nullifier;

// ============================================================================
// Constants
// ============================================================================

pub mod seeds {
    pub const POOL: &[u8] = b"privacy_pool";
    pub const VAULT: &[u8] = b"vault";
    pub const NULLIFIER: &[u8] = b"nullifier";
}

/// SPL Token program ID
pub const TOKEN_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");

/// Associated Token Account program ID
pub const ATA_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

/// Derived address and the bump that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramAddress {
    pub address: Pubkey,
    pub bump: u8,
}

// ============================================================================
// Deriver
// ============================================================================

/// Derives the program's accounts for one program ID
#[derive(Debug, Clone, Copy)]
pub struct AddressDeriver {
    program_id: Pubkey,
}

impl AddressDeriver {
    pub fn new(program_id: Pubkey) -> Self {
        Self { program_id }
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    /// Search bumps 255 down to 0 for the first off-curve address
    ///
    /// The bump occupies one of the `MAX_SEEDS` slots, so at most 15 caller
    /// seeds are accepted. Exhausting every bump is a fatal configuration
    /// error; other seeds are never tried in its place.
    pub fn derive(&self, seeds: &[&[u8]]) -> Result<ProgramAddress> {
        if seeds.len() >= MAX_SEEDS {
            return Err(VeilError::validation(
                Operation::Derive,
                "seeds",
                format!("at most {} seeds plus the bump, got {}", MAX_SEEDS - 1, seeds.len()),
            ));
        }
        if let Some(seed) = seeds.iter().find(|s| s.len() > MAX_SEED_LEN) {
            return Err(VeilError::validation(
                Operation::Derive,
                "seeds",
                format!("seed of {} bytes exceeds {}", seed.len(), MAX_SEED_LEN),
            ));
        }

        Pubkey::try_find_program_address(seeds, &self.program_id)
            .map(|(address, bump)| ProgramAddress { address, bump })
            .ok_or_else(|| VeilError::AddressDerivation {
                operation: Operation::Derive,
                seeds: describe_seeds(seeds),
            })
    }

    /// Pool state account
    pub fn pool(&self) -> Result<ProgramAddress> {
        self.derive(&[seeds::POOL])
    }

    /// Vault account (native custody and token vault authority)
    pub fn vault(&self, pool: &Pubkey) -> Result<ProgramAddress> {
        self.derive(&[seeds::VAULT, pool.as_ref()])
    }

    /// Marker whose existence records that `nullifier` is spent
    pub fn nullifier_marker(&self, pool: &Pubkey, nullifier: &Nullifier) -> Result<ProgramAddress> {
        self.derive(&[seeds::NULLIFIER, pool.as_ref(), nullifier.as_ref()])
    }

    /// Vault token account for a mint
    pub fn vault_token_account(&self, pool: &Pubkey, mint: &Pubkey) -> Result<Pubkey> {
        let vault = self.vault(pool)?;
        Ok(associated_token_address(&vault.address, mint))
    }
}

/// SPL associated token account for `owner` and `mint`
pub fn associated_token_address(owner: &Pubkey, mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[owner.as_ref(), TOKEN_PROGRAM_ID.as_ref(), mint.as_ref()],
        &ATA_PROGRAM_ID,
    )
    .0
}

fn describe_seeds(seeds: &[&[u8]]) -> String {
    let parts: Vec<String> = seeds.iter().map(hex::encode).collect();
    format!("[{}]", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn deriver() -> AddressDeriver {
        AddressDeriver::new(Pubkey::from_str(crate::common::DEFAULT_PROGRAM_ID).unwrap())
    }

    #[test]
    fn test_pool_derivation_deterministic() {
        let a = deriver().pool().unwrap();
        let b = deriver().pool().unwrap();
        assert_eq!(a, b);
        assert!(!a.address.is_on_curve());
    }

    #[test]
    fn test_derivation_matches_find_program_address() {
        let d = deriver();
        let pool = d.pool().unwrap();
        let (expected, bump) = Pubkey::find_program_address(&[b"privacy_pool"], d.program_id());
        assert_eq!(pool.address, expected);
        assert_eq!(pool.bump, bump);

        let vault = d.vault(&pool.address).unwrap();
        let (expected, _) =
            Pubkey::find_program_address(&[b"vault", pool.address.as_ref()], d.program_id());
        assert_eq!(vault.address, expected);
    }

    #[test]
    fn test_marker_depends_on_nullifier() {
        let d = deriver();
        let pool = d.pool().unwrap().address;
        let m1 = d.nullifier_marker(&pool, &Nullifier::new([1; 32])).unwrap();
        let m2 = d.nullifier_marker(&pool, &Nullifier::new([2; 32])).unwrap();
        assert_ne!(m1.address, m2.address);
        assert_eq!(m1, d.nullifier_marker(&pool, &Nullifier::new([1; 32])).unwrap());
    }

    #[test]
    fn test_different_programs_give_different_addresses() {
        let other = AddressDeriver::new(Pubkey::new_unique());
        assert_ne!(deriver().pool().unwrap().address, other.pool().unwrap().address);
    }

    #[test]
    fn test_seed_limits_are_validation_errors() {
        let long = [0u8; 33];
        let err = deriver().derive(&[&long]).unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");

        let many: Vec<&[u8]> = vec![&b"x"[..]; MAX_SEEDS];
        let err = deriver().derive(&many).unwrap_err();
        assert_eq!(err.field(), Some("seeds"));
    }

    #[test]
    fn test_associated_token_address() {
        let owner = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let ata = associated_token_address(&owner, &mint);
        assert_eq!(ata, associated_token_address(&owner, &mint));
        assert_ne!(ata, associated_token_address(&owner, &Pubkey::new_unique()));

        let d = deriver();
        let pool = d.pool().unwrap().address;
        let vault = d.vault(&pool).unwrap().address;
        assert_eq!(
            d.vault_token_account(&pool, &mint).unwrap(),
            associated_token_address(&vault, &mint)
        );
    }
}
