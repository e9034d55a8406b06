//! Privacy Pool Instructions
//!
//! Wire format consumed by the on-chain program:
//!
//! ```text
//! [8-byte discriminator][fixed fields, little-endian][u32 LE length || bytes]
//! ```
//!
//! | Instruction | Fixed fields | Variable |
//! |-------------|--------------|----------|
//! | Initialize | - | - |
//! | ShieldNative / ShieldAsset | commitment(32), amount(u64) | - |
//! | Transfer | nullifier(32), new_commitment(32) | proof |
//! | UnshieldNative / UnshieldAsset | nullifier(32), amount(u64) | proof |
//!
//! Account order is fixed per instruction and must match the program exactly.

use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};
use thiserror::Error;

use crate::common::error::{Operation, Result, VeilError};
use crate::pda::{associated_token_address, AddressDeriver, TOKEN_PROGRAM_ID};
use crate::types::{Commitment, Nullifier};

// ============================================================================
// Discriminators
// ============================================================================

pub mod discriminator {
    pub const INITIALIZE: [u8; 8] = [175, 175, 109, 31, 13, 152, 155, 237];
    pub const SHIELD_SOL: [u8; 8] = [183, 4, 24, 123, 20, 45, 203, 91];
    pub const SHIELD: [u8; 8] = [112, 186, 93, 111, 79, 168, 36, 51];
    pub const TRANSFER: [u8; 8] = [163, 52, 200, 231, 140, 3, 69, 186];
    pub const UNSHIELD_SOL: [u8; 8] = [45, 127, 188, 9, 224, 78, 199, 57];
    pub const UNSHIELD: [u8; 8] = [126, 89, 240, 247, 56, 193, 126, 10];
}

/// Payload length of a shield instruction
pub const SHIELD_DATA_LEN: usize = 8 + 32 + 8;

/// Decoding errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstructionError {
    #[error("unknown instruction discriminator {0:?}")]
    UnknownDiscriminator([u8; 8]),

    #[error("truncated instruction data: need {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("length prefix {declared} disagrees with {remaining} remaining bytes")]
    LengthMismatch { declared: usize, remaining: usize },

    #[error("{0} trailing bytes after instruction data")]
    TrailingBytes(usize),
}

// ============================================================================
// Instruction data
// ============================================================================

/// Decoded instruction data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolInstruction {
    Initialize,
    ShieldNative {
        commitment: Commitment,
        amount: u64,
    },
    ShieldAsset {
        commitment: Commitment,
        amount: u64,
    },
    Transfer {
        nullifier: Nullifier,
        new_commitment: Commitment,
        proof: Vec<u8>,
    },
    UnshieldNative {
        nullifier: Nullifier,
        amount: u64,
        proof: Vec<u8>,
    },
    UnshieldAsset {
        nullifier: Nullifier,
        amount: u64,
        proof: Vec<u8>,
    },
}

impl PoolInstruction {
    pub fn discriminator(&self) -> [u8; 8] {
        match self {
            PoolInstruction::Initialize => discriminator::INITIALIZE,
            PoolInstruction::ShieldNative { .. } => discriminator::SHIELD_SOL,
            PoolInstruction::ShieldAsset { .. } => discriminator::SHIELD,
            PoolInstruction::Transfer { .. } => discriminator::TRANSFER,
            PoolInstruction::UnshieldNative { .. } => discriminator::UNSHIELD_SOL,
            PoolInstruction::UnshieldAsset { .. } => discriminator::UNSHIELD,
        }
    }

    /// Nullifier spent by this instruction, if any
    pub fn nullifier(&self) -> Option<&Nullifier> {
        match self {
            PoolInstruction::Transfer { nullifier, .. }
            | PoolInstruction::UnshieldNative { nullifier, .. }
            | PoolInstruction::UnshieldAsset { nullifier, .. } => Some(nullifier),
            _ => None,
        }
    }

    /// Serialize to instruction data
    pub fn pack(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.packed_len());
        data.extend_from_slice(&self.discriminator());

        match self {
            PoolInstruction::Initialize => {}
            PoolInstruction::ShieldNative { commitment, amount }
            | PoolInstruction::ShieldAsset { commitment, amount } => {
                data.extend_from_slice(commitment.as_bytes());
                data.extend_from_slice(&amount.to_le_bytes());
            }
            PoolInstruction::Transfer {
                nullifier,
                new_commitment,
                proof,
            } => {
                data.extend_from_slice(nullifier.as_bytes());
                data.extend_from_slice(new_commitment.as_bytes());
                put_bytes(&mut data, proof);
            }
            PoolInstruction::UnshieldNative {
                nullifier,
                amount,
                proof,
            }
            | PoolInstruction::UnshieldAsset {
                nullifier,
                amount,
                proof,
            } => {
                data.extend_from_slice(nullifier.as_bytes());
                data.extend_from_slice(&amount.to_le_bytes());
                put_bytes(&mut data, proof);
            }
        }

        data
    }

    fn packed_len(&self) -> usize {
        match self {
            PoolInstruction::Initialize => 8,
            PoolInstruction::ShieldNative { .. } | PoolInstruction::ShieldAsset { .. } => {
                SHIELD_DATA_LEN
            }
            PoolInstruction::Transfer { proof, .. } => 8 + 64 + 4 + proof.len(),
            PoolInstruction::UnshieldNative { proof, .. }
            | PoolInstruction::UnshieldAsset { proof, .. } => 8 + 40 + 4 + proof.len(),
        }
    }

    /// Parse instruction data
    pub fn unpack(data: &[u8]) -> std::result::Result<Self, InstructionError> {
        let mut reader = Reader::new(data);
        let disc: [u8; 8] = reader.array()?;

        let instruction = match disc {
            discriminator::INITIALIZE => PoolInstruction::Initialize,
            discriminator::SHIELD_SOL => PoolInstruction::ShieldNative {
                commitment: Commitment(reader.array()?),
                amount: reader.u64()?,
            },
            discriminator::SHIELD => PoolInstruction::ShieldAsset {
                commitment: Commitment(reader.array()?),
                amount: reader.u64()?,
            },
            discriminator::TRANSFER => PoolInstruction::Transfer {
                nullifier: Nullifier(reader.array()?),
                new_commitment: Commitment(reader.array()?),
                proof: reader.bytes()?,
            },
            discriminator::UNSHIELD_SOL => PoolInstruction::UnshieldNative {
                nullifier: Nullifier(reader.array()?),
                amount: reader.u64()?,
                proof: reader.bytes()?,
            },
            discriminator::UNSHIELD => PoolInstruction::UnshieldAsset {
                nullifier: Nullifier(reader.array()?),
                amount: reader.u64()?,
                proof: reader.bytes()?,
            },
            other => return Err(InstructionError::UnknownDiscriminator(other)),
        };

        reader.finish()?;
        Ok(instruction)
    }
}

fn put_bytes(data: &mut Vec<u8>, bytes: &[u8]) {
    data.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    data.extend_from_slice(bytes);
}

struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn take(&mut self, n: usize) -> std::result::Result<&'a [u8], InstructionError> {
        if self.data.len() < n {
            return Err(InstructionError::Truncated {
                needed: n,
                remaining: self.data.len(),
            });
        }
        let (head, tail) = self.data.split_at(n);
        self.data = tail;
        Ok(head)
    }

    fn array<const N: usize>(&mut self) -> std::result::Result<[u8; N], InstructionError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u64(&mut self) -> std::result::Result<u64, InstructionError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    /// Length-prefixed trailing field; the prefix must cover exactly the rest
    fn bytes(&mut self) -> std::result::Result<Vec<u8>, InstructionError> {
        let declared = u32::from_le_bytes(self.array()?) as usize;
        if declared != self.data.len() {
            return Err(InstructionError::LengthMismatch {
                declared,
                remaining: self.data.len(),
            });
        }
        Ok(self.take(declared)?.to_vec())
    }

    fn finish(self) -> std::result::Result<(), InstructionError> {
        if self.data.is_empty() {
            Ok(())
        } else {
            Err(InstructionError::TrailingBytes(self.data.len()))
        }
    }
}

// ============================================================================
// Encoder
// ============================================================================

/// Builds program instructions with their fixed account lists
#[derive(Debug, Clone, Copy)]
pub struct InstructionEncoder {
    deriver: AddressDeriver,
    pool: Pubkey,
    vault: Pubkey,
}

impl InstructionEncoder {
    /// Create an encoder, deriving the pool and vault once
    pub fn new(program_id: Pubkey) -> Result<Self> {
        let deriver = AddressDeriver::new(program_id);
        let pool = deriver.pool()?.address;
        let vault = deriver.vault(&pool)?.address;
        Ok(Self {
            deriver,
            pool,
            vault,
        })
    }

    pub fn program_id(&self) -> &Pubkey {
        self.deriver.program_id()
    }

    pub fn deriver(&self) -> &AddressDeriver {
        &self.deriver
    }

    pub fn pool(&self) -> &Pubkey {
        &self.pool
    }

    pub fn vault(&self) -> &Pubkey {
        &self.vault
    }

    pub fn nullifier_marker(&self, nullifier: &Nullifier) -> Result<Pubkey> {
        Ok(self.deriver.nullifier_marker(&self.pool, nullifier)?.address)
    }

    fn instruction(&self, data: PoolInstruction, accounts: Vec<AccountMeta>) -> Instruction {
        Instruction {
            program_id: *self.deriver.program_id(),
            accounts,
            data: data.pack(),
        }
    }

    /// Accounts: pool(w), authority(s,w), system_program
    pub fn initialize(&self, authority: &Pubkey) -> Instruction {
        let accounts = vec![
            AccountMeta::new(self.pool, false),
            AccountMeta::new(*authority, true),
            AccountMeta::new_readonly(solana_sdk::system_program::ID, false),
        ];
        self.instruction(PoolInstruction::Initialize, accounts)
    }

    /// Accounts: pool(w), vault(w), depositor(s,w), system_program
    pub fn shield_native(
        &self,
        depositor: &Pubkey,
        commitment: Commitment,
        amount: u64,
    ) -> Instruction {
        let accounts = vec![
            AccountMeta::new(self.pool, false),
            AccountMeta::new(self.vault, false),
            AccountMeta::new(*depositor, true),
            AccountMeta::new_readonly(solana_sdk::system_program::ID, false),
        ];
        self.instruction(PoolInstruction::ShieldNative { commitment, amount }, accounts)
    }

    /// Accounts: pool(w), vault_authority, vault_token_account(w),
    /// depositor_token_account(w), depositor(s,w), token_program
    pub fn shield_asset(
        &self,
        depositor: &Pubkey,
        mint: &Pubkey,
        commitment: Commitment,
        amount: u64,
    ) -> Instruction {
        let accounts = vec![
            AccountMeta::new(self.pool, false),
            AccountMeta::new_readonly(self.vault, false),
            AccountMeta::new(associated_token_address(&self.vault, mint), false),
            AccountMeta::new(associated_token_address(depositor, mint), false),
            AccountMeta::new(*depositor, true),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
        ];
        self.instruction(PoolInstruction::ShieldAsset { commitment, amount }, accounts)
    }

    /// Accounts: pool(w), nullifier_marker(w), relayer(s,w), system_program
    pub fn transfer(
        &self,
        relayer: &Pubkey,
        nullifier: Nullifier,
        new_commitment: Commitment,
        proof: Vec<u8>,
    ) -> Result<Instruction> {
        check_proof(Operation::Transfer, &proof)?;
        let marker = self.nullifier_marker(&nullifier)?;
        let accounts = vec![
            AccountMeta::new(self.pool, false),
            AccountMeta::new(marker, false),
            AccountMeta::new(*relayer, true),
            AccountMeta::new_readonly(solana_sdk::system_program::ID, false),
        ];
        let data = PoolInstruction::Transfer {
            nullifier,
            new_commitment,
            proof,
        };
        Ok(self.instruction(data, accounts))
    }

    /// Accounts: pool(w), nullifier_marker(w), vault(w), recipient(w),
    /// relayer(s,w), system_program
    pub fn unshield_native(
        &self,
        relayer: &Pubkey,
        recipient: &Pubkey,
        nullifier: Nullifier,
        amount: u64,
        proof: Vec<u8>,
    ) -> Result<Instruction> {
        check_proof(Operation::Unshield, &proof)?;
        let marker = self.nullifier_marker(&nullifier)?;
        let accounts = vec![
            AccountMeta::new(self.pool, false),
            AccountMeta::new(marker, false),
            AccountMeta::new(self.vault, false),
            AccountMeta::new(*recipient, false),
            AccountMeta::new(*relayer, true),
            AccountMeta::new_readonly(solana_sdk::system_program::ID, false),
        ];
        let data = PoolInstruction::UnshieldNative {
            nullifier,
            amount,
            proof,
        };
        Ok(self.instruction(data, accounts))
    }

    /// Accounts: pool(w), nullifier_marker(w), vault_authority,
    /// vault_token_account(w), recipient_token_account(w), relayer(s,w),
    /// token_program, system_program
    pub fn unshield_asset(
        &self,
        relayer: &Pubkey,
        recipient: &Pubkey,
        mint: &Pubkey,
        nullifier: Nullifier,
        amount: u64,
        proof: Vec<u8>,
    ) -> Result<Instruction> {
        check_proof(Operation::Unshield, &proof)?;
        let marker = self.nullifier_marker(&nullifier)?;
        let accounts = vec![
            AccountMeta::new(self.pool, false),
            AccountMeta::new(marker, false),
            AccountMeta::new_readonly(self.vault, false),
            AccountMeta::new(associated_token_address(&self.vault, mint), false),
            AccountMeta::new(associated_token_address(recipient, mint), false),
            AccountMeta::new(*relayer, true),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
            AccountMeta::new_readonly(solana_sdk::system_program::ID, false),
        ];
        let data = PoolInstruction::UnshieldAsset {
            nullifier,
            amount,
            proof,
        };
        Ok(self.instruction(data, accounts))
    }
}

fn check_proof(operation: Operation, proof: &[u8]) -> Result<()> {
    if proof.is_empty() {
        return Err(VeilError::validation(operation, "proof", "must not be empty"));
    }
    if proof.len() > u32::MAX as usize {
        return Err(VeilError::validation(operation, "proof", "exceeds u32 length prefix"));
    }
    Ok(())
}
