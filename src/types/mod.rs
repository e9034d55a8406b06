//! Shared Types Module
//!
//! Data types shared across the Veil client.

pub mod asset;
pub mod note;
pub mod transaction;

// Re-exports for convenience
pub use asset::{token_mint, Asset, AssetError, AssetId, COMMON_TOKENS, NATIVE_ASSET_ID};
pub use note::{Commitment, NoteError, Nullifier, Secret, MIN_SECRET_LEN};
pub use transaction::{
    PrivateTransaction, ShieldParams, ShieldRequest, TransactionStatus, TransferParams,
    TransferRequest, UnshieldParams, UnshieldRequest,
};
pub use transaction::{
    validate_address, validate_amount, validate_commitment, validate_nullifier, validate_secret,
};
