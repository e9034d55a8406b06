//! Asset Registry
//!
//! Maps token identifiers to 8-byte asset IDs. Native SOL is always `0`;
//! an SPL mint maps to the first 8 bytes of `sha256(mint_base58)` read
//! little-endian.
//!
//! Two distinct mints can collide on 8 bytes (birthday bound around 2^32
//! mints). Nothing here detects or resolves that.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

/// Asset ID of native SOL
pub const NATIVE_ASSET_ID: u64 = 0;

/// Well-known mints, by symbol
pub const COMMON_TOKENS: &[(&str, &str)] = &[
    ("USDC", "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"),
    ("USDT", "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB"),
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetError {
    #[error("invalid mint address: {0}")]
    InvalidMint(String),

    #[error("unknown token symbol: {0}")]
    UnknownSymbol(String),
}

/// 8-byte asset identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetId(pub u64);

impl AssetId {
    pub const NATIVE: AssetId = AssetId(NATIVE_ASSET_ID);

    /// Asset ID for a token identifier: "SOL"/"native", a known symbol or
    /// a mint address. Symbols hash as their mint.
    pub fn from_token(token: &str) -> Self {
        if is_native_token(token) {
            return Self::NATIVE;
        }
        Self::from_identifier(token_mint(token).unwrap_or(token))
    }

    /// Asset ID for a mint
    pub fn from_mint(mint: &Pubkey) -> Self {
        Self::from_identifier(&mint.to_string())
    }

    fn from_identifier(identifier: &str) -> Self {
        let digest = Sha256::digest(identifier.as_bytes());
        let mut low = [0u8; 8];
        low.copy_from_slice(&digest[..8]);
        Self(u64::from_le_bytes(low))
    }

    pub fn is_native(&self) -> bool {
        self.0 == NATIVE_ASSET_ID
    }

    pub fn to_le_bytes(&self) -> [u8; 8] {
        self.0.to_le_bytes()
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Asset held in the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Asset {
    /// Native SOL, custodied directly by the vault PDA
    Native,
    /// SPL token, custodied by the vault's associated token account
    Token(Pubkey),
}

impl Asset {
    pub fn id(&self) -> AssetId {
        match self {
            Asset::Native => AssetId::NATIVE,
            Asset::Token(mint) => AssetId::from_mint(mint),
        }
    }

    pub fn mint(&self) -> Option<&Pubkey> {
        match self {
            Asset::Native => None,
            Asset::Token(mint) => Some(mint),
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Asset::Native)
    }
}

impl FromStr for Asset {
    type Err = AssetError;

    /// Accepts "SOL"/"native", a known symbol, or a mint address
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if is_native_token(s) {
            return Ok(Asset::Native);
        }
        let mint_str = token_mint(s).unwrap_or(s);
        Pubkey::from_str(mint_str)
            .map(Asset::Token)
            .map_err(|_| AssetError::InvalidMint(s.to_string()))
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Native => f.write_str("SOL"),
            Asset::Token(mint) => write!(f, "{}", mint),
        }
    }
}

/// Mint address for a common token symbol
pub fn token_mint(symbol: &str) -> Option<&'static str> {
    let symbol = symbol.to_uppercase();
    COMMON_TOKENS
        .iter()
        .find(|(s, _)| *s == symbol)
        .map(|(_, mint)| *mint)
}

fn is_native_token(token: &str) -> bool {
    token.eq_ignore_ascii_case("sol") || token.eq_ignore_ascii_case("native")
}
