//! Request and Result Types
//!
//! Requests carry caller input as given (strings for addresses, secrets and
//! hex values). `validate()` turns a request into typed parameters and is
//! the only place caller input is checked; it runs before any crypto or
//! ledger call.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use super::asset::Asset;
use super::note::{Commitment, Nullifier, Secret, MIN_SECRET_LEN};
use crate::common::error::{Operation, Result, VeilError};

/// Status of a submitted private transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Built but not yet confirmed
    Pending,
    /// Confirmed by the ledger
    Confirmed,
    /// Rejected or not confirmed
    Failed,
}

impl Default for TransactionStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// Requests
// ============================================================================

/// Request to shield assets
#[derive(Clone, Serialize, Deserialize)]
pub struct ShieldRequest {
    /// Amount in lamports or token base units
    pub amount: u64,
    /// "SOL", a known symbol, or a mint address
    pub token: String,
    /// Owner secret; a fresh one is generated when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

/// Validated shield parameters
#[derive(Debug, Clone)]
pub struct ShieldParams {
    pub amount: u64,
    pub asset: Asset,
    /// `None` means the secret is generated at commitment time
    pub secret: Option<Secret>,
}

impl ShieldRequest {
    pub fn native(amount: u64) -> Self {
        Self {
            amount,
            token: "SOL".to_string(),
            secret: None,
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn validate(&self) -> Result<ShieldParams> {
        let op = Operation::Shield;
        Ok(ShieldParams {
            amount: validate_amount(op, self.amount)?,
            asset: validate_asset(op, &self.token)?,
            secret: self
                .secret
                .as_deref()
                .map(|s| validate_secret(op, "secret", s))
                .transpose()?,
        })
    }
}

/// Request for a private transfer
#[derive(Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Recipient address (base58)
    pub recipient: String,
    pub amount: u64,
    pub sender_secret: String,
    /// Sender commitment (hex); recomputed from amount and secret when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_commitment: Option<String>,
}

/// Validated transfer parameters
#[derive(Debug, Clone)]
pub struct TransferParams {
    pub recipient: Pubkey,
    pub amount: u64,
    pub sender_secret: Secret,
    pub sender_commitment: Option<Commitment>,
}

impl TransferRequest {
    pub fn validate(&self) -> Result<TransferParams> {
        let op = Operation::Transfer;
        Ok(TransferParams {
            recipient: validate_address(op, "recipient", &self.recipient)?,
            amount: validate_amount(op, self.amount)?,
            sender_secret: validate_secret(op, "sender_secret", &self.sender_secret)?,
            sender_commitment: self
                .sender_commitment
                .as_deref()
                .map(|c| validate_commitment(op, "sender_commitment", c))
                .transpose()?,
        })
    }
}

/// Request to unshield assets
#[derive(Clone, Serialize, Deserialize)]
pub struct UnshieldRequest {
    pub amount: u64,
    /// Public destination address (base58)
    pub destination: String,
    pub owner_secret: String,
    /// Commitment being spent (hex); recomputed when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commitment: Option<String>,
    /// "SOL", a known symbol, or a mint address
    #[serde(default = "default_token")]
    pub token: String,
}

/// Validated unshield parameters
#[derive(Debug, Clone)]
pub struct UnshieldParams {
    pub amount: u64,
    pub destination: Pubkey,
    pub owner_secret: Secret,
    pub commitment: Option<Commitment>,
    pub asset: Asset,
}

impl UnshieldRequest {
    pub fn validate(&self) -> Result<UnshieldParams> {
        let op = Operation::Unshield;
        Ok(UnshieldParams {
            amount: validate_amount(op, self.amount)?,
            destination: validate_address(op, "destination", &self.destination)?,
            owner_secret: validate_secret(op, "owner_secret", &self.owner_secret)?,
            commitment: self
                .commitment
                .as_deref()
                .map(|c| validate_commitment(op, "commitment", c))
                .transpose()?,
            asset: validate_asset(op, &self.token)?,
        })
    }
}

fn default_token() -> String {
    "SOL".to_string()
}

// Requests hold secrets as plain strings; keep them out of Debug output.
macro_rules! redacted_debug {
    ($name:ident { $($field:ident),* }) => {
        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    $(.field(stringify!($field), &self.$field))*
                    .finish_non_exhaustive()
            }
        }
    };
}

redacted_debug!(ShieldRequest { amount, token });
redacted_debug!(TransferRequest { recipient, amount, sender_commitment });
redacted_debug!(UnshieldRequest { amount, destination, commitment, token });

// ============================================================================
// Field validation
// ============================================================================

/// Amount must be positive
pub fn validate_amount(operation: Operation, amount: u64) -> Result<u64> {
    if amount == 0 {
        return Err(VeilError::validation(operation, "amount", "must be positive"));
    }
    Ok(amount)
}

/// Base58 address decoding to exactly 32 bytes
pub fn validate_address(
    operation: Operation,
    field: &'static str,
    address: &str,
) -> Result<Pubkey> {
    Pubkey::from_str(address).map_err(|e| {
        VeilError::validation(operation, field, format!("not a base58 32-byte address: {}", e))
    })
}

/// Secret of at least `MIN_SECRET_LEN` bytes
pub fn validate_secret(operation: Operation, field: &'static str, secret: &str) -> Result<Secret> {
    Secret::from_str(secret).map_err(|_| {
        VeilError::validation(
            operation,
            field,
            format!("must be at least {} bytes, got {}", MIN_SECRET_LEN, secret.len()),
        )
    })
}

/// 32-byte commitment in hex
pub fn validate_commitment(
    operation: Operation,
    field: &'static str,
    hex: &str,
) -> Result<Commitment> {
    Commitment::from_hex(hex).map_err(|e| VeilError::validation(operation, field, e.to_string()))
}

/// 32-byte nullifier in hex
pub fn validate_nullifier(
    operation: Operation,
    field: &'static str,
    hex: &str,
) -> Result<Nullifier> {
    Nullifier::from_hex(hex).map_err(|e| VeilError::validation(operation, field, e.to_string()))
}

fn validate_asset(operation: Operation, token: &str) -> Result<Asset> {
    Asset::from_str(token).map_err(|e| VeilError::validation(operation, "token", e.to_string()))
}

// ============================================================================
// Result
// ============================================================================

/// Result of a shield, transfer or unshield
#[derive(Clone, Serialize, Deserialize)]
pub struct PrivateTransaction {
    /// Ledger transaction signature (base58)
    pub signature: String,
    pub status: TransactionStatus,
    /// New commitment (shield: the deposit; transfer: the recipient's)
    pub commitment: Option<Commitment>,
    /// Nullifier consumed by a transfer or unshield
    pub nullifier: Option<Nullifier>,
    /// Proof bytes, serialized as hex
    #[serde(with = "optional_hex")]
    pub proof: Option<Vec<u8>>,
    /// Shield secret, returned so the owner can spend later
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Fresh secret for the recipient of a transfer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_secret: Option<String>,
}

impl PrivateTransaction {
    pub fn new(signature: impl Into<String>, status: TransactionStatus) -> Self {
        Self {
            signature: signature.into(),
            status,
            commitment: None,
            nullifier: None,
            proof: None,
            secret: None,
            recipient_secret: None,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == TransactionStatus::Confirmed
    }

    /// Serialize to JSON; absent secrets are omitted
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| {
            format!("{{\"signature\": \"{}\", \"status\": \"{}\"}}", self.signature, self.status)
        })
    }
}

impl fmt::Debug for PrivateTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateTransaction")
            .field("signature", &self.signature)
            .field("status", &self.status)
            .field("commitment", &self.commitment)
            .field("nullifier", &self.nullifier)
            .field("proof_len", &self.proof.as_ref().map(Vec::len))
            .finish_non_exhaustive()
    }
}

mod optional_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_some(&hex::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|s| hex::decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
