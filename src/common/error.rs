//! Common Error Types for Veil
//!
//! Every protocol error carries the operation it came from, and where it
//! makes sense the offending field, so a caller can tell what to fix
//! without parsing messages.

use std::fmt;

use thiserror::Error;

use crate::crypto::CryptoError;
use crate::ledger::LedgerError;
use crate::proof::ProofError;

/// Public operations of the protocol layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Initialize,
    Shield,
    Transfer,
    Unshield,
    Query,
    Derive,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Initialize => "initialize",
            Operation::Shield => "shield",
            Operation::Transfer => "transfer",
            Operation::Unshield => "unshield",
            Operation::Query => "query",
            Operation::Derive => "derive",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Root error type for Veil
#[derive(Debug, Error)]
pub enum VeilError {
    /// Rejected before any crypto or network call
    #[error("{operation}: invalid {field}: {reason}")]
    Validation {
        operation: Operation,
        field: &'static str,
        reason: String,
    },

    /// Commitment / nullifier / hash primitive failure
    #[error("{operation}: crypto primitive failed on {field}: {source}")]
    Crypto {
        operation: Operation,
        field: &'static str,
        #[source]
        source: CryptoError,
    },

    /// Proof construction or verification failure
    #[error("{operation}: proof error: {source}")]
    Proof {
        operation: Operation,
        #[source]
        source: ProofError,
    },

    /// The nullifier marker already exists on the ledger
    #[error("{operation}: nullifier {nullifier} already spent")]
    Conflict {
        operation: Operation,
        nullifier: String,
    },

    /// Ledger unreachable, submission rejected or timed out
    #[error("{operation}: ledger error: {source}")]
    Transport {
        operation: Operation,
        #[source]
        source: LedgerError,
    },

    /// No off-curve address found for the seeds; fatal configuration error
    #[error("{operation}: no valid program address for seeds {seeds}")]
    AddressDerivation {
        operation: Operation,
        seeds: String,
    },

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),

    /// Logging errors
    #[error("logging error: {0}")]
    Logging(#[from] super::logging::LoggingError),
}

impl VeilError {
    /// Create a validation error
    pub fn validation(
        operation: Operation,
        field: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::Validation {
            operation,
            field,
            reason: reason.into(),
        }
    }

    /// Create a crypto error
    pub fn crypto(operation: Operation, field: &'static str, source: CryptoError) -> Self {
        Self::Crypto {
            operation,
            field,
            source,
        }
    }

    /// Create a proof error
    pub fn proof(operation: Operation, source: ProofError) -> Self {
        Self::Proof { operation, source }
    }

    /// Create a conflict error for a spent nullifier
    pub fn conflict(operation: Operation, nullifier: impl fmt::Display) -> Self {
        Self::Conflict {
            operation,
            nullifier: nullifier.to_string(),
        }
    }

    /// Wrap a ledger error. "Account in use" on the marker is a conflict.
    pub fn ledger(
        operation: Operation,
        source: LedgerError,
        nullifier: Option<impl fmt::Display>,
    ) -> Self {
        match (source, nullifier) {
            (LedgerError::AccountInUse(_), Some(nullifier)) => Self::conflict(operation, nullifier),
            (source, _) => Self::Transport { operation, source },
        }
    }

    /// Operation the error belongs to, if any
    pub fn operation(&self) -> Option<Operation> {
        match self {
            VeilError::Validation { operation, .. }
            | VeilError::Crypto { operation, .. }
            | VeilError::Proof { operation, .. }
            | VeilError::Conflict { operation, .. }
            | VeilError::Transport { operation, .. }
            | VeilError::AddressDerivation { operation, .. } => Some(*operation),
            VeilError::Config(_) | VeilError::Logging(_) => None,
        }
    }

    /// Offending field for validation and crypto errors
    pub fn field(&self) -> Option<&'static str> {
        match self {
            VeilError::Validation { field, .. } | VeilError::Crypto { field, .. } => Some(field),
            VeilError::Conflict { .. } => Some("nullifier"),
            _ => None,
        }
    }

    /// Check if this is a retryable error
    ///
    /// Only transport failures qualify. A conflict never does: retrying it
    /// with the same nullifier can only fail again.
    pub fn is_retryable(&self) -> bool {
        match self {
            VeilError::Transport { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    /// Get a stable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            VeilError::Validation { .. } => "VALIDATION_ERROR",
            VeilError::Crypto { .. } => "CRYPTO_ERROR",
            VeilError::Proof { .. } => "PROOF_ERROR",
            VeilError::Conflict { .. } => "NULLIFIER_CONFLICT",
            VeilError::Transport { .. } => "TRANSPORT_ERROR",
            VeilError::AddressDerivation { .. } => "ADDRESS_DERIVATION_ERROR",
            VeilError::Config(_) => "CONFIG_ERROR",
            VeilError::Logging(_) => "LOGGING_ERROR",
        }
    }
}

/// Result type alias using VeilError
pub type Result<T> = std::result::Result<T, VeilError>;
