//! Note Types
//!
//! Secrets, commitments and nullifiers. Commitments and nullifiers are
//! exactly 32 bytes; any conversion from raw bytes or hex of another
//! length fails before the value can reach an instruction.

use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Minimum secret length in bytes
pub const MIN_SECRET_LEN: usize = 32;

/// Random bytes behind a generated secret (hex-encoded to 64 bytes)
pub const GENERATED_SECRET_ENTROPY: usize = 32;

/// Errors converting raw input into note types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NoteError {
    #[error("expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("secret must be at least {MIN_SECRET_LEN} bytes, got {0}")]
    SecretTooShort(usize),
}

// ============================================================================
// Secret
// ============================================================================

/// Owner secret behind a commitment
///
/// Never placed on the ledger and never logged; `Debug` is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(Vec<u8>);

impl Secret {
    /// Wrap secret bytes, enforcing the minimum length
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, NoteError> {
        let bytes = bytes.into();
        if bytes.len() < MIN_SECRET_LEN {
            return Err(NoteError::SecretTooShort(bytes.len()));
        }
        Ok(Self(bytes))
    }

    /// Generate a fresh random secret
    ///
    /// The secret is the lowercase hex encoding of 32 random bytes, so the
    /// holder can write it down and pass it back as a string.
    pub fn generate() -> Self {
        let mut entropy = [0u8; GENERATED_SECRET_ENTROPY];
        rand::rngs::OsRng.fill_bytes(&mut entropy);
        Self(hex::encode(entropy).into_bytes())
    }

    /// Raw secret bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The secret as text, if it is valid UTF-8
    pub fn expose_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(<{} bytes redacted>)", self.0.len())
    }
}

impl FromStr for Secret {
    type Err = NoteError;

    /// Text secrets are used as their UTF-8 bytes
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.as_bytes().to_vec())
    }
}

// ============================================================================
// 32-byte values
// ============================================================================

fn decode_hex_32(s: &str) -> Result<[u8; 32], NoteError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s).map_err(|e| NoteError::InvalidHex(e.to_string()))?;
    to_array_32(&bytes)
}

fn to_array_32(bytes: &[u8]) -> Result<[u8; 32], NoteError> {
    bytes.try_into().map_err(|_| NoteError::InvalidLength {
        expected: 32,
        actual: bytes.len(),
    })
}

macro_rules! bytes32_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            pub const LEN: usize = 32;

            pub fn new(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// Convert from a slice, which must be exactly 32 bytes
            pub fn from_slice(bytes: &[u8]) -> Result<Self, NoteError> {
                to_array_32(bytes).map(Self)
            }

            /// Parse from hex, with or without a `0x` prefix
            pub fn from_hex(s: &str) -> Result<Self, NoteError> {
                decode_hex_32(s).map(Self)
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            pub fn to_bytes(&self) -> [u8; 32] {
                self.0
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = NoteError;

            fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
                Self::from_slice(bytes)
            }
        }

        impl FromStr for $name {
            type Err = NoteError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

bytes32_type!(
    /// Binding of (amount, secret) recorded in the pool's Merkle tree
    Commitment
);

bytes32_type!(
    /// One-time spend tag derived from a commitment and its secret
    Nullifier
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_minimum_length() {
        assert!(Secret::new(vec![7u8; 32]).is_ok());
        assert_eq!(
            Secret::new(vec![7u8; 31]).unwrap_err(),
            NoteError::SecretTooShort(31)
        );
        assert!("too short".parse::<Secret>().is_err());
    }

    #[test]
    fn test_generated_secret_is_hex_text() {
        let secret = Secret::generate();
        assert_eq!(secret.len(), 64);
        let text = secret.expose_str().unwrap();
        assert!(hex::decode(text).is_ok());
        assert_ne!(secret, Secret::generate());
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret: Secret = "my_super_secret_key_32_bytes_long!!".parse().unwrap();
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("super"));
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn test_commitment_hex_round_trip() {
        let bytes: [u8; 32] = core::array::from_fn(|i| (i as u8).wrapping_mul(37));
        let commitment = Commitment::new(bytes);
        let decoded = Commitment::from_hex(&commitment.to_hex()).unwrap();
        assert_eq!(decoded.to_bytes(), bytes);

        let prefixed = format!("0x{}", commitment.to_hex());
        assert_eq!(Commitment::from_hex(&prefixed).unwrap(), commitment);
    }

    #[test]
    fn test_wrong_lengths_rejected() {
        assert_eq!(
            Nullifier::from_slice(&[0u8; 31]).unwrap_err(),
            NoteError::InvalidLength { expected: 32, actual: 31 }
        );
        assert!(Commitment::from_hex("abcd").is_err());
        assert!(Commitment::from_hex("zz").is_err());
        assert!(Commitment::try_from(&[1u8; 33][..]).is_err());
    }

    #[test]
    fn test_serde_as_hex() {
        let nullifier = Nullifier::new([0xab; 32]);
        let json = serde_json::to_string(&nullifier).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(32)));
        let back: Nullifier = serde_json::from_str(&json).unwrap();
        assert_eq!(back, nullifier);
    }
}
