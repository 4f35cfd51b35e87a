//! Identifier newtypes.
//!
//! Two distinct identity spaces exist: `ConsulPubKey` identifies a validator
//! on the ledger, `OraclesPubKey` identifies a per-chain oracle on a target
//! chain. They are deliberately separate types; conversions are explicit and
//! fallible.
//!
//! All identifiers serialize as `0x`-prefixed hex strings so they can be used
//! both as JSON values and as JSON map keys.

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Errors from identifier parsing and conversion.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdError {
    /// Byte slice had the wrong length for this identifier.
    #[error("invalid identifier length: expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },

    /// Hex string could not be decoded.
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// Unrecognized chain type name or byte.
    #[error("unknown chain type: {0}")]
    UnknownChain(String),
}

/// Pulse identifier: monotonic per nebula, assigned by the target chain.
pub type PulseId = u64;

macro_rules! hex_id {
    ($(#[$doc:meta])* $name:ident, $len:expr) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// Identifier width in bytes.
            pub const LEN: usize = $len;

            /// Raw byte view.
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// `0x`-prefixed lowercase hex rendering.
            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }

            /// Parse from a hex string, with or without the `0x` prefix.
            pub fn from_hex(s: &str) -> Result<Self, IdError> {
                let raw = s.strip_prefix("0x").unwrap_or(s);
                let bytes = hex::decode(raw).map_err(|e| IdError::InvalidHex(e.to_string()))?;
                Self::try_from(bytes.as_slice())
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = IdError;

            fn try_from(bytes: &[u8]) -> Result<Self, IdError> {
                let arr: [u8; $len] = bytes.try_into().map_err(|_| IdError::InvalidLength {
                    expected: $len,
                    got: bytes.len(),
                })?;
                Ok(Self(arr))
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, IdError> {
                Self::from_hex(s)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
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
                struct HexVisitor;

                impl Visitor<'_> for HexVisitor {
                    type Value = $name;

                    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                        write!(f, "a 0x-prefixed hex string of {} bytes", $len)
                    }

                    fn visit_str<E: de::Error>(self, v: &str) -> Result<$name, E> {
                        $name::from_hex(v).map_err(de::Error::custom)
                    }
                }

                deserializer.deserialize_str(HexVisitor)
            }
        }
    };
}

hex_id!(
    /// Validator identity on the oracle ledger (ed25519 public key).
    ConsulPubKey,
    32
);

hex_id!(
    /// Per-chain oracle identity on a target chain.
    OraclesPubKey,
    33
);

hex_id!(
    /// Data-feed identity, scoped to one target chain.
    NebulaId,
    32
);

/// Supported target chain families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainType {
    Ethereum,
    Waves,
}

impl ChainType {
    /// Single-byte wire representation used in transaction payloads.
    pub fn as_byte(self) -> u8 {
        match self {
            ChainType::Ethereum => 0,
            ChainType::Waves => 1,
        }
    }

    /// Parse the single-byte wire representation.
    pub fn from_byte(b: u8) -> Result<Self, IdError> {
        match b {
            0 => Ok(ChainType::Ethereum),
            1 => Ok(ChainType::Waves),
            other => Err(IdError::UnknownChain(other.to_string())),
        }
    }
}

impl FromStr for ChainType {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, IdError> {
        match s {
            "ethereum" => Ok(ChainType::Ethereum),
            "waves" => Ok(ChainType::Waves),
            other => Err(IdError::UnknownChain(other.to_string())),
        }
    }
}

impl fmt::Display for ChainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainType::Ethereum => write!(f, "ethereum"),
            ChainType::Waves => write!(f, "waves"),
        }
    }
}
