use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

pub const PUBKEY_BYTES: usize = 32;

/// Upper bound on the base58 length of a 32-byte key.
const MAX_BASE58_LEN: usize = 44;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PubkeyError {
    #[error("empty string")]
    Empty,

    #[error("string too long for a public key ({0} chars)")]
    TooLong(usize),

    #[error("invalid base58: {0}")]
    InvalidBase58(String),

    #[error("expected {PUBKEY_BYTES} bytes, decoded {0}")]
    WrongLength(usize),
}

/// An account address: 32 bytes, rendered as base58.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pubkey([u8; PUBKEY_BYTES]);

impl Pubkey {
    pub const fn new(bytes: [u8; PUBKEY_BYTES]) -> Self {
        Self(bytes)
    }

    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, PubkeyError> {
        let array: [u8; PUBKEY_BYTES] = bytes
            .try_into()
            .map_err(|_| PubkeyError::WrongLength(bytes.len()))?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; PUBKEY_BYTES] {
        &self.0
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }
}

impl FromStr for Pubkey {
    type Err = PubkeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(PubkeyError::Empty);
        }
        if s.len() > MAX_BASE58_LEN {
            return Err(PubkeyError::TooLong(s.len()));
        }
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| PubkeyError::InvalidBase58(e.to_string()))?;
        Self::try_from_slice(&bytes)
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pubkey({})", self.to_base58())
    }
}

impl Serialize for Pubkey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base58())
    }
}

impl<'de> Deserialize<'de> for Pubkey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
