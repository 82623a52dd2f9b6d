use thiserror::Error;

use crate::pubkey::PubkeyError;

/// Errors raised by the chain helpers.
///
/// The key store and the signature extractor never surface these to their
/// callers; they log and degrade instead. The RPC client and keypair loader
/// propagate them.
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid public key: {0}")]
    InvalidPubkey(#[from] PubkeyError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// A submitted transaction failed and the signature is known.
    #[error("Transaction {signature} failed: {message}")]
    TransactionFailed { signature: String, message: String },

    #[error("key store error: {0}")]
    KeyStore(String),

    #[error("keypair error: {0}")]
    Keypair(String),

    #[error("invalid RPC URL: {0}")]
    InvalidUrl(String),

    #[error("unknown cluster: {0}")]
    UnknownCluster(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),
}

impl ChainError {
    /// The structured transaction signature carried by this error, if any.
    pub fn signature(&self) -> Option<&str> {
        match self {
            Self::TransactionFailed { signature, .. } => Some(signature),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ChainError>;
