use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ChainError, Result};
use crate::pubkey::{PUBKEY_BYTES, Pubkey};
use crate::rpc::{RpcClient, lamports_to_sol};

pub const DEFAULT_CLI_KEYPAIR_PATH: &str = "~/.config/solana/id.json";
pub const KEYPAIR_PAYER_ENV_NAME: &str = "PAYER_KEYPAIR";
pub const KEYPAIR_TESTER_ENV_NAME: &str = "TESTER_KEYPAIR";

const KEYPAIR_BYTES: usize = 64;

/// Where to look for a keypair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeypairSource {
    /// A Solana CLI keypair file. A leading `~` is expanded.
    File(PathBuf),
    /// An environment variable holding the same JSON byte array.
    Env(String),
}

impl fmt::Display for KeypairSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "file {}", path.display()),
            Self::Env(name) => write!(f, "env ${name}"),
        }
    }
}

/// A 64-byte Solana keypair: secret seed followed by the public key.
///
/// The secret half is never exposed; only the public key is readable.
#[derive(Clone)]
pub struct Keypair {
    bytes: [u8; KEYPAIR_BYTES],
}

impl Keypair {
    pub fn pubkey(&self) -> Pubkey {
        let mut public = [0u8; PUBKEY_BYTES];
        public.copy_from_slice(&self.bytes[KEYPAIR_BYTES - PUBKEY_BYTES..]);
        Pubkey::new(public)
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("pubkey", &self.pubkey())
            .finish_non_exhaustive()
    }
}

/// Parse the `[12, 34, ...]` format written by `solana-keygen`.
pub fn parse_keypair_json(text: &str) -> Result<Keypair> {
    let raw: Vec<u8> = serde_json::from_str(text.trim())
        .map_err(|e| ChainError::Keypair(format!("expected a JSON byte array: {e}")))?;
    let bytes: [u8; KEYPAIR_BYTES] = raw.as_slice().try_into().map_err(|_| {
        ChainError::Keypair(format!("expected {KEYPAIR_BYTES} bytes, found {}", raw.len()))
    })?;
    Ok(Keypair { bytes })
}

/// Expand a leading `~` to the home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

fn load_from(source: &KeypairSource) -> Result<Keypair> {
    match source {
        KeypairSource::File(path) => {
            let path = expand_tilde(path);
            let text = std::fs::read_to_string(&path).map_err(|e| {
                ChainError::Keypair(format!("unable to read {}: {e}", path.display()))
            })?;
            parse_keypair_json(&text)
        }
        KeypairSource::Env(name) => {
            let text = std::env::var(name)
                .map_err(|_| ChainError::Keypair(format!("environment variable {name} is not set")))?;
            parse_keypair_json(&text)
        }
    }
}

/// Load the first keypair that resolves, trying `sources` in order.
pub fn load_keypair(sources: &[KeypairSource]) -> Result<Keypair> {
    let mut failures = Vec::new();
    for source in sources {
        match load_from(source) {
            Ok(keypair) => {
                info!(%source, pubkey = %keypair.pubkey(), "keypair loaded");
                return Ok(keypair);
            }
            Err(e) => {
                debug!(%source, error = %e, "keypair source unavailable");
                failures.push(format!("{source}: {e}"));
            }
        }
    }
    Err(ChainError::Keypair(if failures.is_empty() {
        "no keypair sources given".into()
    } else {
        failures.join("; ")
    }))
}

/// Airdrop `airdrop_lamports` when the balance is below `min_lamports`.
/// Returns the airdrop signature when one was requested.
pub async fn ensure_funded(
    rpc: &RpcClient,
    address: &Pubkey,
    min_lamports: u64,
    airdrop_lamports: u64,
) -> Result<Option<String>> {
    let balance = rpc.get_balance(address).await?;
    if balance >= min_lamports {
        debug!(%address, balance, "balance sufficient, no airdrop");
        return Ok(None);
    }
    let signature = rpc.request_airdrop(address, airdrop_lamports).await?;
    info!(
        %address,
        balance_sol = lamports_to_sol(balance),
        airdrop_sol = lamports_to_sol(airdrop_lamports),
        %signature,
        "airdrop requested"
    );
    Ok(Some(signature))
}
