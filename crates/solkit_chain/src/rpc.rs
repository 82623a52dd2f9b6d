//! Minimal JSON-RPC client for the handful of Solana calls the demos make.
//!
//! Only read calls, airdrops, and submission of an already-signed
//! transaction are covered. Building and signing transactions is left to the
//! caller.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::cluster::RpcConfig;
use crate::error::{ChainError, Result};
use crate::pubkey::Pubkey;
use crate::signature::TransactionLogSource;

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

const DEFAULT_COMMITMENT: &str = "confirmed";

pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

pub fn sol_to_lamports(sol: f64) -> u64 {
    (sol * LAMPORTS_PER_SOL as f64).round() as u64
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestBlockhash {
    pub blockhash: String,
    pub last_valid_block_height: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub lamports: u64,
    pub owner: String,
    pub executable: bool,
    pub rent_epoch: u64,
    #[serde(default)]
    pub space: Option<u64>,
    /// Raw `[payload, encoding]` pair as returned by the node.
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMeta {
    #[serde(default)]
    pub err: Option<Value>,
    #[serde(default)]
    pub fee: u64,
    #[serde(default)]
    pub log_messages: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub slot: u64,
    #[serde(default)]
    pub block_time: Option<i64>,
    #[serde(default)]
    pub meta: Option<TransactionMeta>,
}

impl TransactionRecord {
    pub fn log_messages(&self) -> Option<&[String]> {
        self.meta.as_ref()?.log_messages.as_deref()
    }

    pub fn succeeded(&self) -> bool {
        self.meta.as_ref().is_none_or(|m| m.err.is_none())
    }

    pub fn block_time_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.block_time?, 0)
    }
}

/// Decode a JSON-RPC response body. A `null` result is `Ok(None)`.
fn parse_response<T: DeserializeOwned>(body: &str) -> Result<Option<T>> {
    let response: RpcResponse<T> = serde_json::from_str(body)?;
    if let Some(err) = response.error {
        if let Some(logs) = err
            .data
            .as_ref()
            .and_then(|d| d.get("logs"))
            .and_then(Value::as_array)
        {
            for line in logs.iter().filter_map(Value::as_str) {
                debug!(code = err.code, "{line}");
            }
        }
        return Err(ChainError::Rpc {
            code: err.code,
            message: err.message,
        });
    }
    Ok(response.result)
}

/// First signature of a base64-encoded wire transaction, if it has one.
pub fn first_signature(wire_base64: &str) -> Option<String> {
    let bytes = BASE64.decode(wire_base64.trim()).ok()?;
    let (&count, rest) = bytes.split_first()?;
    // Compact-u16 length prefix; counts below 128 take a single byte.
    if count == 0 || count & 0x80 != 0 {
        return None;
    }
    let signature = rest.get(..64)?;
    Some(bs58::encode(signature).into_string())
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Blocking-free JSON-RPC client bound to a single endpoint.
pub struct RpcClient {
    config: RpcConfig,
    client: reqwest::Client,
    commitment: String,
}

impl RpcClient {
    pub fn new(config: RpcConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            config,
            client,
            commitment: DEFAULT_COMMITMENT.into(),
        })
    }

    pub fn with_commitment(mut self, commitment: impl Into<String>) -> Self {
        self.commitment = commitment.into();
        self
    }

    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<Option<T>> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };
        debug!(url = %self.config.url, %method, "rpc request");

        let response = self
            .client
            .post(&self.config.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ChainError::Timeout(self.config.timeout_secs)
                } else {
                    ChainError::Http(e)
                }
            })?;
        let body = response.error_for_status()?.text().await?;
        parse_response(&body)
    }

    async fn call_required<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        self.call(method, params).await?.ok_or_else(|| ChainError::Rpc {
            code: 0,
            message: format!("{method} returned no result"),
        })
    }

    /// Balance in lamports.
    pub async fn get_balance(&self, address: &Pubkey) -> Result<u64> {
        let params = json!([address.to_base58(), { "commitment": self.commitment }]);
        let ctx: WithContext<u64> = self.call_required("getBalance", params).await?;
        Ok(ctx.value)
    }

    /// Lamports an account of `space` bytes must hold to be rent exempt.
    pub async fn get_minimum_balance_for_rent_exemption(&self, space: usize) -> Result<u64> {
        self.call_required("getMinimumBalanceForRentExemption", json!([space]))
            .await
    }

    pub async fn get_latest_blockhash(&self) -> Result<LatestBlockhash> {
        let params = json!([{ "commitment": self.commitment }]);
        let ctx: WithContext<LatestBlockhash> =
            self.call_required("getLatestBlockhash", params).await?;
        Ok(ctx.value)
    }

    /// `None` when the account has never been allocated.
    pub async fn get_account_info(&self, address: &Pubkey) -> Result<Option<AccountInfo>> {
        let params = json!([
            address.to_base58(),
            { "encoding": "base64", "commitment": self.commitment }
        ]);
        let ctx: WithContext<Option<AccountInfo>> =
            self.call_required("getAccountInfo", params).await?;
        Ok(ctx.value)
    }

    /// `None` when the node has no record of the signature.
    pub async fn get_transaction(&self, signature: &str) -> Result<Option<TransactionRecord>> {
        let params = json!([
            signature,
            {
                "encoding": "json",
                "commitment": self.commitment,
                "maxSupportedTransactionVersion": 0
            }
        ]);
        self.call("getTransaction", params).await
    }

    /// Ask the cluster faucet for `lamports`. Returns the airdrop signature.
    pub async fn request_airdrop(&self, address: &Pubkey, lamports: u64) -> Result<String> {
        if !self.config.cluster.supports_airdrop() {
            return Err(ChainError::Rpc {
                code: 0,
                message: format!("airdrops are not available on {}", self.config.cluster),
            });
        }
        let params = json!([address.to_base58(), lamports]);
        self.call_required("requestAirdrop", params).await
    }

    /// Submit an already-signed, base64-encoded transaction.
    ///
    /// When the node rejects it, the error carries the transaction's first
    /// signature so it can be looked up afterwards.
    pub async fn send_transaction(&self, wire_base64: &str) -> Result<String> {
        let params = json!([
            wire_base64,
            { "encoding": "base64", "preflightCommitment": self.commitment }
        ]);
        match self.call_required::<String>("sendTransaction", params).await {
            Ok(signature) => Ok(signature),
            Err(ChainError::Rpc { code, message }) => match first_signature(wire_base64) {
                Some(signature) => {
                    warn!(%signature, code, %message, "transaction rejected");
                    Err(ChainError::TransactionFailed { signature, message })
                }
                None => Err(ChainError::Rpc { code, message }),
            },
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl TransactionLogSource for RpcClient {
    async fn transaction_logs(&self, signature: &str) -> Result<Option<Vec<String>>> {
        let record = self.get_transaction(signature).await?;
        Ok(record.and_then(|r| r.meta).and_then(|m| m.log_messages))
    }
}
