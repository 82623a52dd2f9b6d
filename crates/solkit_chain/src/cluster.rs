use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ChainError, Result};

/// Environment variable consulted for a custom RPC endpoint.
pub const RPC_URL_ENV: &str = "SOLANA_RPC_URL";

/// Public Solana networks plus a local test validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cluster {
    MainnetBeta,
    Devnet,
    Testnet,
    Localnet,
}

impl Cluster {
    pub const ALL: [Cluster; 4] = [
        Cluster::MainnetBeta,
        Cluster::Devnet,
        Cluster::Testnet,
        Cluster::Localnet,
    ];

    /// Slug used on the command line, in config files and explorer links.
    pub fn slug(&self) -> &'static str {
        match self {
            Cluster::MainnetBeta => "mainnet-beta",
            Cluster::Devnet => "devnet",
            Cluster::Testnet => "testnet",
            Cluster::Localnet => "localnet",
        }
    }

    /// Default public RPC endpoint. These are rate limited and not meant for
    /// production traffic.
    pub fn api_url(&self) -> &'static str {
        match self {
            Cluster::MainnetBeta => "https://api.mainnet-beta.solana.com",
            Cluster::Devnet => "https://api.devnet.solana.com",
            Cluster::Testnet => "https://api.testnet.solana.com",
            Cluster::Localnet => "http://localhost:8899",
        }
    }

    /// Whether the cluster hands out free SOL through `requestAirdrop`.
    pub fn supports_airdrop(&self) -> bool {
        !matches!(self, Cluster::MainnetBeta)
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Cluster {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet-beta" | "mainnet" => Ok(Cluster::MainnetBeta),
            "devnet" => Ok(Cluster::Devnet),
            "testnet" => Ok(Cluster::Testnet),
            "localnet" | "localhost" => Ok(Cluster::Localnet),
            other => Err(ChainError::UnknownCluster(other.to_string())),
        }
    }
}

/// Resolved RPC endpoint for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    pub cluster: Cluster,
    pub url: String,
    pub is_custom: bool,
    pub timeout_secs: u64,
}

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

impl RpcConfig {
    /// Point at the cluster's public endpoint.
    pub fn for_cluster(cluster: Cluster) -> Self {
        Self {
            cluster,
            url: cluster.api_url().to_string(),
            is_custom: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Use `custom_url` when given, otherwise the cluster default.
    ///
    /// Returns `Err` if the custom URL fails validation.
    pub fn resolve(cluster: Cluster, custom_url: Option<&str>) -> Result<Self> {
        let mut config = Self::for_cluster(cluster);
        if let Some(url) = custom_url.filter(|u| !u.trim().is_empty()) {
            config.set_custom_url(url.trim().to_string())?;
        }
        Ok(config)
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn set_custom_url(&mut self, url: String) -> Result<()> {
        if !validate_url(&url) {
            return Err(ChainError::InvalidUrl(url));
        }
        self.url = url;
        self.is_custom = true;
        Ok(())
    }

    /// Reset back to the cluster's public endpoint.
    pub fn reset_to_default(&mut self) {
        self.url = self.cluster.api_url().to_string();
        self.is_custom = false;
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self::for_cluster(Cluster::Devnet)
    }
}

/// Validate that a URL is well-formed and uses HTTP or HTTPS.
pub fn validate_url(url: &str) -> bool {
    match url::Url::parse(url) {
        Ok(parsed) => {
            let scheme = parsed.scheme();
            (scheme == "http" || scheme == "https") && parsed.host().is_some()
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_cluster_has_a_valid_default_url() {
        for cluster in Cluster::ALL {
            assert!(validate_url(cluster.api_url()), "{cluster}");
        }
    }

    #[test]
    fn slugs_round_trip_through_from_str() {
        for cluster in Cluster::ALL {
            assert_eq!(cluster.slug().parse::<Cluster>().unwrap(), cluster);
        }
    }

    #[test]
    fn from_str_accepts_aliases() {
        assert_eq!("Mainnet".parse::<Cluster>().unwrap(), Cluster::MainnetBeta);
        assert_eq!(" localhost ".parse::<Cluster>().unwrap(), Cluster::Localnet);
        assert!("moonnet".parse::<Cluster>().is_err());
    }

    #[test]
    fn serde_uses_kebab_case() {
        let json = serde_json::to_string(&Cluster::MainnetBeta).unwrap();
        assert_eq!(json, "\"mainnet-beta\"");
        let parsed: Cluster = serde_json::from_str("\"devnet\"").unwrap();
        assert_eq!(parsed, Cluster::Devnet);
    }

    #[test]
    fn only_mainnet_refuses_airdrops() {
        assert!(!Cluster::MainnetBeta.supports_airdrop());
        assert!(Cluster::Devnet.supports_airdrop());
        assert!(Cluster::Localnet.supports_airdrop());
    }

    #[test]
    fn resolve_without_override_uses_cluster_url() {
        let rpc = RpcConfig::resolve(Cluster::Testnet, None).unwrap();
        assert_eq!(rpc.url, "https://api.testnet.solana.com");
        assert!(!rpc.is_custom);
        assert_eq!(rpc.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn resolve_ignores_blank_override() {
        let rpc = RpcConfig::resolve(Cluster::Devnet, Some("   ")).unwrap();
        assert!(!rpc.is_custom);
    }

    #[test]
    fn resolve_with_override_marks_custom() {
        let rpc = RpcConfig::resolve(Cluster::Devnet, Some("https://my-node.example.com")).unwrap();
        assert!(rpc.is_custom);
        assert_eq!(rpc.url, "https://my-node.example.com");
        assert_eq!(rpc.cluster, Cluster::Devnet);
    }

    #[test]
    fn resolve_rejects_invalid_override() {
        assert!(RpcConfig::resolve(Cluster::Devnet, Some("not-a-url")).is_err());
        assert!(RpcConfig::resolve(Cluster::Devnet, Some("ftp://files.example.com")).is_err());
    }

    #[test]
    fn reset_to_default_restores_cluster_url() {
        let mut rpc = RpcConfig::for_cluster(Cluster::Devnet);
        rpc.set_custom_url("https://custom.example.com".into()).unwrap();
        rpc.reset_to_default();
        assert_eq!(rpc.url, Cluster::Devnet.api_url());
        assert!(!rpc.is_custom);
    }

    #[test]
    fn validate_url_rejects_garbage() {
        assert!(!validate_url(""));
        assert!(!validate_url("not a url"));
        assert!(!validate_url("ftp://server.com"));
        assert!(!validate_url("file:///etc/passwd"));
        assert!(validate_url("http://localhost:8899"));
    }
}
