use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::cluster::Cluster;

const EXPLORER_BASE: &str = "https://explorer.solana.com";
const LOCALNET_RPC: &str = "http://localhost:8899";

/// What an explorer link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplorerCategory {
    Transaction,
    Address,
    Block,
}

impl ExplorerCategory {
    fn path_segment(&self) -> &'static str {
        match self {
            Self::Transaction => "tx",
            Self::Address => "address",
            Self::Block => "block",
        }
    }
}

impl fmt::Display for ExplorerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Transaction => "transaction",
            Self::Address => "address",
            Self::Block => "block",
        })
    }
}

impl FromStr for ExplorerCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tx" | "transaction" => Ok(Self::Transaction),
            "address" | "account" => Ok(Self::Address),
            "block" => Ok(Self::Block),
            other => Err(format!("unknown explorer category: {other}")),
        }
    }
}

/// Human-viewable Solana Explorer URL for `id` on `cluster`.
pub fn explorer_link(category: ExplorerCategory, id: &str, cluster: Cluster) -> String {
    let mut url = match Url::parse(EXPLORER_BASE) {
        Ok(url) => url,
        Err(_) => return format!("{EXPLORER_BASE}/{}/{id}", category.path_segment()),
    };
    if let Ok(mut segments) = url.path_segments_mut() {
        segments
            .pop_if_empty()
            .push(category.path_segment())
            .push(id);
    }
    match cluster {
        Cluster::MainnetBeta => {}
        Cluster::Devnet | Cluster::Testnet => {
            url.query_pairs_mut().append_pair("cluster", cluster.slug());
        }
        Cluster::Localnet => {
            url.query_pairs_mut()
                .append_pair("cluster", "custom")
                .append_pair("customUrl", LOCALNET_RPC);
        }
    }
    url.to_string()
}
