use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Command-line surface. Every subcommand is a single, self-contained step
/// of the demo scripts.
#[derive(Parser, Debug)]
#[command(
    name = "solkit",
    about = "Local helpers for Solana demo scripts",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Cluster to talk to (mainnet-beta, devnet, testnet, localnet).
    #[arg(long, global = true)]
    pub cluster: Option<String>,

    /// Custom RPC endpoint; overrides the cluster's public URL.
    #[arg(long, global = true)]
    pub rpc_url: Option<String>,

    /// Key store file; defaults to `.local_keys/keys.json`.
    #[arg(long, global = true)]
    pub keys_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Manage locally stored public keys.
    #[command(subcommand)]
    Keys(KeysCommand),
    /// Print an account's balance.
    Balance {
        /// Base58 address or a name from the key store.
        target: String,
    },
    /// Print the rent-exempt minimum for one or more account sizes.
    Rent {
        #[arg(required = true)]
        bytes: Vec<usize>,
    },
    /// Print the latest blockhash.
    Blockhash,
    /// Print an account's on-chain info.
    Account { target: String },
    /// Print the program logs of a transaction.
    TxLogs { signature: String },
    /// Pull a transaction signature out of an error message.
    Extract {
        message: String,
        /// Also fetch and print the transaction's logs.
        #[arg(long)]
        fetch_logs: bool,
    },
    /// Request an airdrop (not available on mainnet-beta).
    Airdrop {
        target: String,
        #[arg(long, default_value_t = 1.0)]
        sol: f64,
    },
    /// Show the payer keypair's address.
    Payer {
        /// Airdrop when the balance is low.
        #[arg(long)]
        fund: bool,
    },
    /// Print a Solana Explorer link.
    Explorer {
        /// tx, address or block.
        category: String,
        id: String,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum KeysCommand {
    /// List every stored name.
    List,
    /// Show one stored key.
    Show { name: String },
    /// Store (or overwrite) a named public key.
    Save { name: String, pubkey: String },
}
