use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as _, Result};
use tracing::warn;

use solkit_chain::keypair::{KeypairSource, ensure_funded, load_keypair};
use solkit_chain::{
    Cluster, ExplorerCategory, KeyStore, LAMPORTS_PER_SOL, Pubkey, RpcClient, RpcConfig,
    SignatureExtractor, ensure_key_dir, explorer_link, lamports_to_sol, sol_to_lamports,
};
use solkit_core::config::SolkitConfig;

use crate::cli::{Cli, Command, KeysCommand};

/// Fund the payer when it drops below half a SOL.
const MIN_PAYER_LAMPORTS: u64 = LAMPORTS_PER_SOL / 2;

/// Everything a subcommand needs, resolved once from config and flags.
pub struct Context {
    pub config: SolkitConfig,
    pub rpc: RpcConfig,
    pub keys: KeyStore,
}

impl Context {
    /// Flags win over environment, which wins over the config file.
    pub fn new(cli: &Cli, mut config: SolkitConfig) -> Result<Self> {
        if let Some(cluster) = &cli.cluster {
            config.cluster = cluster.clone();
        }
        if let Some(url) = &cli.rpc_url {
            config.rpc_url = Some(url.clone());
        }
        if let Some(path) = &cli.keys_file {
            config.key_store_path = path.clone();
        }

        let cluster: Cluster = config.cluster.parse()?;
        let rpc = RpcConfig::resolve(cluster, config.rpc_url.as_deref())?
            .with_timeout(config.rpc_timeout_secs);
        let keys =
            KeyStore::new(config.key_store_path.clone()).with_policy(config.malformed_key_policy);

        Ok(Self { config, rpc, keys })
    }

    fn client(&self) -> Result<RpcClient> {
        RpcClient::new(self.rpc.clone()).context("Failed to build RPC client")
    }

    /// A stored name first, then a literal base58 address.
    fn resolve_address(&self, target: &str) -> Result<Pubkey> {
        if let Some(key) = self.keys.get(target) {
            return Ok(key);
        }
        target
            .parse()
            .with_context(|| format!("'{target}' is neither a stored name nor a valid address"))
    }

    fn payer_sources(&self) -> Vec<KeypairSource> {
        vec![
            KeypairSource::Env(self.config.payer_keypair_env.clone()),
            KeypairSource::File(PathBuf::from(&self.config.payer_keypair_path)),
        ]
    }
}

pub async fn run(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Keys(cmd) => run_keys(cmd, ctx),
        Command::Balance { target } => run_balance(&target, ctx).await,
        Command::Rent { bytes } => run_rent(&bytes, ctx).await,
        Command::Blockhash => run_blockhash(ctx).await,
        Command::Account { target } => run_account(&target, ctx).await,
        Command::TxLogs { signature } => run_tx_logs(&signature, ctx).await,
        Command::Extract {
            message,
            fetch_logs,
        } => run_extract(&message, fetch_logs, ctx).await,
        Command::Airdrop { target, sol } => run_airdrop(&target, sol, ctx).await,
        Command::Payer { fund } => run_payer(fund, ctx).await,
        Command::Explorer { category, id } => run_explorer(&category, &id, ctx),
    }
}

fn run_keys(cmd: KeysCommand, ctx: &Context) -> Result<()> {
    match cmd {
        KeysCommand::List => {
            let keys = ctx.keys.load();
            if keys.is_empty() {
                println!("No keys stored in {}", ctx.keys.path().display());
            }
            for (name, key) in &keys {
                println!("{name}: {key}");
            }
        }
        KeysCommand::Show { name } => match ctx.keys.load().get(&name) {
            Some(key) => println!("{name}: {key}"),
            None => anyhow::bail!("no key named '{name}' in {}", ctx.keys.path().display()),
        },
        KeysCommand::Save { name, pubkey } => {
            let key: Pubkey = pubkey
                .parse()
                .with_context(|| format!("'{pubkey}' is not a valid public key"))?;
            ensure_key_dir(ctx.keys.path()).with_context(|| {
                format!("Failed to create directory for {}", ctx.keys.path().display())
            })?;
            let saved = ctx.keys.save(&name, &key);
            if saved.is_empty() {
                anyhow::bail!("key store state unknown after save; see warnings above");
            }
            println!("Saved {name}: {key} ({} stored)", saved.len());
        }
    }
    Ok(())
}

async fn run_balance(target: &str, ctx: &Context) -> Result<()> {
    let address = ctx.resolve_address(target)?;
    let lamports = ctx.client()?.get_balance(&address).await?;
    println!("Account address: {address}");
    println!("Current balance (in lamports): {lamports}");
    println!("Current balance (in SOL): {}", lamports_to_sol(lamports));
    Ok(())
}

async fn run_rent(sizes: &[usize], ctx: &Context) -> Result<()> {
    let client = ctx.client()?;
    for &space in sizes {
        let lamports = client.get_minimum_balance_for_rent_exemption(space).await?;
        println!("Total lamports to store {space} bytes: {lamports}");
        println!("Total in SOL: {}", lamports_to_sol(lamports));
    }
    Ok(())
}

async fn run_blockhash(ctx: &Context) -> Result<()> {
    let latest = ctx.client()?.get_latest_blockhash().await?;
    println!("blockhash: {}", latest.blockhash);
    println!("lastValidBlockHeight: {}", latest.last_valid_block_height);
    Ok(())
}

async fn run_account(target: &str, ctx: &Context) -> Result<()> {
    let address = ctx.resolve_address(target)?;
    match ctx.client()?.get_account_info(&address).await? {
        Some(info) => {
            println!("Account info for: {address}");
            println!("  owner: {}", info.owner);
            println!("  lamports: {}", info.lamports);
            println!("  executable: {}", info.executable);
            println!("  rentEpoch: {}", info.rent_epoch);
            if let Some(space) = info.space {
                println!("  space: {space}");
            }
        }
        None => println!("Account {address} does not exist on {}", ctx.rpc.cluster),
    }
    Ok(())
}

async fn run_tx_logs(signature: &str, ctx: &Context) -> Result<()> {
    let record = ctx.client()?.get_transaction(signature).await?;
    println!(
        "{}",
        explorer_link(ExplorerCategory::Transaction, signature, ctx.rpc.cluster)
    );
    let Some(record) = record else {
        println!("Transaction not found");
        return Ok(());
    };
    println!("slot: {}", record.slot);
    if let Some(when) = record.block_time_utc() {
        println!("block time: {}", when.to_rfc3339());
    }
    println!("status: {}", if record.succeeded() { "ok" } else { "failed" });
    match record.log_messages() {
        Some(lines) => lines.iter().for_each(|line| println!("{line}")),
        None => println!("No log messages provided by RPC"),
    }
    Ok(())
}

async fn run_extract(message: &str, fetch_logs: bool, ctx: &Context) -> Result<()> {
    let client = ctx.client()?;
    let extractor = SignatureExtractor::new(&client, ctx.rpc.cluster)
        .with_timeout(Duration::from_secs(ctx.config.log_fetch_timeout_secs));
    match extractor.extract(message, fetch_logs).await {
        Some(signature) => println!("{signature}"),
        None => println!("No transaction signature found"),
    }
    Ok(())
}

async fn run_airdrop(target: &str, sol: f64, ctx: &Context) -> Result<()> {
    if !sol.is_finite() || sol <= 0.0 {
        anyhow::bail!("airdrop amount must be a positive number of SOL");
    }
    let address = ctx.resolve_address(target)?;
    let signature = ctx
        .client()?
        .request_airdrop(&address, sol_to_lamports(sol))
        .await?;
    println!("Airdrop requested: {signature}");
    println!(
        "{}",
        explorer_link(ExplorerCategory::Transaction, &signature, ctx.rpc.cluster)
    );
    Ok(())
}

async fn run_payer(fund: bool, ctx: &Context) -> Result<()> {
    let payer = load_keypair(&ctx.payer_sources()).context("No payer keypair available")?;
    let address = payer.pubkey();
    println!("Payer address: {address}");

    if fund {
        let client = ctx.client()?;
        match ensure_funded(&client, &address, MIN_PAYER_LAMPORTS, LAMPORTS_PER_SOL).await {
            Ok(Some(signature)) => println!("Airdrop requested: {signature}"),
            Ok(None) => println!("Balance sufficient, no airdrop needed"),
            Err(e) => warn!(error = %e, "unable to fund payer"),
        }
    }
    Ok(())
}

fn run_explorer(category: &str, id: &str, ctx: &Context) -> Result<()> {
    let category: ExplorerCategory = category.parse().map_err(anyhow::Error::msg)?;
    println!("{}", explorer_link(category, id, ctx.rpc.cluster));
    Ok(())
}
