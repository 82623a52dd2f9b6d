mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use solkit_core::config::SolkitConfig;
use solkit_core::logging;

use crate::cli::Cli;
use crate::commands::Context;

#[tokio::main]
async fn main() -> Result<()> {
    // Optional `.env` next to the scripts.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = SolkitConfig::load()?;
    let _log_guard = logging::init_logging(&config)?;

    let ctx = Context::new(&cli, config).inspect_err(|e| error!("Startup failed: {e:#}"))?;
    info!(
        cluster = %ctx.rpc.cluster,
        rpc = %ctx.rpc.url,
        keys = %ctx.keys.path().display(),
        "solkit ready"
    );

    commands::run(cli.command, &ctx).await
}
