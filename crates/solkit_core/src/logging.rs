use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::SolkitConfig;

/// Default directives layered on top of the configured level.
fn default_filter(level: &str) -> String {
    format!("{level},solkit_app=debug,solkit_chain=debug,solkit_core=debug,hyper=warn,reqwest=warn")
}

/// Initializes the logging system with file + console output.
/// Returns a guard that must be kept alive for the duration of the process.
pub fn init_logging(config: &SolkitConfig) -> Result<WorkerGuard> {
    let logs_dir = SolkitConfig::logs_dir()?;
    std::fs::create_dir_all(&logs_dir)?;

    // File appender: daily rotation
    let file_appender = tracing_appender::rolling::daily(&logs_dir, "solkit");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(&config.log_level)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .without_time()
                .compact(),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    Ok(guard)
}
