use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// Environment variables that override file settings.
pub const ENV_RPC_URL: &str = "SOLANA_RPC_URL";
pub const ENV_CLUSTER: &str = "SOLKIT_CLUSTER";
pub const ENV_KEYS_FILE: &str = "SOLKIT_KEYS_FILE";

// ---------------------------------------------------------------------------
// MalformedKeyPolicy
// ---------------------------------------------------------------------------

/// What the key store does with a stored value that is not a valid public key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedKeyPolicy {
    /// Keep the name with an empty placeholder value.
    #[default]
    Placeholder,
    /// Drop the entry.
    Skip,
    /// Treat the whole file as unreadable.
    Reject,
}

impl fmt::Display for MalformedKeyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Placeholder => "placeholder",
            Self::Skip => "skip",
            Self::Reject => "reject",
        })
    }
}

impl FromStr for MalformedKeyPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "placeholder" => Ok(Self::Placeholder),
            "skip" => Ok(Self::Skip),
            "reject" => Ok(Self::Reject),
            other => anyhow::bail!("unknown malformed key policy: {other}"),
        }
    }
}

// ---------------------------------------------------------------------------
// SolkitConfig
// ---------------------------------------------------------------------------

/// Settings stored at `~/.solkit/config.json`.
///
/// No secret material is kept here; keypairs stay in their own files or in
/// environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolkitConfig {
    // Network
    pub cluster: String,
    pub rpc_url: Option<String>,
    pub rpc_timeout_secs: u64,
    pub log_fetch_timeout_secs: u64,

    // Local key store
    pub key_store_path: PathBuf,
    pub malformed_key_policy: MalformedKeyPolicy,

    // Payer keypair
    pub payer_keypair_path: String,
    pub payer_keypair_env: String,

    // General
    pub log_level: String,
}

impl Default for SolkitConfig {
    fn default() -> Self {
        Self {
            cluster: "devnet".into(),
            rpc_url: None,
            rpc_timeout_secs: 30,
            log_fetch_timeout_secs: 5,
            key_store_path: Path::new(".local_keys").join("keys.json"),
            malformed_key_policy: MalformedKeyPolicy::Placeholder,
            payer_keypair_path: "~/.config/solana/id.json".into(),
            payer_keypair_env: "PAYER_KEYPAIR".into(),
            log_level: "info".into(),
        }
    }
}

impl SolkitConfig {
    /// Returns the base config directory: `~/.solkit/`
    pub fn base_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".solkit"))
    }

    /// Returns the config file path: `~/.solkit/config.json`
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("config.json"))
    }

    /// Returns the logs directory: `~/.solkit/logs/`
    pub fn logs_dir() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("logs"))
    }

    /// Ensures all required directories exist.
    pub fn ensure_dirs() -> Result<()> {
        let dirs = [Self::base_dir()?, Self::logs_dir()?];
        for dir in &dirs {
            if !dir.exists() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
            }
        }
        Ok(())
    }

    /// Loads config from disk, or creates default if missing, then applies
    /// environment overrides.
    pub fn load() -> Result<Self> {
        Self::ensure_dirs()?;
        let path = Self::config_path()?;
        let mut config = Self::load_from_path(&path)?;
        config.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Load config from a specific file path.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let config: Self = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            info!("Loaded config from {}", path.display());
            Ok(config)
        } else {
            let config = Self::default();
            config.save_to_path(path)?;
            info!("Created default config at {}", path.display());
            Ok(config)
        }
    }

    /// Save config to a specific file path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Apply overrides from the environment. `lookup` is injected so tests
    /// need not touch the process environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_RPC_URL).filter(|v| !v.trim().is_empty()) {
            self.rpc_url = Some(url);
        }
        if let Some(cluster) = lookup(ENV_CLUSTER).filter(|v| !v.trim().is_empty()) {
            self.cluster = cluster;
        }
        if let Some(path) = lookup(ENV_KEYS_FILE).filter(|v| !v.trim().is_empty()) {
            self.key_store_path = PathBuf::from(path);
        }
    }
}
