use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::Value;
use solkit_core::config::MalformedKeyPolicy;
use tracing::{debug, info, warn};

use crate::error::{ChainError, Result};
use crate::pubkey::{Pubkey, PubkeyError};

pub const DEFAULT_KEY_DIR_NAME: &str = ".local_keys";
pub const DEFAULT_PUBLIC_KEY_FILE: &str = "keys.json";

/// `.local_keys/keys.json`, relative to the working directory.
pub fn default_key_store_path() -> PathBuf {
    Path::new(DEFAULT_KEY_DIR_NAME).join(DEFAULT_PUBLIC_KEY_FILE)
}

/// In-memory value of one named entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredKey {
    Valid(Pubkey),
    /// Stand-in for a value that did not decode. Written back as `""`.
    Placeholder,
}

impl StoredKey {
    pub fn pubkey(&self) -> Option<&Pubkey> {
        match self {
            Self::Valid(key) => Some(key),
            Self::Placeholder => None,
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            Self::Valid(key) => key.to_base58(),
            Self::Placeholder => String::new(),
        }
    }
}

impl fmt::Display for StoredKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid(key) => write!(f, "{key}"),
            Self::Placeholder => f.write_str("<undecodable>"),
        }
    }
}

/// Result of decoding a single stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryDecode {
    Decoded(Pubkey),
    Malformed { raw: String, reason: PubkeyError },
}

impl EntryDecode {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(text) => match text.parse::<Pubkey>() {
                Ok(key) => Self::Decoded(key),
                Err(reason) => Self::Malformed {
                    raw: text.clone(),
                    reason,
                },
            },
            other => Self::Malformed {
                raw: other.to_string(),
                reason: PubkeyError::InvalidBase58("value is not a string".into()),
            },
        }
    }
}

pub type KeyMap = BTreeMap<String, StoredKey>;

/// Named public keys persisted as one flat JSON object.
///
/// Every operation re-reads the file; nothing is cached between calls. There
/// is no locking, so two processes saving at once race and the last writer
/// wins.
#[derive(Debug, Clone)]
pub struct KeyStore {
    path: PathBuf,
    policy: MalformedKeyPolicy,
}

impl KeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            policy: MalformedKeyPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: MalformedKeyPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> MalformedKeyPolicy {
        self.policy
    }

    /// Read every entry. A missing or unparseable file yields an empty map,
    /// as does a rejected entry under [`MalformedKeyPolicy::Reject`].
    pub fn load(&self) -> KeyMap {
        self.decode().unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "key store rejected, treating as empty");
            KeyMap::new()
        })
    }

    /// Insert or overwrite `name`, write the whole file, and return what is
    /// now on disk. Any failure is logged and reported as an empty map, which
    /// callers must read as "state unknown".
    pub fn save(&self, name: &str, key: &Pubkey) -> KeyMap {
        match self.try_save(name, key) {
            Ok(keys) => keys,
            Err(e) => {
                warn!(path = %self.path.display(), %name, error = %e, "unable to save key to file");
                KeyMap::new()
            }
        }
    }

    /// Look up a single valid key by name.
    pub fn get(&self, name: &str) -> Option<Pubkey> {
        self.load().get(name).and_then(|k| k.pubkey().copied())
    }

    /// Apply the policy to every stored entry. Only a rejected entry is an
    /// error; a missing or unparseable file decodes to an empty map.
    fn decode(&self) -> Result<KeyMap> {
        let raw = match self.read_raw() {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(path = %self.path.display(), "key store file not found, starting empty");
                return Ok(KeyMap::new());
            }
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "key store unreadable, treating as empty");
                return Ok(KeyMap::new());
            }
        };

        let mut keys = KeyMap::new();
        for (name, decoded) in raw {
            match decoded {
                EntryDecode::Decoded(key) => {
                    keys.insert(name, StoredKey::Valid(key));
                }
                EntryDecode::Malformed { raw, reason } => match self.policy {
                    MalformedKeyPolicy::Placeholder => {
                        warn!(%name, %raw, %reason, "stored key did not decode, keeping placeholder");
                        keys.insert(name, StoredKey::Placeholder);
                    }
                    MalformedKeyPolicy::Skip => {
                        warn!(%name, %raw, %reason, "stored key did not decode, skipping entry");
                    }
                    MalformedKeyPolicy::Reject => {
                        return Err(ChainError::KeyStore(format!(
                            "stored key '{name}' did not decode ({reason}): {raw}"
                        )));
                    }
                },
            }
        }
        Ok(keys)
    }

    /// A rejected file is left untouched.
    fn try_save(&self, name: &str, key: &Pubkey) -> Result<KeyMap> {
        let mut text: BTreeMap<String, String> = self
            .decode()?
            .into_iter()
            .map(|(n, stored)| (n, stored.to_text()))
            .collect();
        text.insert(name.to_string(), key.to_base58());

        let json = serde_json::to_string_pretty(&text)?;
        std::fs::write(&self.path, json)?;
        info!(path = %self.path.display(), %name, %key, count = text.len(), "public key saved");

        Ok(self.load())
    }

    /// `Ok(None)` when the file does not exist.
    fn read_raw(&self) -> Result<Option<Vec<(String, EntryDecode)>>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        let value: Value = serde_json::from_str(&content)?;
        match value {
            Value::Null => Ok(Some(Vec::new())),
            Value::Object(map) => Ok(Some(decode_entries(map))),
            other => Err(ChainError::KeyStore(format!(
                "key store must be a JSON object, found {}",
                json_kind(&other)
            ))),
        }
    }
}

impl Default for KeyStore {
    fn default() -> Self {
        Self::new(default_key_store_path())
    }
}

/// Decode every value of a raw key-store object.
pub fn decode_entries(map: serde_json::Map<String, Value>) -> Vec<(String, EntryDecode)> {
    map.into_iter()
        .map(|(name, value)| {
            let decoded = EntryDecode::from_value(&value);
            (name, decoded)
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Create the key store's parent directory if it is missing.
pub fn ensure_key_dir(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.exists() => std::fs::create_dir_all(dir),
        _ => Ok(()),
    }
}

/// [`KeyStore::load`] with the default policy.
pub fn load_public_keys(path: &Path) -> KeyMap {
    KeyStore::new(path).load()
}

/// [`KeyStore::save`] with the default policy.
pub fn save_public_key(name: &str, key: &Pubkey, path: &Path) -> KeyMap {
    KeyStore::new(path).save(name, key)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
