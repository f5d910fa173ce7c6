//! Application configuration management.
//!
//! Configuration lives at `~/.config/mailroom/config.json`. Environment
//! variables override the file so deployments can point the client at a
//! backend without editing it:
//!
//! - `MAILROOM_API_URL`
//! - `MAILROOM_SETTLEMENTS_URL`
//! - `MAILROOM_STORE` (`file`, `keyring` or `memory`)

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::auth::sweep::DEFAULT_SWEEP_PERIOD_SECS;
use crate::auth::{FileStore, KeyringStore, MemoryStore, SessionStore};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "mailroom";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_API_URL: &str = "http://localhost:3000/app";
const DEFAULT_SETTLEMENTS_URL: &str = "http://localhost:3001/settlements";

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const ENV_API_URL: &str = "MAILROOM_API_URL";
pub const ENV_SETTLEMENTS_URL: &str = "MAILROOM_SETTLEMENTS_URL";
pub const ENV_STORE: &str = "MAILROOM_STORE";

/// Where the session is persisted between runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    File,
    Keyring,
    Memory,
}

impl FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(StoreKind::File),
            "keyring" => Ok(StoreKind::Keyring),
            "memory" => Ok(StoreKind::Memory),
            other => anyhow::bail!("Unknown session store '{}'", other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the main API, including the `/app` prefix
    pub api_url: String,
    /// Base URL of the settlements service
    pub settlements_url: String,
    pub request_timeout_secs: u64,
    pub sweep_interval_secs: u64,
    pub store: StoreKind,
    pub last_email: Option<String>,
    /// Directory for rolling log files; stderr only when unset
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            settlements_url: DEFAULT_SETTLEMENTS_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_PERIOD_SECS,
            store: StoreKind::default(),
            last_email: None,
            log_dir: None,
        }
    }
}

impl Config {
    /// Load from the default location and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production). Invalid values are logged and ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.api_url = url.trim().to_string();
        }
        if let Some(url) = lookup(ENV_SETTLEMENTS_URL).filter(|v| !v.trim().is_empty()) {
            self.settlements_url = url.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_STORE) {
            match raw.parse() {
                Ok(kind) => self.store = kind,
                Err(e) => warn!(error = %e, "Ignoring {}", ENV_STORE),
            }
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Build the configured session store.
    ///
    /// Falls back to memory when there is no cache directory, so the session
    /// simply does not outlive the process.
    pub fn session_store(&self) -> Arc<dyn SessionStore> {
        self.session_store_in(self.cache_dir())
    }

    fn session_store_in(&self, cache_dir: Result<PathBuf>) -> Arc<dyn SessionStore> {
        match self.store {
            StoreKind::File => match cache_dir {
                Ok(dir) => Arc::new(FileStore::new(dir)),
                Err(e) => {
                    warn!(error = %e, "No cache directory, keeping session in memory");
                    Arc::new(MemoryStore::new())
                }
            },
            StoreKind::Keyring => Arc::new(KeyringStore::new()),
            StoreKind::Memory => Arc::new(MemoryStore::new()),
        }
    }
}
