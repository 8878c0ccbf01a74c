//! Configuration management for catfactsd.
//!
//! Loads settings from /etc/catfacts/config.toml, ./catfacts.toml, or uses defaults.

use anyhow::{Context, Result};
use catfacts_common::{SqliteFactStore, UpstreamConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Config file path
pub const CONFIG_PATH: &str = "/etc/catfacts/config.toml";

/// Fallback config file path, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "catfacts.toml";

/// `db_path` value selecting a throwaway in-memory store
pub const IN_MEMORY_DB: &str = ":memory:";

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Largest batch a single fetch-many command may request
    #[serde(default = "default_max_fetch_per_request")]
    pub max_fetch_per_request: usize,
}

fn default_bind() -> String {
    "127.0.0.1:7870".to_string()
}

fn default_max_fetch_per_request() -> usize {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_fetch_per_request: default_max_fetch_per_request(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file, or ":memory:"
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Where export files are written (defaults to the OS temp dir)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_dir: Option<PathBuf>,
}

fn default_db_path() -> String {
    SqliteFactStore::default_path().display().to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            export_dir: None,
        }
    }
}

impl StorageConfig {
    pub fn is_in_memory(&self) -> bool {
        self.db_path == IN_MEMORY_DB
    }

    pub fn export_dir(&self) -> PathBuf {
        self.export_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Open the configured fact store
    pub fn open_store(&self) -> Result<SqliteFactStore> {
        if self.is_in_memory() {
            warn!("Using in-memory fact store; facts are lost on exit");
            return SqliteFactStore::open_in_memory().context("Failed to open in-memory store");
        }
        SqliteFactStore::open(Path::new(&self.db_path))
            .with_context(|| format!("Failed to open fact store at {}", self.db_path))
    }
}

/// Daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Log filter used when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Full configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub daemon: DaemonConfig,
}

impl Config {
    /// Load the first config file that exists, or return defaults
    ///
    /// A config file that exists but cannot be read or parsed is an error.
    pub fn load() -> Result<Self> {
        Self::load_first(&[Path::new(CONFIG_PATH), Path::new(DEFAULT_CONFIG_PATH)])
    }

    fn load_first(candidates: &[&Path]) -> Result<Self> {
        for path in candidates {
            match fs::read_to_string(path) {
                Ok(content) => return Self::parse(&content, path),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!("No config at {}", path.display());
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to read config {}", path.display()))
                }
            }
        }

        warn!("Config not found, using defaults");
        Ok(Config::default())
    }

    /// Load config from specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config.normalized())
    }

    /// Keep fetch-many requests within what the upstream client accepts
    fn normalized(mut self) -> Self {
        let ceiling = self.upstream.max_batch.max(1);
        let requested = self.server.max_fetch_per_request;
        if requested == 0 || requested > ceiling {
            let clamped = requested.clamp(1, ceiling);
            warn!(
                "server.max_fetch_per_request = {} outside 1..={} (upstream.max_batch), using {}",
                requested, ceiling, clamped
            );
            self.server.max_fetch_per_request = clamped;
        }
        self
    }

    /// Save default config to path (for init)
    pub fn save_default(path: &Path) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        info!("Saved default config to {}", path.display());
        Ok(())
    }
}
