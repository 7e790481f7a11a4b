//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/partsync/config.toml)
//! 3. Environment variables (PARTSYNC_* prefix)
//!
//! Environment variables take precedence over config file values.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::sync::{BridgeConfig, FileRemote, RemoteStore};

/// Environment variable prefix
const ENV_PREFIX: &str = "PARTSYNC";

/// Keys accepted by [`Config::set`]
pub const CONFIG_KEYS: &[&str] = &[
    "data_dir",
    "remote_dir",
    "sync_enabled",
    "user_id",
    "debounce_ms",
    "poll_interval_ms",
    "document",
];

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Directory holding the local snapshot
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory used as the remote document store
    #[serde(default)]
    pub remote_dir: Option<PathBuf>,

    /// Whether sync is enabled
    #[serde(default)]
    pub sync_enabled: bool,

    /// Opaque identifier of the signed-in user
    #[serde(default)]
    pub user_id: Option<String>,

    /// Quiet period before local edits are pushed
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// How often the directory remote is checked for changes
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Remote document name under the user
    #[serde(default = "default_document")]
    pub document: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            remote_dir: None,
            sync_enabled: false,
            user_id: None,
            debounce_ms: default_debounce_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            document: default_document(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (PARTSYNC_DATA_DIR, PARTSYNC_REMOTE_DIR, ...)
    /// 2. Config file (~/.config/partsync/config.toml or PARTSYNC_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load from an explicit path when one is given, else the default location
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides()?;
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(val) = env_var("DATA_DIR") {
            self.data_dir = PathBuf::from(val);
        }

        if let Some(val) = env_var("REMOTE_DIR") {
            self.remote_dir = non_empty(val).map(PathBuf::from);
        }

        if let Some(val) = env_var("SYNC_ENABLED") {
            self.sync_enabled = val.eq_ignore_ascii_case("true") || val == "1";
        }

        if let Some(val) = env_var("USER_ID") {
            self.user_id = non_empty(val);
        }

        if let Some(val) = env_var("DEBOUNCE_MS") {
            self.debounce_ms = val
                .parse()
                .with_context(|| format!("Invalid {}_DEBOUNCE_MS: {:?}", ENV_PREFIX, val))?;
        }

        if let Some(val) = env_var("POLL_INTERVAL_MS") {
            self.poll_interval_ms = val
                .parse()
                .with_context(|| format!("Invalid {}_POLL_INTERVAL_MS: {:?}", ENV_PREFIX, val))?;
        }

        Ok(())
    }

    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Set a value by key, parsing it from text
    ///
    /// `""` or `"none"` clears optional values.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "data_dir" => self.data_dir = PathBuf::from(value),
            "remote_dir" => self.remote_dir = non_empty(value.to_string()).map(PathBuf::from),
            "sync_enabled" => {
                self.sync_enabled = value
                    .parse()
                    .context("Invalid value for sync_enabled. Use 'true' or 'false'.")?;
            }
            "user_id" => self.user_id = non_empty(value.to_string()),
            "debounce_ms" => {
                self.debounce_ms = value
                    .parse()
                    .context("Invalid value for debounce_ms. Use milliseconds.")?;
            }
            "poll_interval_ms" => {
                self.poll_interval_ms = value
                    .parse()
                    .context("Invalid value for poll_interval_ms. Use milliseconds.")?;
            }
            "document" => {
                if value.is_empty() || value.contains('/') {
                    bail!("Invalid document name: {:?}", value);
                }
                self.document = value.to_string();
            }
            _ => bail!(
                "Unknown configuration key: '{}'\nValid keys: {}",
                key,
                CONFIG_KEYS.join(", ")
            ),
        }
        Ok(())
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with PARTSYNC_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Some(path) = env_var("CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("partsync")
            .join("config.toml")
    }

    /// Path of the local snapshot file
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join("document.partsync")
    }

    /// The configured remote store, if sync is enabled and a backend is set
    pub fn remote(&self) -> Option<Arc<dyn RemoteStore>> {
        if !self.sync_enabled {
            return None;
        }
        let dir = self.remote_dir.as_ref()?;
        Some(Arc::new(FileRemote::new(
            dir.clone(),
            Duration::from_millis(self.poll_interval_ms),
        )))
    }

    /// Bridge settings derived from this configuration
    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            debounce: Duration::from_millis(self.debounce_ms),
            document: self.document.clone(),
        }
    }
}

fn env_var(suffix: &str) -> Option<String> {
    std::env::var(format!("{}_{}", ENV_PREFIX, suffix)).ok()
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() || value == "none" {
        None
    } else {
        Some(value)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("partsync")
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_document() -> String {
    "main".to_string()
}
