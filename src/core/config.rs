//! Configuration management

use crate::hid::protocol::{MANUFACTURER, PRODUCT};
use anyhow::{ensure, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Shortest accepted poll read timeout
pub const MIN_READ_TIMEOUT_MS: i32 = 1;

/// Longest accepted poll read timeout; writes and dispose wait out a read in progress
pub const MAX_READ_TIMEOUT_MS: i32 = 1000;

/// When the key poller raises a key-change notification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerMode {
    /// Once per key press; held keys do not fire again
    #[default]
    Press,
    /// Whenever the pressed set changes, including releases
    Change,
    /// On every report read from the device
    Level,
}

/// Deck discovery and polling configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckConfig {
    /// Expected manufacturer descriptor string
    #[serde(default = "default_manufacturer")]
    pub manufacturer: String,
    /// Expected product descriptor string
    #[serde(default = "default_product")]
    pub product: String,
    /// Timeout of a single blocking read in the poll loop
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: i32,
    /// Pause after a failed read before polling again
    #[serde(default = "default_read_error_backoff")]
    pub read_error_backoff_ms: u64,
    /// Key-change notification mode
    #[serde(default)]
    pub trigger: TriggerMode,
}

fn default_manufacturer() -> String {
    MANUFACTURER.to_string()
}
fn default_product() -> String {
    PRODUCT.to_string()
}
fn default_read_timeout() -> i32 {
    50
}
fn default_read_error_backoff() -> u64 {
    50
}

impl Default for DeckConfig {
    fn default() -> Self {
        Self {
            manufacturer: default_manufacturer(),
            product: default_product(),
            read_timeout_ms: default_read_timeout(),
            read_error_backoff_ms: default_read_error_backoff(),
            trigger: TriggerMode::default(),
        }
    }
}

impl DeckConfig {
    /// Check values the poll loop relies on
    pub fn validate(&self) -> Result<()> {
        ensure!(
            (MIN_READ_TIMEOUT_MS..=MAX_READ_TIMEOUT_MS).contains(&self.read_timeout_ms),
            "read_timeout_ms must be between {} and {}, got {}",
            MIN_READ_TIMEOUT_MS,
            MAX_READ_TIMEOUT_MS,
            self.read_timeout_ms
        );
        Ok(())
    }
}

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Deck configuration
    #[serde(default)]
    pub device: DeckConfig,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from a file, or defaults if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?;
            config
                .device
                .validate()
                .with_context(|| format!("Invalid config file: {:?}", path))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)
    }

    /// Save configuration to a file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "streamdeck", "StreamDeckHid")
            .context("Failed to determine config directory")?;
        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    /// Get the default configuration embedded in the binary
    pub fn default_config_str() -> &'static str {
        include_str!("../../config/default.toml")
    }
}
