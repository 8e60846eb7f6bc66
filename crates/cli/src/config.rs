//! Configuration loading from plugboard.toml.

use policy::Address;
use runtime::plugins::DEFAULT_PERIOD_SECS;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// The account being driven.
    pub account: AccountConfig,

    /// Subscription plugin settings.
    #[serde(default)]
    pub subscription: SubscriptionConfig,
}

/// Account identity and storage.
#[derive(Debug, Deserialize)]
pub struct AccountConfig {
    /// The account's own address.
    #[serde(default = "default_address")]
    pub address: String,

    /// Owner seeded into the single-owner plugin on first use.
    /// Later runs keep whatever owner the ledger records.
    pub owner: Address,

    /// Ledger database path. Defaults to the user data directory.
    pub database: Option<PathBuf>,
}

/// Subscription plugin configuration.
#[derive(Debug, Deserialize)]
pub struct SubscriptionConfig {
    /// Minimum seconds between collections.
    #[serde(default = "default_period")]
    pub period_secs: u64,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            period_secs: default_period(),
        }
    }
}

fn default_address() -> String {
    "account".to_string()
}

fn default_period() -> u64 {
    DEFAULT_PERIOD_SECS
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),
}
