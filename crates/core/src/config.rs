//! Application configuration.

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::storage::Storage;

/// Configuration file location under the user's config directory.
pub const CONFIG_FILE: &str = "relief/config.toml";

const DEFAULT_IDENTITY_URL: &str = "http://localhost:9999";

/// Identity-service connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// Base URL of the hosted identity backend.
    pub base_url: String,
    /// API key sent with every request.
    pub api_key: String,
}

/// Application settings, layered from the config file and `RELIEF_*`
/// environment overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Directory holding the durable partitions.
    pub store_root: PathBuf,
    /// Identity-service connection settings.
    pub identity: IdentityConfig,
}

/// Absolute path of the configuration file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_FILE)
}

/// Write a commented default configuration when none exists yet.
pub fn ensure_default_config() -> Result<()> {
    let path = config_path();
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&path, default_config_contents())
        .with_context(|| format!("failed to write {}", path.display()))
}

fn default_config_contents() -> String {
    format!(
        r#"# Relief configuration.

# Directory holding the durable partitions.
store_root = "{}"

[identity]
# Base URL of the hosted identity backend.
base_url = "{DEFAULT_IDENTITY_URL}"
# API key sent with every request.
api_key = ""
"#,
        Storage::default_root().display()
    )
}

impl AppConfig {
    /// Load settings from the default config file location.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path())
    }

    fn load_from(path: PathBuf) -> Result<Self> {
        let settings = Config::builder()
            .set_default(
                "store_root",
                Storage::default_root().to_string_lossy().to_string(),
            )?
            .set_default("identity.base_url", DEFAULT_IDENTITY_URL)?
            .set_default("identity.api_key", "")?
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix("RELIEF").separator("__"))
            .build()
            .context("failed to load configuration")?;
        settings
            .try_deserialize()
            .context("invalid configuration")
    }
}
