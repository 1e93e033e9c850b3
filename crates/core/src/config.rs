//! Configuration file parsing for .plansync.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_FILENAME: &str = ".plansync.toml";

/// Main configuration structure for .plansync.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlansyncConfig {
    #[serde(default)]
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the hosted backend (e.g. "https://xyz.supabase.co")
    #[serde(default)]
    pub url: String,

    /// Public API key sent with every request. Can also be set via PLANSYNC_ANON_KEY
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anon_key: Option<String>,

    /// Table holding one row per subscription
    #[serde(default = "default_subscriptions_table")]
    pub subscriptions_table: String,

    /// Name of the remote function creating checkout sessions
    #[serde(default = "default_checkout_function")]
    pub checkout_function: String,

    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_subscriptions_table() -> String {
    "subscriptions".to_string()
}

fn default_checkout_function() -> String {
    "create-checkout".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: None,
            subscriptions_table: default_subscriptions_table(),
            checkout_function: default_checkout_function(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl PlansyncConfig {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: PlansyncConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Find and load .plansync.toml from the current directory or ancestors,
    /// then apply environment overrides
    pub fn find_and_load(start_dir: &Path) -> Result<Self> {
        let mut current = start_dir;

        let mut config = loop {
            let config_path = current.join(CONFIG_FILENAME);
            if config_path.exists() {
                break Self::from_file(&config_path)?;
            }

            match current.parent() {
                Some(parent) => current = parent,
                // No config found, use defaults
                None => break Self::default(),
            }
        };

        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Overrides file values with PLANSYNC_URL / PLANSYNC_ANON_KEY
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("PLANSYNC_URL").filter(|v| !v.is_empty()) {
            self.backend.url = url;
        }
        if let Some(key) = lookup("PLANSYNC_ANON_KEY").filter(|v| !v.is_empty()) {
            self.backend.anon_key = Some(key);
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}
