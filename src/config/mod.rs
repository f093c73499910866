//! Vault configuration.
//!
//! [`VaultConfig`] is read from a TOML file, falls back to defaults for any
//! missing section, and finally applies `DATAVAULT_*` environment overrides.

use crate::constants::{DEFAULT_STORAGE_PATH, DEFAULT_WRITE_LOCK_TIMEOUT_MS};
use crate::error::{VaultError, VaultResult};
use crate::logging::LogConfig;
use crate::rewards::RewardConfig;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for a [`crate::Vault`] instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Path where the vault stores its sled database
    pub storage_path: PathBuf,
    /// Longest a writer waits for the writer gate before failing with `Busy`
    #[serde(default = "default_write_lock_timeout_ms")]
    pub write_lock_timeout_ms: u64,
    /// Open a throwaway database that is removed on drop
    #[serde(default)]
    pub temporary: bool,
    #[serde(default)]
    pub rewards: RewardConfig,
    #[serde(default)]
    pub logging: LogConfig,
}

fn default_write_lock_timeout_ms() -> u64 {
    DEFAULT_WRITE_LOCK_TIMEOUT_MS
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            write_lock_timeout_ms: DEFAULT_WRITE_LOCK_TIMEOUT_MS,
            temporary: false,
            rewards: RewardConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

impl VaultConfig {
    /// Create a new vault configuration with the specified storage path
    pub fn new(storage_path: PathBuf) -> Self {
        Self {
            storage_path,
            ..Default::default()
        }
    }

    /// Configuration for a temporary database rooted at `storage_path`
    pub fn temporary(storage_path: PathBuf) -> Self {
        Self {
            storage_path,
            temporary: true,
            ..Default::default()
        }
    }

    pub fn with_write_lock_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.write_lock_timeout_ms = timeout_ms;
        self
    }

    pub fn with_rewards(mut self, rewards: RewardConfig) -> Self {
        self.rewards = rewards;
        self
    }

    pub fn with_logging(mut self, logging: LogConfig) -> Self {
        self.logging = logging;
        self
    }

    pub fn write_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.write_lock_timeout_ms)
    }

    /// Parse a TOML document into a configuration and validate it
    pub fn from_toml_str(content: &str) -> VaultResult<Self> {
        let config: VaultConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `DATAVAULT_STORAGE_PATH` and `DATAVAULT_WRITE_LOCK_TIMEOUT_MS`
    pub fn apply_env_overrides(&mut self) -> VaultResult<()> {
        if let Ok(path) = std::env::var("DATAVAULT_STORAGE_PATH") {
            self.storage_path = PathBuf::from(path);
        }
        if let Ok(timeout) = std::env::var("DATAVAULT_WRITE_LOCK_TIMEOUT_MS") {
            self.write_lock_timeout_ms = timeout.trim().parse().map_err(|_| {
                VaultError::Config(format!(
                    "DATAVAULT_WRITE_LOCK_TIMEOUT_MS must be an integer, got '{}'",
                    timeout
                ))
            })?;
        }
        self.logging
            .apply_env_overrides()
            .map_err(|e| VaultError::Config(e.to_string()))?;
        self.validate()
    }

    pub fn validate(&self) -> VaultResult<()> {
        if self.storage_path.as_os_str().is_empty() {
            return Err(VaultError::Config("storage_path cannot be empty".to_string()));
        }
        if self.write_lock_timeout_ms == 0 {
            return Err(VaultError::Config(
                "write_lock_timeout_ms must be greater than 0".to_string(),
            ));
        }
        self.rewards.validate()?;
        self.logging
            .validate()
            .map_err(|e| VaultError::Config(e.to_string()))
    }
}

/// Load the vault configuration.
///
/// Reads `path` when given and present, otherwise starts from defaults. In
/// both cases environment overrides are applied last.
pub fn load_vault_config(path: Option<&str>) -> VaultResult<VaultConfig> {
    let mut config = match path.map(Path::new) {
        Some(p) if p.exists() => {
            info!("Loading vault config from {}", p.display());
            VaultConfig::from_toml_str(&std::fs::read_to_string(p)?)?
        }
        Some(p) => {
            debug!("Config file {} not found, using defaults", p.display());
            VaultConfig::default()
        }
        None => VaultConfig::default(),
    };
    config.apply_env_overrides()?;
    Ok(config)
}

/// Serializes tests that read or write `DATAVAULT_*` environment variables.
#[cfg(test)]
pub(crate) static ENV_LOCK: parking_lot::Mutex<()> = parking_lot::const_mutex(());

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = VaultConfig::default();
        assert_eq!(config.write_lock_timeout(), Duration::from_millis(5000));
        assert_eq!(config.rewards.unit_amount, 1);
        assert!(!config.temporary);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = VaultConfig::from_toml_str(
            r#"
            storage_path = "/tmp/vault"
            write_lock_timeout_ms = 250

            [rewards]
            unit_amount = 2
            unit = "credit"
            credit_value_cents = 25
            "#,
        )
        .unwrap();
        assert_eq!(config.storage_path, PathBuf::from("/tmp/vault"));
        assert_eq!(config.write_lock_timeout(), Duration::from_millis(250));
        assert_eq!(config.rewards.unit_amount, 2);
        assert_eq!(config.logging, LogConfig::default());
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let result = VaultConfig::from_toml_str(
            r#"
            storage_path = "/tmp/vault"
            write_lock_timeout_ms = 0
            "#,
        );
        assert!(matches!(result, Err(VaultError::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let _env = ENV_LOCK.lock();
        let dir = tempdir().unwrap();
        let path = dir.path().join("vault.toml");
        std::fs::write(&path, "storage_path = \"/srv/vault\"\n").unwrap();

        let config = load_vault_config(path.to_str()).unwrap();
        assert_eq!(config.write_lock_timeout_ms, DEFAULT_WRITE_LOCK_TIMEOUT_MS);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let _env = ENV_LOCK.lock();
        let config = load_vault_config(Some("/nonexistent/vault.toml")).unwrap();
        assert_eq!(config.rewards, RewardConfig::default());
    }

    #[test]
    fn test_env_overrides_storage_path_and_timeout() {
        let _env = ENV_LOCK.lock();
        std::env::set_var("DATAVAULT_STORAGE_PATH", "/var/lib/datavault");
        std::env::set_var("DATAVAULT_WRITE_LOCK_TIMEOUT_MS", " 750 ");
        let config = load_vault_config(None);
        std::env::remove_var("DATAVAULT_STORAGE_PATH");
        std::env::remove_var("DATAVAULT_WRITE_LOCK_TIMEOUT_MS");

        let config = config.unwrap();
        assert_eq!(config.storage_path, PathBuf::from("/var/lib/datavault"));
        assert_eq!(config.write_lock_timeout(), Duration::from_millis(750));
    }

    #[test]
    fn test_non_integer_timeout_is_a_config_error() {
        let _env = ENV_LOCK.lock();
        std::env::set_var("DATAVAULT_WRITE_LOCK_TIMEOUT_MS", "soon");
        let result = load_vault_config(None);
        std::env::remove_var("DATAVAULT_WRITE_LOCK_TIMEOUT_MS");

        match result {
            Err(VaultError::Config(message)) => assert!(message.contains("soon")),
            other => panic!("expected a config error, got {:?}", other),
        }
    }
}
