//! Configuration management for the logging system
//!
//! This module handles loading logging configuration from TOML files and
//! environment variables.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Main logging configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// General logging settings
    #[serde(default)]
    pub general: GeneralConfig,
    /// Feature-specific log levels, keyed by module name (`permissions`, `rewards`, ...)
    #[serde(default = "LogConfig::default_features")]
    pub features: HashMap<String, String>,
}

/// General logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default log level for all modules
    pub default_level: String,
    /// Enable colored output
    pub enable_colors: bool,
    /// Include timestamps
    pub include_timestamp: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            features: Self::default_features(),
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_level: "INFO".to_string(),
            enable_colors: true,
            include_timestamp: true,
        }
    }
}

impl LogConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text and apply environment overrides
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: LogConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// `DATAVAULT_LOG_LEVEL` replaces the default level and
    /// `DATAVAULT_LOG_FEATURE_<NAME>` sets the level of one feature.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(level) = std::env::var("DATAVAULT_LOG_LEVEL") {
            self.general.default_level = level.to_uppercase();
        }

        for (key, value) in std::env::vars() {
            if let Some(feature) = key.strip_prefix("DATAVAULT_LOG_FEATURE_") {
                self.features
                    .insert(feature.to_lowercase(), value.to_uppercase());
            }
        }

        self.validate()
    }

    /// Checks that every configured level is a known log level
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR", "OFF"];

        let known = |level: &str| valid_levels.contains(&level.to_uppercase().as_str());

        if !known(self.general.default_level.as_str()) {
            return Err(ConfigError::InvalidLevel(self.general.default_level.clone()));
        }

        for (feature, level) in &self.features {
            if !known(level.as_str()) {
                return Err(ConfigError::InvalidLevel(format!("{}={}", feature, level)));
            }
        }

        Ok(())
    }

    fn default_features() -> HashMap<String, String> {
        let mut features = HashMap::new();
        features.insert("users".to_string(), "INFO".to_string());
        features.insert("permissions".to_string(), "INFO".to_string());
        features.insert("rewards".to_string(), "INFO".to_string());
        features.insert("audit".to_string(), "INFO".to_string());
        features.insert("storage".to_string(), "INFO".to_string());
        features.insert("db_operations".to_string(), "WARN".to_string());
        features
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Invalid log level: {0}")]
    InvalidLevel(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ENV_LOCK;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.general.default_level, "INFO");
        assert_eq!(config.features.get("rewards"), Some(&"INFO".to_string()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let _env = ENV_LOCK.lock();
        let config = LogConfig::from_toml_str(
            r#"
            [general]
            default_level = "DEBUG"
            enable_colors = false
            include_timestamp = true

            [features]
            permissions = "trace"
            "#,
        )
        .unwrap();
        assert_eq!(config.features.get("permissions"), Some(&"trace".to_string()));
        assert!(!config.general.enable_colors);
    }

    #[test]
    fn test_invalid_level_is_rejected() {
        let mut config = LogConfig::default();
        config.features.insert("audit".to_string(), "LOUD".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::InvalidLevel(_))));
    }

    #[test]
    fn test_env_overrides_levels() {
        let _env = ENV_LOCK.lock();
        std::env::set_var("DATAVAULT_LOG_LEVEL", "debug");
        std::env::set_var("DATAVAULT_LOG_FEATURE_REWARDS", "trace");
        let mut config = LogConfig::default();
        let result = config.apply_env_overrides();
        std::env::remove_var("DATAVAULT_LOG_LEVEL");
        std::env::remove_var("DATAVAULT_LOG_FEATURE_REWARDS");

        assert!(result.is_ok());
        assert_eq!(config.general.default_level, "DEBUG");
        assert_eq!(config.features.get("rewards"), Some(&"TRACE".to_string()));
        assert_eq!(config.features.get("audit"), Some(&"INFO".to_string()));
    }

    #[test]
    fn test_env_override_with_unknown_level_fails() {
        let _env = ENV_LOCK.lock();
        std::env::set_var("DATAVAULT_LOG_FEATURE_AUDIT", "loud");
        let mut config = LogConfig::default();
        let result = config.apply_env_overrides();
        std::env::remove_var("DATAVAULT_LOG_FEATURE_AUDIT");

        assert!(matches!(result, Err(ConfigError::InvalidLevel(_))));
    }
}
