//! # Logging
//!
//! Library code logs through the `log` facade. Binaries call
//! [`LoggingSystem::init`] once to install an `env_logger` configured from a
//! [`LogConfig`], with per-feature levels mapped onto the crate's modules.

pub mod config;

pub use config::{ConfigError, LogConfig};

use log::LevelFilter;
use once_cell::sync::OnceCell;

/// Global logging configuration instance
static LOGGING_CONFIG: OnceCell<LogConfig> = OnceCell::new();

pub struct LoggingSystem;

impl LoggingSystem {
    /// Initialize the logging system with default configuration
    pub fn init_default() -> Result<(), LoggingError> {
        Self::init(&LogConfig::default())
    }

    /// Initialize the logging system with a custom configuration
    pub fn init(config: &LogConfig) -> Result<(), LoggingError> {
        config.validate()?;

        let mut builder = env_logger::Builder::new();
        builder.filter_level(parse_level(&config.general.default_level)?);
        for (feature, level) in &config.features {
            builder.filter_module(&format!("datavault::{}", feature), parse_level(level)?);
        }
        builder.write_style(if config.general.enable_colors {
            env_logger::WriteStyle::Auto
        } else {
            env_logger::WriteStyle::Never
        });
        if !config.general.include_timestamp {
            builder.format_timestamp(None);
        }

        LOGGING_CONFIG
            .set(config.clone())
            .map_err(|_| LoggingError::AlreadyInitialized)?;
        builder
            .try_init()
            .map_err(|_| LoggingError::AlreadyInitialized)
    }

    /// Get the global logging configuration
    pub fn get_config() -> Option<&'static LogConfig> {
        LOGGING_CONFIG.get()
    }
}

/// Parses a level name such as `"DEBUG"` into a filter
pub fn parse_level(level: &str) -> Result<LevelFilter, LoggingError> {
    match level.to_uppercase().as_str() {
        "TRACE" => Ok(LevelFilter::Trace),
        "DEBUG" => Ok(LevelFilter::Debug),
        "INFO" => Ok(LevelFilter::Info),
        "WARN" => Ok(LevelFilter::Warn),
        "ERROR" => Ok(LevelFilter::Error),
        "OFF" => Ok(LevelFilter::Off),
        _ => Err(LoggingError::Config(format!("Invalid log level: {}", level))),
    }
}

/// Logging system errors
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Logging system already initialized")]
    AlreadyInitialized,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Config error: {0}")]
    ConfigError(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug").unwrap(), LevelFilter::Debug);
        assert_eq!(parse_level("OFF").unwrap(), LevelFilter::Off);
        assert!(matches!(parse_level("chatty"), Err(LoggingError::Config(_))));
    }

    #[test]
    fn test_double_init_is_rejected() {
        let config = LogConfig::default();
        let first = LoggingSystem::init(&config);
        let second = LoggingSystem::init(&config);
        assert!(first.is_ok() || matches!(first, Err(LoggingError::AlreadyInitialized)));
        assert!(matches!(second, Err(LoggingError::AlreadyInitialized)));
        assert!(LoggingSystem::get_config().is_some());
    }

    #[test]
    fn test_init_rejects_invalid_level() {
        let mut config = LogConfig::default();
        config.general.default_level = "LOUD".to_string();
        assert!(matches!(
            LoggingSystem::init(&config),
            Err(LoggingError::ConfigError(ConfigError::InvalidLevel(_)))
        ));
    }
}
