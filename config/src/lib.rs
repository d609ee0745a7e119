//! # Configuration Management for EntityHaus
//!
//! This crate provides centralized configuration structures for all EntityHaus components:
//! pagination windows used by the entity service and the lifecycle signal dispatcher.
//!
//! ## Quick Start
//!
//! ### Programmatic Configuration
//! ```rust
//! use config::{PaginationConfig, SignalConfig};
//!
//! let pagination = PaginationConfig::new(25, 100, 100, true);
//! let signal = SignalConfig::new(30, 100, true, 3);
//! ```
//!
//! ### TOML File Configuration
//! ```toml
//! [pagination]
//! default_page_size = 25
//! max_limit = 100
//! unbounded_chunk_size = 100
//! with_count = true
//!
//! [signal]
//! callback_timeout_seconds = 30
//! max_callbacks = 100
//! remove_failing_callbacks = true
//! max_consecutive_failures = 3
//! ```
//!
//! Load configuration:
//! ```rust,no_run
//! use config::AppConfig;
//!
//! // Load from ENTITYHAUS_CONFIG, ./entityhaus.toml or defaults
//! let config = AppConfig::load()?;
//!
//! // Or load from custom path
//! let config = AppConfig::from_file("config/production.toml")?;
//! # Ok::<(), config::ConfigError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::{env, path::Path};
use thiserror::Error;

const DEFAULT_CONFIG_PATH: &str = "./entityhaus.toml";
const CONFIG_ENV_VAR: &str = "ENTITYHAUS_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Dotenvy error: {0}")]
    Dotenvy(#[from] dotenvy::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pagination: PaginationConfig,
    pub signal: SignalConfig,
}

/// Pagination windows applied by the parameter normalizer and the pagination strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Page size used when a paged operation receives no pagination parameters
    pub default_page_size: u64,
    /// Upper bound for `limit` and `pageSize`; larger values are clamped
    pub max_limit: u64,
    /// Chunk size used when collecting an unbounded result set
    pub unbounded_chunk_size: u64,
    /// Whether paged results carry a total count
    pub with_count: bool,
}

/// Signal system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub callback_timeout_seconds: u64,
    pub max_callbacks: usize,
    pub remove_failing_callbacks: bool,
    pub max_consecutive_failures: u32,
}

impl AppConfig {
    /// Load configuration from the TOML file named in the environment (or `.env`),
    /// falling back to `./entityhaus.toml` and finally to defaults
    pub fn load() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => {}
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let config = if let Ok(config_path) = env::var(CONFIG_ENV_VAR) {
            Self::from_file(&config_path)?
        } else if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::from_file(DEFAULT_CONFIG_PATH)?
        } else {
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pagination.max_limit == 0 {
            return Err(ConfigError::Invalid(
                "Pagination max_limit must be greater than 0".to_string(),
            ));
        }
        if self.pagination.default_page_size == 0 {
            return Err(ConfigError::Invalid(
                "Pagination default_page_size must be greater than 0".to_string(),
            ));
        }
        if self.pagination.default_page_size > self.pagination.max_limit {
            return Err(ConfigError::Invalid(
                "Pagination default_page_size cannot be greater than max_limit".to_string(),
            ));
        }
        if self.pagination.unbounded_chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "Pagination unbounded_chunk_size must be greater than 0".to_string(),
            ));
        }

        if self.signal.max_consecutive_failures == 0 {
            return Err(ConfigError::Invalid(
                "Signal max_consecutive_failures must be greater than 0".to_string(),
            ));
        }
        if self.signal.callback_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "Signal callback_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl PaginationConfig {
    /// Create a new pagination configuration
    pub fn new(
        default_page_size: u64,
        max_limit: u64,
        unbounded_chunk_size: u64,
        with_count: bool,
    ) -> Self {
        Self {
            default_page_size,
            max_limit,
            unbounded_chunk_size,
            with_count,
        }
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: 25,
            max_limit: 100,
            unbounded_chunk_size: 100,
            with_count: true,
        }
    }
}

impl SignalConfig {
    /// Create a new signal configuration
    pub fn new(
        callback_timeout_seconds: u64,
        max_callbacks: usize,
        remove_failing_callbacks: bool,
        max_consecutive_failures: u32,
    ) -> Self {
        Self {
            callback_timeout_seconds,
            max_callbacks,
            remove_failing_callbacks,
            max_consecutive_failures,
        }
    }
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            callback_timeout_seconds: 30,
            max_callbacks: 100,
            remove_failing_callbacks: true,
            max_consecutive_failures: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pagination.default_page_size, 25);
        assert_eq!(config.pagination.max_limit, 100);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [pagination]
            max_limit = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.pagination.max_limit, 50);
        assert_eq!(config.pagination.default_page_size, 25);
        assert_eq!(config.signal.max_consecutive_failures, 3);
    }

    #[test]
    fn test_rejects_page_size_above_max() {
        let result = AppConfig::from_toml_str(
            r#"
            [pagination]
            default_page_size = 200
            max_limit = 100
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_zero_failure_threshold() {
        let result = AppConfig::from_toml_str(
            r#"
            [signal]
            max_consecutive_failures = 0
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_malformed_toml() {
        let result = AppConfig::from_toml_str("[pagination\nmax_limit = ");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }
}
