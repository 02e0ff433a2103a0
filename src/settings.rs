//! Resilience configuration.
//!
//! Loaded from a TOML file with environment variable overrides, or built
//! in code. Every field has a default, so an empty file is valid.

use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::escalation::{EscalationConfig, MAX_DEDUP_WINDOW_SECS};
use crate::recovery::RecoveryConfig;
use crate::retry::RetryConfig;

/// Prefix for environment overrides, e.g.
/// `RESILIENCE__RETRY__MAX_RETRIES=5`.
pub const ENV_PREFIX: &str = "RESILIENCE";

/// Errors that can occur when loading resilience configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// The configuration could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] config::ConfigError),

    /// The configuration file path is invalid.
    #[error("invalid configuration path: {0}")]
    InvalidPath(String),

    /// A value is outside its allowed range.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Top-level configuration for an [`ErrorHandler`](crate::handler::ErrorHandler).
///
/// Plain values come before tables so the struct serializes to valid TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub enable_retry: bool,
    pub enable_recovery: bool,
    pub enable_escalation: bool,
    pub retry: RetryConfig,
    pub recovery: RecoveryConfig,
    pub escalation: EscalationConfig,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            enable_retry: true,
            enable_recovery: true,
            enable_escalation: true,
            retry: RetryConfig::default(),
            recovery: RecoveryConfig::default(),
            escalation: EscalationConfig::default(),
        }
    }
}

impl ResilienceConfig {
    /// Load configuration from a TOML file, then apply environment overrides.
    ///
    /// # Environment Variable Overrides
    ///
    /// `RESILIENCE__<SECTION>__<KEY>` overrides a nested key and
    /// `RESILIENCE__<KEY>` a top-level one, e.g.
    /// `RESILIENCE__RETRY__JITTER_ENABLED=false` or
    /// `RESILIENCE__ENABLE_ESCALATION=false`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The path is not valid UTF-8
    /// - The configuration file does not exist
    /// - The file or an override cannot be parsed
    /// - A value fails [`validate`](Self::validate)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let path_str = path
            .to_str()
            .ok_or_else(|| ConfigError::InvalidPath(format!("{:?}", path)))?;

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path_str.to_string()));
        }

        Self::build(Config::builder().add_source(File::new(path_str, FileFormat::Toml)))
    }

    /// Defaults plus environment overrides, without a file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::build(Config::builder())
    }

    fn build(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let resilience: ResilienceConfig = config.try_deserialize()?;
        resilience.validate()?;
        Ok(resilience)
    }

    /// Parse configuration from an inline TOML string. No environment
    /// overrides are applied.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::from_str(s, FileFormat::Toml))
            .build()?;
        let resilience: ResilienceConfig = config.try_deserialize()?;
        resilience.validate()?;
        Ok(resilience)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let retry = &self.retry;
        if !(0.0..=1.0).contains(&retry.jitter_percent) {
            return Err(ConfigError::Invalid(format!(
                "retry.jitter_percent must be between 0 and 1, got {}",
                retry.jitter_percent
            )));
        }
        if retry.backoff_multiplier.is_nan() || retry.backoff_multiplier < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "retry.backoff_multiplier must be at least 1, got {}",
                retry.backoff_multiplier
            )));
        }
        if retry.max_delay_ms == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_delay_ms must be greater than 0".to_string(),
            ));
        }
        if retry.initial_delay_ms > retry.max_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "retry.initial_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                retry.initial_delay_ms, retry.max_delay_ms
            )));
        }
        if let Some(secs) = self.escalation.dedup_window_secs {
            if secs > MAX_DEDUP_WINDOW_SECS {
                return Err(ConfigError::Invalid(format!(
                    "escalation.dedup_window_secs must be at most {}, got {}",
                    MAX_DEDUP_WINDOW_SECS, secs
                )));
            }
        }
        Ok(())
    }
}
