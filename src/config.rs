//! # Configuration
//!
//! Layered configuration for the workflow engine: built-in defaults, then an
//! optional TOML file, then `RELEASE_WORKFLOW__*` environment variables
//! (`RELEASE_WORKFLOW__RETRY__MAX_RETRIES=5`, `RELEASE_WORKFLOW__LOCK__TTL_MS=60000`).
//! Durations are written in milliseconds.

use crate::constants::system;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const ENV_PREFIX: &str = "RELEASE_WORKFLOW";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Backoff parameters of the transaction retry executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_factor: f64,
    pub jitter_max_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: system::DEFAULT_MAX_RETRIES,
            initial_delay_ms: system::DEFAULT_INITIAL_DELAY_MS,
            max_delay_ms: system::DEFAULT_MAX_DELAY_MS,
            backoff_factor: system::DEFAULT_BACKOFF_FACTOR,
            jitter_max_ms: system::DEFAULT_JITTER_MAX_MS,
        }
    }
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn jitter_max(&self) -> Duration {
        Duration::from_millis(self.jitter_max_ms)
    }

    /// Backoff before jitter for the 1-based `attempt`:
    /// `min(max_delay, initial_delay * backoff_factor^(attempt - 1))`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let scaled = self.initial_delay_ms as f64 * self.backoff_factor.powi(exponent);
        let capped = scaled.min(self.max_delay_ms as f64);
        if capped.is_finite() && capped >= 0.0 {
            Duration::from_millis(capped as u64)
        } else {
            self.max_delay()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::invalid("retry.max_retries", "must be at least 1"));
        }
        if !(self.backoff_factor >= 1.0) {
            return Err(ConfigError::invalid(
                "retry.backoff_factor",
                format!("must be >= 1.0, got {}", self.backoff_factor),
            ));
        }
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(ConfigError::invalid(
                "retry.initial_delay_ms",
                format!(
                    "{} exceeds max_delay_ms {}",
                    self.initial_delay_ms, self.max_delay_ms
                ),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    pub ttl_ms: u64,
    pub sweep_interval_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            ttl_ms: system::DEFAULT_LOCK_TTL_MS,
            sweep_interval_ms: system::DEFAULT_SWEEP_INTERVAL_MS,
        }
    }
}

impl LockConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Capacity of the channel feeding workflow events to handlers
    pub handler_queue_capacity: usize,
    /// Upper bound on a single sink write or handler run
    pub side_effect_timeout_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            handler_queue_capacity: system::DEFAULT_HANDLER_QUEUE_CAPACITY,
            side_effect_timeout_ms: system::DEFAULT_SIDE_EFFECT_TIMEOUT_MS,
        }
    }
}

impl DispatcherConfig {
    pub fn side_effect_timeout(&self) -> Duration {
        Duration::from_millis(self.side_effect_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub enabled: bool,
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
    /// Successful half-open calls needed to close the circuit again
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            failure_threshold: system::DEFAULT_CIRCUIT_FAILURE_THRESHOLD,
            reset_timeout_ms: system::DEFAULT_CIRCUIT_RESET_TIMEOUT_MS,
            success_threshold: 1,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/release_workflow_development".to_string(),
            max_connections: 10,
            acquire_timeout_ms: 5_000,
        }
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub retry: RetryConfig,
    pub lock: LockConfig,
    pub dispatcher: DispatcherConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub database: Option<DatabaseConfig>,
}

impl WorkflowConfig {
    /// Defaults overlaid with `RELEASE_WORKFLOW__*` environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::build(None, None)
    }

    /// Defaults, then the TOML file at `path` if it exists, then the environment
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::build(Some(path.as_ref()), None)
    }

    /// Like [`load_from`](Self::load_from), reading overrides from `overrides`
    /// (keys such as `RELEASE_WORKFLOW__LOCK__TTL_MS`) instead of the process
    /// environment.
    pub fn load_with_overrides(
        path: Option<&Path>,
        overrides: HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        Self::build(path, Some(overrides))
    }

    fn build(
        path: Option<&Path>,
        overrides: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            debug!(path = %path.display(), "Loading workflow configuration file");
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            );
        }

        let environment = config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .source(overrides);

        let loaded: Self = builder
            .add_source(environment)
            .build()?
            .try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retry.validate()?;
        if self.lock.ttl_ms == 0 {
            return Err(ConfigError::invalid("lock.ttl_ms", "must be greater than zero"));
        }
        if self.lock.sweep_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "lock.sweep_interval_ms",
                "must be greater than zero",
            ));
        }
        if self.dispatcher.handler_queue_capacity == 0 {
            return Err(ConfigError::invalid(
                "dispatcher.handler_queue_capacity",
                "must be greater than zero",
            ));
        }
        if self.dispatcher.side_effect_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "dispatcher.side_effect_timeout_ms",
                "must be greater than zero",
            ));
        }
        if self.circuit_breaker.enabled && self.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigError::invalid(
                "circuit_breaker.failure_threshold",
                "must be greater than zero when enabled",
            ));
        }
        Ok(())
    }
}
