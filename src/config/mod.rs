//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables
//! - Builder methods

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};

/// Session lifecycle configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Session name advertised in create requests
    pub session_name: String,

    /// Requested session timeout in milliseconds
    pub session_timeout_ms: u64,

    /// Timeout for each create/activate/reactivate/close exchange in milliseconds
    pub request_timeout_ms: u64,

    /// Maximum response message size (0 = unlimited)
    pub max_response_message_size: u32,

    /// Reconnect policy
    pub reconnect: ReconnectConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_name: "ua-session".to_string(),
            session_timeout_ms: 120_000,
            request_timeout_ms: 60_000,
            max_response_message_size: 0,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| SessionError::Config(format!("Failed to read config file: {e}")))?;

        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(name) = std::env::var("UA_SESSION_NAME") {
            config.session_name = name;
        }
        if let Some(val) = env_parse("UA_SESSION_TIMEOUT_MS") {
            config.session_timeout_ms = val;
        }
        if let Some(val) = env_parse("UA_REQUEST_TIMEOUT_MS") {
            config.request_timeout_ms = val;
        }
        if let Some(val) = env_parse("UA_RECONNECT_MAX_ATTEMPTS") {
            config.reconnect.max_reactivate_attempts = val;
        }
        if let Some(val) = env_parse("UA_RECONNECT_MAX_CYCLES") {
            config.reconnect.max_recovery_cycles = Some(val);
        }

        config
    }

    /// Default config file location (`<config dir>/ua-session/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("ua-session").join("config.toml"))
    }

    /// Set session name
    pub fn with_session_name(mut self, name: impl Into<String>) -> Self {
        self.session_name = name.into();
        self
    }

    /// Set requested session timeout
    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set per-exchange request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set maximum response message size
    pub fn with_max_response_message_size(mut self, size: u32) -> Self {
        self.max_response_message_size = size;
        self
    }

    /// Set reconnect policy
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Requested session timeout
    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }

    /// Per-exchange request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Reject settings the state machine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_ms == 0 {
            return Err(SessionError::Config(
                "request_timeout_ms must be greater than 0".to_string(),
            ));
        }
        self.reconnect.validate()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|val| val.parse().ok())
}

/// Reactivation retry and recovery policy.
///
/// `Reactivate` retries up to `max_reactivate_attempts` times, waiting
/// [`delay_for_attempt`](Self::delay_for_attempt) before each retry. When
/// those run out the machine falls back to creating a new session; each such
/// fall-back is one recovery cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Reactivation attempts per recovery cycle (at least 1)
    pub max_reactivate_attempts: u32,

    /// Delay before the first retry in milliseconds
    pub initial_backoff_ms: u64,

    /// Upper bound on any retry delay in milliseconds
    pub max_backoff_ms: u64,

    /// Delay multiplier between retries
    pub backoff_multiplier: f64,

    /// Recovery cycles allowed before giving up (None = retry forever)
    pub max_recovery_cycles: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_reactivate_attempts: 5,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 16_000,
            backoff_multiplier: 2.0,
            max_recovery_cycles: None,
        }
    }
}

impl ReconnectConfig {
    /// Set reactivation attempts per cycle
    pub fn with_max_reactivate_attempts(mut self, attempts: u32) -> Self {
        self.max_reactivate_attempts = attempts;
        self
    }

    /// Set backoff bounds
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff_ms = initial.as_millis() as u64;
        self.max_backoff_ms = max.as_millis() as u64;
        self
    }

    /// Set backoff multiplier
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Set recovery cycle ceiling
    pub fn with_max_recovery_cycles(mut self, cycles: Option<u32>) -> Self {
        self.max_recovery_cycles = cycles;
        self
    }

    /// Delay before reactivation attempt `attempt`.
    ///
    /// The first attempt (0) runs immediately; retry `n` waits
    /// `initial * multiplier^(n-1)`, capped at `max_backoff_ms`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = (attempt - 1).min(i32::MAX as u32) as i32;
        let delay_ms = self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped = delay_ms.min(self.max_backoff_ms as f64);

        Duration::from_millis(capped as u64)
    }

    /// Whether another reactivation attempt fits in this cycle.
    pub fn has_attempts_after(&self, attempt: u32) -> bool {
        attempt.saturating_add(1) < self.max_reactivate_attempts
    }

    /// Whether recovery cycle `cycle` (1-based) is past the ceiling.
    pub fn exceeds_recovery_ceiling(&self, cycle: u32) -> bool {
        self.max_recovery_cycles.is_some_and(|max| cycle > max)
    }

    fn validate(&self) -> Result<()> {
        if self.max_reactivate_attempts == 0 {
            return Err(SessionError::Config(
                "max_reactivate_attempts must be at least 1".to_string(),
            ));
        }
        if self.backoff_multiplier < 1.0 {
            return Err(SessionError::Config(format!(
                "backoff_multiplier must be >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(SessionError::Config(format!(
                "initial_backoff_ms ({}) exceeds max_backoff_ms ({})",
                self.initial_backoff_ms, self.max_backoff_ms
            )));
        }
        Ok(())
    }
}
