//! Match engine configuration.
//!
//! Loaded from environment variables. Every variable has a default, so an
//! empty environment yields a working configuration.

use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default health/metrics endpoint bind address.
pub const DEFAULT_HEALTH_BIND_ADDRESS: &str = "0.0.0.0:8081";

/// Default reconnect window before a disconnected player forfeits.
pub const DEFAULT_DISCONNECT_GRACE_PERIOD_SECONDS: u64 = 60;

/// Default time a finished match lingers after both seats are released.
pub const DEFAULT_MATCH_EVICTION_GRACE_SECONDS: u64 = 30;

/// Default bound on waiting for match actors during shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECONDS: u64 = 30;

/// Default engine instance ID prefix.
pub const DEFAULT_ENGINE_ID_PREFIX: &str = "engine";

/// Match engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Unique identifier for this engine instance.
    pub engine_id: String,

    /// Health endpoint bind address (default: "0.0.0.0:8081").
    pub health_bind_address: String,

    /// Reconnect window in seconds (default: 60).
    pub disconnect_grace_period_seconds: u64,

    /// Eviction delay for terminal matches in seconds (default: 30).
    pub match_eviction_grace_seconds: u64,

    /// Shutdown wait bound in seconds (default: 30).
    pub shutdown_timeout_seconds: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// The part of [`Config`] the actor system needs.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub engine_id: String,
    pub disconnect_grace: Duration,
    pub eviction_grace: Duration,
    pub shutdown_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            engine_id: DEFAULT_ENGINE_ID_PREFIX.to_string(),
            disconnect_grace: Duration::from_secs(DEFAULT_DISCONNECT_GRACE_PERIOD_SECONDS),
            eviction_grace: Duration::from_secs(DEFAULT_MATCH_EVICTION_GRACE_SECONDS),
            shutdown_timeout: Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECONDS),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for a malformed numeric variable
    /// or a zero grace period.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let health_bind_address = vars
            .get("ENGINE_HEALTH_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HEALTH_BIND_ADDRESS.to_string());

        let disconnect_grace_period_seconds = parse_seconds(
            vars,
            "ENGINE_DISCONNECT_GRACE_PERIOD_SECONDS",
            DEFAULT_DISCONNECT_GRACE_PERIOD_SECONDS,
        )?;
        let match_eviction_grace_seconds = parse_seconds(
            vars,
            "ENGINE_MATCH_EVICTION_GRACE_SECONDS",
            DEFAULT_MATCH_EVICTION_GRACE_SECONDS,
        )?;
        let shutdown_timeout_seconds = parse_seconds(
            vars,
            "ENGINE_SHUTDOWN_TIMEOUT_SECONDS",
            DEFAULT_SHUTDOWN_TIMEOUT_SECONDS,
        )?;

        if disconnect_grace_period_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "ENGINE_DISCONNECT_GRACE_PERIOD_SECONDS must be greater than zero".to_string(),
            ));
        }

        let engine_id = vars.get("ENGINE_ID").cloned().unwrap_or_else(|| {
            let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
            let uuid_suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
            format!("{DEFAULT_ENGINE_ID_PREFIX}-{hostname}-{short_suffix}")
        });

        Ok(Config {
            engine_id,
            health_bind_address,
            disconnect_grace_period_seconds,
            match_eviction_grace_seconds,
            shutdown_timeout_seconds,
        })
    }

    /// Settings handed to the coordinator and match actors.
    #[must_use]
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            engine_id: self.engine_id.clone(),
            disconnect_grace: Duration::from_secs(self.disconnect_grace_period_seconds),
            eviction_grace: Duration::from_secs(self.match_eviction_grace_seconds),
            shutdown_timeout: Duration::from_secs(self.shutdown_timeout_seconds),
        }
    }
}

fn parse_seconds(
    vars: &HashMap<String, String>,
    key: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    match vars.get(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e| {
            ConfigError::InvalidValue(format!("{key} must be a whole number of seconds: {e}"))
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vars_defaults() {
        let config = Config::from_vars(&HashMap::new()).expect("Config should load");

        assert_eq!(config.health_bind_address, DEFAULT_HEALTH_BIND_ADDRESS);
        assert_eq!(config.disconnect_grace_period_seconds, 60);
        assert_eq!(config.match_eviction_grace_seconds, 30);
        assert_eq!(config.shutdown_timeout_seconds, 30);
        assert!(config.engine_id.starts_with("engine-"));
    }

    #[test]
    fn test_from_vars_custom_values() {
        let vars = HashMap::from([
            ("ENGINE_ID".to_string(), "engine-eu-1".to_string()),
            (
                "ENGINE_HEALTH_BIND_ADDRESS".to_string(),
                "127.0.0.1:9090".to_string(),
            ),
            (
                "ENGINE_DISCONNECT_GRACE_PERIOD_SECONDS".to_string(),
                "15".to_string(),
            ),
            (
                "ENGINE_MATCH_EVICTION_GRACE_SECONDS".to_string(),
                "0".to_string(),
            ),
            (
                "ENGINE_SHUTDOWN_TIMEOUT_SECONDS".to_string(),
                " 5 ".to_string(),
            ),
        ]);

        let config = Config::from_vars(&vars).expect("Config should load");
        assert_eq!(config.engine_id, "engine-eu-1");
        assert_eq!(config.health_bind_address, "127.0.0.1:9090");
        assert_eq!(config.disconnect_grace_period_seconds, 15);
        assert_eq!(config.match_eviction_grace_seconds, 0);
        assert_eq!(config.shutdown_timeout_seconds, 5);
    }

    #[test]
    fn test_non_numeric_value_rejected() {
        let vars = HashMap::from([(
            "ENGINE_DISCONNECT_GRACE_PERIOD_SECONDS".to_string(),
            "a minute".to_string(),
        )]);

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidValue(msg)) if msg.contains("ENGINE_DISCONNECT_GRACE_PERIOD_SECONDS"))
        );
    }

    #[test]
    fn test_zero_grace_period_rejected() {
        let vars = HashMap::from([(
            "ENGINE_DISCONNECT_GRACE_PERIOD_SECONDS".to_string(),
            "0".to_string(),
        )]);
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_engine_settings_durations() {
        let vars = HashMap::from([
            ("ENGINE_ID".to_string(), "engine-test".to_string()),
            (
                "ENGINE_DISCONNECT_GRACE_PERIOD_SECONDS".to_string(),
                "90".to_string(),
            ),
        ]);
        let settings = Config::from_vars(&vars).unwrap().engine_settings();

        assert_eq!(settings.engine_id, "engine-test");
        assert_eq!(settings.disconnect_grace, Duration::from_secs(90));
        assert_eq!(settings.eviction_grace, Duration::from_secs(30));
        assert_eq!(settings.shutdown_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_default_settings_match_default_config() {
        let settings = EngineSettings::default();
        assert_eq!(settings.disconnect_grace, Duration::from_secs(60));
        assert_eq!(settings.eviction_grace, Duration::from_secs(30));
    }
}
