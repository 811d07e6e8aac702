//! Main application configuration
//!
//! This module defines the primary configuration structures for the login
//! queue service, including environment variable and TOML file loading and
//! validation.

use crate::admission::policy::{QueuePolicy, DEFAULT_GRACE_MARGIN_SECONDS};
use crate::auth::hasher_for;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub server: ServerSettings,
    pub queue: QueueSettings,
    pub auth: AuthSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for health check and metrics endpoints
    pub health_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Game server capacity settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Maximum players online at once (0 = uncapped)
    pub max_players: u32,
}

/// Waiting list settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Time granted beyond the retry interval before an entry is evicted
    pub grace_margin_seconds: u64,
    /// Periodic expiry sweep interval in seconds (0 = sweep only on login)
    pub sweep_interval_seconds: u64,
    /// Interval for refreshing queue and occupancy gauges
    pub metrics_interval_seconds: u64,
}

/// Credential hashing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Name of the password hashing algorithm
    pub hash_algorithm: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "login-queue".to_string(),
            log_level: "info".to_string(),
            health_port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { max_players: 0 }
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            grace_margin_seconds: DEFAULT_GRACE_MARGIN_SECONDS,
            sweep_interval_seconds: 0,
            metrics_interval_seconds: 15,
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            hash_algorithm: "sha1".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Parse configuration from TOML text without validating it
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Ok(port) = env::var("HEALTH_PORT") {
            self.service.health_port = port
                .parse()
                .map_err(|_| anyhow!("Invalid HEALTH_PORT value: {}", port))?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            self.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }

        // Server settings
        if let Ok(max_players) = env::var("MAX_PLAYERS") {
            self.server.max_players = max_players
                .parse()
                .map_err(|_| anyhow!("Invalid MAX_PLAYERS value: {}", max_players))?;
        }

        // Queue settings
        if let Ok(margin) = env::var("QUEUE_GRACE_MARGIN_SECONDS") {
            self.queue.grace_margin_seconds = margin
                .parse()
                .map_err(|_| anyhow!("Invalid QUEUE_GRACE_MARGIN_SECONDS value: {}", margin))?;
        }
        if let Ok(interval) = env::var("QUEUE_SWEEP_INTERVAL_SECONDS") {
            self.queue.sweep_interval_seconds = interval.parse().map_err(|_| {
                anyhow!("Invalid QUEUE_SWEEP_INTERVAL_SECONDS value: {}", interval)
            })?;
        }

        // Auth settings
        if let Ok(algorithm) = env::var("PASSWORD_HASH_ALGORITHM") {
            self.auth.hash_algorithm = algorithm;
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get the periodic sweep interval, if enabled
    pub fn sweep_interval(&self) -> Option<Duration> {
        match self.queue.sweep_interval_seconds {
            0 => None,
            seconds => Some(Duration::from_secs(seconds)),
        }
    }

    /// Get the gauge refresh interval as Duration
    pub fn metrics_interval(&self) -> Duration {
        Duration::from_secs(self.queue.metrics_interval_seconds)
    }

    /// Build the waiting list retry policy
    pub fn queue_policy(&self) -> QueuePolicy {
        QueuePolicy {
            grace_margin_seconds: self.queue.grace_margin_seconds,
        }
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate ports
    if config.service.health_port == 0 {
        return Err(anyhow!("Health port cannot be 0"));
    }

    // Validate timeouts
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }
    if config.queue.metrics_interval_seconds == 0 {
        return Err(anyhow!("Metrics interval must be greater than 0"));
    }

    // Validate queue policy
    config.queue_policy().validate()?;

    // Validate hash algorithm
    hasher_for(&config.auth.hash_algorithm)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.server.max_players, 0);
        assert_eq!(config.queue.grace_margin_seconds, 15);
        assert_eq!(config.auth.hash_algorithm, "sha1");
        assert!(config.sweep_interval().is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = AppConfig::default();
        config.service.log_level = "verbose".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.service.health_port = 0;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.queue.grace_margin_seconds = 0;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.queue.metrics_interval_seconds = 0;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.auth.hash_algorithm = "md5".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [server]
            max_players = 900

            [queue]
            sweep_interval_seconds = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.server.max_players, 900);
        assert_eq!(config.sweep_interval(), Some(Duration::from_secs(60)));
        assert_eq!(config.queue.grace_margin_seconds, 15);
        assert_eq!(config.service.name, "login-queue");
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!(
            "login-queue-config-{}.toml",
            std::process::id()
        ));
        std::fs::write(
            &path,
            "[service]\nlog_level = \"debug\"\n\n[auth]\nhash_algorithm = \"sha256\"\n",
        )
        .unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.service.log_level, "debug");
        assert_eq!(config.auth.hash_algorithm, "sha256");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let path = Path::new("/nonexistent/login-queue.toml");
        assert!(AppConfig::from_file(path).is_err());
    }

    #[test]
    fn test_queue_policy_from_config() {
        let mut config = AppConfig::default();
        config.queue.grace_margin_seconds = 30;
        assert_eq!(
            config.queue_policy().timeout_for(1),
            Duration::from_secs(35)
        );
    }
}
