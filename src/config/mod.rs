//! Configuration management for the race timer
//!
//! This module handles loading and validating configuration from environment variables,
//! files, and command-line arguments.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::coordinator::config::{CoordinatorConfig, ServerConfig};
use crate::coordinator::notifier::DEFAULT_PARTICIPANT_PORT;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Race settings
    pub race: CoordinatorConfig,

    /// Start notification configuration
    pub notifications: NotificationConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Start notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Post start notifications to participant devices
    pub enabled: bool,

    /// Port the devices listen on
    pub participant_port: u16,

    /// Per-device request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            participant_port: DEFAULT_PARTICIPANT_PORT,
            timeout_secs: 5,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Unset or unparsable variables fall back to the defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let server = ServerConfig {
            bind_address: env_or("RACETIMER_BIND_ADDRESS", defaults.server.bind_address),
            enable_cors: env_or("RACETIMER_ENABLE_CORS", defaults.server.enable_cors),
            enable_request_logging: env_or(
                "RACETIMER_REQUEST_LOGGING",
                defaults.server.enable_request_logging,
            ),
        };

        let race = CoordinatorConfig {
            max_participants: env_or("RACETIMER_MAX_PARTICIPANTS", defaults.race.max_participants),
            start_countdown_ms: env_or(
                "RACETIMER_START_COUNTDOWN_MS",
                defaults.race.start_countdown_ms,
            ),
            finish_countdown_ms: env_or(
                "RACETIMER_FINISH_COUNTDOWN_MS",
                defaults.race.finish_countdown_ms,
            ),
            target_laps: env_or("RACETIMER_TARGET_LAPS", defaults.race.target_laps),
        };

        let notifications = NotificationConfig {
            enabled: env_or("RACETIMER_NOTIFY", defaults.notifications.enabled),
            participant_port: env_or(
                "RACETIMER_PARTICIPANT_PORT",
                defaults.notifications.participant_port,
            ),
            timeout_secs: env_or("RACETIMER_NOTIFY_TIMEOUT", defaults.notifications.timeout_secs),
        };

        let logging = LoggingConfig {
            level: std::env::var("RACETIMER_LOG_LEVEL").unwrap_or(defaults.logging.level),
            format: std::env::var("RACETIMER_LOG_FORMAT").unwrap_or(defaults.logging.format),
        };

        Ok(Self {
            server,
            race,
            notifications,
            logging,
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.race.validate()?;

        if self.notifications.enabled && self.notifications.participant_port == 0 {
            anyhow::bail!("participant_port must be greater than 0");
        }

        if self.notifications.timeout_secs == 0 {
            anyhow::bail!("notification timeout_secs must be greater than 0");
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!("log format must be 'text' or 'json', got '{}'", self.logging.format);
        }

        Ok(())
    }

    /// Get notification timeout as Duration
    #[must_use]
    pub fn notification_timeout(&self) -> Duration {
        Duration::from_secs(self.notifications.timeout_secs)
    }
}
