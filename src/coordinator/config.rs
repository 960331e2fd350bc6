//! Coordinator configuration

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use thiserror::Error;

const DEFAULT_MAX_PARTICIPANTS: usize = 2;
const DEFAULT_START_COUNTDOWN_MS: u64 = 20_000;
const DEFAULT_FINISH_COUNTDOWN_MS: u64 = 10_000;
const DEFAULT_TARGET_LAPS: u32 = 10;

// ============================================================================
// Race Settings
// ============================================================================

/// Race settings used by the coordinator
///
/// All of these may be changed at runtime; a race copies its target lap count
/// when it starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Maximum registered participants
    pub max_participants: usize,

    /// Default start countdown in milliseconds
    pub start_countdown_ms: u64,

    /// Finish countdown started by the first finisher, in milliseconds
    pub finish_countdown_ms: u64,

    /// Default number of laps per race
    pub target_laps: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_participants: DEFAULT_MAX_PARTICIPANTS,
            start_countdown_ms: DEFAULT_START_COUNTDOWN_MS,
            finish_countdown_ms: DEFAULT_FINISH_COUNTDOWN_MS,
            target_laps: DEFAULT_TARGET_LAPS,
        }
    }
}

impl CoordinatorConfig {
    /// Create a new config builder
    pub fn builder() -> CoordinatorConfigBuilder {
        CoordinatorConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_participants == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_participants",
                reason: "Must allow at least 1 participant".to_string(),
            });
        }

        if self.target_laps == 0 {
            return Err(ConfigError::InvalidValue {
                field: "target_laps",
                reason: "A race needs at least 1 lap".to_string(),
            });
        }

        Ok(())
    }

    /// Apply a partial update, leaving `self` untouched if the result is invalid
    pub fn apply(&mut self, update: &SettingsUpdate) -> Result<(), ConfigError> {
        let mut next = self.clone();
        if let Some(max) = update.max_participants {
            next.max_participants = max;
        }
        if let Some(ms) = update.start_countdown_ms {
            next.start_countdown_ms = ms;
        }
        if let Some(ms) = update.finish_countdown_ms {
            next.finish_countdown_ms = ms;
        }
        if let Some(laps) = update.target_laps {
            next.target_laps = laps;
        }

        next.validate()?;
        *self = next;
        Ok(())
    }
}

/// Partial change to the race settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub max_participants: Option<usize>,
    pub start_countdown_ms: Option<u64>,
    pub finish_countdown_ms: Option<u64>,
    pub target_laps: Option<u32>,
}

/// Builder for CoordinatorConfig
#[derive(Debug, Default)]
pub struct CoordinatorConfigBuilder {
    max_participants: Option<usize>,
    start_countdown_ms: Option<u64>,
    finish_countdown_ms: Option<u64>,
    target_laps: Option<u32>,
}

impl CoordinatorConfigBuilder {
    /// Set max participants
    pub fn max_participants(mut self, max: usize) -> Self {
        self.max_participants = Some(max);
        self
    }

    /// Set start countdown
    pub fn start_countdown_ms(mut self, ms: u64) -> Self {
        self.start_countdown_ms = Some(ms);
        self
    }

    /// Set finish countdown
    pub fn finish_countdown_ms(mut self, ms: u64) -> Self {
        self.finish_countdown_ms = Some(ms);
        self
    }

    /// Set laps per race
    pub fn target_laps(mut self, laps: u32) -> Self {
        self.target_laps = Some(laps);
        self
    }

    /// Build the config
    pub fn build(self) -> Result<CoordinatorConfig, ConfigError> {
        let config = CoordinatorConfig {
            max_participants: self.max_participants.unwrap_or(DEFAULT_MAX_PARTICIPANTS),
            start_countdown_ms: self.start_countdown_ms.unwrap_or(DEFAULT_START_COUNTDOWN_MS),
            finish_countdown_ms: self.finish_countdown_ms.unwrap_or(DEFAULT_FINISH_COUNTDOWN_MS),
            target_laps: self.target_laps.unwrap_or(DEFAULT_TARGET_LAPS),
        };

        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// Server Settings
// ============================================================================

/// Configuration for the HTTP server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address
    pub bind_address: SocketAddr,

    /// Enable CORS for API
    pub enable_cors: bool,

    /// Enable request logging
    pub enable_request_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 5000)),
            enable_cors: true,
            enable_request_logging: true,
        }
    }
}

impl ServerConfig {
    /// Parse and set the bind address
    pub fn with_bind_address_str(mut self, addr: &str) -> Result<Self, ConfigError> {
        self.bind_address = addr.parse().map_err(|_| ConfigError::InvalidValue {
            field: "bind_address",
            reason: format!("Invalid address: {addr}"),
        })?;
        Ok(self)
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}
