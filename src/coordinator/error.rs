//! Error types for the race coordinator
//!
//! Every coordinator operation returns one of these instead of panicking.
//! Most variants are ordinary rejections a client is expected to branch on.

use thiserror::Error;

use crate::error::ErrorCategory;
use crate::models::RacePhase;

use super::config::ConfigError;

/// Result type for coordinator operations
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

/// Rejections and failures reported by the race coordinator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    /// Registration attempted outside the registration window
    #[error("Registration closed. Wait until next registration period.")]
    RegistrationClosed,

    /// Roster is full
    #[error("Registration closed. Max participants reached ({current}/{max}).")]
    CapacityReached { current: usize, max: usize },

    /// Identifier could not be parsed as a network address
    #[error("Could not parse participant identifier '{0}'")]
    InvalidIdentifier(String),

    /// Identifier was empty
    #[error("Must provide device identifier to register")]
    MissingIdentifier,

    /// Operation not allowed in the current phase
    #[error("Cannot {operation} while race is in phase {phase}")]
    InvalidPhase {
        operation: &'static str,
        phase: RacePhase,
    },

    /// Lap submitted for an identifier that never registered
    #[error("The given identifier '{0}' is not registered")]
    ParticipantNotFound(String),

    /// Result requested for a participant absent from the last race
    #[error("No result for participant {0} in the last race")]
    ResultNotFound(u32),

    /// No race has been started yet
    #[error("No races available")]
    NoRace,

    /// Most recent race is still running
    #[error("The last race has not finished")]
    RaceNotFinished,

    /// Cancel requested with no countdown running
    #[error("No countdown is active")]
    NoActiveCountdown,

    /// Lap time could not be understood
    #[error("Invalid lap time '{input}': {reason}")]
    InvalidLapTime { input: String, reason: String },

    /// Runtime setting rejected
    #[error("Invalid value for '{field}': {reason}")]
    InvalidSetting { field: &'static str, reason: String },
}

impl CoordinatorError {
    /// Classification used for handling and status mapping
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidIdentifier(_) | Self::MissingIdentifier | Self::InvalidLapTime { .. } => {
                ErrorCategory::Validation
            }
            Self::RegistrationClosed
            | Self::InvalidPhase { .. }
            | Self::RaceNotFinished
            | Self::NoActiveCountdown => ErrorCategory::Phase,
            Self::ParticipantNotFound(_) | Self::ResultNotFound(_) | Self::NoRace => {
                ErrorCategory::NotFound
            }
            Self::CapacityReached { .. } => ErrorCategory::Capacity,
            Self::InvalidSetting { .. } => ErrorCategory::Config,
        }
    }

    /// Whether the same request may succeed later without changes
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RegistrationClosed
                | Self::CapacityReached { .. }
                | Self::RaceNotFinished
                | Self::NoRace
        )
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::RegistrationClosed => "registration_closed",
            Self::CapacityReached { .. } => "capacity_reached",
            Self::InvalidIdentifier(_) => "invalid_identifier",
            Self::MissingIdentifier => "missing_identifier",
            Self::InvalidPhase { .. } => "invalid_phase",
            Self::ParticipantNotFound(_) => "participant_not_found",
            Self::ResultNotFound(_) => "result_not_found",
            Self::NoRace => "no_race",
            Self::RaceNotFinished => "race_not_finished",
            Self::NoActiveCountdown => "no_active_countdown",
            Self::InvalidLapTime { .. } => "invalid_lap_time",
            Self::InvalidSetting { .. } => "invalid_setting",
        }
    }

    pub(crate) fn invalid_phase(operation: &'static str, phase: RacePhase) -> Self {
        Self::InvalidPhase { operation, phase }
    }
}

impl From<ConfigError> for CoordinatorError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::InvalidValue { field, reason } => Self::InvalidSetting { field, reason },
        }
    }
}
