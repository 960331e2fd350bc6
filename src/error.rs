//! Unified error handling for the racetimer crate
//!
//! Request-level failures stay in [`CoordinatorError`]; [`Error`] covers
//! server setup and the serve loop, and [`ErrorCategory`] classifies both.
//!
//! # Architecture
//!
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Server startup and runtime failures
//!
//! # Usage
//!
//! ```rust,ignore
//! use racetimer::error::{Error, ErrorCategory};
//!
//! fn handle_error(err: Error) {
//!     match err.category() {
//!         ErrorCategory::Transport if err.is_recoverable() => println!("Try again later: {err}"),
//!         _ => eprintln!("Server failed: {err}"),
//!     }
//! }
//! ```

use thiserror::Error;

// Re-export domain-specific errors for convenience
pub use crate::coordinator::config::ConfigError;
pub use crate::coordinator::error::CoordinatorError;
pub use crate::coordinator::notifier::NotifyError;
pub use crate::coordinator::server::ServerError;

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Malformed input (identifier, lap time, request body)
    Validation,
    /// Operation not allowed in the current race phase
    Phase,
    /// Unknown participant, result or race
    NotFound,
    /// Roster is full
    Capacity,
    /// Configuration and settings errors
    Config,
    /// Network, HTTP and I/O failures
    Transport,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Short lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Phase => "phase",
            Self::NotFound => "not_found",
            Self::Capacity => "capacity",
            Self::Config => "config",
            Self::Transport => "transport",
            Self::Other => "other",
        }
    }
}

/// Errors raised while bringing up or running the coordinator server
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid race settings
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Start notifier could not be created
    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    /// HTTP server errors
    #[error("Server error: {0}")]
    Server(#[from] ServerError),
}

impl Error {
    /// Check if this error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Notify(_) | Self::Server(ServerError::BindError(_)) => true,
            Self::Config(_) | Self::Server(_) => false,
        }
    }

    /// Get the error category for handling strategies
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) => ErrorCategory::Config,
            Self::Notify(_) | Self::Server(_) => ErrorCategory::Transport,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
