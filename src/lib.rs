//! racetimer - Lap race coordinator
//!
//! Coordinates short lap races between networked lap timer devices: devices
//! register, a countdown starts the race, laps stream in, and the first
//! finisher starts a countdown that closes the race.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`coordinator`] - Race lifecycle, countdowns, results and the HTTP API
//! - [`models`] - Core data structures and lap time formats
//! - [`metrics`] - Prometheus metrics
//! - [`error`] - Unified error type
//!
//! # Example
//!
//! ```no_run
//! use racetimer::config::Config;
//! use racetimer::coordinator::CoordinatorServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let server = CoordinatorServer::new(&config)?;
//!     server.start_with_shutdown(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     }).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod metrics;
pub mod models;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::coordinator::{
        CoordinatorConfig, CoordinatorError, CoordinatorResult, CoordinatorServer,
        RaceCoordinator,
    };
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::models::{Lap, RacePhase};
}

// Direct re-exports for convenience
pub use models::{Lap, RacePhase};
