//! Race coordinator
//!
//! This module holds the race lifecycle coordinator: participant registration,
//! start and finish countdowns, lap recording and race results, plus the HTTP
//! server that exposes them.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │               Race Coordinator               │
//! │                                              │
//! │  ┌────────────────────────────────────────┐  │
//! │  │        Participant Registry            │  │
//! │  │  - Address to id mapping               │  │
//! │  │  - Lifetime lap logs                   │  │
//! │  └────────────────────────────────────────┘  │
//! │                                              │
//! │  ┌────────────────────────────────────────┐  │
//! │  │        Lifecycle + Countdowns          │  │
//! │  │  - Start / finish countdown tasks      │  │
//! │  │  - Race history and finish order       │  │
//! │  └────────────────────────────────────────┘  │
//! │                                              │
//! │  ┌────────────────────────────────────────┐  │
//! │  │        REST API                        │  │
//! │  │  POST /api/v1/race/register/{ip}       │  │
//! │  │  POST /api/v1/race/start               │  │
//! │  │  POST /api/v1/race/laps                │  │
//! │  │  GET  /api/v1/race/state               │  │
//! │  │  GET  /api/v1/race/results/...         │  │
//! │  └────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use racetimer::coordinator::{CoordinatorConfig, RaceCoordinator};
//!
//! let coordinator = RaceCoordinator::new(CoordinatorConfig::default());
//! let id = coordinator.register("10.0.0.1").await?;
//! coordinator.start_race(Some(0), None).await?;
//! ```

pub mod api;
pub mod config;
pub mod countdown;
pub mod error;
pub mod manager;
pub mod notifier;
pub mod race;
pub mod registry;
pub mod server;

// Re-export main types
pub use config::{CoordinatorConfig, ServerConfig, SettingsUpdate};
pub use error::{CoordinatorError, CoordinatorResult};
pub use manager::{parse_identifier, LapRecorded, RaceCoordinator, RaceStatus};
pub use notifier::{NotifyReport, ParticipantNotifier};
pub use race::{RaceResult, RaceSummary};
pub use registry::ParticipantInfo;
pub use server::{AppState, CoordinatorServer};
