//! Coordinator server implementation
//!
//! This module wires the race coordinator, the participant notifier and the
//! REST API into an HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::Result;

use super::api::create_router;
use super::config::ServerConfig;
use super::manager::RaceCoordinator;
use super::notifier::ParticipantNotifier;

// ============================================================================
// App State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Race coordinator
    pub coordinator: RaceCoordinator,

    /// Start notifier, absent when notifications are disabled
    pub notifier: Option<Arc<ParticipantNotifier>>,

    /// Server start time
    pub start_time: Instant,

    /// Server configuration
    pub config: ServerConfig,
}

impl AppState {
    /// State with no notifier
    pub fn new(coordinator: RaceCoordinator, config: ServerConfig) -> Self {
        Self {
            coordinator,
            notifier: None,
            start_time: Instant::now(),
            config,
        }
    }

    /// Attach a start notifier
    pub fn with_notifier(mut self, notifier: ParticipantNotifier) -> Self {
        self.notifier = Some(Arc::new(notifier));
        self
    }
}

// ============================================================================
// Coordinator Server
// ============================================================================

/// HTTP front end for the race coordinator
pub struct CoordinatorServer {
    config: ServerConfig,
    state: AppState,
}

impl CoordinatorServer {
    /// Create a server from the application configuration
    pub fn new(config: &Config) -> Result<Self> {
        config.race.validate()?;

        let coordinator = RaceCoordinator::new(config.race.clone());
        let mut state = AppState::new(coordinator, config.server.clone());

        if config.notifications.enabled {
            let notifier = ParticipantNotifier::new(
                config.notifications.participant_port,
                Duration::from_secs(config.notifications.timeout_secs),
            )?;
            state = state.with_notifier(notifier);
        }

        Ok(Self {
            config: config.server.clone(),
            state,
        })
    }

    /// Get the application state
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Handle to the coordinator behind this server
    pub fn coordinator(&self) -> &RaceCoordinator {
        &self.state.coordinator
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let mut router = create_router(self.state.clone());

        if self.config.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        if self.config.enable_request_logging {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Serve until `shutdown_signal` resolves
    pub async fn start_with_shutdown(
        &self,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let router = self.build_router();
        let addr = self.config.bind_address;

        tracing::info!(%addr, "Starting race coordinator (with graceful shutdown)");

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(e.to_string()))?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ServerError::ServeError(e.to_string()))?;

        tracing::info!("Race coordinator shutdown complete");
        Ok(())
    }

    /// Get server info
    pub async fn info(&self) -> ServerInfo {
        let settings = self.state.coordinator.settings().await;
        ServerInfo {
            bind_address: self.config.bind_address,
            max_participants: settings.max_participants,
            target_laps: settings.target_laps,
            notifications_enabled: self.state.notifier.is_some(),
            cors_enabled: self.config.enable_cors,
            request_logging_enabled: self.config.enable_request_logging,
        }
    }
}

/// Server information
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub bind_address: SocketAddr,
    pub max_participants: usize,
    pub target_laps: u32,
    pub notifications_enabled: bool,
    pub cors_enabled: bool,
    pub request_logging_enabled: bool,
}

impl ServerInfo {
    /// Format as display string
    pub fn display(&self) -> String {
        let toggle = |on: bool| if on { "enabled" } else { "disabled" };
        format!(
            "Race Coordinator\n\
             {:-<40}\n\
             Bind Address: {}\n\
             Max Participants: {}\n\
             Target Laps: {}\n\
             Start Notifications: {}\n\
             CORS: {}\n\
             Request Logging: {}",
            "",
            self.bind_address,
            self.max_participants,
            self.target_laps,
            toggle(self.notifications_enabled),
            toggle(self.cors_enabled),
            toggle(self.request_logging_enabled)
        )
    }
}

// ============================================================================
// Server Errors
// ============================================================================

/// Server errors
#[derive(Error, Debug, Clone)]
pub enum ServerError {
    #[error("Failed to bind: {0}")]
    BindError(String),

    #[error("Server error: {0}")]
    ServeError(String),
}

// ============================================================================
// Tests
// ============================================================================
