//! Start notifications for participant devices
//!
//! Each lap timer device runs a small HTTP listener. When a start countdown
//! begins, the coordinator posts the countdown length to every registered
//! device so they can count down locally.

use futures::future::join_all;
use reqwest::Client;
use serde::Serialize;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use thiserror::Error;

use crate::metrics;

/// Default port the lap timer devices listen on
pub const DEFAULT_PARTICIPANT_PORT: u16 = 80;

// ============================================================================
// Message Types
// ============================================================================

/// Body posted to a device when the race is about to start
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartMessage {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(rename = "countDownMillis")]
    pub count_down_millis: u64,
}

impl StartMessage {
    pub fn new(count_down_millis: u64) -> Self {
        Self {
            kind: "start",
            count_down_millis,
        }
    }
}

/// Outcome of notifying every participant
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifyReport {
    pub delivered: usize,
    pub failed: usize,
}

// ============================================================================
// Participant Notifier
// ============================================================================

/// Sends start notifications to participant devices
#[derive(Debug, Clone)]
pub struct ParticipantNotifier {
    http_client: Client,
    port: u16,
}

impl ParticipantNotifier {
    /// Create a notifier posting to `port` on each device
    pub fn new(port: u16, timeout: Duration) -> Result<Self, NotifyError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::InitError(e.to_string()))?;

        Ok(Self { http_client, port })
    }

    /// Port notifications are sent to
    pub fn port(&self) -> u16 {
        self.port
    }

    /// URL of a device's listener
    pub fn endpoint(&self, address: IpAddr) -> String {
        format!("http://{}/", SocketAddr::new(address, self.port))
    }

    /// Post the start message to a single device
    pub async fn send_start(&self, address: IpAddr, countdown_ms: u64) -> Result<(), NotifyError> {
        let url = self.endpoint(address);

        let response = self
            .http_client
            .post(&url)
            .json(&StartMessage::new(countdown_ms))
            .send()
            .await
            .map_err(|e| NotifyError::NetworkError {
                address,
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(NotifyError::HttpError {
                address,
                status: response.status().as_u16(),
            });
        }

        Ok(())
    }

    /// Notify every device concurrently
    ///
    /// Failures are logged and counted; they never abort the other sends.
    pub async fn notify_start(&self, participants: &[IpAddr], countdown_ms: u64) -> NotifyReport {
        let sends = participants
            .iter()
            .map(|address| self.send_start(*address, countdown_ms));

        let mut report = NotifyReport::default();
        for result in join_all(sends).await {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::warn!(error = %e, "Start notification failed");
                    report.failed += 1;
                }
            }
        }

        metrics::record_notifications(report.delivered, report.failed);
        tracing::info!(
            delivered = report.delivered,
            failed = report.failed,
            countdown_ms,
            "Start notifications sent"
        );
        report
    }
}

// ============================================================================
// Notifier Errors
// ============================================================================

/// Notification errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("Initialization error: {0}")]
    InitError(String),

    #[error("Network error for {address}: {message}")]
    NetworkError { address: IpAddr, message: String },

    #[error("Device {address} answered with HTTP {status}")]
    HttpError { address: IpAddr, status: u16 },
}
