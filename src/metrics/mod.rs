//! Prometheus metrics for the race coordinator
//!
//! This module provides metrics tracking for:
//! - Registration: attempts by outcome, registered participants
//! - Races: lifecycle phase, races started and finished, race duration
//! - Timing: laps recorded, countdowns cancelled, start notifications
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails or never happens, every recording function is a
//! no-op.

use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram, Counter,
    CounterVec, Encoder, Gauge, Histogram, TextEncoder,
};
use std::sync::OnceLock;

use crate::models::RacePhase;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for all race metrics
struct RaceMetrics {
    registrations: CounterVec,
    registered_participants: Gauge,
    laps_recorded: Counter,
    races_started: Counter,
    races_finished: Counter,
    countdowns_cancelled: CounterVec,
    race_phase: Gauge,
    race_duration: Histogram,
    notifications: CounterVec,
}

impl RaceMetrics {
    fn register() -> Result<Self, prometheus::Error> {
        Ok(Self {
            registrations: register_counter_vec!(
                "racetimer_registrations_total",
                "Registration attempts by outcome",
                &["outcome"]
            )?,
            registered_participants: register_gauge!(
                "racetimer_registered_participants",
                "Number of registered participants"
            )?,
            laps_recorded: register_counter!(
                "racetimer_laps_recorded_total",
                "Total laps recorded"
            )?,
            races_started: register_counter!(
                "racetimer_races_started_total",
                "Total races started"
            )?,
            races_finished: register_counter!(
                "racetimer_races_finished_total",
                "Total races finished"
            )?,
            countdowns_cancelled: register_counter_vec!(
                "racetimer_countdowns_cancelled_total",
                "Countdowns cancelled by the phase they were cancelled in",
                &["phase"]
            )?,
            race_phase: register_gauge!(
                "racetimer_race_phase",
                "Current lifecycle phase (0 = Registration, 1 = StartCountdown, 2 = InProgress, 3 = FinishCountdown, 4 = Finished)"
            )?,
            race_duration: register_histogram!(
                "racetimer_race_duration_seconds",
                "Time from race start to race finish in seconds",
                vec![10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1200.0, 1800.0, 3600.0]
            )?,
            notifications: register_counter_vec!(
                "racetimer_start_notifications_total",
                "Start notifications sent to participants by outcome",
                &["outcome"]
            )?,
        })
    }
}

/// Global storage; `None` when registration failed
static RACE_METRICS: OnceLock<Option<RaceMetrics>> = OnceLock::new();

fn metrics() -> Option<&'static RaceMetrics> {
    RACE_METRICS.get().and_then(Option::as_ref)
}

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// Safe to call more than once; only the first call registers anything. If
/// registration fails the error is logged and metrics stay disabled.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = racetimer::metrics::init_metrics() {
///     eprintln!("Warning: Metrics initialization failed: {}", e);
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let stored = RACE_METRICS.get_or_init(|| match RaceMetrics::register() {
        Ok(m) => {
            tracing::info!("Prometheus metrics initialized successfully");
            Some(m)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Prometheus metrics registration failed");
            None
        }
    });

    match stored {
        Some(_) => Ok(()),
        None => Err("Metrics registration failed".into()),
    }
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    metrics().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record a registration attempt
pub fn record_registration(outcome: &str) {
    if let Some(m) = metrics() {
        m.registrations.with_label_values(&[outcome]).inc();
    }
}

/// Update the registered participant gauge
pub fn set_registered_participants(count: usize) {
    if let Some(m) = metrics() {
        m.registered_participants.set(count as f64);
    }
}

/// Record a lap
pub fn record_lap() {
    if let Some(m) = metrics() {
        m.laps_recorded.inc();
    }
}

/// Record a race start
pub fn record_race_started() {
    if let Some(m) = metrics() {
        m.races_started.inc();
    }
}

/// Record a race finish and its duration
pub fn record_race_finished(duration_secs: f64) {
    let Some(m) = metrics() else {
        return;
    };

    m.races_finished.inc();
    m.race_duration.observe(duration_secs);
}

/// Record a cancelled countdown
pub fn record_countdown_cancelled(phase: RacePhase) {
    if let Some(m) = metrics() {
        m.countdowns_cancelled
            .with_label_values(&[phase.as_str()])
            .inc();
    }
}

/// Update the phase gauge
pub fn set_phase(phase: RacePhase) {
    if let Some(m) = metrics() {
        m.race_phase.set(f64::from(phase.code()));
    }
}

/// Record start notification results
pub fn record_notifications(delivered: usize, failed: usize) {
    let Some(m) = metrics() else {
        return;
    };

    if delivered > 0 {
        m.notifications
            .with_label_values(&["delivered"])
            .inc_by(delivered as f64);
    }
    if failed > 0 {
        m.notifications
            .with_label_values(&["failed"])
            .inc_by(failed as f64);
    }
}

// ============================================================================
// Tests
// ============================================================================
