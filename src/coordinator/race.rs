//! A single race and its results

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::models::{self, Lap};

use super::error::{CoordinatorError, CoordinatorResult};

/// One execution of the race
///
/// A participant enters the finish order the moment its lap count reaches the
/// target, and only once. The finish order is the order those laps arrived in.
#[derive(Debug, Clone)]
pub struct Race {
    target_laps: u32,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    results: BTreeMap<u32, Vec<Lap>>,
    finish_order: Vec<u32>,
}

impl Race {
    /// Create a race that ends after `target_laps` laps
    pub fn new(target_laps: u32) -> Self {
        Self {
            target_laps,
            started_at: None,
            finished_at: None,
            results: BTreeMap::new(),
            finish_order: Vec::new(),
        }
    }

    /// Ensure a participant has an entry; no-op if it already does
    pub fn add_participant(&mut self, id: u32) {
        self.results.entry(id).or_default();
    }

    /// Append the next lap for a participant
    ///
    /// Returns the lap, numbered within this race.
    pub fn record_lap(&mut self, id: u32, duration: Duration) -> CoordinatorResult<Lap> {
        let laps = self
            .results
            .get_mut(&id)
            .ok_or(CoordinatorError::ResultNotFound(id))?;

        let lap = Lap::new(laps.len() as u32 + 1, duration);
        laps.push(lap);

        if laps.len() >= self.target_laps as usize && !self.finish_order.contains(&id) {
            self.finish_order.push(id);
        }

        Ok(lap)
    }

    /// Whether anyone has completed the target lap count
    pub fn has_any_finisher(&self) -> bool {
        !self.finish_order.is_empty()
    }

    /// Whether every participant has completed the target lap count
    pub fn all_finished(&self) -> bool {
        !self.results.is_empty() && self.results.keys().all(|id| self.finish_order.contains(id))
    }

    /// Stamp the start time
    pub fn start(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        self.started_at = Some(now);
        now
    }

    /// Stamp the finish time; later calls keep the first stamp
    pub fn finish(&mut self) -> DateTime<Utc> {
        *self.finished_at.get_or_insert_with(Utc::now)
    }

    /// Time between start and finish, once both are stamped
    pub fn duration(&self) -> Option<chrono::Duration> {
        Some(self.finished_at? - self.started_at?)
    }

    pub fn target_laps(&self) -> u32 {
        self.target_laps
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    /// Laps per participant id
    pub fn results(&self) -> &BTreeMap<u32, Vec<Lap>> {
        &self.results
    }

    /// Participants in the order they completed the race
    pub fn finish_order(&self) -> &[u32] {
        &self.finish_order
    }

    /// Number of laps a participant has completed in this race
    pub fn lap_count(&self, id: u32) -> usize {
        self.results.get(&id).map_or(0, Vec::len)
    }

    /// Placing, overall time and fastest lap for one finisher
    pub fn result_for(&self, id: u32) -> CoordinatorResult<RaceResult> {
        let place = self
            .finish_order
            .iter()
            .position(|finisher| *finisher == id)
            .ok_or(CoordinatorError::ResultNotFound(id))?;
        let laps = self
            .results
            .get(&id)
            .ok_or(CoordinatorError::ResultNotFound(id))?;

        Ok(RaceResult::from_laps(id, place + 1, laps))
    }

    /// Serializable snapshot of this race
    pub fn summary(&self, index: usize) -> RaceSummary {
        RaceSummary {
            index,
            target_laps: self.target_laps,
            started_at: self.started_at,
            finished_at: self.finished_at,
            duration_ms: self.duration().map(|d| d.num_milliseconds()),
            finish_order: self.finish_order.clone(),
            lap_results: self
                .results
                .iter()
                .map(|(id, laps)| ParticipantLaps {
                    participant_id: *id,
                    laps: laps.clone(),
                })
                .collect(),
        }
    }
}

// ============================================================================
// Summaries
// ============================================================================

/// Laps recorded for one participant in a race
#[derive(Debug, Clone, Serialize)]
pub struct ParticipantLaps {
    pub participant_id: u32,
    pub laps: Vec<Lap>,
}

/// Snapshot of a race as returned by queries
#[derive(Debug, Clone, Serialize)]
pub struct RaceSummary {
    /// Position in the race history, starting at 0
    pub index: usize,
    pub target_laps: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub finish_order: Vec<u32>,
    pub lap_results: Vec<ParticipantLaps>,
}

/// Result for one participant of a finished race
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceResult {
    pub id: u32,
    pub place: usize,
    pub overall_time: String,
    pub overall_time_ms: f64,
    pub fastest_lap: String,
    pub fastest_lap_ms: f64,
    pub fastest_lap_number: u32,
}

impl RaceResult {
    fn from_laps(id: u32, place: usize, laps: &[Lap]) -> Self {
        let overall = models::total_time(laps);
        let fastest = models::fastest_lap(laps);
        let fastest_duration = fastest.map(|lap| lap.duration()).unwrap_or_default();

        Self {
            id,
            place,
            overall_time: models::format_lap_time(overall),
            overall_time_ms: models::duration_millis(overall),
            fastest_lap: models::format_lap_time(fastest_duration),
            fastest_lap_ms: models::duration_millis(fastest_duration),
            fastest_lap_number: fastest.map_or(0, |lap| lap.number()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
