//! Participant registry
//!
//! This module tracks the lap timer devices that have registered, keyed by
//! their network address, and keeps each device's lifetime lap log.

use serde::Serialize;
use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

use crate::models::{self, Lap};

use super::error::{CoordinatorError, CoordinatorResult};

// ============================================================================
// Participant Timer
// ============================================================================

/// Append-only lap log for one participant
#[derive(Debug, Clone)]
pub struct ParticipantTimer {
    id: u32,
    laps: Vec<Lap>,
}

impl ParticipantTimer {
    /// Create an empty timer
    pub fn new(id: u32) -> Self {
        Self { id, laps: Vec::new() }
    }

    /// Participant id assigned at registration
    pub fn id(&self) -> u32 {
        self.id
    }

    /// All laps in the order they were recorded
    pub fn laps(&self) -> &[Lap] {
        &self.laps
    }

    /// Number of recorded laps
    pub fn lap_count(&self) -> usize {
        self.laps.len()
    }

    /// Append a lap, numbered after the last one
    pub fn add_lap(&mut self, duration: Duration) -> Lap {
        let lap = Lap::new(self.laps.len() as u32 + 1, duration);
        self.laps.push(lap);
        lap
    }

    /// Total elapsed time over all laps
    pub fn total_time(&self) -> Duration {
        models::total_time(&self.laps)
    }

    /// Fastest recorded lap
    pub fn fastest_lap(&self) -> Option<Lap> {
        models::fastest_lap(&self.laps)
    }
}

// ============================================================================
// Participant Info
// ============================================================================

/// Read-only summary of a registered participant
#[derive(Debug, Clone, Serialize)]
pub struct ParticipantInfo {
    pub id: u32,
    pub identifier: IpAddr,
    pub lap_count: usize,
    pub total_time_ms: f64,
    pub fastest_lap: Option<Lap>,
}

impl ParticipantInfo {
    fn new(identifier: IpAddr, timer: &ParticipantTimer) -> Self {
        Self {
            id: timer.id(),
            identifier,
            lap_count: timer.lap_count(),
            total_time_ms: models::duration_millis(timer.total_time()),
            fastest_lap: timer.fastest_lap(),
        }
    }
}

// ============================================================================
// Participant Registry
// ============================================================================

/// Maps device addresses to lap timers and hands out participant ids
///
/// Ids start at 1, strictly increase and are never handed out twice.
#[derive(Debug)]
pub struct ParticipantRegistry {
    next_id: u32,
    entries: HashMap<IpAddr, ParticipantTimer>,
}

impl Default for ParticipantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ParticipantRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            next_id: 1,
            entries: HashMap::new(),
        }
    }

    /// Register an address, returning its id
    ///
    /// Registering a known address returns the id it already has.
    pub fn register(&mut self, identifier: IpAddr) -> u32 {
        if let Some(timer) = self.entries.get(&identifier) {
            return timer.id();
        }

        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(identifier, ParticipantTimer::new(id));
        id
    }

    /// Look up the timer for an address
    pub fn lookup(&self, identifier: &IpAddr) -> Option<&ParticipantTimer> {
        self.entries.get(identifier)
    }

    /// Whether an address has registered
    pub fn contains(&self, identifier: &IpAddr) -> bool {
        self.entries.contains_key(identifier)
    }

    /// Append a lap to a participant's lifetime log
    pub fn record_lap(&mut self, identifier: &IpAddr, duration: Duration) -> CoordinatorResult<Lap> {
        let timer = self
            .entries
            .get_mut(identifier)
            .ok_or_else(|| CoordinatorError::ParticipantNotFound(identifier.to_string()))?;

        Ok(timer.add_lap(duration))
    }

    /// Read view of every registered timer
    pub fn all(&self) -> &HashMap<IpAddr, ParticipantTimer> {
        &self.entries
    }

    /// Participant ids in registration order
    pub fn ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.entries.values().map(ParticipantTimer::id).collect();
        ids.sort_unstable();
        ids
    }

    /// Participant summaries ordered by id
    pub fn participants(&self) -> Vec<ParticipantInfo> {
        let mut participants: Vec<ParticipantInfo> = self
            .entries
            .iter()
            .map(|(identifier, timer)| ParticipantInfo::new(*identifier, timer))
            .collect();
        participants.sort_by_key(|p| p.id);
        participants
    }

    /// Number of registered participants
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nobody has registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
