//! Race lifecycle coordinator
//!
//! [`RaceCoordinator`] owns the roster, the race history and the lifecycle
//! state machine:
//!
//! ```text
//!  Registration ──start──▶ StartCountdown ──elapsed──▶ InProgress
//!       ▲   ▲                    │                        │ first finisher
//!       │   └──────cancel────────┘                        ▼
//!       │                                          FinishCountdown
//!       │                                                 │ elapsed / all finished
//!       └────────open registration──── Finished ◀─────────┘
//! ```
//!
//! Every mutation takes the single write lock, so transitions triggered by
//! concurrent lap submissions are applied one at a time. Queries take the read
//! lock and see either the whole of a transition or none of it.

use serde::Serialize;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;

use crate::metrics;
use crate::models::{Lap, RacePhase};

use super::config::{CoordinatorConfig, SettingsUpdate};
use super::countdown::Countdown;
use super::error::{CoordinatorError, CoordinatorResult};
use super::race::{Race, RaceResult, RaceSummary};
use super::registry::{ParticipantInfo, ParticipantRegistry};

// ============================================================================
// Lifecycle
// ============================================================================

/// Lifecycle state, carrying only the data valid in each phase
#[derive(Debug)]
enum Lifecycle {
    Registration,
    StartCountdown { countdown: Countdown, target_laps: u32 },
    InProgress,
    FinishCountdown { countdown: Countdown },
    Finished,
}

impl Lifecycle {
    fn phase(&self) -> RacePhase {
        match self {
            Self::Registration => RacePhase::Registration,
            Self::StartCountdown { .. } => RacePhase::StartCountdown,
            Self::InProgress => RacePhase::InProgress,
            Self::FinishCountdown { .. } => RacePhase::FinishCountdown,
            Self::Finished => RacePhase::Finished,
        }
    }

    fn countdown(&self) -> Option<&Countdown> {
        match self {
            Self::StartCountdown { countdown, .. } | Self::FinishCountdown { countdown } => {
                Some(countdown)
            }
            _ => None,
        }
    }

    fn into_countdown(self) -> Option<Countdown> {
        match self {
            Self::StartCountdown { countdown, .. } | Self::FinishCountdown { countdown } => {
                Some(countdown)
            }
            _ => None,
        }
    }
}

// ============================================================================
// Coordinator State
// ============================================================================

#[derive(Debug)]
struct CoordinatorState {
    lifecycle: Lifecycle,
    settings: CoordinatorConfig,
    registry: ParticipantRegistry,
    races: Vec<Race>,
    countdown_generation: u64,
}

impl CoordinatorState {
    fn new(settings: CoordinatorConfig) -> Self {
        Self {
            lifecycle: Lifecycle::Registration,
            settings,
            registry: ParticipantRegistry::new(),
            races: Vec::new(),
            countdown_generation: 0,
        }
    }

    fn phase(&self) -> RacePhase {
        self.lifecycle.phase()
    }

    /// Move to `next`, stopping whatever countdown the old state carried
    fn transition(&mut self, next: Lifecycle) {
        let from = self.phase();
        let previous = std::mem::replace(&mut self.lifecycle, next);
        if let Some(countdown) = previous.into_countdown() {
            countdown.cancel();
        }

        let to = self.phase();
        metrics::set_phase(to);
        tracing::debug!(from = %from, to = %to, "Race phase changed");
    }

    /// Create a race with every registered participant and start it
    fn begin_race(&mut self, target_laps: u32) {
        let mut race = Race::new(target_laps);
        for id in self.registry.ids() {
            race.add_participant(id);
        }
        race.start();
        self.races.push(race);
        self.transition(Lifecycle::InProgress);

        metrics::record_race_started();
        tracing::info!(
            race_index = self.races.len() - 1,
            target_laps,
            participants = self.registry.len(),
            "Race started"
        );
    }

    /// Stamp the finish time of the current race
    fn finish_current_race(&mut self) {
        let duration = self.races.last_mut().and_then(|race| {
            race.finish();
            race.duration()
        });
        self.transition(Lifecycle::Finished);

        let duration_secs = duration
            .and_then(|d| d.to_std().ok())
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        metrics::record_race_finished(duration_secs);
        tracing::info!(
            race_index = self.races.len().saturating_sub(1),
            duration_secs,
            finish_order = ?self.races.last().map(Race::finish_order),
            "Race finished"
        );
    }

    /// Apply the transition of an expired countdown
    fn complete_countdown(&mut self, generation: u64) {
        match &self.lifecycle {
            Lifecycle::StartCountdown {
                countdown,
                target_laps,
            } if countdown.generation() == generation => {
                let target_laps = *target_laps;
                self.begin_race(target_laps);
            }
            Lifecycle::FinishCountdown { countdown } if countdown.generation() == generation => {
                tracing::info!("Finish countdown elapsed");
                self.finish_current_race();
            }
            _ => {
                tracing::debug!(generation, phase = %self.phase(), "Ignoring stale countdown");
            }
        }
    }

    fn next_generation(&mut self) -> u64 {
        self.countdown_generation += 1;
        self.countdown_generation
    }

    fn millis_remaining(&self) -> i64 {
        self.lifecycle.countdown().map_or(-1, Countdown::millis_remaining)
    }
}

// ============================================================================
// Query Types
// ============================================================================

/// Outcome of a recorded lap
#[derive(Debug, Clone, Serialize)]
pub struct LapRecorded {
    pub participant_id: u32,
    pub lap: Lap,
    pub phase: RacePhase,
}

/// Point-in-time view of the coordinator
#[derive(Debug, Clone, Serialize)]
pub struct RaceStatus {
    pub phase: RacePhase,
    pub millis_remaining: i64,
    /// Full length of the active countdown
    pub countdown_ms: Option<u64>,
    /// Laps of the running race, or the laps the next race will use
    pub target_laps: u32,
    pub participant_count: usize,
    pub max_participants: usize,
    pub race_count: usize,
}

// ============================================================================
// Race Coordinator
// ============================================================================

/// Shared coordinator for the race lifecycle
///
/// Cloning is cheap; all clones drive the same state.
#[derive(Debug, Clone)]
pub struct RaceCoordinator {
    state: Arc<RwLock<CoordinatorState>>,
}

impl Default for RaceCoordinator {
    fn default() -> Self {
        Self::new(CoordinatorConfig::default())
    }
}

impl RaceCoordinator {
    /// Create a coordinator in the registration phase
    pub fn new(settings: CoordinatorConfig) -> Self {
        metrics::set_phase(RacePhase::Registration);
        Self {
            state: Arc::new(RwLock::new(CoordinatorState::new(settings))),
        }
    }

    fn spawn_countdown(&self, state: &mut CoordinatorState, millis: u64) -> Countdown {
        let generation = state.next_generation();
        let shared: Weak<RwLock<CoordinatorState>> = Arc::downgrade(&self.state);

        Countdown::spawn(generation, Duration::from_millis(millis), move || async move {
            if let Some(shared) = shared.upgrade() {
                shared.write().await.complete_countdown(generation);
            }
        })
    }

    // ------------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------------

    /// Register a participant by network address, returning its id
    pub async fn register(&self, identifier: &str) -> CoordinatorResult<u32> {
        let mut state = self.state.write().await;

        let phase = state.phase();
        if phase != RacePhase::Registration {
            metrics::record_registration("closed");
            tracing::warn!(identifier, phase = %phase, "Registration rejected: window closed");
            return Err(CoordinatorError::RegistrationClosed);
        }

        let address = parse_identifier(identifier).inspect_err(|_| {
            metrics::record_registration("invalid");
        })?;

        let max = state.settings.max_participants;
        if !state.registry.contains(&address) && state.registry.len() >= max {
            metrics::record_registration("capacity");
            tracing::warn!(identifier, max, "Registration rejected: capacity reached");
            return Err(CoordinatorError::CapacityReached {
                current: state.registry.len(),
                max,
            });
        }

        let id = state.registry.register(address);
        metrics::record_registration("success");
        metrics::set_registered_participants(state.registry.len());
        tracing::info!(identifier = %address, participant_id = id, "Participant registered");
        Ok(id)
    }

    /// Reopen registration after a finished race
    pub async fn open_registration(&self) -> CoordinatorResult<()> {
        let mut state = self.state.write().await;

        match state.phase() {
            RacePhase::Finished => {
                state.transition(Lifecycle::Registration);
                tracing::info!("Registration reopened");
                Ok(())
            }
            RacePhase::Registration => Ok(()),
            phase => Err(CoordinatorError::invalid_phase("open registration", phase)),
        }
    }

    // ------------------------------------------------------------------------
    // Start / finish
    // ------------------------------------------------------------------------

    /// Start a race after `countdown_ms`, or the configured start countdown
    ///
    /// A zero countdown starts the race before this returns.
    pub async fn start_race(
        &self,
        countdown_ms: Option<u64>,
        target_laps: Option<u32>,
    ) -> CoordinatorResult<RacePhase> {
        let mut state = self.state.write().await;

        let phase = state.phase();
        if !matches!(phase, RacePhase::Registration | RacePhase::Finished) {
            tracing::warn!(phase = %phase, "Start rejected: race already under way");
            return Err(CoordinatorError::invalid_phase("start race", phase));
        }

        let countdown_ms = countdown_ms.unwrap_or(state.settings.start_countdown_ms);
        let target_laps = target_laps.unwrap_or(state.settings.target_laps);
        if target_laps == 0 {
            return Err(CoordinatorError::InvalidSetting {
                field: "target_laps",
                reason: "A race needs at least 1 lap".to_string(),
            });
        }

        if countdown_ms == 0 {
            state.begin_race(target_laps);
        } else {
            let countdown = self.spawn_countdown(&mut state, countdown_ms);
            state.transition(Lifecycle::StartCountdown {
                countdown,
                target_laps,
            });
            tracing::info!(countdown_ms, target_laps, "Start countdown begun");
        }

        Ok(state.phase())
    }

    /// Finish the running race after `countdown_ms`, or the configured finish countdown
    pub async fn finish_race(&self, countdown_ms: Option<u64>) -> CoordinatorResult<RacePhase> {
        let mut state = self.state.write().await;

        let phase = state.phase();
        if phase != RacePhase::InProgress {
            return Err(CoordinatorError::invalid_phase("finish race", phase));
        }

        let countdown_ms = countdown_ms.unwrap_or(state.settings.finish_countdown_ms);
        self.begin_finish(&mut state, countdown_ms);
        Ok(state.phase())
    }

    fn begin_finish(&self, state: &mut CoordinatorState, countdown_ms: u64) {
        if countdown_ms == 0 {
            state.finish_current_race();
        } else {
            let countdown = self.spawn_countdown(state, countdown_ms);
            state.transition(Lifecycle::FinishCountdown { countdown });
            tracing::info!(countdown_ms, "Finish countdown begun");
        }
    }

    /// Cancel the active countdown and return to the phase before it
    ///
    /// The phase has reverted by the time this returns.
    pub async fn cancel_countdown(&self) -> CoordinatorResult<RacePhase> {
        let mut state = self.state.write().await;

        let next = match state.lifecycle {
            Lifecycle::StartCountdown { .. } => Lifecycle::Registration,
            Lifecycle::FinishCountdown { .. } => Lifecycle::InProgress,
            _ => return Err(CoordinatorError::NoActiveCountdown),
        };

        let cancelled = state.phase();
        state.transition(next);
        metrics::record_countdown_cancelled(cancelled);
        tracing::info!(cancelled = %cancelled, phase = %state.phase(), "Countdown cancelled");
        Ok(state.phase())
    }

    // ------------------------------------------------------------------------
    // Laps
    // ------------------------------------------------------------------------

    /// Record a lap for a registered participant
    ///
    /// Laps for one participant must arrive in order; they are numbered as
    /// they arrive. The first participant to complete the target lap count
    /// starts the finish countdown, or finishes the race outright when only
    /// one participant is registered.
    pub async fn add_lap_result(
        &self,
        identifier: &str,
        duration: Duration,
    ) -> CoordinatorResult<LapRecorded> {
        let address = parse_identifier(identifier)?;

        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let participant_id = state
            .registry
            .lookup(&address)
            .map(|timer| timer.id())
            .ok_or_else(|| CoordinatorError::ParticipantNotFound(address.to_string()))?;

        let phase = state.phase();
        if !phase.is_racing() {
            tracing::warn!(participant_id, phase = %phase, "Lap rejected: no race running");
            return Err(CoordinatorError::invalid_phase("add lap result", phase));
        }

        let race = state.races.last_mut().ok_or(CoordinatorError::NoRace)?;
        let had_finisher = race.has_any_finisher();
        let lap = race
            .record_lap(participant_id, duration)
            .map_err(|_| CoordinatorError::ParticipantNotFound(address.to_string()))?;
        // Only the lap that produces the race's first finisher opens the finish countdown
        let first_finisher = !had_finisher && race.has_any_finisher();
        let all_finished = race.all_finished();

        state.registry.record_lap(&address, duration)?;
        metrics::record_lap();
        tracing::debug!(participant_id, lap = %lap, "Lap recorded");

        match phase {
            RacePhase::InProgress if all_finished || (first_finisher && state.registry.len() == 1) => {
                state.finish_current_race();
            }
            RacePhase::InProgress if first_finisher => {
                tracing::info!(participant_id, "First participant finished");
                let countdown_ms = state.settings.finish_countdown_ms;
                self.begin_finish(state, countdown_ms);
            }
            RacePhase::FinishCountdown if all_finished => {
                tracing::info!("All participants finished");
                state.finish_current_race();
            }
            _ => {}
        }

        Ok(LapRecorded {
            participant_id,
            lap,
            phase: state.phase(),
        })
    }

    // ------------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------------

    /// Maximum number of participants
    pub async fn max_participants(&self) -> usize {
        self.state.read().await.settings.max_participants
    }

    /// Change the maximum number of participants
    pub async fn set_max_participants(&self, max: usize) -> CoordinatorResult<usize> {
        self.update_settings(SettingsUpdate {
            max_participants: Some(max),
            ..Default::default()
        })
        .await
        .map(|settings| settings.max_participants)
    }

    /// Current race settings
    pub async fn settings(&self) -> CoordinatorConfig {
        self.state.read().await.settings.clone()
    }

    /// Change race settings; nothing changes if any value is rejected
    pub async fn update_settings(
        &self,
        update: SettingsUpdate,
    ) -> CoordinatorResult<CoordinatorConfig> {
        let mut state = self.state.write().await;

        state.settings.apply(&update)?;

        tracing::info!(settings = ?state.settings, "Race settings updated");
        Ok(state.settings.clone())
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Current lifecycle phase
    pub async fn phase(&self) -> RacePhase {
        self.state.read().await.phase()
    }

    /// Milliseconds left on the active countdown, or -1 when none is running
    pub async fn millis_remaining(&self) -> i64 {
        self.state.read().await.millis_remaining()
    }

    /// Phase, countdown and roster in one consistent read
    pub async fn status(&self) -> RaceStatus {
        let state = self.state.read().await;

        let target_laps = match &state.lifecycle {
            Lifecycle::StartCountdown { target_laps, .. } => *target_laps,
            Lifecycle::InProgress | Lifecycle::FinishCountdown { .. } => state
                .races
                .last()
                .map_or(state.settings.target_laps, Race::target_laps),
            _ => state.settings.target_laps,
        };

        RaceStatus {
            phase: state.phase(),
            millis_remaining: state.millis_remaining(),
            countdown_ms: state
                .lifecycle
                .countdown()
                .map(|countdown| u64::try_from(countdown.duration().as_millis()).unwrap_or(u64::MAX)),
            target_laps,
            participant_count: state.registry.len(),
            max_participants: state.settings.max_participants,
            race_count: state.races.len(),
        }
    }

    /// Registered participants ordered by id
    pub async fn participants(&self) -> Vec<ParticipantInfo> {
        self.state.read().await.registry.participants()
    }

    /// Addresses of all registered participants
    pub async fn participant_addresses(&self) -> Vec<IpAddr> {
        let state = self.state.read().await;
        let mut participants: Vec<(u32, IpAddr)> = state
            .registry
            .all()
            .iter()
            .map(|(address, timer)| (timer.id(), *address))
            .collect();
        participants.sort_unstable();
        participants.into_iter().map(|(_, address)| address).collect()
    }

    /// Every race so far, oldest first
    pub async fn all_races(&self) -> Vec<RaceSummary> {
        let state = self.state.read().await;
        state
            .races
            .iter()
            .enumerate()
            .map(|(index, race)| race.summary(index))
            .collect()
    }

    /// Snapshot of the most recent race
    pub async fn current_race(&self) -> Option<RaceSummary> {
        let state = self.state.read().await;
        let index = state.races.len().checked_sub(1)?;
        state.races.last().map(|race| race.summary(index))
    }

    /// Laps per participant id for the most recent race; empty before any race
    pub async fn current_race_results(&self) -> BTreeMap<u32, Vec<Lap>> {
        self.state
            .read()
            .await
            .races
            .last()
            .map(|race| race.results().clone())
            .unwrap_or_default()
    }

    /// Finish order of the most recent race; empty before any race
    pub async fn finish_order_for_last_race(&self) -> Vec<u32> {
        self.state
            .read()
            .await
            .races
            .last()
            .map(|race| race.finish_order().to_vec())
            .unwrap_or_default()
    }

    /// Placing and times for one participant of the most recent race
    pub async fn last_race_result(&self, id: u32) -> CoordinatorResult<RaceResult> {
        let state = self.state.read().await;
        let race = state.races.last().ok_or(CoordinatorError::NoRace)?;
        if !race.is_finished() {
            return Err(CoordinatorError::RaceNotFinished);
        }
        race.result_for(id)
    }
}

/// Parse a participant identifier into a network address
pub fn parse_identifier(identifier: &str) -> CoordinatorResult<IpAddr> {
    let trimmed = identifier.trim();
    if trimmed.is_empty() {
        return Err(CoordinatorError::MissingIdentifier);
    }
    trimmed
        .parse()
        .map_err(|_| CoordinatorError::InvalidIdentifier(identifier.to_string()))
}

// ============================================================================
// Tests
// ============================================================================
