// Core data structures for the race timer

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::coordinator::error::CoordinatorError;

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 60 * SECS_PER_MINUTE;
const SECS_PER_DAY: u64 = 24 * SECS_PER_HOUR;

/// Lifecycle phase of the race coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RacePhase {
    /// Participants may register
    Registration,
    /// Waiting for the start countdown to elapse
    StartCountdown,
    /// Race running, laps are accepted
    InProgress,
    /// First finisher crossed the line, waiting for the rest
    FinishCountdown,
    /// Race over, results are final
    Finished,
}

impl RacePhase {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registration => "Registration",
            Self::StartCountdown => "StartCountdown",
            Self::InProgress => "InProgress",
            Self::FinishCountdown => "FinishCountdown",
            Self::Finished => "Finished",
        }
    }

    /// Whether laps are accepted in this phase
    pub fn is_racing(&self) -> bool {
        matches!(self, Self::InProgress | Self::FinishCountdown)
    }

    /// Whether a countdown is running in this phase
    pub fn is_countdown(&self) -> bool {
        matches!(self, Self::StartCountdown | Self::FinishCountdown)
    }

    /// Numeric code, used for the phase gauge
    pub fn code(&self) -> u8 {
        match self {
            Self::Registration => 0,
            Self::StartCountdown => 1,
            Self::InProgress => 2,
            Self::FinishCountdown => 3,
            Self::Finished => 4,
        }
    }
}

impl Default for RacePhase {
    fn default() -> Self {
        Self::Registration
    }
}

impl fmt::Display for RacePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One completed lap
///
/// Laps are numbered from 1 by whoever appends them and never change afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Lap {
    number: u32,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    duration: Duration,
}

impl Lap {
    /// Create a lap
    pub fn new(number: u32, duration: Duration) -> Self {
        Self { number, duration }
    }

    /// Lap number, starting at 1
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Elapsed time for this lap
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl fmt::Display for Lap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.number, format_lap_time(self.duration))
    }
}

fn serialize_millis<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_f64(duration_millis(*duration))
}

/// Duration in fractional milliseconds
pub fn duration_millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Sum of all lap durations
pub fn total_time(laps: &[Lap]) -> Duration {
    laps.iter().map(Lap::duration).sum()
}

/// Fastest lap; the earliest one wins a tie
pub fn fastest_lap(laps: &[Lap]) -> Option<Lap> {
    laps.iter().copied().min_by_key(Lap::duration)
}

// ============================================================================
// Lap time text format
// ============================================================================

/// Render a lap time as `[d.]hh:mm:ss[.fff]`
pub fn format_lap_time(duration: Duration) -> String {
    let total = duration.as_secs();
    let days = total / SECS_PER_DAY;
    let hours = (total % SECS_PER_DAY) / SECS_PER_HOUR;
    let minutes = (total % SECS_PER_HOUR) / SECS_PER_MINUTE;
    let seconds = total % SECS_PER_MINUTE;
    let millis = duration.subsec_millis();

    let mut out = String::new();
    if days > 0 {
        out.push_str(&format!("{days}."));
    }
    out.push_str(&format!("{hours:02}:{minutes:02}:{seconds:02}"));
    if millis > 0 {
        out.push_str(&format!(".{millis:03}"));
    }
    out
}

/// Parse a lap time string
///
/// Accepted forms:
///
/// ```text
/// 6               -> 6 days
/// 6:12            -> 6h 12m
/// 6:12:14         -> 6h 12m 14s
/// 6:12:14:45      -> 6d 12h 14m 45s
/// 6.12:14:45      -> 6d 12h 14m 45s
/// 0:01:14.3448    -> 1m 14.3448s
/// ```
pub fn parse_lap_time(input: &str) -> Result<Duration, CoordinatorError> {
    let invalid = |reason: &str| CoordinatorError::InvalidLapTime {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let text = input.trim();
    if text.is_empty() {
        return Err(invalid("lap time is empty"));
    }
    if text.starts_with('-') {
        return Err(invalid("lap time cannot be negative"));
    }

    let Some(first_colon) = text.find(':') else {
        let days = parse_whole(text).ok_or_else(|| invalid("expected a whole number of days"))?;
        let secs = days
            .checked_mul(SECS_PER_DAY)
            .ok_or_else(|| invalid("lap time overflows"))?;
        return Ok(Duration::from_secs(secs));
    };

    let (day_prefix, clock) = match text.find('.') {
        Some(dot) if dot < first_colon => {
            let days = parse_whole(&text[..dot]).ok_or_else(|| invalid("bad day field"))?;
            (Some(days), &text[dot + 1..])
        }
        _ => (None, text),
    };

    let fields: Vec<&str> = clock.split(':').collect();
    let (days, hours, minutes, seconds) = match (day_prefix, fields.as_slice()) {
        (day, [h, m]) => (day.unwrap_or(0), *h, *m, None),
        (day, [h, m, s]) => (day.unwrap_or(0), *h, *m, Some(*s)),
        (None, [d, h, m, s]) => {
            let days = parse_whole(d).ok_or_else(|| invalid("bad day field"))?;
            (days, *h, *m, Some(*s))
        }
        _ => return Err(invalid("unrecognised lap time layout")),
    };

    let hours = parse_whole(hours).ok_or_else(|| invalid("bad hour field"))?;
    let minutes = parse_whole(minutes).ok_or_else(|| invalid("bad minute field"))?;
    if hours >= 24 {
        return Err(invalid("hours must be below 24"));
    }
    if minutes >= 60 {
        return Err(invalid("minutes must be below 60"));
    }

    let (seconds, nanos) = match seconds {
        Some(s) => parse_seconds(s).ok_or_else(|| invalid("bad second field"))?,
        None => (0, 0),
    };
    if seconds >= 60 {
        return Err(invalid("seconds must be below 60"));
    }

    let whole = days
        .checked_mul(SECS_PER_DAY)
        .and_then(|d| d.checked_add(hours * SECS_PER_HOUR + minutes * SECS_PER_MINUTE + seconds))
        .ok_or_else(|| invalid("lap time overflows"))?;

    Ok(Duration::new(whole, nanos))
}

/// Convert a millisecond count into a lap duration
pub fn lap_time_from_millis(millis: f64) -> Result<Duration, CoordinatorError> {
    if !millis.is_finite() || millis < 0.0 {
        return Err(CoordinatorError::InvalidLapTime {
            input: millis.to_string(),
            reason: "milliseconds must be a non-negative number".to_string(),
        });
    }
    Duration::try_from_secs_f64(millis / 1000.0).map_err(|e| CoordinatorError::InvalidLapTime {
        input: millis.to_string(),
        reason: e.to_string(),
    })
}

fn parse_whole(field: &str) -> Option<u64> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

fn parse_seconds(field: &str) -> Option<(u64, u32)> {
    let (whole, fraction) = match field.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (field, None),
    };
    let seconds = parse_whole(whole)?;

    let nanos = match fraction {
        None => 0,
        Some(digits) => {
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            // Anything past nanosecond precision is dropped
            let kept = &digits[..digits.len().min(9)];
            let scale = 10u32.pow(9 - kept.len() as u32);
            kept.parse::<u32>().ok()? * scale
        }
    };

    Some((seconds, nanos))
}
