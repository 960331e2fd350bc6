//! Cancellable countdown handle
//!
//! A countdown is a spawned task that sleeps until a deadline and then runs a
//! completion. The remaining time is read from the deadline on demand.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Handle to a running countdown
///
/// Dropping the handle does not stop the task; call [`Countdown::cancel`].
#[derive(Debug)]
pub struct Countdown {
    generation: u64,
    duration: Duration,
    deadline: Instant,
    task: JoinHandle<()>,
}

impl Countdown {
    /// Spawn a countdown that runs `on_expiry` once `duration` has elapsed
    pub fn spawn<F, Fut>(generation: u64, duration: Duration, on_expiry: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let deadline = Instant::now() + duration;
        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            on_expiry().await;
        });

        Self {
            generation,
            duration,
            deadline,
            task,
        }
    }

    /// Identifies this countdown among all countdowns of a coordinator
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Full length of the countdown
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Time left before expiry, zero once the deadline has passed
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Whole milliseconds left before expiry
    pub fn millis_remaining(&self) -> i64 {
        i64::try_from(self.remaining().as_millis()).unwrap_or(i64::MAX)
    }

    /// Stop the countdown task
    ///
    /// A completion that already woke up may still be waiting for the
    /// coordinator lock; the generation check discards it.
    pub fn cancel(self) {
        self.task.abort();
    }
}
