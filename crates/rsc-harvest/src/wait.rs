//! Bounded waiting on the tokio clock.
//!
//! All waits go through `tokio::time`, so tests can run on a paused clock
//! and never sleep for real.

use std::time::Duration;

use tokio::time::Instant;

/// Floor applied to polling intervals so a zero interval cannot spin.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A point in time after which polling stops.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.at
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// Sleep for one polling interval (at least [`MIN_POLL_INTERVAL`]),
    /// clipped to the time left.
    ///
    /// Returns `false` without sleeping once the deadline has passed.
    pub async fn tick(&self, interval: Duration) -> bool {
        let remaining = self.remaining();
        if remaining.is_zero() {
            return false;
        }
        tokio::time::sleep(interval.max(MIN_POLL_INTERVAL).min(remaining)).await;
        true
    }
}

/// Fixed delay used to let the page settle after an action.
pub async fn settle(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
