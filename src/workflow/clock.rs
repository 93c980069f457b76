//! Runtime clock.
//!
//! Wall-clock time anchored once, then advanced by tokio's monotonic clock.
//! Workflows never read this directly; they go through the journal.

use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct RuntimeClock {
    anchor_wall: DateTime<Utc>,
    anchor: Instant,
}

impl RuntimeClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Clock whose current reading is `wall`.
    pub fn starting_at(wall: DateTime<Utc>) -> Self {
        Self {
            anchor_wall: wall,
            anchor: Instant::now(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        let elapsed = TimeDelta::from_std(self.anchor.elapsed()).unwrap_or(TimeDelta::MAX);
        self.anchor_wall
            .checked_add_signed(elapsed)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Time left until `deadline`; zero once it has passed.
    pub fn until(&self, deadline: DateTime<Utc>) -> Duration {
        (deadline - self.now()).to_std().unwrap_or(Duration::ZERO)
    }
}

impl Default for RuntimeClock {
    fn default() -> Self {
        Self::new()
    }
}
