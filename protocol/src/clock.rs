//! # Logical Clock
//!
//! Time in strata only moves when someone moves it. The clock is read to
//! decide whether a queued strategy change has become eligible, and to stamp
//! events. It never consults the wall clock after construction, so replaying
//! the same operations yields the same decisions.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A deterministic, manually advanced clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalClock {
    now: DateTime<Utc>,
}

impl LogicalClock {
    /// Starts the clock at `genesis`.
    pub fn starting_at(genesis: DateTime<Utc>) -> Self {
        Self { now: genesis }
    }

    /// Current logical time.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Moves the clock forward. Negative durations are ignored; time never
    /// runs backwards.
    pub fn advance(&mut self, by: Duration) {
        if by > Duration::zero() {
            self.now += by;
        }
    }

    /// Convenience for `advance(Duration::seconds(secs))`.
    pub fn advance_secs(&mut self, secs: i64) {
        self.advance(Duration::seconds(secs));
    }
}

impl Default for LogicalClock {
    /// Genesis at the Unix epoch.
    fn default() -> Self {
        Self::starting_at(Utc.timestamp_opt(0, 0).single().unwrap_or_default())
    }
}
