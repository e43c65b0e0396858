//! Test clocks — deterministic `Clock` implementations for tests.

use std::sync::Mutex;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use psyche_core::clock::Clock;

/// A clock that always returns a fixed point in time.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// A clock that only moves when told to. Timer tests advance it by the
/// milliseconds they want to elapse.
#[derive(Debug)]
pub struct ManualClock {
    origin: DateTime<Utc>,
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock starting at 2026-01-15T10:00:00Z.
    ///
    /// # Panics
    ///
    /// Never in practice; the start date is a valid constant.
    #[must_use]
    pub fn new() -> Self {
        let origin = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        Self {
            origin,
            now: Mutex::new(origin),
        }
    }

    /// Moves the clock forward.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn advance_ms(&self, millis: i64) {
        let mut now = self.now.lock().unwrap();
        *now += TimeDelta::milliseconds(millis);
    }

    /// Milliseconds elapsed since the clock was created.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn elapsed_ms(&self) -> i64 {
        (*self.now.lock().unwrap() - self.origin).num_milliseconds()
    }

    /// The instant the clock was created at.
    #[must_use]
    pub fn origin(&self) -> DateTime<Utc> {
        self.origin
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
