//! Clock abstraction for deterministic timing.

use chrono::{DateTime, Utc};

/// Abstraction over wall-clock time. Phase deadlines are computed from it,
/// so tests can drive timers without sleeping.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock that delegates to the system clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Converts a `std::time::Duration` into a `chrono::TimeDelta`, saturating
/// at the largest representable delta.
#[must_use]
pub fn to_delta(duration: std::time::Duration) -> chrono::TimeDelta {
    chrono::TimeDelta::from_std(duration).unwrap_or(chrono::TimeDelta::MAX)
}

/// The time `duration` after `now`, saturating at the latest representable
/// time. Deadlines that far out never fire.
#[must_use]
pub fn deadline_after(now: DateTime<Utc>, duration: std::time::Duration) -> DateTime<Utc> {
    now.checked_add_signed(to_delta(duration))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
