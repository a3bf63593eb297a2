//! Injectable wall-clock.
//!
//! All nondeterminism around "now" flows through this trait so that metric
//! windows, cooldowns, and time-of-day indicators are reproducible in tests.

use chrono::{DateTime, Duration, FixedOffset, Local, Utc};
use parking_lot::Mutex;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Local wall time, used only for the time-of-day indicators
    /// (weekend activity, peak hours).
    fn local_now(&self) -> DateTime<FixedOffset> {
        self.now().with_timezone(&Local).fixed_offset()
    }
}

/// Production clock backed by the system time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn local_now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// Deterministic clock for tests and demos. Starts at a given instant and
/// only moves when explicitly advanced.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
    offset: FixedOffset,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
            offset: FixedOffset::east_opt(0).unwrap(),
        }
    }

    /// Use a fixed UTC offset for `local_now` (time-of-day indicator tests).
    pub fn with_offset(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self {
            now: Mutex::new(now),
            offset,
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock();
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }

    fn local_now(&self) -> DateTime<FixedOffset> {
        self.now().with_timezone(&self.offset)
    }
}
