//! Time sources
//!
//! Interest accrual and loan due dates are computed from a `Clock` rather than
//! from the wall clock directly, so tests can move time forward deterministically.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

/// A trusted source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to
///
/// Clones share the same instant, so a test can keep one handle and give
/// another to the engine.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(RwLock::new(start)),
        }
    }

    /// Move time forward (or backward, for a negative duration)
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write();
        *now = *now + by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.write() = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

/// Whole seconds elapsed from `since` to `now`, never negative
pub fn elapsed_seconds(since: DateTime<Utc>, now: DateTime<Utc>) -> u128 {
    let secs = (now - since).num_seconds();
    if secs > 0 {
        secs as u128
    } else {
        0
    }
}

/// `since` moved forward by exactly the whole seconds `elapsed_seconds` counts
///
/// The sub-second remainder is left pending for the next accrual.
pub fn advance_by_elapsed(since: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    since + Duration::seconds(elapsed_seconds(since, now) as i64)
}
