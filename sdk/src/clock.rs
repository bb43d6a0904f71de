//! Time source seam.
//!
//! Signature `created` stamps and access-token expiry both need wall-clock
//! time; routing them through a trait keeps every time-dependent code path
//! testable with a pinned clock.

use chrono::{DateTime, Utc};

/// Wall-clock time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Current time as whole seconds since the Unix epoch.
    fn unix_now(&self) -> u64 {
        self.now().timestamp().max(0) as u64
    }
}

/// System wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
