//! Time source seam.

use chrono::{DateTime, Utc};

/// Source of the current time.
///
/// Rollback deadlines and cooldowns are compared against this rather
/// than the system clock directly.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
