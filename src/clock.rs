//! Wall-clock source used by time-dependent selection rules.
//!
//! Garbage-collection selection compares fragment write times against
//! "now" and derives the `gc_before` bound from it. Reading the time through
//! [`Clock`] keeps those decisions reproducible in tests.

use std::fmt::Debug;
use std::time::SystemTime;

/// Source of the current wall-clock time.
pub trait Clock: Debug + Send + Sync {
    /// Returns the current time.
    fn now(&self) -> SystemTime;
}

/// [`Clock`] backed by [`SystemTime::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}
