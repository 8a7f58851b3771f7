//! Time sources.
//!
//! Timestamps are Unix milliseconds as `i64`. Components that need the time
//! take an `Arc<dyn Clock>` so tests can pin it.

use std::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A source of the current time.
pub trait Clock: Send + Sync + Debug {
    /// Current time in Unix milliseconds.
    fn now_millis(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

/// Deterministic clock for tests.
///
/// Each read advances the clock by one millisecond before returning, so
/// consecutive timestamps are distinct and predictable.
#[derive(Debug)]
pub struct TestClock {
    millis: AtomicI64,
}

impl TestClock {
    /// Default starting point, 2009-02-13T23:31:30Z.
    pub const START: i64 = 1234567890000;

    pub fn new() -> Self {
        Self::starting_at(Self::START)
    }

    pub fn starting_at(millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(millis),
        }
    }

    /// Set the current time. The next read returns `millis + 1`.
    pub fn set(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        self.millis
            .fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TestClock {
    fn now_millis(&self) -> i64 {
        self.millis.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_steps() {
        let clock = TestClock::new();
        assert_eq!(clock.now_millis(), 1234567890001);
        assert_eq!(clock.now_millis(), 1234567890002);

        clock.advance(Duration::from_secs(1));
        assert_eq!(clock.now_millis(), 1234567891003);

        clock.set(0);
        assert_eq!(clock.now_millis(), 1);
    }

    #[test]
    fn test_system_clock_is_recent() {
        // 2020-01-01
        assert!(SystemClock.now_millis() > 1_577_836_800_000);
    }
}
