//! Time source abstraction
//!
//! Expiry checks and stream id generation read time through [`Clock`] so
//! tests can move time forward without sleeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Source of monotonic and wall-clock time
pub trait Clock: Send + Sync + 'static {
    /// Current monotonic instant
    fn now(&self) -> Instant;

    /// Current wall-clock time
    fn system_time(&self) -> SystemTime;

    /// Milliseconds since the UNIX epoch
    fn millis_since_epoch(&self) -> u64 {
        self.system_time().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
    }
}

/// Real system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
}

impl<T: Clock> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn system_time(&self) -> SystemTime {
        (**self).system_time()
    }
}

/// Manually advanced clock for tests
///
/// Clones share the same elapsed counter, so a clone handed to a store can
/// be advanced from the test body.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    epoch_offset: Duration,
    elapsed_nanos: Arc<AtomicU64>,
}

impl MockClock {
    /// Clock starting now, with wall-clock time at the UNIX epoch
    pub fn new() -> Self {
        Self::at_epoch_millis(0)
    }

    /// Clock whose wall-clock time starts at `millis` after the UNIX epoch
    pub fn at_epoch_millis(millis: u64) -> Self {
        Self {
            start: Instant::now(),
            epoch_offset: Duration::from_millis(millis),
            elapsed_nanos: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Move time forward by `duration`
    pub fn advance(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.elapsed_nanos.fetch_add(nanos, Ordering::SeqCst);
    }

    /// Move time forward by `millis` milliseconds
    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    /// Total time advanced so far
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_nanos.load(Ordering::SeqCst))
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        UNIX_EPOCH + self.epoch_offset + self.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates `SystemClock` behavior for the monotonic scenario.
    ///
    /// Assertions:
    /// - Ensures successive `now()` calls never go backwards.
    /// - Ensures the epoch milliseconds are after 2020.
    #[test]
    fn test_system_clock_monotonic() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
        assert!(clock.millis_since_epoch() > 1_577_836_800_000);
    }

    /// Validates `MockClock::advance` behavior for the shared clone scenario.
    ///
    /// Assertions:
    /// - Confirms advancing one clone moves the other.
    /// - Confirms wall-clock millis follow the starting offset.
    #[test]
    fn test_mock_clock_advance_shared() {
        let clock = MockClock::at_epoch_millis(1_000);
        let handle = clock.clone();
        let before = clock.now();

        handle.advance_millis(250);

        assert_eq!(clock.now() - before, Duration::from_millis(250));
        assert_eq!(clock.millis_since_epoch(), 1_250);
        assert_eq!(clock.elapsed(), Duration::from_millis(250));
    }
}
