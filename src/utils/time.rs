//! Time sources for liveness and retention checks.
//!
//! Everything that ages out (sessions, dedup records, the maintenance gate)
//! reads the time through [`Clock`], so tests can move time by hand instead
//! of sleeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time source.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall-clock monotonic time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
///
/// Clones share the same time, so a test can keep one handle while the
/// server owns another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    offset_nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset_nanos: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Move time forward by `by`.
    pub fn advance(&self, by: Duration) {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.offset_nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    /// Time elapsed since the clock was created.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.offset_nanos.load(Ordering::Relaxed))
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }
}

/// True if more than `ttl` has passed between `since` and `now`.
///
/// The comparison is strict: an entry exactly `ttl` old is still alive.
#[inline]
pub fn is_expired(since: Instant, now: Instant, ttl: Duration) -> bool {
    now.saturating_duration_since(since) > ttl
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        let start = clock.now();

        handle.advance(Duration::from_secs(3));

        assert_eq!(clock.now() - start, Duration::from_secs(3));
        assert_eq!(clock.elapsed(), Duration::from_secs(3));
    }

    #[test]
    fn test_expiry_is_strict() {
        let start = Instant::now();
        let ttl = Duration::from_secs(5);

        assert!(!is_expired(start, start + ttl, ttl));
        assert!(is_expired(start, start + ttl + Duration::from_millis(1), ttl));
    }

    #[test]
    fn test_expiry_tolerates_reordered_instants() {
        let now = Instant::now();
        let later = now + Duration::from_secs(1);
        assert!(!is_expired(later, now, Duration::ZERO));
    }
}
