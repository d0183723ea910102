//! Time-windowed ingestion gate tripped by queue overflow.
//!
//! The breaker is a single reset timestamp. Ingestion is suppressed while
//! `now < reset`; once time passes it the breaker is closed again without
//! anyone touching it. Writers race (last one wins), which is fine since the
//! gate is advisory.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Default suppression window after an overflow.
pub const DEFAULT_DURATION: Duration = Duration::from_millis(10_000);

/// Lock-free circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    origin: Instant,
    /// Reset time as nanoseconds since `origin`; 0 means never tripped
    reset_at: AtomicU64,
    duration: Duration,
}

impl CircuitBreaker {
    /// Create a closed breaker that stays open for `duration` once tripped.
    pub fn new(duration: Duration) -> Self {
        Self {
            origin: Instant::now(),
            reset_at: AtomicU64::new(0),
            duration,
        }
    }

    fn offset(&self, at: Instant) -> u64 {
        let nanos = at.saturating_duration_since(self.origin).as_nanos();
        u64::try_from(nanos).unwrap_or(u64::MAX)
    }

    /// Suppression window length.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Whether ingestion is currently suppressed.
    pub fn is_open(&self) -> bool {
        self.is_open_at(Instant::now())
    }

    /// Whether ingestion is suppressed at `now`.
    pub fn is_open_at(&self, now: Instant) -> bool {
        self.offset(now) < self.reset_at.load(Ordering::Relaxed)
    }

    /// Open the breaker for one window starting now.
    pub fn trip(&self) -> Instant {
        self.trip_at(Instant::now())
    }

    /// Open the breaker for one window starting at `now`. Returns the reset time.
    pub fn trip_at(&self, now: Instant) -> Instant {
        let window = u64::try_from(self.duration.as_nanos()).unwrap_or(u64::MAX);
        let reset = self.offset(now).saturating_add(window);
        self.reset_at.store(reset, Ordering::Relaxed);
        self.origin + Duration::from_nanos(reset)
    }

    /// Time left until the breaker closes, if it is open at `now`.
    pub fn remaining_at(&self, now: Instant) -> Option<Duration> {
        let reset = self.reset_at.load(Ordering::Relaxed);
        let now = self.offset(now);
        (now < reset).then(|| Duration::from_nanos(reset - now))
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(DEFAULT_DURATION)
    }
}
