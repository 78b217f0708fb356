//! Monotonic nanosecond timestamps.
//!
//! Entry metadata (`created_at`, `last_access`, `expires_at`) needs to live
//! in `AtomicU64` cells so reads can update recency without a write lock.
//! `Instant` isn't `Copy`-into-an-atomic, so every cache keeps one `Instant`
//! epoch and stores offsets from it, the same trick `quanta`/moka use.

use std::time::Instant;

/// Sentinel stored in an entry's `expires_at` cell meaning "no TTL".
pub const NO_DEADLINE: u64 = u64::MAX;

/// A monotonic clock anchored at cache construction time.
#[derive(Debug)]
pub struct Clock {
    epoch: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Clock {
            epoch: Instant::now(),
        }
    }

    /// Nanoseconds elapsed since the clock was created.
    #[inline]
    pub fn now(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }

    /// Converts a duration to an absolute deadline relative to `now`.
    #[inline]
    pub fn deadline_after(&self, now: u64, duration: std::time::Duration) -> u64 {
        now.saturating_add(duration.as_nanos() as u64)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
