//! Cache statistics.
//!
//! Atomic counters with relaxed ordering and a `snapshot()` that copies out
//! a point-in-time view. Recording is a no-op when `record_stats` is off on
//! the builder so disabled caches pay nothing but a branch.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Point-in-time, immutable copy of all counters plus their derived rates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub loads: u64,
    pub load_failures: u64,
    pub total_load_time_nanos: u64,
}

impl CacheStats {
    /// `hits / (hits + misses)`, or `0.0` when no requests were recorded.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// `1.0 - hit_rate()`, `0.0` when no requests were recorded.
    pub fn miss_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            1.0 - self.hit_rate()
        }
    }

    /// Average load latency in nanoseconds, `0.0` when no loads occurred.
    pub fn avg_load_time_nanos(&self) -> f64 {
        if self.loads == 0 {
            0.0
        } else {
            self.total_load_time_nanos as f64 / self.loads as f64
        }
    }
}

/// Lock-free counter bank backing [`CacheStats`].
pub(crate) struct Stats {
    enabled: AtomicBool,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    loads: AtomicU64,
    load_failures: AtomicU64,
    total_load_time_nanos: AtomicU64,
}

impl Stats {
    pub fn new(enabled: bool) -> Self {
        Stats {
            enabled: AtomicBool::new(enabled),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            loads: AtomicU64::new(0),
            load_failures: AtomicU64::new(0),
            total_load_time_nanos: AtomicU64::new(0),
        }
    }

    #[inline]
    fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn record_hit(&self) {
        if self.enabled() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_miss(&self) {
        if self.enabled() {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_eviction(&self) {
        if self.enabled() {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_load(&self, duration_nanos: u64) {
        if self.enabled() {
            self.loads.fetch_add(1, Ordering::Relaxed);
            self.total_load_time_nanos
                .fetch_add(duration_nanos, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_load_failure(&self, duration_nanos: u64) {
        if self.enabled() {
            self.loads.fetch_add(1, Ordering::Relaxed);
            self.load_failures.fetch_add(1, Ordering::Relaxed);
            self.total_load_time_nanos
                .fetch_add(duration_nanos, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            total_load_time_nanos: self.total_load_time_nanos.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.loads.store(0, Ordering::Relaxed);
        self.load_failures.store(0, Ordering::Relaxed);
        self.total_load_time_nanos.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_rates_from_recorded_counts() {
        let stats = Stats::new(true);
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        let snap = stats.snapshot();
        assert_eq!(snap.hits, 2);
        assert_eq!(snap.misses, 1);
        assert!((snap.hit_rate() - (2.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn disabled_stats_do_not_accumulate() {
        let stats = Stats::new(false);
        stats.record_hit();
        stats.record_miss();
        let snap = stats.snapshot();
        assert_eq!(snap.hits, 0);
        assert_eq!(snap.misses, 0);
    }

    #[test]
    fn reset_zeroes_every_counter() {
        let stats = Stats::new(true);
        stats.record_hit();
        stats.record_load(500);
        stats.reset();
        let snap = stats.snapshot();
        assert_eq!(snap, CacheStats {
            hits: 0,
            misses: 0,
            evictions: 0,
            loads: 0,
            load_failures: 0,
            total_load_time_nanos: 0,
        });
    }
}
