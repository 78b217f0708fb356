//! The `Entry` data model: one cached value plus the metadata the store and
//! eviction policies need. Generic over `V`, with atomic, clock-relative
//! timestamps so a read can update recency under a shard's read lock alone
//! where the policy allows it.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::clock::NO_DEADLINE;

/// One cached value and its bookkeeping.
///
/// Invariants: `weight` is immutable after creation; `created_at <=
/// last_access` always; `access_count` is monotonically non-decreasing
/// modulo lost updates under races (tolerated -- stats are approximate).
pub(crate) struct Entry<V> {
    pub value: V,
    pub weight: u64,
    pub created_at: u64,
    pub last_access: AtomicU64,
    pub access_count: AtomicU64,
    /// `NO_DEADLINE` sentinel means no TTL. Stored as a single effective
    /// deadline even when both write- and access-based TTL are configured --
    /// the earlier of the two always wins.
    pub expires_at: AtomicU64,
}

impl<V> Entry<V> {
    pub fn new(value: V, weight: u64, now: u64, expires_at: Option<u64>) -> Self {
        Entry {
            value,
            weight,
            created_at: now,
            last_access: AtomicU64::new(now),
            access_count: AtomicU64::new(0),
            expires_at: AtomicU64::new(expires_at.unwrap_or(NO_DEADLINE)),
        }
    }

    #[inline]
    pub fn is_expired(&self, now: u64) -> bool {
        let deadline = self.expires_at.load(Ordering::Relaxed);
        deadline != NO_DEADLINE && now >= deadline
    }

    #[inline]
    pub fn record_access(&self, now: u64) {
        self.last_access.store(now, Ordering::Relaxed);
        self.access_count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn last_access(&self) -> u64 {
        self.last_access.load(Ordering::Relaxed)
    }
}
