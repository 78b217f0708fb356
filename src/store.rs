//! The sharded concurrent store.
//!
//! Generic `K`/`V` entries are routed to one of a power-of-two number of
//! shards by a bitmask over the key's hash, with a pluggable [`PolicyKind`]
//! per shard. Each shard is guarded by its own `RwLock`; a round-robin
//! cursor across shards drives an "evict one candidate, re-check bound,
//! repeat" loop whenever a global size or weight bound is exceeded.

use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ahash::RandomState;
use crossbeam_utils::CachePadded;
use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::clock::Clock;
use crate::entry::Entry;
use crate::listener::ListenerRegistry;
use crate::policy::{EvictReason, PolicyKind, TouchContext};
use crate::sketch::FrequencySketch;
use crate::stats::Stats;

pub(crate) type Weigher<K, V> = dyn Fn(&K, &V) -> u32 + Send + Sync;

struct ShardInner<K: Eq + Hash + Clone, V> {
    entries: HashMap<K, Entry<V>, RandomState>,
    policy: PolicyKind<K>,
}

struct Shard<K: Eq + Hash + Clone, V> {
    inner: RwLock<ShardInner<K, V>>,
}

/// Configuration the store needs that isn't itself a shard or a policy.
pub(crate) struct StoreConfig<K, V> {
    pub shard_count: usize,
    pub initial_capacity: usize,
    pub maximum_size: Option<u64>,
    pub maximum_weight: Option<u64>,
    pub expire_after_write: Option<Duration>,
    pub expire_after_access: Option<Duration>,
    pub weigher: Option<Box<Weigher<K, V>>>,
    pub policy_factory: Box<dyn Fn(u64, Option<Arc<FrequencySketch>>) -> PolicyKind<K>>,
    pub sketch: Option<Arc<FrequencySketch>>,
    pub hasher: RandomState,
}

pub(crate) struct Store<K: Eq + Hash + Clone, V: Clone> {
    shards: Vec<Shard<K, V>>,
    shard_mask: usize,
    hasher: RandomState,
    clock: Clock,
    maximum_size: Option<u64>,
    maximum_weight: Option<u64>,
    expire_after_write: Option<Duration>,
    expire_after_access: Option<Duration>,
    weigher: Option<Box<Weigher<K, V>>>,
    // Cache-padded: every put/remove/eviction touches these, and they sit
    // right next to the per-shard locks in the allocation -- without padding
    // a writer on one shard's counter update would false-share the cache
    // line with a reader on an unrelated shard's hot atomic.
    current_size: CachePadded<AtomicU64>,
    current_weight: CachePadded<AtomicU64>,
    pub listeners: Arc<ListenerRegistry<K, V>>,
    pub stats: Arc<Stats>,
    pub sketch: Option<Arc<FrequencySketch>>,
}

impl<K: Eq + Hash + Clone, V: Clone> Store<K, V> {
    pub fn new(config: StoreConfig<K, V>, listeners: Arc<ListenerRegistry<K, V>>, stats: Arc<Stats>) -> Self {
        let shard_count = config.shard_count.max(1).next_power_of_two();
        let per_shard_capacity = if config.maximum_size.is_some() || config.maximum_weight.is_some() {
            let bound = config.maximum_size.unwrap_or(u64::MAX);
            (bound / shard_count as u64).max(1)
        } else {
            64
        };

        let shards = (0..shard_count)
            .map(|_| Shard {
                inner: RwLock::new(ShardInner {
                    entries: HashMap::with_capacity_and_hasher(
                        config.initial_capacity / shard_count.max(1),
                        RandomState::new(),
                    ),
                    policy: (config.policy_factory)(per_shard_capacity, config.sketch.clone()),
                }),
            })
            .collect();

        Store {
            shards,
            shard_mask: shard_count - 1,
            hasher: config.hasher,
            clock: Clock::new(),
            maximum_size: config.maximum_size,
            maximum_weight: config.maximum_weight,
            expire_after_write: config.expire_after_write,
            expire_after_access: config.expire_after_access,
            weigher: config.weigher,
            current_size: CachePadded::new(AtomicU64::new(0)),
            current_weight: CachePadded::new(AtomicU64::new(0)),
            listeners,
            stats,
            sketch: config.sketch,
        }
    }

    #[inline]
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    #[inline]
    fn shard_index(&self, key: &K) -> usize {
        let mut hasher = self.hasher.build_hasher();
        key.hash(&mut hasher);
        (hasher.finish() as usize) & self.shard_mask
    }

    fn weigh(&self, key: &K, value: &V) -> u64 {
        match &self.weigher {
            Some(w) => w(key, value) as u64,
            None => 1,
        }
    }

    fn effective_deadline(&self, now: u64) -> Option<u64> {
        match (self.expire_after_write, self.expire_after_access) {
            (None, None) => None,
            (Some(d), None) => Some(self.clock.deadline_after(now, d)),
            (None, Some(d)) => Some(self.clock.deadline_after(now, d)),
            (Some(w), Some(a)) => Some(self.clock.deadline_after(now, w.min(a))),
        }
    }

    /// Recomputes the access-based contribution to `expires_at` on a read or
    /// write; the earlier of the write- and access-based deadlines always
    /// wins.
    fn refresh_access_deadline(&self, entry: &Entry<V>, now: u64) {
        if let Some(access_ttl) = self.expire_after_access {
            let access_deadline = self.clock.deadline_after(now, access_ttl);
            let candidate = match self.expire_after_write {
                // Write TTL is anchored at created_at, not now; recompute it
                // fresh each time so the earlier of the two still wins.
                Some(write_ttl) => {
                    let write_deadline = self.clock.deadline_after(entry.created_at, write_ttl);
                    write_deadline.min(access_deadline)
                }
                None => access_deadline,
            };
            entry.expires_at.store(candidate, Ordering::Relaxed);
        }
    }

    /// Returns when `key` was last inserted (not last accessed), for
    /// refresh-after-write scheduling. Does not check expiry.
    pub fn created_at(&self, key: &K) -> Option<u64> {
        let shard_idx = self.shard_index(key);
        let shard = &self.shards[shard_idx];
        let inner = shard.inner.read();
        inner.entries.get(key).map(|entry| entry.created_at)
    }

    pub fn size(&self) -> u64 {
        self.current_size.load(Ordering::Relaxed)
    }

    pub fn weight(&self) -> u64 {
        self.current_weight.load(Ordering::Relaxed)
    }

    /// Looks up `key`. Expired entries are removed under the shard's write
    /// lock and reported as absent.
    pub fn get(&self, key: &K) -> Option<V> {
        let shard_idx = self.shard_index(key);
        let now = self.clock.now();
        let shard = &self.shards[shard_idx];
        let mut inner = shard.inner.write();

        let expired = match inner.entries.get(key) {
            Some(entry) => entry.is_expired(now),
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        if expired {
            self.remove_locked(&mut inner, shard_idx, key, EvictReason::Expired);
            self.stats.record_miss();
            return None;
        }

        let entry = inner.entries.get(key).expect("checked above");
        entry.record_access(now);
        self.refresh_access_deadline(entry, now);
        let weight = entry.weight;
        let last_access = entry.last_access();
        let value = entry.value.clone();

        inner.policy.touch(key, TouchContext { weight, last_access, now });
        self.stats.record_hit();
        Some(value)
    }

    /// Same expiration semantics as [`Store::get`] but never updates access
    /// recency.
    pub fn contains(&self, key: &K) -> bool {
        let shard_idx = self.shard_index(key);
        let now = self.clock.now();
        let shard = &self.shards[shard_idx];
        let inner = shard.inner.read();
        match inner.entries.get(key) {
            Some(entry) => !entry.is_expired(now),
            None => false,
        }
    }

    /// Inserts or replaces `key`. Returns the previous value, if any.
    pub fn put(&self, key: K, value: V) -> Option<V> {
        let shard_idx = self.shard_index(&key);
        let now = self.clock.now();
        let weight = self.weigh(&key, &value);
        let deadline = self.effective_deadline(now);

        let shard = &self.shards[shard_idx];
        let mut inner = shard.inner.write();

        let previous = inner.entries.remove(&key).map(|old| {
            self.current_size.fetch_sub(1, Ordering::Relaxed);
            self.current_weight.fetch_sub(old.weight, Ordering::Relaxed);
            old.value
        });
        if let Some(prev) = &previous {
            self.listeners.dispatch_remove(&key, prev);
        }

        let entry = Entry::new(value.clone(), weight, now, deadline);
        inner.entries.insert(key.clone(), entry);
        inner.policy.touch(&key, TouchContext { weight, last_access: now, now });
        self.current_size.fetch_add(1, Ordering::Relaxed);
        self.current_weight.fetch_add(weight, Ordering::Relaxed);
        self.listeners.dispatch_put(&key, &value);

        drop(inner);
        self.enforce_bounds(shard_idx, &key);
        previous
    }

    /// Removes `key` explicitly. Returns the prior value, if any.
    pub fn remove(&self, key: &K) -> Option<V> {
        let shard_idx = self.shard_index(key);
        let shard = &self.shards[shard_idx];
        let mut inner = shard.inner.write();
        self.remove_locked(&mut inner, shard_idx, key, EvictReason::Explicit)
    }

    fn remove_locked(
        &self,
        inner: &mut ShardInner<K, V>,
        _shard_idx: usize,
        key: &K,
        reason: EvictReason,
    ) -> Option<V> {
        let entry = inner.entries.remove(key)?;
        inner.policy.remove(key);
        self.current_size.fetch_sub(1, Ordering::Relaxed);
        self.current_weight.fetch_sub(entry.weight, Ordering::Relaxed);

        match reason {
            EvictReason::Explicit => self.listeners.dispatch_remove(key, &entry.value),
            _ => {
                self.stats.record_eviction();
                tracing::trace!(?reason, "evicting entry");
                self.listeners.dispatch_evict(key, &entry.value, reason);
            }
        }
        Some(entry.value)
    }

    /// Acquires every shard's write lock in index order, clears all state,
    /// and resets counters. The fixed order avoids deadlock against a
    /// concurrent `clear`.
    pub fn clear(&self) {
        for shard in &self.shards {
            let mut inner = shard.inner.write();
            inner.entries.clear();
            inner.policy.clear();
        }
        self.current_size.store(0, Ordering::Relaxed);
        self.current_weight.store(0, Ordering::Relaxed);
        self.listeners.dispatch_clear();
    }

    /// Evicts every entry matching `predicate`, without regard to bounds.
    pub fn invalidate_entries_if(&self, predicate: impl Fn(&K, &V) -> bool) {
        for (idx, shard) in self.shards.iter().enumerate() {
            let mut inner = shard.inner.write();
            let doomed: Vec<K> = inner
                .entries
                .iter()
                .filter(|(k, e)| predicate(k, &e.value))
                .map(|(k, _)| k.clone())
                .collect();
            for key in doomed {
                self.remove_locked(&mut inner, idx, &key, EvictReason::Explicit);
            }
        }
    }

    /// Scans every shard and removes expired entries. Used by the periodic
    /// maintenance task and by tests wanting a deterministic sweep instead
    /// of sleeping on wall-clock TTLs.
    pub fn purge_expired(&self) -> u64 {
        let now = self.clock.now();
        let mut removed = 0u64;
        for (idx, shard) in self.shards.iter().enumerate() {
            let mut inner = shard.inner.write();
            let expired: Vec<K> = inner
                .entries
                .iter()
                .filter(|(_, e)| e.is_expired(now))
                .map(|(k, _)| k.clone())
                .collect();
            for key in expired {
                if self.remove_locked(&mut inner, idx, &key, EvictReason::Expired).is_some() {
                    removed += 1;
                }
            }
        }
        removed
    }

    /// Evicts one candidate at a time and re-checks the bound, round-robining
    /// across shards starting from the shard that was just written to.
    fn enforce_bounds(&self, start_shard: usize, forbidden_key: &K) {
        loop {
            let over_size = self
                .maximum_size
                .map(|max| self.current_size.load(Ordering::Relaxed) > max)
                .unwrap_or(false);
            let over_weight = self
                .maximum_weight
                .map(|max| self.current_weight.load(Ordering::Relaxed) > max)
                .unwrap_or(false);
            if !over_size && !over_weight {
                break;
            }

            let mut evicted = false;
            for offset in 0..self.shards.len() {
                let idx = (start_shard + offset) & self.shard_mask;
                let forbidden = if idx == start_shard { Some(forbidden_key) } else { None };
                if self.evict_one_from_shard(idx, forbidden) {
                    evicted = true;
                    break;
                }
            }

            if !evicted {
                // Nothing evictable right now (e.g. every remaining entry is
                // the just-inserted, forbidden key). Accept transient
                // overflow rather than spin.
                break;
            }
        }
    }

    fn evict_one_from_shard(&self, shard_idx: usize, forbidden: Option<&K>) -> bool {
        let shard = &self.shards[shard_idx];
        let mut inner = shard.inner.write();
        let reason = if self.maximum_weight.is_some() && self.maximum_size.is_none() {
            EvictReason::Weight
        } else {
            EvictReason::Size
        };
        match inner.policy.select_victim(forbidden) {
            Some(victim) => self
                .remove_locked(&mut inner, shard_idx, &victim, reason)
                .is_some(),
            None => false,
        }
    }
}
