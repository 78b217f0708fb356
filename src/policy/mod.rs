//! Eviction policies: candidate selection and O(1) (or near-O(1)) bookkeeping.
//!
//! Each shard owns exactly one [`PolicyKind`] instance. Dispatch is a plain
//! `match` rather than a trait object -- there are few variants, they're
//! known at build time, and it avoids a vtable indirection on every touch.

mod fifo_filo;
mod idle;
mod lfu;
mod list;
mod lru;
mod tiny_lfu;
mod weight;

pub use tiny_lfu::WindowTinyLfu;

use std::hash::Hash;
use std::sync::Arc;

use fifo_filo::{FifoPolicy, FiloPolicy};
use idle::IdlePolicy;
use lfu::LfuPolicy;
use lru::LruPolicy;
use weight::WeightPolicy;

use crate::sketch::FrequencySketch;

/// Why an entry left the cache. Reported to [`crate::listener::EventListener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictReason {
    Size,
    Weight,
    Expired,
    Explicit,
}

/// Context handed to a policy on every touch so it can update its own
/// bookkeeping without reading back from the store.
#[derive(Debug, Clone, Copy)]
pub struct TouchContext {
    pub weight: u64,
    pub last_access: u64,
    pub now: u64,
}

/// User-facing selector for [`crate::builder::CacheBuilder::eviction_policy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPolicyKind {
    Lru,
    Lfu,
    Fifo,
    Filo,
    IdleTime,
    Weight,
    Composite,
    WindowTinyLfu,
}

/// Concrete per-shard eviction policy state.
pub(crate) enum PolicyKind<K: Eq + Hash + Clone> {
    Lru(LruPolicy<K>),
    Lfu(LfuPolicy<K>),
    Fifo(FifoPolicy<K>),
    Filo(FiloPolicy<K>),
    Idle(IdlePolicy<K>),
    Weight(WeightPolicy<K>),
    Composite(Vec<PolicyKind<K>>),
    WindowTinyLfu(WindowTinyLfu<K>),
}

impl<K: Eq + Hash + Clone> PolicyKind<K> {
    pub fn new_lru() -> Self {
        PolicyKind::Lru(LruPolicy::new())
    }

    pub fn new_lfu() -> Self {
        PolicyKind::Lfu(LfuPolicy::new())
    }

    pub fn new_fifo() -> Self {
        PolicyKind::Fifo(FifoPolicy::new())
    }

    pub fn new_filo() -> Self {
        PolicyKind::Filo(FiloPolicy::new())
    }

    pub fn new_idle(max_idle_nanos: u64) -> Self {
        PolicyKind::Idle(IdlePolicy::new(max_idle_nanos))
    }

    pub fn new_weight() -> Self {
        PolicyKind::Weight(WeightPolicy::new())
    }

    pub fn new_composite(members: Vec<PolicyKind<K>>) -> Self {
        PolicyKind::Composite(members)
    }

    pub fn new_window_tiny_lfu(shard_capacity: u64, sketch: Arc<FrequencySketch>) -> Self {
        PolicyKind::WindowTinyLfu(WindowTinyLfu::new(shard_capacity, sketch))
    }

    /// Called on every read and write of `key`.
    pub fn touch(&mut self, key: &K, ctx: TouchContext) {
        match self {
            PolicyKind::Lru(p) => p.touch(key, ctx),
            PolicyKind::Lfu(p) => p.touch(key, ctx),
            PolicyKind::Fifo(p) => p.touch(key, ctx),
            PolicyKind::Filo(p) => p.touch(key, ctx),
            PolicyKind::Idle(p) => p.touch(key, ctx),
            PolicyKind::Weight(p) => p.touch(key, ctx),
            PolicyKind::Composite(members) => {
                for m in members.iter_mut() {
                    m.touch(key, ctx);
                }
            }
            PolicyKind::WindowTinyLfu(p) => p.touch(key, ctx),
        }
    }

    /// Called on explicit remove or after a key has been evicted.
    pub fn remove(&mut self, key: &K) {
        match self {
            PolicyKind::Lru(p) => p.remove(key),
            PolicyKind::Lfu(p) => p.remove(key),
            PolicyKind::Fifo(p) => p.remove(key),
            PolicyKind::Filo(p) => p.remove(key),
            PolicyKind::Idle(p) => p.remove(key),
            PolicyKind::Weight(p) => p.remove(key),
            PolicyKind::Composite(members) => {
                for m in members.iter_mut() {
                    m.remove(key);
                }
            }
            PolicyKind::WindowTinyLfu(p) => p.remove(key),
        }
    }

    pub fn clear(&mut self) {
        match self {
            PolicyKind::Lru(p) => p.clear(),
            PolicyKind::Lfu(p) => p.clear(),
            PolicyKind::Fifo(p) => p.clear(),
            PolicyKind::Filo(p) => p.clear(),
            PolicyKind::Idle(p) => p.clear(),
            PolicyKind::Weight(p) => p.clear(),
            PolicyKind::Composite(members) => {
                for m in members.iter_mut() {
                    m.clear();
                }
            }
            PolicyKind::WindowTinyLfu(p) => p.clear(),
        }
    }

    /// Returns one eviction candidate, never `forbidden`, if the policy can
    /// find one. Composite policies ask each member in order.
    pub fn select_victim(&mut self, forbidden: Option<&K>) -> Option<K> {
        match self {
            PolicyKind::Lru(p) => p.select_victim(forbidden),
            PolicyKind::Lfu(p) => p.select_victim(forbidden),
            PolicyKind::Fifo(p) => p.select_victim(forbidden),
            PolicyKind::Filo(p) => p.select_victim(forbidden),
            PolicyKind::Idle(p) => p.select_victim(forbidden),
            PolicyKind::Weight(p) => p.select_victim(forbidden),
            PolicyKind::Composite(members) => {
                for m in members.iter_mut() {
                    if let Some(victim) = m.select_victim(forbidden) {
                        return Some(victim);
                    }
                }
                None
            }
            PolicyKind::WindowTinyLfu(p) => p.select_victim(forbidden),
        }
    }
}
