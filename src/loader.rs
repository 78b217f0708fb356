//! Single-flight load coordination.
//!
//! At most one load executes per key at a time; concurrent callers join the
//! in-flight attempt instead of re-invoking the loader. A small
//! `Notify`-gated slot map plays the same role `moka`'s `get_with` single
//! flight plays, built from `tokio::sync::Notify` plus `parking_lot::Mutex`.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use ahash::RandomState;
use hashbrown::HashMap;
use hashbrown::HashSet;
use parking_lot::{Condvar, Mutex};
use tokio::sync::Notify;

struct LoadSlot<V> {
    notify: Notify,
    outcome: Mutex<Option<Option<V>>>,
}

/// Coordinates concurrent loads of the same key so only one actually runs.
pub(crate) struct LoadCoordinator<K, V> {
    in_flight: Mutex<HashMap<K, Arc<LoadSlot<V>>, RandomState>>,
}

impl<K: Eq + Hash + Clone, V: Clone> LoadCoordinator<K, V> {
    pub fn new() -> Self {
        LoadCoordinator {
            in_flight: Mutex::new(HashMap::with_hasher(RandomState::new())),
        }
    }

    /// Runs `run` for `key` unless a load is already in flight, in which
    /// case this call joins it. Every caller -- leader and joiners alike --
    /// receives the same outcome, but only the leader actually dispatched
    /// the load; the returned `bool` tells the caller which one it was, so
    /// load statistics and listener dispatch happen exactly once per load.
    pub async fn load_or_join<F, Fut>(&self, key: &K, run: F) -> (Option<V>, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<V>>,
    {
        let (slot, is_leader) = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get(key) {
                Some(existing) => (Arc::clone(existing), false),
                None => {
                    let slot = Arc::new(LoadSlot {
                        notify: Notify::new(),
                        outcome: Mutex::new(None),
                    });
                    in_flight.insert(key.clone(), Arc::clone(&slot));
                    (slot, true)
                }
            }
        };

        if is_leader {
            let result = run().await;
            *slot.outcome.lock() = Some(result.clone());
            self.in_flight.lock().remove(key);
            slot.notify.notify_waiters();
            (result, true)
        } else {
            loop {
                let notified = slot.notify.notified();
                if let Some(outcome) = slot.outcome.lock().clone() {
                    return (outcome, false);
                }
                notified.await;
            }
        }
    }
}

struct BlockingLoadSlot<V> {
    cv: Condvar,
    outcome: Mutex<Option<Option<V>>>,
}

/// Blocking counterpart to [`LoadCoordinator`] for [`crate::cache::Cache::get`],
/// which must not require a `Future` to provide its single-flight guarantee.
/// Same slot-map shape, `parking_lot::Condvar` standing in for `Notify`.
pub(crate) struct BlockingLoadCoordinator<K, V> {
    in_flight: Mutex<HashMap<K, Arc<BlockingLoadSlot<V>>, RandomState>>,
}

impl<K: Eq + Hash + Clone, V: Clone> BlockingLoadCoordinator<K, V> {
    pub fn new() -> Self {
        BlockingLoadCoordinator {
            in_flight: Mutex::new(HashMap::with_hasher(RandomState::new())),
        }
    }

    /// Same leader/joiner contract as [`LoadCoordinator::load_or_join`]: the
    /// returned `bool` is `true` only for the caller that actually ran `run`.
    pub fn load_or_join<F>(&self, key: &K, run: F) -> (Option<V>, bool)
    where
        F: FnOnce() -> Option<V>,
    {
        let (slot, is_leader) = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get(key) {
                Some(existing) => (Arc::clone(existing), false),
                None => {
                    let slot = Arc::new(BlockingLoadSlot {
                        cv: Condvar::new(),
                        outcome: Mutex::new(None),
                    });
                    in_flight.insert(key.clone(), Arc::clone(&slot));
                    (slot, true)
                }
            }
        };

        if is_leader {
            let result = run();
            *slot.outcome.lock() = Some(result.clone());
            self.in_flight.lock().remove(key);
            slot.cv.notify_all();
            (result, true)
        } else {
            let mut outcome = slot.outcome.lock();
            while outcome.is_none() {
                slot.cv.wait(&mut outcome);
            }
            (outcome.clone().unwrap(), false)
        }
    }
}

/// Tracks which keys currently have a refresh-after-write reload in flight,
/// so a burst of reads past the refresh deadline triggers at most one
/// background reload per key.
pub(crate) struct RefreshTracker<K> {
    pending: Mutex<HashSet<K, RandomState>>,
}

impl<K: Eq + Hash + Clone> RefreshTracker<K> {
    pub fn new() -> Self {
        RefreshTracker {
            pending: Mutex::new(HashSet::with_hasher(RandomState::new())),
        }
    }

    /// Claims `key` for a refresh. Returns `false` if one is already pending.
    pub fn try_begin(&self, key: &K) -> bool {
        let mut pending = self.pending.lock();
        if pending.contains(key) {
            false
        } else {
            pending.insert(key.clone());
            true
        }
    }

    pub fn finish(&self, key: &K) {
        self.pending.lock().remove(key);
    }
}
