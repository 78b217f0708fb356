//! Event listener dispatch.
//!
//! Listeners subscribe at construction time via
//! [`crate::builder::CacheBuilder::listener`] and are notified synchronously
//! on the thread performing the triggering operation. Dispatch for
//! put/remove/evict runs under the shard's write lock, so listener
//! implementations must be fast and must not call back into the cache.

use std::sync::Arc;

use crate::policy::EvictReason;

/// Subscriber for cache lifecycle events.
///
/// Default no-op methods let implementations override only what they need
/// instead of a single monolithic callback enum.
pub trait EventListener<K, V>: Send + Sync {
    fn on_put(&self, _key: &K, _value: &V) {}
    fn on_remove(&self, _key: &K, _value: &V) {}
    fn on_evict(&self, _key: &K, _value: &V, _reason: EvictReason) {}
    fn on_load(&self, _key: &K, _value: &V) {}
    fn on_load_error(&self, _key: &K, _error: &str) {}
    fn on_clear(&self) {}
}

/// Holds every subscribed listener and fans each event out to all of them.
pub(crate) struct ListenerRegistry<K, V> {
    listeners: Vec<Arc<dyn EventListener<K, V>>>,
}

impl<K, V> ListenerRegistry<K, V> {
    pub fn new(listeners: Vec<Arc<dyn EventListener<K, V>>>) -> Self {
        ListenerRegistry { listeners }
    }

    pub fn dispatch_put(&self, key: &K, value: &V) {
        for listener in &self.listeners {
            listener.on_put(key, value);
        }
    }

    pub fn dispatch_remove(&self, key: &K, value: &V) {
        for listener in &self.listeners {
            listener.on_remove(key, value);
        }
    }

    pub fn dispatch_evict(&self, key: &K, value: &V, reason: EvictReason) {
        for listener in &self.listeners {
            listener.on_evict(key, value, reason);
        }
    }

    pub fn dispatch_load(&self, key: &K, value: &V) {
        for listener in &self.listeners {
            listener.on_load(key, value);
        }
    }

    pub fn dispatch_load_error(&self, key: &K, error: &str) {
        for listener in &self.listeners {
            listener.on_load_error(key, error);
        }
    }

    pub fn dispatch_clear(&self) {
        for listener in &self.listeners {
            listener.on_clear();
        }
    }
}
