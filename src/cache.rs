//! The top-level cache handle: wires the sharded store, the loader/refresh
//! coordinator, periodic maintenance, listeners, and stats into one
//! `Clone`-able, `Arc`-backed facade.

use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::expiration::MaintenanceHandle;
use crate::loader::{BlockingLoadCoordinator, LoadCoordinator, RefreshTracker};
use crate::stats::CacheStats;
use crate::store::Store;

pub(crate) type SyncLoader<K, V> = Arc<dyn Fn(&K) -> Option<V> + Send + Sync>;
pub(crate) type AsyncLoader<K, V> =
    Arc<dyn Fn(K) -> Pin<Box<dyn Future<Output = Option<V>> + Send>> + Send + Sync>;

const DEFAULT_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60);

struct Inner<K: Eq + Hash + Clone, V: Clone> {
    store: Arc<Store<K, V>>,
    sync_loader: Option<SyncLoader<K, V>>,
    async_loader: Option<AsyncLoader<K, V>>,
    refresh_after_write: Option<Duration>,
    coordinator: LoadCoordinator<K, V>,
    blocking_coordinator: BlockingLoadCoordinator<K, V>,
    refresh_tracker: RefreshTracker<K>,
    runtime: Option<tokio::runtime::Handle>,
    maintenance: Mutex<Option<MaintenanceHandle>>,
}

/// A concurrent, bounded, policy-driven cache mapping `K` to `V`.
///
/// Cheaply `Clone`-able: every clone shares the same underlying store.
pub struct Cache<K: Eq + Hash + Clone, V: Clone> {
    inner: Arc<Inner<K, V>>,
}

impl<K: Eq + Hash + Clone, V: Clone> Clone for Cache<K, V> {
    fn clone(&self) -> Self {
        Cache {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(
        store: Arc<Store<K, V>>,
        sync_loader: Option<SyncLoader<K, V>>,
        async_loader: Option<AsyncLoader<K, V>>,
        refresh_after_write: Option<Duration>,
    ) -> Self {
        let runtime = tokio::runtime::Handle::try_current().ok();

        let maintenance = runtime.as_ref().map(|handle| {
            let _guard = handle.enter();
            MaintenanceHandle::spawn(Arc::clone(&store), store.sketch.clone(), DEFAULT_MAINTENANCE_INTERVAL)
        });
        if runtime.is_none() {
            tracing::debug!("cache constructed outside a tokio runtime; periodic maintenance disabled");
        }

        Cache {
            inner: Arc::new(Inner {
                store,
                sync_loader,
                async_loader,
                refresh_after_write,
                coordinator: LoadCoordinator::new(),
                blocking_coordinator: BlockingLoadCoordinator::new(),
                refresh_tracker: RefreshTracker::new(),
                runtime,
                maintenance: Mutex::new(maintenance),
            }),
        }
    }

    async fn run_loader(inner: &Inner<K, V>, key: &K) -> Option<V> {
        if let Some(loader) = &inner.sync_loader {
            return loader(key);
        }
        if let Some(loader) = &inner.async_loader {
            return loader(key.clone()).await;
        }
        None
    }

    fn has_loader(&self) -> bool {
        self.inner.sync_loader.is_some() || self.inner.async_loader.is_some()
    }

    /// Looks up `key`. On a miss, if a loader is configured, invokes it
    /// under the single-flight guarantee and caches a successful result.
    pub fn get(&self, key: &K) -> Option<V> {
        if let Some(value) = self.inner.store.get(key) {
            self.maybe_schedule_refresh(key);
            return Some(value);
        }
        if !self.has_loader() {
            return None;
        }
        self.load_blocking(key)
    }

    /// Async counterpart of [`Cache::get`]. The store lookup itself never
    /// suspends; only loader dispatch and single-flight joins do.
    pub async fn get_async(&self, key: &K) -> Option<V> {
        if let Some(value) = self.inner.store.get(key) {
            self.maybe_schedule_refresh(key);
            return Some(value);
        }
        if !self.has_loader() {
            return None;
        }
        self.load_async(key).await
    }

    fn load_blocking(&self, key: &K) -> Option<V> {
        let inner = &self.inner;
        let started = inner.store.now();
        let (result, is_leader) = inner.blocking_coordinator.load_or_join(key, || {
            if let Some(loader) = &inner.sync_loader {
                loader(key)
            } else if let Some(loader) = &inner.async_loader {
                match &inner.runtime {
                    Some(handle) => {
                        let fut = loader(key.clone());
                        tokio::task::block_in_place(|| handle.block_on(fut))
                    }
                    None => None,
                }
            } else {
                None
            }
        });
        if is_leader {
            self.record_load_outcome(key, &result, started);
        }
        result
    }

    async fn load_async(&self, key: &K) -> Option<V> {
        let inner = Arc::clone(&self.inner);
        let key_owned = key.clone();
        let started = inner.store.now();
        let run_inner = Arc::clone(&inner);
        let (result, is_leader) = inner
            .coordinator
            .load_or_join(key, move || async move { Self::run_loader(&run_inner, &key_owned).await })
            .await;
        if is_leader {
            self.record_load_outcome(key, &result, started);
        }
        result
    }

    fn record_load_outcome(&self, key: &K, result: &Option<V>, started: u64) {
        let inner = &self.inner;
        let duration = inner.store.now().saturating_sub(started);
        match result {
            Some(value) => {
                inner.store.put(key.clone(), value.clone());
                inner.store.listeners.dispatch_load(key, value);
                inner.store.stats.record_load(duration);
            }
            None => {
                tracing::debug!(duration_nanos = duration, "load failed, returning absence");
                inner.store.listeners.dispatch_load_error(key, "loader produced no value");
                inner.store.stats.record_load_failure(duration);
            }
        }
    }

    /// Triggers a background reload if `refresh_after_write` has elapsed
    /// since `key` was last written and no reload is already pending for it.
    fn maybe_schedule_refresh(&self, key: &K) {
        let Some(refresh_after) = self.inner.refresh_after_write else {
            return;
        };
        if !self.has_loader() {
            return;
        }
        let Some(created_at) = self.inner.store.created_at(key) else {
            return;
        };
        let now = self.inner.store.now();
        if now.saturating_sub(created_at) < refresh_after.as_nanos() as u64 {
            return;
        }
        if !self.inner.refresh_tracker.try_begin(key) {
            return;
        }
        let Some(handle) = self.inner.runtime.clone() else {
            self.inner.refresh_tracker.finish(key);
            return;
        };

        let inner = Arc::clone(&self.inner);
        let key = key.clone();
        handle.spawn(async move {
            let started = inner.store.now();
            let result = Self::run_loader(&inner, &key).await;
            let duration = inner.store.now().saturating_sub(started);
            match &result {
                Some(value) => {
                    inner.store.put(key.clone(), value.clone());
                    inner.store.listeners.dispatch_load(&key, value);
                    inner.store.stats.record_load(duration);
                }
                None => {
                    inner.store.listeners.dispatch_load_error(&key, "refresh produced no value");
                    inner.store.stats.record_load_failure(duration);
                }
            }
            inner.refresh_tracker.finish(&key);
        });
    }

    pub fn put(&self, key: K, value: V) -> Option<V> {
        self.inner.store.put(key, value)
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner.store.remove(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.store.contains(key)
    }

    pub fn clear(&self) {
        self.inner.store.clear()
    }

    pub fn size(&self) -> u64 {
        self.inner.store.size()
    }

    pub fn weight(&self) -> u64 {
        self.inner.store.weight()
    }

    pub async fn put_async(&self, key: K, value: V) -> Option<V> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.store.put(key, value))
            .await
            .unwrap_or(None)
    }

    pub async fn remove_async(&self, key: K) -> Option<V> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.store.remove(&key))
            .await
            .unwrap_or(None)
    }

    pub async fn clear_async(&self) {
        let inner = Arc::clone(&self.inner);
        let _ = tokio::task::spawn_blocking(move || inner.store.clear()).await;
    }

    /// Forces an immediate expiration sweep across all shards, the way
    /// moka's `run_pending_tasks` lets tests avoid waiting on the periodic
    /// maintenance interval. Returns the number of entries removed.
    pub fn run_pending_tasks(&self) -> u64 {
        self.inner.store.purge_expired()
    }

    /// Evicts every entry for which `predicate` returns true, regardless of
    /// configured bounds.
    pub fn invalidate_entries_if<F>(&self, predicate: F)
    where
        F: Fn(&K, &V) -> bool,
    {
        self.inner.store.invalidate_entries_if(predicate)
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.store.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.inner.store.stats.reset()
    }

    /// Stops the periodic maintenance task, joining it with a bounded
    /// timeout. Other clones of this cache remain usable; only the shared
    /// maintenance task is affected.
    pub async fn shutdown(&self) {
        let handle = self.inner.maintenance.lock().take();
        if let Some(handle) = handle {
            handle.shutdown().await;
        }
    }
}
