//! `CacheBuilder`: the validating constructor for [`crate::Cache`].
//!
//! Bad configuration is rejected at build time, never at runtime.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use ahash::RandomState;

use crate::cache::{AsyncLoader, Cache, SyncLoader};
use crate::error::ConfigError;
use crate::listener::{EventListener, ListenerRegistry};
use crate::policy::{EvictionPolicyKind, PolicyKind};
use crate::sketch::{FrequencySketch, FrequencySketchMode};
use crate::stats::Stats;
use crate::store::{Store, StoreConfig};

/// How strongly an entry is held once inserted. `Weak`/`Soft` are modeled as
/// eviction-priority hints rather than true GC-observed reference weakening,
/// which has no direct analogue without a tracing collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReachabilityMode {
    #[default]
    Strong,
    Weak,
    Soft,
}

pub struct CacheBuilder<K, V> {
    maximum_size: Option<i64>,
    maximum_weight: Option<i64>,
    weigher: Option<Box<dyn Fn(&K, &V) -> u32 + Send + Sync>>,
    expire_after_write: Option<Duration>,
    expire_after_access: Option<Duration>,
    refresh_after_write: Option<Duration>,
    eviction_policy: EvictionPolicyKind,
    composite_members: Vec<EvictionPolicyKind>,
    max_idle_time: Option<Duration>,
    frequency_sketch_mode: FrequencySketchMode,
    record_stats: bool,
    initial_capacity: usize,
    concurrency_level: usize,
    sync_loader: Option<SyncLoader<K, V>>,
    async_loader: Option<AsyncLoader<K, V>>,
    listeners: Vec<Arc<dyn EventListener<K, V>>>,
    weak_keys: bool,
    weak_values: bool,
    soft_values: bool,
}

impl<K, V> Default for CacheBuilder<K, V> {
    fn default() -> Self {
        CacheBuilder {
            maximum_size: None,
            maximum_weight: None,
            weigher: None,
            expire_after_write: None,
            expire_after_access: None,
            refresh_after_write: None,
            eviction_policy: EvictionPolicyKind::WindowTinyLfu,
            composite_members: Vec::new(),
            max_idle_time: None,
            frequency_sketch_mode: FrequencySketchMode::Optimized,
            record_stats: false,
            initial_capacity: 16,
            concurrency_level: 16,
            sync_loader: None,
            async_loader: None,
            listeners: Vec::new(),
            weak_keys: false,
            weak_values: false,
            soft_values: false,
        }
    }
}

impl<K, V> CacheBuilder<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }
}

impl<K, V> CacheBuilder<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn maximum_size(mut self, n: i64) -> Self {
        self.maximum_size = Some(n);
        self
    }

    pub fn maximum_weight(mut self, n: i64) -> Self {
        self.maximum_weight = Some(n);
        self
    }

    pub fn weigher<F>(mut self, f: F) -> Self
    where
        F: Fn(&K, &V) -> u32 + Send + Sync + 'static,
    {
        self.weigher = Some(Box::new(f));
        self
    }

    pub fn expire_after_write(mut self, d: Duration) -> Self {
        self.expire_after_write = Some(d);
        self
    }

    pub fn expire_after_access(mut self, d: Duration) -> Self {
        self.expire_after_access = Some(d);
        self
    }

    pub fn refresh_after_write(mut self, d: Duration) -> Self {
        self.refresh_after_write = Some(d);
        self
    }

    pub fn eviction_policy(mut self, policy: EvictionPolicyKind) -> Self {
        self.eviction_policy = policy;
        self
    }

    /// Configures `COMPOSITE` with an ordered fallback chain. Implies
    /// `eviction_policy(EvictionPolicyKind::Composite)`.
    pub fn composite_policy(mut self, members: Vec<EvictionPolicyKind>) -> Self {
        self.eviction_policy = EvictionPolicyKind::Composite;
        self.composite_members = members;
        self
    }

    pub fn max_idle_time(mut self, d: Duration) -> Self {
        self.max_idle_time = Some(d);
        self
    }

    pub fn frequency_sketch_mode(mut self, mode: FrequencySketchMode) -> Self {
        self.frequency_sketch_mode = mode;
        self
    }

    pub fn record_stats(mut self, enabled: bool) -> Self {
        self.record_stats = enabled;
        self
    }

    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    pub fn concurrency_level(mut self, level: usize) -> Self {
        self.concurrency_level = level;
        self
    }

    pub fn loader<F>(mut self, f: F) -> Self
    where
        F: Fn(&K) -> Option<V> + Send + Sync + 'static,
    {
        self.sync_loader = Some(Arc::new(f));
        self
    }

    pub fn async_loader<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Option<V>> + Send + 'static,
    {
        self.async_loader = Some(Arc::new(move |k: K| {
            Box::pin(f(k)) as std::pin::Pin<Box<dyn std::future::Future<Output = Option<V>> + Send>>
        }));
        self
    }

    pub fn listener(mut self, listener: Arc<dyn EventListener<K, V>>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn weak_keys(mut self, enabled: bool) -> Self {
        self.weak_keys = enabled;
        self
    }

    pub fn weak_values(mut self, enabled: bool) -> Self {
        self.weak_values = enabled;
        self
    }

    pub fn soft_values(mut self, enabled: bool) -> Self {
        self.soft_values = enabled;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(n) = self.maximum_size {
            if n <= 0 {
                return Err(ConfigError::NonPositiveMaximumSize(n));
            }
        }
        if let Some(n) = self.maximum_weight {
            if n <= 0 {
                return Err(ConfigError::NonPositiveMaximumWeight(n));
            }
        }
        if self.maximum_size.is_some() && self.maximum_weight.is_some() {
            return Err(ConfigError::SizeAndWeightBothSet);
        }
        if self.maximum_weight.is_some() && self.weigher.is_none() {
            return Err(ConfigError::WeightWithoutWeigher);
        }
        if self.weak_values && self.soft_values {
            return Err(ConfigError::WeakAndSoftValuesBothSet);
        }
        if self.sync_loader.is_some() && self.async_loader.is_some() {
            return Err(ConfigError::SyncAndAsyncLoaderBothSet);
        }
        if matches!(self.eviction_policy, EvictionPolicyKind::IdleTime) && self.max_idle_time.is_none() {
            return Err(ConfigError::IdleTimeWithoutMaxIdle);
        }
        if self.max_idle_time.is_some()
            && !matches!(
                self.eviction_policy,
                EvictionPolicyKind::IdleTime | EvictionPolicyKind::Composite
            )
        {
            return Err(ConfigError::IncompatiblePolicySetting {
                setting: "max_idle_time",
                required_policy: "IDLE_TIME or COMPOSITE",
                configured_policy: policy_name(self.eviction_policy),
            });
        }
        if matches!(self.eviction_policy, EvictionPolicyKind::Weight) && self.weigher.is_none() {
            return Err(ConfigError::IncompatiblePolicySetting {
                setting: "eviction_policy = WEIGHT",
                required_policy: "a weigher must be configured",
                configured_policy: policy_name(self.eviction_policy),
            });
        }
        Ok(())
    }

    pub fn build(self) -> Result<Cache<K, V>, ConfigError> {
        if let Err(err) = self.validate() {
            tracing::warn!(%err, "rejecting cache configuration");
            return Err(err);
        }

        let sketch = match self.frequency_sketch_mode {
            FrequencySketchMode::None => None,
            mode => {
                let estimated_capacity = self
                    .maximum_size
                    .or(self.maximum_weight)
                    .map(|n| n as u64)
                    .unwrap_or(4096);
                Some(Arc::new(FrequencySketch::new(mode, (estimated_capacity * 8) as usize)))
            }
        };

        let policy = self.eviction_policy;
        let composite_members = self.composite_members.clone();
        let max_idle_nanos = self.max_idle_time.map(|d| d.as_nanos() as u64).unwrap_or(u64::MAX);
        let policy_factory: Box<dyn Fn(u64, Option<Arc<FrequencySketch>>) -> PolicyKind<K>> =
            Box::new(move |shard_capacity, shard_sketch| {
                build_policy(policy, &composite_members, shard_capacity, shard_sketch, max_idle_nanos)
            });

        let store_config = StoreConfig {
            shard_count: self.concurrency_level,
            initial_capacity: self.initial_capacity,
            maximum_size: self.maximum_size.map(|n| n as u64),
            maximum_weight: self.maximum_weight.map(|n| n as u64),
            expire_after_write: self.expire_after_write,
            expire_after_access: self.expire_after_access,
            weigher: self.weigher,
            policy_factory,
            sketch,
            hasher: RandomState::new(),
        };

        let listeners = Arc::new(ListenerRegistry::new(self.listeners));
        let stats = Arc::new(Stats::new(self.record_stats));
        let store = Arc::new(Store::new(store_config, listeners, stats));

        Ok(Cache::new(
            store,
            self.sync_loader,
            self.async_loader,
            self.refresh_after_write,
        ))
    }
}

fn policy_name(kind: EvictionPolicyKind) -> &'static str {
    match kind {
        EvictionPolicyKind::Lru => "LRU",
        EvictionPolicyKind::Lfu => "LFU",
        EvictionPolicyKind::Fifo => "FIFO",
        EvictionPolicyKind::Filo => "FILO",
        EvictionPolicyKind::IdleTime => "IDLE_TIME",
        EvictionPolicyKind::Weight => "WEIGHT",
        EvictionPolicyKind::Composite => "COMPOSITE",
        EvictionPolicyKind::WindowTinyLfu => "WINDOW_TINY_LFU",
    }
}

fn build_policy<K: Eq + Hash + Clone>(
    kind: EvictionPolicyKind,
    composite_members: &[EvictionPolicyKind],
    shard_capacity: u64,
    sketch: Option<Arc<FrequencySketch>>,
    max_idle_nanos: u64,
) -> PolicyKind<K> {
    match kind {
        EvictionPolicyKind::Lru => PolicyKind::new_lru(),
        EvictionPolicyKind::Lfu => PolicyKind::new_lfu(),
        EvictionPolicyKind::Fifo => PolicyKind::new_fifo(),
        EvictionPolicyKind::Filo => PolicyKind::new_filo(),
        EvictionPolicyKind::IdleTime => PolicyKind::new_idle(max_idle_nanos),
        EvictionPolicyKind::Weight => PolicyKind::new_weight(),
        EvictionPolicyKind::WindowTinyLfu => {
            let sketch = sketch.unwrap_or_else(|| Arc::new(FrequencySketch::new(FrequencySketchMode::Optimized, 256)));
            PolicyKind::new_window_tiny_lfu(shard_capacity, sketch)
        }
        EvictionPolicyKind::Composite => {
            let members = composite_members
                .iter()
                .map(|m| build_policy(*m, &[], shard_capacity, sketch.clone(), max_idle_nanos))
                .collect();
            PolicyKind::new_composite(members)
        }
    }
}

/// Parses a string-configured policy name. Used by deserializing
/// configuration layers; the typed [`CacheBuilder`] API above is preferred
/// for programmatic construction.
pub fn parse_eviction_policy(name: &str) -> Result<EvictionPolicyKind, ConfigError> {
    match name {
        "LRU" => Ok(EvictionPolicyKind::Lru),
        "LFU" => Ok(EvictionPolicyKind::Lfu),
        "FIFO" => Ok(EvictionPolicyKind::Fifo),
        "FILO" => Ok(EvictionPolicyKind::Filo),
        "IDLE_TIME" => Ok(EvictionPolicyKind::IdleTime),
        "WEIGHT" => Ok(EvictionPolicyKind::Weight),
        "COMPOSITE" => Ok(EvictionPolicyKind::Composite),
        "WINDOW_TINY_LFU" => Ok(EvictionPolicyKind::WindowTinyLfu),
        other => Err(ConfigError::UnknownPolicy(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_maximum_size() {
        let err = CacheBuilder::<&str, i32>::new().maximum_size(0).build().unwrap_err();
        assert_eq!(err, ConfigError::NonPositiveMaximumSize(0));
    }

    #[test]
    fn rejects_non_positive_maximum_weight() {
        let err = CacheBuilder::<&str, i32>::new()
            .maximum_weight(-1)
            .weigher(|_k: &&str, _v: &i32| 1)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::NonPositiveMaximumWeight(-1));
    }

    #[test]
    fn rejects_maximum_weight_without_weigher() {
        let err = CacheBuilder::<&str, i32>::new().maximum_weight(10).build().unwrap_err();
        assert_eq!(err, ConfigError::WeightWithoutWeigher);
    }

    #[test]
    fn rejects_simultaneous_size_and_weight() {
        let err = CacheBuilder::<&str, i32>::new()
            .maximum_size(10)
            .maximum_weight(10)
            .weigher(|_k: &&str, _v: &i32| 1)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::SizeAndWeightBothSet);
    }

    #[test]
    fn rejects_weak_and_soft_values_together() {
        let err = CacheBuilder::<&str, i32>::new()
            .maximum_size(10)
            .weak_values(true)
            .soft_values(true)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::WeakAndSoftValuesBothSet);
    }

    #[test]
    fn rejects_sync_and_async_loader_together() {
        let err = CacheBuilder::<&str, i32>::new()
            .maximum_size(10)
            .loader(|_k: &&str| Some(1))
            .async_loader(|_k: &str| async { Some(1) })
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::SyncAndAsyncLoaderBothSet);
    }

    #[test]
    fn rejects_idle_time_policy_without_max_idle() {
        let err = CacheBuilder::<&str, i32>::new()
            .maximum_size(10)
            .eviction_policy(EvictionPolicyKind::IdleTime)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::IdleTimeWithoutMaxIdle);
    }

    #[test]
    fn rejects_max_idle_time_with_incompatible_policy() {
        let err = CacheBuilder::<&str, i32>::new()
            .maximum_size(10)
            .eviction_policy(EvictionPolicyKind::Lru)
            .max_idle_time(Duration::from_secs(1))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::IncompatiblePolicySetting { .. }));
    }

    #[test]
    fn rejects_unknown_policy_name() {
        let err = parse_eviction_policy("NOT_A_POLICY").unwrap_err();
        assert_eq!(err, ConfigError::UnknownPolicy("NOT_A_POLICY".to_string()));
    }

    #[test]
    fn accepts_minimal_valid_configuration() {
        let cache: Cache<&str, i32> = CacheBuilder::new().maximum_size(10).build().unwrap();
        cache.put("a", 1);
        assert_eq!(cache.get(&"a"), Some(1));
    }
}
