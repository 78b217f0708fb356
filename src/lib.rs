//! A high-performance, feature-rich in-process caching engine.
//!
//! Sharded concurrent store, pluggable eviction (LRU, LFU, FIFO, FILO,
//! idle-time, weight-based, composite, and Window-TinyLFU admission),
//! write/access TTL expiration, a single-flight loader/refresh coordinator,
//! atomic statistics, and synchronous event listeners.
//!
//! ```no_run
//! use corecache::{Cache, CacheBuilder};
//!
//! let cache: Cache<String, u64> = CacheBuilder::new()
//!     .maximum_size(10_000)
//!     .build()
//!     .expect("valid configuration");
//!
//! cache.put("answer".to_string(), 42);
//! assert_eq!(cache.get(&"answer".to_string()), Some(42));
//! ```

mod builder;
mod cache;
mod clock;
mod entry;
mod error;
mod expiration;
mod listener;
mod loader;
mod policy;
mod sketch;
mod stats;
mod store;

pub use builder::{parse_eviction_policy, CacheBuilder, ReachabilityMode};
pub use cache::Cache;
pub use error::ConfigError;
pub use listener::EventListener;
pub use policy::{EvictReason, EvictionPolicyKind};
pub use sketch::FrequencySketchMode;
pub use stats::CacheStats;
