//! End-to-end scenarios against the public `Cache`/`CacheBuilder` surface.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use corecache::{Cache, CacheBuilder, EvictionPolicyKind};

/// Surfaces the crate's `tracing` events (eviction, maintenance sweeps, load
/// failures, config rejection) on test output instead of discarding them.
fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

#[test]
fn basic_round_trip_evicts_on_overflow() {
    init_tracing();
    let cache: Cache<&str, i32> = CacheBuilder::new()
        .maximum_size(2)
        .eviction_policy(EvictionPolicyKind::Lru)
        .concurrency_level(1)
        .build()
        .unwrap();

    cache.put("a", 1);
    cache.put("b", 2);
    assert_eq!(cache.get(&"a"), Some(1));
    cache.put("c", 3);

    assert_eq!(cache.get(&"b"), None);
    assert_eq!(cache.get(&"a"), Some(1));
    assert_eq!(cache.get(&"c"), Some(3));
    assert_eq!(cache.size(), 2);
}

#[tokio::test]
async fn access_based_ttl_expires_after_wait() {
    let cache: Cache<&str, i32> = CacheBuilder::new()
        .expire_after_access(Duration::from_millis(50))
        .record_stats(true)
        .build()
        .unwrap();

    cache.put("x", 7);
    assert_eq!(cache.get(&"x"), Some(7));

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(cache.get(&"x"), None);

    let stats = cache.stats();
    assert!(stats.misses >= 1);
}

#[tokio::test]
async fn write_based_ttl_with_refresh_serves_stale_then_refreshed() {
    // Starts at 1: "v0" is the manually seeded value below, so the first
    // loader invocation (the refresh past the deadline) must produce a
    // distinguishable "v1".
    let counter = Arc::new(AtomicU32::new(1));
    let counter_for_loader = Arc::clone(&counter);

    let cache: Cache<&str, String> = CacheBuilder::new()
        .expire_after_write(Duration::from_secs(1))
        .refresh_after_write(Duration::from_millis(80))
        .loader(move |_k: &&str| {
            let n = counter_for_loader.fetch_add(1, Ordering::SeqCst);
            Some(format!("v{n}"))
        })
        .build()
        .unwrap();

    cache.put("k", "v0".to_string());

    tokio::time::sleep(Duration::from_millis(120)).await;
    // First read past the refresh deadline still serves the stale value and
    // kicks off a background reload.
    assert_eq!(cache.get(&"k"), Some("v0".to_string()));

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(cache.get(&"k"), Some("v1".to_string()));
}

#[tokio::test]
async fn single_flight_under_contention() {
    let invocations = Arc::new(AtomicU32::new(0));
    let invocations_for_loader = Arc::clone(&invocations);

    let cache: Cache<&str, &str> = CacheBuilder::new()
        .async_loader(move |_k: &str| {
            let invocations = Arc::clone(&invocations_for_loader);
            async move {
                invocations.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Some("V")
            }
        })
        .build()
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..32 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move { cache.get_async(&"k").await }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }

    assert!(results.iter().all(|r| *r == Some("V")));
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
}

#[test]
fn lru_recency_protects_recently_read_entry() {
    let cache: Cache<&str, i32> = CacheBuilder::new()
        .maximum_size(3)
        .eviction_policy(EvictionPolicyKind::Lru)
        .concurrency_level(1)
        .build()
        .unwrap();

    cache.put("a", 1);
    cache.put("b", 2);
    cache.put("c", 3);
    cache.get(&"a");
    cache.put("d", 4);

    assert_eq!(cache.get(&"b"), None);
    assert_eq!(cache.get(&"a"), Some(1));
    assert_eq!(cache.get(&"c"), Some(3));
    assert_eq!(cache.get(&"d"), Some(4));
}

#[test]
fn window_tiny_lfu_admits_new_entries_without_panicking() {
    let cache: Cache<u32, u32> = CacheBuilder::new()
        .maximum_size(100)
        .eviction_policy(EvictionPolicyKind::WindowTinyLfu)
        .concurrency_level(1)
        .build()
        .unwrap();

    for key in 1..=100u32 {
        cache.put(key, key);
        for _ in 0..10 {
            cache.get(&key);
        }
    }

    cache.put(101, 101);
    cache.get(&101);
    cache.put(102, 102);
    cache.get(&102);

    assert!(cache.size() <= 100);
}

#[test]
fn remove_then_get_is_absent() {
    let cache: Cache<&str, i32> = CacheBuilder::new().maximum_size(10).build().unwrap();
    cache.put("k", 1);
    cache.remove(&"k");
    assert_eq!(cache.get(&"k"), None);
}

#[test]
fn put_put_get_returns_latest() {
    let cache: Cache<&str, i32> = CacheBuilder::new().maximum_size(10).build().unwrap();
    cache.put("k", 1);
    cache.put("k", 2);
    assert_eq!(cache.get(&"k"), Some(2));
}

#[test]
fn clear_is_idempotent() {
    let cache: Cache<&str, i32> = CacheBuilder::new().maximum_size(10).build().unwrap();
    cache.put("a", 1);
    cache.put("b", 2);
    cache.clear();
    assert_eq!(cache.size(), 0);
    cache.clear();
    assert_eq!(cache.size(), 0);
}

#[test]
fn stats_hits_plus_misses_equals_completed_gets() {
    let cache: Cache<&str, i32> = CacheBuilder::new()
        .maximum_size(10)
        .record_stats(true)
        .build()
        .unwrap();

    cache.put("a", 1);
    cache.get(&"a");
    cache.get(&"missing");
    cache.get(&"a");

    let stats = cache.stats();
    assert_eq!(stats.hits + stats.misses, 3);
}

#[test]
fn invalidate_entries_if_removes_matching_keys() {
    let cache: Cache<i32, i32> = CacheBuilder::new().maximum_size(100).build().unwrap();
    for i in 0..10 {
        cache.put(i, i);
    }
    cache.invalidate_entries_if(|k, _v| k % 2 == 0);
    for i in 0..10 {
        if i % 2 == 0 {
            assert_eq!(cache.get(&i), None);
        } else {
            assert_eq!(cache.get(&i), Some(i));
        }
    }
}

#[test]
fn weight_bound_is_respected() {
    let cache: Cache<&str, Vec<u8>> = CacheBuilder::new()
        .maximum_weight(10)
        .weigher(|_k: &&str, v: &Vec<u8>| v.len() as u32)
        .eviction_policy(EvictionPolicyKind::Weight)
        .concurrency_level(1)
        .build()
        .unwrap();

    cache.put("a", vec![0; 4]);
    cache.put("b", vec![0; 4]);
    cache.put("c", vec![0; 4]);

    assert!(cache.weight() <= 10);
}
