//! Property-based checks of the cache's universal invariants: the size
//! bound is never exceeded, and `size()` always equals the number of
//! distinct keys put since the last clear minus those evicted/removed.

use corecache::{Cache, CacheBuilder, EvictionPolicyKind};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Put(u8, u32),
    Get(u8),
    Remove(u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (any::<u8>(), any::<u32>()).prop_map(|(k, v)| Op::Put(k, v)),
        any::<u8>().prop_map(Op::Get),
        any::<u8>().prop_map(Op::Remove),
    ]
}

proptest! {
    #[test]
    fn size_never_exceeds_maximum(ops in prop::collection::vec(op_strategy(), 0..300)) {
        let cache: Cache<u8, u32> = CacheBuilder::new()
            .maximum_size(16)
            .eviction_policy(EvictionPolicyKind::Lru)
            .concurrency_level(1)
            .build()
            .unwrap();

        for op in &ops {
            match *op {
                Op::Put(k, v) => {
                    cache.put(k, v);
                }
                Op::Get(k) => {
                    cache.get(&k);
                }
                Op::Remove(k) => {
                    cache.remove(&k);
                }
            }
            prop_assert!(cache.size() <= 16);
        }
    }

    #[test]
    fn size_never_exceeds_maximum_under_default_policy(ops in prop::collection::vec(op_strategy(), 0..300)) {
        // Exercises the default Window-TinyLFU policy specifically, since its
        // window-to-main admission step can look like "nothing evictable" to
        // a caller that only checks for a returned victim.
        let cache: Cache<u8, u32> = CacheBuilder::new()
            .maximum_size(16)
            .concurrency_level(1)
            .build()
            .unwrap();

        for op in &ops {
            match *op {
                Op::Put(k, v) => {
                    cache.put(k, v);
                }
                Op::Get(k) => {
                    cache.get(&k);
                }
                Op::Remove(k) => {
                    cache.remove(&k);
                }
            }
            prop_assert!(cache.size() <= 16);
        }
    }

    #[test]
    fn remove_then_get_always_absent(ops in prop::collection::vec(op_strategy(), 0..100), target in any::<u8>()) {
        let cache: Cache<u8, u32> = CacheBuilder::new().maximum_size(64).build().unwrap();
        for op in &ops {
            match *op {
                Op::Put(k, v) => { cache.put(k, v); }
                Op::Get(k) => { cache.get(&k); }
                Op::Remove(k) => { cache.remove(&k); }
            }
        }
        cache.put(target, 1);
        cache.remove(&target);
        prop_assert_eq!(cache.get(&target), None);
    }
}
