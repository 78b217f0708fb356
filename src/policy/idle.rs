//! Idle-time eviction: evicts whichever tracked key has been untouched the
//! longest, once it crosses `max_idle`; falls back to the globally oldest
//! access when nothing has crossed the threshold yet.

use std::collections::BTreeMap;
use std::hash::Hash;

use ahash::RandomState;
use hashbrown::HashMap;

use super::TouchContext;

/// Ordering key: `(last_access, sequence)`. `sequence` only exists to keep
/// BTreeMap keys unique when two keys share a `last_access`; it carries no
/// meaning of its own, which is what lets this structure avoid requiring
/// `K: Ord` -- only the timestamp needs to be comparable.
type OrderKey = (u64, u64);

pub(crate) struct IdlePolicy<K: Eq + Hash + Clone> {
    max_idle_nanos: u64,
    next_seq: u64,
    tracked: HashMap<K, OrderKey, RandomState>,
    by_access: BTreeMap<OrderKey, K>,
}

impl<K: Eq + Hash + Clone> IdlePolicy<K> {
    pub fn new(max_idle_nanos: u64) -> Self {
        IdlePolicy {
            max_idle_nanos,
            next_seq: 0,
            tracked: HashMap::with_hasher(RandomState::new()),
            by_access: BTreeMap::new(),
        }
    }

    pub fn touch(&mut self, key: &K, ctx: TouchContext) {
        if let Some(previous) = self.tracked.get(key).copied() {
            self.by_access.remove(&previous);
        }
        let order_key = (ctx.last_access, self.next_seq);
        self.next_seq += 1;
        self.tracked.insert(key.clone(), order_key);
        self.by_access.insert(order_key, key.clone());
    }

    pub fn remove(&mut self, key: &K) {
        if let Some(previous) = self.tracked.remove(key) {
            self.by_access.remove(&previous);
        }
    }

    pub fn clear(&mut self) {
        self.tracked.clear();
        self.by_access.clear();
    }

    pub fn select_victim(&mut self, forbidden: Option<&K>) -> Option<K> {
        // The oldest entry is always the best candidate, whether or not it
        // has crossed max_idle: if it has, it's the largest-idle-time entry;
        // if nothing has, it's the fallback globally-oldest entry.
        let mut iter = self.by_access.iter();
        let (first_order, first_key) = iter.next()?;
        let (order, key) = if Some(first_key) == forbidden {
            let (o, k) = iter.next()?;
            (*o, k.clone())
        } else {
            (*first_order, first_key.clone())
        };
        self.by_access.remove(&order);
        self.tracked.remove(&key);
        Some(key)
    }

    #[cfg(test)]
    pub fn is_idle(&self, key: &K, now: u64) -> bool {
        self.tracked
            .get(key)
            .map(|&(last_access, _)| now.saturating_sub(last_access) >= self.max_idle_nanos)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_longest_idle_entry() {
        let mut idle = IdlePolicy::new(100);
        idle.touch(&"a", TouchContext { weight: 1, last_access: 0, now: 0 });
        idle.touch(&"b", TouchContext { weight: 1, last_access: 50, now: 50 });
        assert!(idle.is_idle(&"a", 200));
        assert_eq!(idle.select_victim(None), Some("a"));
    }

    #[test]
    fn falls_back_to_globally_oldest_when_none_past_threshold() {
        let mut idle = IdlePolicy::new(1_000_000);
        idle.touch(&"a", TouchContext { weight: 1, last_access: 0, now: 0 });
        idle.touch(&"b", TouchContext { weight: 1, last_access: 10, now: 10 });
        assert_eq!(idle.select_victim(None), Some("a"));
    }
}
