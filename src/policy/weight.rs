//! Weight-based eviction: evicts the largest-weight entry, ties broken by
//! least-recent access.

use std::collections::BTreeMap;
use std::hash::Hash;

use ahash::RandomState;
use hashbrown::HashMap;

use super::TouchContext;

/// Ordering key: `(u64::MAX - weight, last_access, sequence)`, ascending.
/// The smallest tuple is therefore the *largest* weight, and ties on weight
/// fall through to the smallest `last_access` (oldest, i.e. least-recent).
/// `sequence` only disambiguates equal `(weight, last_access)` pairs and
/// carries no meaning of its own -- this avoids requiring `K: Ord`.
type OrderKey = (u64, u64, u64);

pub(crate) struct WeightPolicy<K: Eq + Hash + Clone> {
    next_seq: u64,
    tracked: HashMap<K, OrderKey, RandomState>,
    by_weight: BTreeMap<OrderKey, K>,
}

impl<K: Eq + Hash + Clone> WeightPolicy<K> {
    pub fn new() -> Self {
        WeightPolicy {
            next_seq: 0,
            tracked: HashMap::with_hasher(RandomState::new()),
            by_weight: BTreeMap::new(),
        }
    }

    pub fn touch(&mut self, key: &K, ctx: TouchContext) {
        if let Some(previous) = self.tracked.get(key).copied() {
            self.by_weight.remove(&previous);
        }
        let order_key = (u64::MAX - ctx.weight, ctx.last_access, self.next_seq);
        self.next_seq += 1;
        self.tracked.insert(key.clone(), order_key);
        self.by_weight.insert(order_key, key.clone());
    }

    pub fn remove(&mut self, key: &K) {
        if let Some(previous) = self.tracked.remove(key) {
            self.by_weight.remove(&previous);
        }
    }

    pub fn clear(&mut self) {
        self.tracked.clear();
        self.by_weight.clear();
    }

    pub fn select_victim(&mut self, forbidden: Option<&K>) -> Option<K> {
        let mut iter = self.by_weight.iter();
        let (first_order, first_key) = iter.next()?;
        let (order, key) = if Some(first_key) == forbidden {
            let (o, k) = iter.next()?;
            (*o, k.clone())
        } else {
            (*first_order, first_key.clone())
        };
        self.by_weight.remove(&order);
        self.tracked.remove(&key);
        Some(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_largest_weight() {
        let mut weight = WeightPolicy::new();
        weight.touch(&"small", TouchContext { weight: 1, last_access: 0, now: 0 });
        weight.touch(&"big", TouchContext { weight: 100, last_access: 1, now: 1 });
        assert_eq!(weight.select_victim(None), Some("big"));
    }

    #[test]
    fn ties_broken_by_least_recent_access() {
        let mut weight = WeightPolicy::new();
        weight.touch(&"older", TouchContext { weight: 10, last_access: 0, now: 0 });
        weight.touch(&"newer", TouchContext { weight: 10, last_access: 100, now: 100 });
        assert_eq!(weight.select_victim(None), Some("older"));
    }
}
