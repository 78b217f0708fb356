//! Least-frequently-used eviction: each key has an exact per-key frequency
//! counter (distinct from the approximate count-min sketch used by
//! Window-TinyLFU's admission filter) incremented on every touch. Ties are
//! broken by least-recent access.

use std::collections::BTreeMap;
use std::hash::Hash;

use ahash::RandomState;
use hashbrown::HashMap;

use super::TouchContext;

/// Ordering key: `(frequency, last_access, sequence)`, ascending -- the
/// smallest tuple is the least-frequently, then least-recently, used key.
/// `sequence` disambiguates exact ties and carries no meaning of its own.
type OrderKey = (u64, u64, u64);

struct Record {
    frequency: u64,
    order_key: OrderKey,
}

pub(crate) struct LfuPolicy<K: Eq + Hash + Clone> {
    next_seq: u64,
    tracked: HashMap<K, Record, RandomState>,
    by_frequency: BTreeMap<OrderKey, K>,
}

impl<K: Eq + Hash + Clone> LfuPolicy<K> {
    pub fn new() -> Self {
        LfuPolicy {
            next_seq: 0,
            tracked: HashMap::with_hasher(RandomState::new()),
            by_frequency: BTreeMap::new(),
        }
    }

    pub fn touch(&mut self, key: &K, ctx: TouchContext) {
        let frequency = match self.tracked.get(key) {
            Some(record) => {
                self.by_frequency.remove(&record.order_key);
                record.frequency.saturating_add(1)
            }
            None => 1,
        };
        let order_key = (frequency, ctx.last_access, self.next_seq);
        self.next_seq += 1;
        self.tracked.insert(key.clone(), Record { frequency, order_key });
        self.by_frequency.insert(order_key, key.clone());
    }

    pub fn remove(&mut self, key: &K) {
        if let Some(record) = self.tracked.remove(key) {
            self.by_frequency.remove(&record.order_key);
        }
    }

    pub fn clear(&mut self) {
        self.tracked.clear();
        self.by_frequency.clear();
    }

    pub fn select_victim(&mut self, forbidden: Option<&K>) -> Option<K> {
        let mut iter = self.by_frequency.iter();
        let (first_order, first_key) = iter.next()?;
        let (order, key) = if Some(first_key) == forbidden {
            let (o, k) = iter.next()?;
            (*o, k.clone())
        } else {
            (*first_order, first_key.clone())
        };
        self.by_frequency.remove(&order);
        self.tracked.remove(&key);
        Some(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_least_frequently_touched() {
        let mut lfu = LfuPolicy::new();
        let ctx = |t| TouchContext { weight: 1, last_access: t, now: t };
        lfu.touch(&"a", ctx(0));
        lfu.touch(&"a", ctx(1));
        lfu.touch(&"a", ctx(2));
        lfu.touch(&"b", ctx(3));
        assert_eq!(lfu.select_victim(None), Some("b"));
    }

    #[test]
    fn ties_broken_by_least_recent_access() {
        let mut lfu = LfuPolicy::new();
        let ctx = |t| TouchContext { weight: 1, last_access: t, now: t };
        lfu.touch(&"older", ctx(0));
        lfu.touch(&"newer", ctx(100));
        assert_eq!(lfu.select_victim(None), Some("older"));
    }
}
