//! Least-recently-used eviction, backed by [`super::list::OrderedKeyList`].

use std::hash::Hash;

use super::list::OrderedKeyList;
use super::TouchContext;

pub(crate) struct LruPolicy<K: Eq + Hash + Clone> {
    list: OrderedKeyList<K>,
}

impl<K: Eq + Hash + Clone> LruPolicy<K> {
    pub fn new() -> Self {
        LruPolicy {
            list: OrderedKeyList::new(),
        }
    }

    pub fn touch(&mut self, key: &K, _ctx: TouchContext) {
        self.list.move_to_back(key);
    }

    pub fn remove(&mut self, key: &K) {
        self.list.remove(key);
    }

    pub fn clear(&mut self) {
        self.list.clear();
    }

    pub fn select_victim(&mut self, forbidden: Option<&K>) -> Option<K> {
        let candidate = match self.list.front() {
            None => return None,
            Some(f) if Some(f) == forbidden => self.list.second_from_front().cloned(),
            Some(f) => Some(f.clone()),
        }?;
        self.list.remove(&candidate);
        Some(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_least_recently_touched() {
        let mut lru = LruPolicy::new();
        let ctx = TouchContext { weight: 1, last_access: 0, now: 0 };
        lru.touch(&"a", ctx);
        lru.touch(&"b", ctx);
        lru.touch(&"c", ctx);
        lru.touch(&"a", ctx); // "a" becomes most recent
        assert_eq!(lru.select_victim(None), Some("b"));
    }

    #[test]
    fn skips_forbidden_key() {
        let mut lru = LruPolicy::new();
        let ctx = TouchContext { weight: 1, last_access: 0, now: 0 };
        lru.touch(&"a", ctx);
        lru.touch(&"b", ctx);
        assert_eq!(lru.select_victim(Some(&"a")), Some("b"));
    }
}
