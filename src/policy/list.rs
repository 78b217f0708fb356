//! Arena-backed intrusive doubly-linked list of keys.
//!
//! A bare key ordering structure shared by every list-based policy (LRU,
//! FIFO, FILO, and the window/probationary/protected segments of
//! Window-TinyLFU). Index-based links keep this safe: no `Rc<RefCell<_>>`
//! cycles, no unsafe pointer code.

use std::hash::Hash;

use ahash::RandomState;
use hashbrown::HashMap;

struct ListNode<K> {
    key: K,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Ordered list of keys with O(1) push/remove/move-to-back given a key.
pub(crate) struct OrderedKeyList<K> {
    index: HashMap<K, usize, RandomState>,
    nodes: Vec<Option<ListNode<K>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<K: Eq + Hash + Clone> OrderedKeyList<K> {
    pub fn new() -> Self {
        OrderedKeyList {
            index: HashMap::with_hasher(RandomState::new()),
            nodes: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Oldest entry (list head) without removing it.
    pub fn front(&self) -> Option<&K> {
        self.head.and_then(|idx| self.nodes[idx].as_ref()).map(|n| &n.key)
    }

    /// Most recently inserted/touched entry (list tail) without removing it.
    pub fn last(&self) -> Option<&K> {
        self.tail.and_then(|idx| self.nodes[idx].as_ref()).map(|n| &n.key)
    }

    /// The entry one hop more-recent than the head, without removing it.
    /// Used to skip a forbidden head candidate.
    pub fn second_from_front(&self) -> Option<&K> {
        let head = self.head?;
        let next = self.nodes[head].as_ref().expect("node exists").next?;
        self.nodes[next].as_ref().map(|n| &n.key)
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = {
            let node = self.nodes[idx].as_ref().expect("node exists");
            (node.prev, node.next)
        };
        match prev {
            Some(p) => self.nodes[p].as_mut().expect("node exists").next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].as_mut().expect("node exists").prev = prev,
            None => self.tail = prev,
        }
        if let Some(node) = self.nodes[idx].as_mut() {
            node.prev = None;
            node.next = None;
        }
    }

    fn attach_back(&mut self, idx: usize) {
        let tail = self.tail;
        if let Some(node) = self.nodes[idx].as_mut() {
            node.prev = tail;
            node.next = None;
        }
        match tail {
            Some(t) => self.nodes[t].as_mut().expect("node exists").next = Some(idx),
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
    }

    /// Inserts `key` at the tail if new; if already present, this is a no-op
    /// (callers wanting reorder-on-touch should call `move_to_back` instead).
    pub fn push_back(&mut self, key: K) {
        if self.index.contains_key(&key) {
            return;
        }
        let idx = self.free.pop().unwrap_or_else(|| {
            self.nodes.push(None);
            self.nodes.len() - 1
        });
        self.nodes[idx] = Some(ListNode {
            key: key.clone(),
            prev: None,
            next: None,
        });
        self.attach_back(idx);
        self.index.insert(key, idx);
        self.len += 1;
    }

    /// Moves an existing key to the tail (most-recently-used end). Inserts it
    /// if it wasn't tracked yet.
    pub fn move_to_back(&mut self, key: &K) {
        match self.index.get(key).copied() {
            Some(idx) => {
                if self.tail == Some(idx) {
                    return;
                }
                self.detach(idx);
                self.attach_back(idx);
            }
            None => self.push_back(key.clone()),
        }
    }

    pub fn remove(&mut self, key: &K) -> bool {
        match self.index.remove(key) {
            Some(idx) => {
                self.detach(idx);
                self.nodes[idx] = None;
                self.free.push(idx);
                self.len -= 1;
                true
            }
            None => false,
        }
    }

    pub fn pop_front(&mut self) -> Option<K> {
        let idx = self.head?;
        let key = self.nodes[idx].as_ref().expect("node exists").key.clone();
        self.remove(&key);
        Some(key)
    }

    pub fn clear(&mut self) {
        self.index.clear();
        self.nodes.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order_preserved_without_reorder() {
        let mut list = OrderedKeyList::new();
        list.push_back("a");
        list.push_back("b");
        list.push_back("c");
        assert_eq!(list.pop_front(), Some("a"));
        assert_eq!(list.pop_front(), Some("b"));
        assert_eq!(list.pop_front(), Some("c"));
        assert_eq!(list.pop_front(), None);
    }

    #[test]
    fn move_to_back_reorders_for_lru() {
        let mut list = OrderedKeyList::new();
        list.push_back("a");
        list.push_back("b");
        list.push_back("c");
        list.move_to_back(&"a");
        assert_eq!(list.front(), Some(&"b"));
        list.remove(&"b");
        assert_eq!(list.front(), Some(&"c"));
    }

    #[test]
    fn remove_updates_len_and_links() {
        let mut list = OrderedKeyList::new();
        list.push_back(1);
        list.push_back(2);
        list.push_back(3);
        assert!(list.remove(&2));
        assert_eq!(list.len(), 2);
        assert_eq!(list.pop_front(), Some(1));
        assert_eq!(list.pop_front(), Some(3));
    }
}
