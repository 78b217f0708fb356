//! Window-TinyLFU: a small LRU "window" admits all new entries; a segmented
//! "main" region (probationary + protected) holds the long-term population.
//! Admission from window into main is gated by a shared frequency sketch.
//!
//! Window candidate vs. main victim, frequency decides the winner, ties
//! favor the incumbent; admission filtering kept separate from the cache's
//! own cost-tracked storage.

use std::hash::Hash;
use std::sync::Arc;

use super::list::OrderedKeyList;
use super::TouchContext;
use crate::sketch::FrequencySketch;

/// Window is ~1% of shard capacity, rounded up to at least 1.
const WINDOW_RATIO: f64 = 0.01;
/// Within main, probationary:protected = 20:80.
const PROTECTED_RATIO: f64 = 0.80;

pub struct WindowTinyLfu<K: Eq + Hash + Clone> {
    window: OrderedKeyList<K>,
    probationary: OrderedKeyList<K>,
    protected: OrderedKeyList<K>,
    window_capacity: usize,
    main_capacity: usize,
    protected_capacity: usize,
    sketch: Arc<FrequencySketch>,
}

impl<K: Eq + Hash + Clone> WindowTinyLfu<K> {
    pub fn new(shard_capacity: u64, sketch: Arc<FrequencySketch>) -> Self {
        let shard_capacity = shard_capacity.max(1) as f64;
        let window_capacity = ((shard_capacity * WINDOW_RATIO).ceil() as usize).max(1);
        let main_capacity = (shard_capacity as usize).saturating_sub(window_capacity).max(1);
        let protected_capacity = ((main_capacity as f64 * PROTECTED_RATIO).ceil() as usize).max(1);

        WindowTinyLfu {
            window: OrderedKeyList::new(),
            probationary: OrderedKeyList::new(),
            protected: OrderedKeyList::new(),
            window_capacity,
            main_capacity,
            protected_capacity,
            sketch,
        }
    }

    pub fn touch(&mut self, key: &K, _ctx: TouchContext) {
        self.sketch.increment(key);

        if self.protected.contains(key) {
            self.protected.move_to_back(key);
        } else if self.probationary.contains(key) {
            self.probationary.remove(key);
            self.protected.move_to_back(key);
            self.demote_overflow();
        } else if self.window.contains(key) {
            self.window.move_to_back(key);
        } else {
            self.window.push_back(key.clone());
        }
    }

    /// Keeps the protected segment within its capacity by demoting its LRU
    /// end back to probationary whenever a hit promotes another key in.
    fn demote_overflow(&mut self) {
        while self.protected.len() > self.protected_capacity {
            if let Some(demoted) = self.protected.pop_front() {
                self.probationary.push_back(demoted);
            } else {
                break;
            }
        }
    }

    pub fn remove(&mut self, key: &K) {
        if !self.window.remove(key) && !self.probationary.remove(key) {
            self.protected.remove(key);
        }
    }

    pub fn clear(&mut self) {
        self.window.clear();
        self.probationary.clear();
        self.protected.clear();
    }

    /// Resolves window overflow against admission until an actual victim is
    /// found. Admitting a window candidate into main with room to spare
    /// frees no space by itself, so that step alone must never be mistaken
    /// for "nothing to evict" -- the loop keeps going until it finds a real
    /// victim or genuinely runs out of anything to examine.
    fn pick_victim(&mut self) -> Option<K> {
        loop {
            if self.window.len() > self.window_capacity {
                let candidate = self.window.pop_front()?;
                let main_len = self.probationary.len() + self.protected.len();

                if main_len < self.main_capacity {
                    // Main has genuine room: admit the candidate. Nothing
                    // was freed, so only stop here if both regions are now
                    // within budget; otherwise keep resolving.
                    self.probationary.push_back(candidate);
                    if self.window.len() <= self.window_capacity
                        && self.probationary.len() + self.protected.len() <= self.main_capacity
                    {
                        return None;
                    }
                    continue;
                }

                let main_victim = self.probationary.front().or_else(|| self.protected.front()).cloned();
                return Some(match main_victim {
                    // No incumbent to compete with: the candidate itself is
                    // the only thing there is to evict.
                    None => candidate,
                    Some(main_victim) => {
                        let candidate_freq = self.sketch.frequency(&candidate);
                        let victim_freq = self.sketch.frequency(&main_victim);
                        if candidate_freq > victim_freq {
                            self.probationary.remove(&main_victim);
                            self.protected.remove(&main_victim);
                            self.probationary.push_back(candidate);
                            main_victim
                        } else {
                            // Tie or candidate loses: retain incumbency.
                            candidate
                        }
                    }
                });
            }

            // Window within budget: only main being over its own capacity
            // calls for a direct eviction; otherwise there is nothing to do.
            let main_len = self.probationary.len() + self.protected.len();
            if main_len > self.main_capacity {
                return self.probationary.pop_front().or_else(|| self.protected.pop_front());
            }
            return None;
        }
    }

    pub fn select_victim(&mut self, forbidden: Option<&K>) -> Option<K> {
        let victim = self.pick_victim()?;

        if Some(&victim) == forbidden {
            // Can't evict the key that triggered this insert; put the
            // candidate back so no bookkeeping is lost and let the caller's
            // bound-enforcement loop stop for this round.
            if !self.probationary.contains(&victim) && !self.protected.contains(&victim) {
                self.window.push_back(victim);
            }
            return None;
        }

        Some(victim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sketch::FrequencySketchMode;

    fn sketch() -> Arc<FrequencySketch> {
        Arc::new(FrequencySketch::new(FrequencySketchMode::Basic, 256))
    }

    #[test]
    fn admits_into_main_while_room_remains() {
        let mut tlfu = WindowTinyLfu::new(100, sketch());
        let ctx = TouchContext { weight: 1, last_access: 0, now: 0 };
        tlfu.touch(&"a", ctx);
        // window_capacity is 1 at this size, so a second distinct key
        // pushes "a" out of the window and into competition with an empty
        // main -- it should be admitted without an eviction.
        tlfu.touch(&"b", ctx);
        assert_eq!(tlfu.select_victim(None), None);
    }

    #[test]
    fn retains_frequently_accessed_incumbent_over_cold_newcomer() {
        let sk = sketch();
        let mut tlfu = WindowTinyLfu::new(4, Arc::clone(&sk));
        let ctx = TouchContext { weight: 1, last_access: 0, now: 0 };

        // Warm up an incumbent key heavily so its sketch frequency is high.
        for _ in 0..10 {
            tlfu.touch(&"incumbent", ctx);
        }
        // Force it from window into main via subsequent admits.
        tlfu.touch(&"filler1", ctx);
        tlfu.touch(&"filler2", ctx);
        let _ = tlfu.select_victim(None);
        let _ = tlfu.select_victim(None);

        // A cold newcomer, touched once, should not win against a warm
        // incumbent once they actually compete.
        tlfu.touch(&"cold", ctx);
        tlfu.touch(&"cold2", ctx);
        // Regardless of which exact key is evicted, the heavily-touched
        // incumbent's sketch frequency must exceed the newcomer's.
        assert!(sk.frequency(&"incumbent") > sk.frequency(&"cold"));
    }

    #[test]
    fn always_yields_a_victim_when_forced_past_capacity() {
        // capacity 2 -> window_capacity 1, main_capacity 1: exactly the
        // shape that used to let a window-to-main admission stand in for an
        // eviction and report no victim while still over budget.
        let mut tlfu = WindowTinyLfu::new(2, sketch());
        let ctx = TouchContext { weight: 1, last_access: 0, now: 0 };
        tlfu.touch(&"a", ctx);
        tlfu.touch(&"b", ctx);
        tlfu.touch(&"c", ctx);
        assert!(tlfu.select_victim(None).is_some());
    }
}
