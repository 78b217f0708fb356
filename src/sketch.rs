//! Count-min frequency sketch and the Window-TinyLFU admission filter.
//!
//! Four derived hashes index one counter array of saturating adds with
//! periodic decay, and a doorkeeper bloom filter gates the first sighting of
//! a key so singleton keys don't pollute the counters (Tiny-LFU paper
//! §3.4.2). Counters here are nibbles (4 bits) packed two-per-byte, keeping
//! the sketch at half a byte per counter.

use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU8, Ordering};

use ahash::RandomState;

const COUNTER_MAX: u8 = 15;
const HASH_COUNT: usize = 4;

/// How aggressively the cache tracks access frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrequencySketchMode {
    /// No frequency tracking. Only valid with policies that don't need it.
    None,
    /// Plain count-min sketch, four hash functions, 4-bit saturating counters.
    Basic,
    /// `Basic` plus a doorkeeper bloom filter gating first-time increments.
    Optimized,
}

/// Count-min sketch with 4-bit saturating counters packed two per byte.
///
/// Thread-safe via per-byte atomic compare-exchange; increments from
/// concurrent readers may race and lose an update, which is acceptable --
/// counts only need to be approximate and non-decreasing.
pub struct FrequencySketch {
    mode: FrequencySketchMode,
    width: usize,
    cells: Vec<AtomicU8>,
    hashers: [RandomState; HASH_COUNT],
    doorkeeper: Option<Doorkeeper>,
    additions: std::sync::atomic::AtomicU64,
    reset_at: u64,
}

impl FrequencySketch {
    /// `width` must be a power of two; callers pass
    /// `(8 * expected_capacity).next_power_of_two()`.
    pub fn new(mode: FrequencySketchMode, width: usize) -> Self {
        let width = width.max(8).next_power_of_two();
        let cells = (0..width.div_ceil(2)).map(|_| AtomicU8::new(0)).collect();
        let hashers = std::array::from_fn(|_| RandomState::new());
        let doorkeeper = match mode {
            FrequencySketchMode::Optimized => Some(Doorkeeper::new(width)),
            _ => None,
        };

        FrequencySketch {
            mode,
            width,
            cells,
            hashers,
            doorkeeper,
            additions: std::sync::atomic::AtomicU64::new(0),
            reset_at: width as u64,
        }
    }

    pub fn mode(&self) -> FrequencySketchMode {
        self.mode
    }

    fn positions<K: Hash>(&self, key: &K) -> [usize; HASH_COUNT] {
        std::array::from_fn(|i| {
            let mut hasher = self.hashers[i].build_hasher();
            key.hash(&mut hasher);
            (hasher.finish() as usize) & (self.width - 1)
        })
    }

    /// Returns the 4-bit counter at `index`, reading its packed byte.
    fn read(&self, index: usize) -> u8 {
        let byte = self.cells[index / 2].load(Ordering::Relaxed);
        if index % 2 == 0 {
            byte & 0x0F
        } else {
            byte >> 4
        }
    }

    /// Increments the 4-bit counter at `index`, saturating at 15. Returns
    /// `true` if the counter actually changed (wasn't already saturated).
    fn try_increment(&self, index: usize) -> bool {
        let cell = &self.cells[index / 2];
        let mut current = cell.load(Ordering::Relaxed);
        loop {
            let (shift, mask) = if index % 2 == 0 { (0u8, 0x0Fu8) } else { (4u8, 0xF0u8) };
            let value = (current & mask) >> shift;
            if value >= COUNTER_MAX {
                return false;
            }
            let updated = (current & !mask) | (((value + 1) << shift) & mask);
            match cell.compare_exchange_weak(
                current,
                updated,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Records one access of `key`, aging the whole sketch if the configured
    /// increment threshold has been crossed.
    pub fn increment<K: Hash>(&self, key: &K) {
        if matches!(self.mode, FrequencySketchMode::None) {
            return;
        }

        let positions = self.positions(key);

        let should_bump = match &self.doorkeeper {
            // Optimized mode: first sighting only flips the doorkeeper bit;
            // the counter only moves once the doorkeeper already saw it.
            Some(door) => door.contains_or_insert(&positions),
            None => true,
        };

        if should_bump {
            for p in positions {
                self.try_increment(p);
            }
        }

        let seen = self.additions.fetch_add(1, Ordering::Relaxed) + 1;
        if seen >= self.reset_at {
            self.age();
        }
    }

    /// Minimum counter across the key's four positions, plus one if the
    /// doorkeeper has already seen the key (Tiny-LFU §3.4.2).
    pub fn frequency<K: Hash>(&self, key: &K) -> u8 {
        if matches!(self.mode, FrequencySketchMode::None) {
            return 0;
        }
        let positions = self.positions(key);
        let base = positions.iter().map(|&p| self.read(p)).min().unwrap_or(0);
        match &self.doorkeeper {
            Some(door) if door.contains(&positions) => base.saturating_add(1),
            _ => base,
        }
    }

    /// Halves every counter and clears the doorkeeper. Called automatically
    /// once `W` increments have been recorded, and by the cache's periodic
    /// maintenance sweep.
    pub fn age(&self) {
        for cell in &self.cells {
            let mut current = cell.load(Ordering::Relaxed);
            loop {
                // Halve both packed nibbles independently (right shift by 1).
                let lo = (current & 0x0F) >> 1;
                let hi = ((current & 0xF0) >> 4) >> 1;
                let next = lo | (hi << 4);
                match cell.compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed) {
                    Ok(_) => break,
                    Err(actual) => current = actual,
                }
            }
        }
        self.additions.store(0, Ordering::Relaxed);
        if let Some(door) = &self.doorkeeper {
            door.clear();
        }
    }

    pub fn clear(&self) {
        for cell in &self.cells {
            cell.store(0, Ordering::Relaxed);
        }
        self.additions.store(0, Ordering::Relaxed);
        if let Some(door) = &self.doorkeeper {
            door.clear();
        }
    }
}

/// Single-bit-per-slot bloom filter gating a count-min sketch's first
/// increment, per Tiny-LFU §3.4.2. Sized to the same width as the sketch.
struct Doorkeeper {
    bits: Vec<AtomicU8>,
    mask: usize,
}

impl Doorkeeper {
    fn new(width: usize) -> Self {
        Doorkeeper {
            bits: (0..width.div_ceil(8)).map(|_| AtomicU8::new(0)).collect(),
            mask: width - 1,
        }
    }

    fn bit(&self, position: usize) -> (usize, u8) {
        let position = position & self.mask;
        (position / 8, 1u8 << (position % 8))
    }

    fn contains(&self, positions: &[usize; HASH_COUNT]) -> bool {
        positions.iter().all(|&p| {
            let (byte, mask) = self.bit(p);
            self.bits[byte].load(Ordering::Relaxed) & mask != 0
        })
    }

    /// Sets all bits for `positions`. Returns whether they were *all*
    /// already set beforehand (i.e. this is not the key's first sighting).
    fn contains_or_insert(&self, positions: &[usize; HASH_COUNT]) -> bool {
        let mut all_set = true;
        for &p in positions {
            let (byte, mask) = self.bit(p);
            let previous = self.bits[byte].fetch_or(mask, Ordering::Relaxed);
            if previous & mask == 0 {
                all_set = false;
            }
        }
        all_set
    }

    fn clear(&self) {
        for b in &self.bits {
            b.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increments_and_reads_frequency() {
        let sketch = FrequencySketch::new(FrequencySketchMode::Basic, 64);
        for _ in 0..5 {
            sketch.increment(&"hot");
        }
        sketch.increment(&"cold");
        assert!(sketch.frequency(&"hot") >= sketch.frequency(&"cold"));
    }

    #[test]
    fn saturates_at_fifteen() {
        let sketch = FrequencySketch::new(FrequencySketchMode::Basic, 16);
        for _ in 0..64 {
            sketch.increment(&"k");
            if sketch.frequency(&"k") >= COUNTER_MAX {
                // aging may have reset it; just assert the ceiling holds
                assert!(sketch.frequency(&"k") <= COUNTER_MAX);
            }
        }
    }

    #[test]
    fn optimized_mode_requires_two_sightings_before_counting() {
        let sketch = FrequencySketch::new(FrequencySketchMode::Optimized, 64);
        sketch.increment(&"k");
        let after_first = sketch.frequency(&"k");
        sketch.increment(&"k");
        let after_second = sketch.frequency(&"k");
        assert!(after_second >= after_first);
    }

    #[test]
    fn none_mode_always_reports_zero() {
        let sketch = FrequencySketch::new(FrequencySketchMode::None, 64);
        sketch.increment(&"k");
        assert_eq!(sketch.frequency(&"k"), 0);
    }
}
