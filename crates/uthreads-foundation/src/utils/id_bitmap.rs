//! Fixed-capacity set of small integer ids, backed by an array of u64s.

use alloc::vec;
use alloc::vec::Vec;

/// Tracks which ids in `[0, capacity)` are taken. Freed ids are handed out
/// again lowest-first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdBitmap {
    capacity: usize,
    bits: Vec<u64>,
}

impl IdBitmap {
    /// Returns a bitmap with every id free.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            bits: vec![0u64; capacity.div_ceil(64)],
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of ids currently taken.
    pub fn taken(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_full(&self) -> bool {
        self.taken() == self.capacity
    }

    /// Returns whether `id` is taken. Out-of-range ids are never taken.
    pub fn contains(&self, id: usize) -> bool {
        if id >= self.capacity {
            return false;
        }
        self.bits[id / 64] & (1u64 << (id % 64)) != 0
    }

    /// Marks `id` as taken.
    ///
    /// # Panics
    /// Panics if `id` is outside the bitmap.
    pub fn insert(&mut self, id: usize) {
        assert!(
            id < self.capacity,
            "cannot insert {} into IdBitmap of capacity {}",
            id,
            self.capacity
        );
        self.bits[id / 64] |= 1u64 << (id % 64);
    }

    /// Frees `id`. Returns whether it was taken.
    pub fn remove(&mut self, id: usize) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.bits[id / 64] &= !(1u64 << (id % 64));
        true
    }

    /// Takes and returns the lowest free id, or None if every id is taken.
    pub fn allocate_lowest(&mut self) -> Option<usize> {
        let id = self
            .bits
            .iter()
            .enumerate()
            .find(|(_, w)| **w != u64::MAX)
            .map(|(i, w)| i * 64 + (!*w).trailing_zeros() as usize)
            .filter(|id| *id < self.capacity)?;
        self.insert(id);
        Some(id)
    }

    /// Iterates over taken ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.capacity).filter(move |id| self.contains(*id))
    }
}
