//! Visited set for HNSW graph traversal.
//!
//! A bitset over node ids that remembers which 64-bit words it dirtied, so
//! `clear()` costs O(words touched) and the set can be reused across every
//! layer search of a query and across queries on the same thread.

#[derive(Debug, Default)]
pub struct VisitedSet {
    bits: Vec<u64>,
    touched: Vec<u32>,
}

impl VisitedSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            bits: vec![0u64; capacity.div_ceil(64)],
            touched: Vec::new(),
        }
    }

    /// Unmarks every id marked since the last clear.
    pub fn clear(&mut self) {
        for &word in &self.touched {
            self.bits[word as usize] = 0;
        }
        self.touched.clear();
    }

    /// Ensure capacity covers at least `cap` ids, growing if needed.
    pub fn ensure_capacity(&mut self, cap: usize) {
        let words = cap.div_ceil(64);
        if words > self.bits.len() {
            self.bits.resize(words, 0);
        }
    }

    /// Mark `id` as visited. Returns `true` if it was NOT previously visited.
    #[inline]
    pub fn insert(&mut self, id: u32) -> bool {
        let word = (id / 64) as usize;
        let mask = 1u64 << (id % 64);
        let slot = &mut self.bits[word];
        if *slot & mask != 0 {
            return false;
        }
        if *slot == 0 {
            self.touched.push(word as u32);
        }
        *slot |= mask;
        true
    }
}
