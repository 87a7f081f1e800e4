use std::collections::BTreeSet;

/// Bounded pool of `u32` indices into a fixed-size native pool
///
/// Backs query slots on every backend. Released indices are handed out
/// again lowest first, so live indices stay packed at the start of the
/// native pool.
#[derive(Debug)]
pub struct IndexPool {
    released: BTreeSet<u32>,
    /// Indices `0..fresh` have been handed out at least once
    fresh: u32,
    capacity: u32,
}

impl IndexPool {
    pub fn new(capacity: u32) -> Self {
        Self { released: BTreeSet::new(), fresh: 0, capacity }
    }

    /// Lowest free index, `None` when all `capacity` indices are taken
    pub fn acquire(&mut self) -> Option<u32> {
        if let Some(index) = self.released.pop_first() {
            return Some(index);
        }
        if self.fresh == self.capacity {
            return None;
        }
        self.fresh += 1;
        Some(self.fresh - 1)
    }

    pub fn release(&mut self, index: u32) {
        debug_assert!(index < self.fresh, "index {} was never acquired", index);
        let inserted = self.released.insert(index);
        debug_assert!(inserted, "index {} released twice", index);
    }

    /// Indices currently handed out
    pub fn in_use(&self) -> u32 {
        self.fresh - self.released.len() as u32
    }

    /// One past the highest index ever handed out
    pub fn high_water_mark(&self) -> u32 {
        self.fresh
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

#[cfg(test)]
#[path = "index_pool_tests.rs"]
mod tests;
