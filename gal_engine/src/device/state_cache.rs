/// Deduplication of immutable state objects
///
/// Creating a state object whose descriptor equals a live one hands out the
/// existing handle and bumps its reference count. The native object is
/// released when the last reference is destroyed.

use std::hash::Hash;
use rustc_hash::FxHashMap;
use slotmap::{Key, SecondaryMap};

pub(crate) struct StateCache<D, H: Key> {
    by_desc: FxHashMap<D, H>,
    ref_counts: SecondaryMap<H, u32>,
}

impl<D: Eq + Hash + Clone, H: Key> StateCache<D, H> {
    pub(crate) fn new() -> Self {
        Self {
            by_desc: FxHashMap::default(),
            ref_counts: SecondaryMap::new(),
        }
    }

    /// Existing handle for `desc`, with one more reference
    pub(crate) fn acquire(&mut self, desc: &D) -> Option<H> {
        let handle = *self.by_desc.get(desc)?;
        if let Some(count) = self.ref_counts.get_mut(handle) {
            *count += 1;
        }
        Some(handle)
    }

    /// Register a freshly created state object with one reference
    pub(crate) fn insert(&mut self, desc: D, handle: H) {
        self.by_desc.insert(desc, handle);
        self.ref_counts.insert(handle, 1);
    }

    /// Drop one reference; returns true when it was the last one
    pub(crate) fn release(&mut self, handle: H, desc: &D) -> bool {
        match self.ref_counts.get_mut(handle) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            _ => {
                self.ref_counts.remove(handle);
                self.by_desc.remove(desc);
                true
            }
        }
    }

    pub(crate) fn ref_count(&self, handle: H) -> u32 {
        self.ref_counts.get(handle).copied().unwrap_or(0)
    }

    pub(crate) fn clear(&mut self) {
        self.by_desc.clear();
        self.ref_counts.clear();
    }
}

#[cfg(test)]
#[path = "state_cache_tests.rs"]
mod tests;
