use super::*;
use crate::handle::SamplerStateHandle;
use slotmap::SlotMap;

#[test]
fn test_acquire_unknown_descriptor() {
    let mut cache: StateCache<u32, SamplerStateHandle> = StateCache::new();
    assert!(cache.acquire(&7).is_none());
}

#[test]
fn test_reference_counting() {
    let mut handles: SlotMap<SamplerStateHandle, ()> = SlotMap::with_key();
    let handle = handles.insert(());
    let mut cache = StateCache::new();

    cache.insert(7u32, handle);
    assert_eq!(cache.acquire(&7), Some(handle));
    assert_eq!(cache.ref_count(handle), 2);

    assert!(!cache.release(handle, &7));
    assert_eq!(cache.ref_count(handle), 1);
    assert!(cache.release(handle, &7));
    assert_eq!(cache.ref_count(handle), 0);

    // Released descriptors are no longer shared
    assert!(cache.acquire(&7).is_none());
}

#[test]
fn test_clear() {
    let mut handles: SlotMap<SamplerStateHandle, ()> = SlotMap::with_key();
    let handle = handles.insert(());
    let mut cache = StateCache::new();
    cache.insert(1u32, handle);
    cache.clear();
    assert!(cache.acquire(&1).is_none());
}
