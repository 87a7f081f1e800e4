//! Unit tests for the staging range allocator
//!
//! The allocator is pure bookkeeping, so no GPU is required.

use super::*;

const CHUNK: u64 = 64 * 1024;

fn allocator() -> StagingAllocator {
    let mut ranges = StagingAllocator::new();
    ranges.add_chunk(CHUNK);
    ranges
}

fn overlaps(a: &StagingRange, b: &StagingRange) -> bool {
    a.chunk == b.chunk && a.offset < b.end() && b.offset < a.end()
}

// ============================================================================
// ALIGNMENT
// ============================================================================

#[test]
fn test_allocation_respects_alignment() {
    let mut ranges = allocator();
    let _odd = ranges.try_allocate(1, 13).unwrap();
    let range = ranges.try_allocate(256, 4096).unwrap();
    assert_eq!(range.offset % 256, 0);
    assert!(range.size >= 4096);
}

#[test]
fn test_alignment_padding_stays_free() {
    let mut ranges = allocator();
    ranges.try_allocate(1, 4).unwrap();
    ranges.try_allocate(64, 64).unwrap();
    // The 60 bytes of padding can still serve a small request
    let small = ranges.try_allocate(4, 16).unwrap();
    assert_eq!(small.offset, 4);
}

#[test]
fn test_exhausted_chunk_reports_none() {
    let mut ranges = allocator();
    assert!(ranges.try_allocate(1, CHUNK).is_some());
    assert!(ranges.try_allocate(1, 1).is_none());

    let second = ranges.add_chunk(CHUNK);
    let range = ranges.try_allocate(1, 1).unwrap();
    assert_eq!(range.chunk, second);
}

// ============================================================================
// FRAME-STAMPED RECLAIM
// ============================================================================

#[test]
fn test_reclaimed_range_not_reused_before_completion() {
    let mut ranges = allocator();
    let first = ranges.try_allocate(256, 4096).unwrap();
    ranges.reclaim(first, 3);

    // Frame 3 still in flight: the next allocations must not overlap it
    for _ in 0..8 {
        let next = ranges.try_allocate(256, 4096).unwrap();
        assert!(!overlaps(&first, &next));
    }

    // Frame 2 completing is not enough
    assert_eq!(ranges.retire_completed(2), 0);
    assert_eq!(ranges.pending_count(), 1);
}

#[test]
fn test_retired_range_is_reused() {
    let mut ranges = allocator();
    let first = ranges.try_allocate(256, 4096).unwrap();
    ranges.reclaim(first, 0);
    assert_eq!(ranges.retire_completed(0), 1);

    let again = ranges.try_allocate(256, 4096).unwrap();
    assert_eq!(again, first);
}

#[test]
fn test_retire_coalesces_neighbours() {
    let mut ranges = allocator();
    let a = ranges.try_allocate(1, 1000).unwrap();
    let b = ranges.try_allocate(1, 1000).unwrap();
    let c = ranges.try_allocate(1, 1000).unwrap();
    ranges.reclaim(b, 1);
    ranges.reclaim(a, 1);
    ranges.reclaim(c, 2);

    ranges.retire_completed(1);
    assert_eq!(ranges.free_block_count(0), 2);

    ranges.retire_completed(2);
    assert_eq!(ranges.free_block_count(0), 1);
    assert_eq!(ranges.free_bytes(0), CHUNK);
}

#[test]
fn test_release_merges_both_sides() {
    let mut ranges = allocator();
    let a = ranges.try_allocate(1, 100).unwrap();
    let b = ranges.try_allocate(1, 100).unwrap();
    let _c = ranges.try_allocate(1, 100).unwrap();

    ranges.release(a);
    assert_eq!(ranges.free_block_count(0), 2);
    ranges.release(b);
    assert_eq!(ranges.free_block_count(0), 2);
    assert_eq!(ranges.free_bytes(0), CHUNK - 100);
    assert_eq!(ranges.chunk_size(0), CHUNK);
}
