use super::*;

fn handle(frame: u64, slot: u32) -> TimestampHandle {
    TimestampHandle { frame, slot }
}

#[test]
fn test_allocate_respects_budget() {
    let mut pool = TimestampPool::new(4, 2);
    pool.begin_frame(0);
    assert_eq!(pool.allocate(0), Some(0));
    assert_eq!(pool.allocate(0), Some(1));
    assert_eq!(pool.allocate(0), None);
    assert_eq!(pool.count(0), 2);
}

#[test]
fn test_allocate_for_unknown_frame() {
    let mut pool = TimestampPool::new(4, 8);
    assert_eq!(pool.allocate(3), None);
}

#[test]
fn test_pending_until_frame_completed() {
    let mut pool = TimestampPool::new(4, 8);
    pool.begin_frame(5);
    let slot = pool.allocate(5).unwrap();

    assert_eq!(pool.lookup(handle(5, slot), None, 1.0), TimestampResult::Pending);
    assert_eq!(pool.lookup(handle(5, slot), Some(4), 1.0), TimestampResult::Pending);
    // Completed but not read back yet
    assert_eq!(pool.lookup(handle(5, slot), Some(5), 1.0), TimestampResult::Pending);
}

#[test]
fn test_ready_after_resolve() {
    let mut pool = TimestampPool::new(4, 8);
    pool.begin_frame(1);
    pool.allocate(1);
    pool.allocate(1);
    assert_eq!(pool.unresolved(1), vec![(1, 2)]);

    pool.resolve(1, vec![Some(1_000), Some(3_500)]);
    assert!(pool.unresolved(1).is_empty());

    let start = pool.lookup(handle(1, 0), Some(1), 2.0);
    let end = pool.lookup(handle(1, 1), Some(1), 2.0);
    assert_eq!(start, TimestampResult::Ready(Duration::from_nanos(2_000)));
    assert_eq!(TimestampResult::elapsed(start, end), Some(Duration::from_nanos(5_000)));
}

#[test]
fn test_unwritten_slot_is_invalid() {
    let mut pool = TimestampPool::new(4, 8);
    pool.begin_frame(0);
    pool.allocate(0);
    pool.resolve(0, vec![None]);
    assert_eq!(pool.lookup(handle(0, 0), Some(0), 1.0), TimestampResult::Invalid);
}

#[test]
fn test_slot_beyond_allocation_is_invalid() {
    let mut pool = TimestampPool::new(4, 8);
    pool.begin_frame(0);
    pool.allocate(0);
    assert_eq!(pool.lookup(handle(0, 1), Some(0), 1.0), TimestampResult::Invalid);
}

#[test]
fn test_frame_older_than_history_is_invalid() {
    let mut pool = TimestampPool::new(4, 8);
    pool.begin_frame(0);
    pool.allocate(0);
    pool.resolve(0, vec![Some(10)]);
    assert!(pool.lookup(handle(0, 0), Some(0), 1.0).is_ready());

    for frame in 1..=4 {
        pool.begin_frame(frame);
    }
    // Frame 4 reused the slot of frame 0
    assert_eq!(pool.lookup(handle(0, 0), Some(4), 1.0), TimestampResult::Invalid);
}

#[test]
fn test_future_frame_is_invalid() {
    let mut pool = TimestampPool::new(4, 8);
    pool.begin_frame(2);
    assert_eq!(pool.lookup(handle(9, 0), Some(2), 1.0), TimestampResult::Invalid);
}
