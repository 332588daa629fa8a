use std::sync::{Arc, Mutex};
use std::thread;

use hematite::buffer::lru_k_replacer::LruKReplacer;

#[test]
fn sample_test() {
    let mut replacer = LruKReplacer::new(7, 2);

    // Scenario: add six frames to the replacer. We have [1,2,3,4,5].
    // Frame 6 is non-evictable.
    for frame_id in 1..=6 {
        replacer.record_access(frame_id);
    }
    for frame_id in 1..=5 {
        replacer.set_evictable(frame_id, true);
    }
    replacer.set_evictable(6, false);
    assert_eq!(replacer.size(), 5);

    // Record an access for frame 1. Now frame 1 has two accesses total; all
    // other frames have infinite backward k-distance. The eviction order is
    // [2,3,4,5,1].
    replacer.record_access(1);

    assert_eq!(replacer.evict(), Some(2));
    assert_eq!(replacer.evict(), Some(3));
    assert_eq!(replacer.evict(), Some(4));
    assert_eq!(replacer.size(), 2);

    // Insert new frames 3 and 4, and update the access history for 5.
    replacer.record_access(3);
    replacer.record_access(4);
    replacer.record_access(5);
    replacer.record_access(4);
    replacer.set_evictable(3, true);
    replacer.set_evictable(4, true);
    assert_eq!(replacer.size(), 4);

    // Frame 3 only has one access, so it has infinite backward k-distance.
    assert_eq!(replacer.evict(), Some(3));
    assert_eq!(replacer.size(), 3);

    // Frame 6's single old access gives it the maximum backward k-distance.
    replacer.set_evictable(6, true);
    assert_eq!(replacer.size(), 4);
    assert_eq!(replacer.evict(), Some(6));
    assert_eq!(replacer.size(), 3);

    // Pinning frame 1 leaves [5,4]; 5's second-most-recent access is older.
    replacer.set_evictable(1, false);
    assert_eq!(replacer.size(), 2);
    assert_eq!(replacer.evict(), Some(5));
    assert_eq!(replacer.size(), 1);

    // Fresh accesses for frame 1 make frame 4 the older of the two.
    replacer.record_access(1);
    replacer.record_access(1);
    replacer.set_evictable(1, true);
    assert_eq!(replacer.size(), 2);
    assert_eq!(replacer.evict(), Some(4));
    assert_eq!(replacer.size(), 1);

    assert_eq!(replacer.evict(), Some(1));
    assert_eq!(replacer.size(), 0);

    // Evicting from an empty replacer fails and does not change the size.
    assert_eq!(replacer.evict(), None);
    assert_eq!(replacer.size(), 0);
}

#[test]
fn set_evictable_test() {
    let mut replacer = LruKReplacer::new(7, 2);

    replacer.set_evictable(0, true);
    replacer.set_evictable(1, true);
    replacer.set_evictable(2, true);
    replacer.set_evictable(3, true);
    assert_eq!(replacer.size(), 4);

    replacer.set_evictable(0, false);
    replacer.set_evictable(1, false);
    replacer.set_evictable(2, false);
    assert_eq!(replacer.size(), 1);

    // set_evictable is idempotent.
    replacer.set_evictable(0, true);
    replacer.set_evictable(0, true);
    replacer.set_evictable(0, true);
    assert_eq!(replacer.size(), 2);
}

#[test]
fn evict_infinite_test() {
    let mut replacer = LruKReplacer::new(7, 2);
    replacer.record_access(0);
    replacer.record_access(1);
    replacer.record_access(2);

    replacer.set_evictable(0, true);
    replacer.set_evictable(1, true);
    replacer.set_evictable(2, true);
    replacer.set_evictable(3, true);

    replacer.record_access(3);
    replacer.record_access(3);
    replacer.record_access(3);

    assert_eq!(replacer.size(), 4);

    // Frame 3 has a full history; everything else is infinite, so the
    // earliest-accessed infinite frame goes first.
    assert_eq!(replacer.evict(), Some(0));
    assert_eq!(replacer.size(), 3);
}

#[test]
fn evict_after_k_test() {
    let mut replacer = LruKReplacer::new(10, 3);

    for frame_id in [1, 2, 3, 4, 1, 2, 3, 1, 2] {
        replacer.record_access(frame_id);
    }
    replacer.set_evictable(1, true);
    replacer.set_evictable(2, true);
    replacer.set_evictable(3, true);
    replacer.set_evictable(4, true);

    // Frames 3 and 4 lack k accesses; 3 was first touched earlier.
    assert_eq!(replacer.evict(), Some(3));
}

#[test]
fn remove_test() {
    let mut replacer = LruKReplacer::new(7, 2);
    replacer.set_evictable(0, true);
    replacer.set_evictable(1, true);
    replacer.set_evictable(2, true);
    replacer.set_evictable(3, true);
    assert_eq!(replacer.size(), 4);

    replacer.record_access(0);
    replacer.record_access(0);
    replacer.record_access(0);

    replacer.remove(0);
    assert_eq!(replacer.size(), 3);

    replacer.set_evictable(0, true);
    replacer.record_access(0);
    assert_eq!(replacer.size(), 4);

    // Removing a frame the replacer has never seen is a silent no-op.
    replacer.remove(6);
    assert_eq!(replacer.size(), 4);
}

#[test]
#[should_panic(expected = "non-evictable")]
fn remove_non_evictable_panics() {
    let mut replacer = LruKReplacer::new(7, 2);
    replacer.record_access(0);
    replacer.set_evictable(0, false);
    replacer.remove(0);
}

#[test]
#[should_panic(expected = "invalid frame id")]
fn record_access_out_of_range_panics() {
    let mut replacer = LruKReplacer::new(7, 2);
    replacer.record_access(7);
}

#[test]
fn big_evict_test() {
    let mut replacer = LruKReplacer::new(1000, 3);

    for i in 0..1000 {
        replacer.record_access(i);
        replacer.set_evictable(i, true);
    }
    for i in 250..1000 {
        replacer.record_access(i);
    }
    for i in 500..1000 {
        replacer.record_access(i);
    }
    for i in 750..1000 {
        replacer.record_access(i);
    }

    for i in 250..500 {
        replacer.set_evictable(i, false);
    }
    for i in 0..100 {
        replacer.remove(i);
    }

    // Infinite-k frames leave in first-access order.
    for i in 100..250 {
        assert_eq!(replacer.evict(), Some(i));
    }
    // Then the frames whose k-th most recent access is oldest.
    for i in 500..600 {
        assert_eq!(replacer.evict(), Some(i));
    }

    for i in 250..500 {
        replacer.set_evictable(i, true);
    }
    for i in 600..750 {
        replacer.record_access(i);
        replacer.record_access(i);
    }

    // The re-enabled frames only ever saw two accesses, so they are the
    // infinite-k set again.
    for i in 250..500 {
        assert_eq!(replacer.evict(), Some(i));
    }
}

#[test]
fn concurrent_access_test() {
    let replacer = Arc::new(Mutex::new(LruKReplacer::new(10, 2)));

    let mut handles = vec![];
    for i in 0..10 {
        let replacer = Arc::clone(&replacer);
        handles.push(thread::spawn(move || {
            let mut replacer = replacer.lock().unwrap();
            replacer.record_access(i);
            replacer.set_evictable(i, true);
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let mut replacer = replacer.lock().unwrap();
    assert_eq!(replacer.size(), 10);
    for _ in 0..10 {
        assert!(replacer.evict().is_some());
    }
    assert_eq!(replacer.size(), 0);
}
