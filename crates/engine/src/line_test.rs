//! Line tests
//!
//! Slot allocation, overflow, draining, and record destruction.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use proptest::prelude::*;

use crate::Line;
use crate::error::InvalidCapacity;

/// Record that counts its own destruction
#[derive(Debug)]
struct Tracked {
    id: u32,
    drops: Arc<AtomicUsize>,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

fn tracked(id: u32, drops: &Arc<AtomicUsize>) -> Tracked {
    Tracked {
        id,
        drops: Arc::clone(drops),
    }
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_new_rejects_bad_capacity() {
    assert_eq!(Line::<u8>::new(0).unwrap_err(), InvalidCapacity(0));
    assert_eq!(Line::<u8>::new(12).unwrap_err(), InvalidCapacity(12));
    assert!(Line::<u8>::new(1).is_ok());
    assert!(Line::<u8>::new(1024).is_ok());
}

#[test]
fn test_new_is_empty() {
    let line = Line::<u64>::new(16).unwrap();
    assert!(line.is_empty());
    assert!(!line.is_full());
    assert_eq!(line.len(), 0);
    assert_eq!(line.capacity(), 16);
}

// ============================================================================
// Push / overflow
// ============================================================================

#[test]
fn test_push_returns_slot_index() {
    let line = Line::new(4).unwrap();
    assert_eq!(line.push("a"), Ok(0));
    assert_eq!(line.push("b"), Ok(1));
    assert_eq!(line.len(), 2);
}

#[test]
fn test_push_past_capacity_keeps_prefix() {
    let mut line = Line::new(8).unwrap();
    for i in 0..8u32 {
        assert_eq!(line.push(i), Ok(i as usize));
    }
    assert!(line.is_full());

    // Overflowing hands the record back and leaves the cursor at capacity
    assert_eq!(line.push(8), Err(8));
    assert_eq!(line.push(9), Err(9));
    assert_eq!(line.len(), 8);

    assert_eq!(line.as_slice(), &[0, 1, 2, 3, 4, 5, 6, 7]);
}

#[test]
fn test_drain_resets_for_reuse() {
    let mut line = Line::new(2).unwrap();
    line.push(1).unwrap();
    line.push(2).unwrap();
    assert_eq!(line.drain(), vec![1, 2]);
    assert!(line.is_empty());

    line.push(3).unwrap();
    assert_eq!(line.drain(), vec![3]);
    assert_eq!(line.drain(), Vec::<i32>::new());
}

// ============================================================================
// Consume
// ============================================================================

#[test]
fn test_consume_hands_prefix_and_resets() {
    let line = Line::new(8).unwrap();
    line.push(String::from("x")).unwrap();
    line.push(String::from("y")).unwrap();

    // SAFETY: single-threaded test, no concurrent pushes
    let seen = unsafe { line.consume(|records| records.to_vec()) };
    assert_eq!(seen, vec!["x".to_string(), "y".to_string()]);
    assert!(line.is_empty());
}

#[test]
fn test_consume_panic_keeps_records() {
    let drops = Arc::new(AtomicUsize::new(0));
    let line = Line::new(4).unwrap();
    line.push(tracked(1, &drops)).unwrap();
    line.push(tracked(2, &drops)).unwrap();

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        // SAFETY: single-threaded test
        unsafe { line.consume(|_| panic!("consumer failed")) }
    }));
    assert!(result.is_err());
    assert_eq!(line.len(), 2);
    assert_eq!(drops.load(Ordering::SeqCst), 0);

    drop(line);
    assert_eq!(drops.load(Ordering::SeqCst), 2);
}

// ============================================================================
// Destruction
// ============================================================================

#[test]
fn test_records_dropped_exactly_once() {
    let drops = Arc::new(AtomicUsize::new(0));
    let line = Line::new(8).unwrap();
    for id in 0..5 {
        line.push(tracked(id, &drops)).unwrap();
    }

    // SAFETY: single-threaded test
    let ids = unsafe { line.consume(|records| records.iter().map(|r| r.id).collect::<Vec<_>>()) };
    assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    assert_eq!(drops.load(Ordering::SeqCst), 5);

    line.push(tracked(9, &drops)).unwrap();
    drop(line);
    assert_eq!(drops.load(Ordering::SeqCst), 6);
}

#[test]
fn test_rejected_record_not_dropped_by_line() {
    let drops = Arc::new(AtomicUsize::new(0));
    let mut line = Line::new(1).unwrap();
    line.push(tracked(0, &drops)).unwrap();

    let rejected = line.push(tracked(1, &drops)).unwrap_err();
    assert_eq!(rejected.id, 1);
    assert_eq!(drops.load(Ordering::SeqCst), 0);

    let drained = line.drain();
    assert_eq!(drops.load(Ordering::SeqCst), 0);
    drop(drained);
    drop(rejected);
    assert_eq!(drops.load(Ordering::SeqCst), 2);
}

// ============================================================================
// Concurrent writers
// ============================================================================

#[test]
fn test_concurrent_pushes_unique_slots() {
    const WRITERS: u64 = 8;
    const PER_WRITER: u64 = 512;

    let line = Arc::new(Line::new(4096).unwrap());
    let handles: Vec<_> = (0..WRITERS)
        .map(|w| {
            let line = Arc::clone(&line);
            thread::spawn(move || {
                for i in 0..PER_WRITER {
                    line.push(w * PER_WRITER + i).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut line = Arc::try_unwrap(line).unwrap();
    let records = line.drain();
    assert_eq!(records.len() as u64, WRITERS * PER_WRITER);

    let unique: HashSet<_> = records.iter().copied().collect();
    assert_eq!(unique.len(), records.len());
    assert_eq!(unique, (0..WRITERS * PER_WRITER).collect());
}

#[test]
fn test_concurrent_overflow_never_exceeds_capacity() {
    let line = Arc::new(Line::new(64).unwrap());
    let stored = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let line = Arc::clone(&line);
            let stored = Arc::clone(&stored);
            thread::spawn(move || {
                for i in 0..100u32 {
                    if line.push(i).is_ok() {
                        stored.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(stored.load(Ordering::Relaxed), 64);
    assert_eq!(line.len(), 64);
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_single_writer_drain_preserves_order(
        records in prop::collection::vec(any::<u32>(), 0..=256),
    ) {
        let mut line = Line::new(256).unwrap();
        for record in &records {
            prop_assert!(line.push(*record).is_ok());
        }
        prop_assert_eq!(line.drain(), records);
    }

    #[test]
    fn prop_overflow_keeps_first_capacity_records(
        shift in 0u32..6,
        extra in 1usize..32,
    ) {
        let capacity = 1usize << shift;
        let mut line = Line::new(capacity).unwrap();
        for i in 0..capacity + extra {
            let pushed = line.push(i);
            prop_assert_eq!(pushed.is_ok(), i < capacity);
        }
        let expected: Vec<usize> = (0..capacity).collect();
        prop_assert_eq!(line.as_slice(), expected.as_slice());
    }
}
