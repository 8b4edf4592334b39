//! Fixed-capacity accumulation buffer for one record type
//!
//! A `Line<T>` is a boxed slice of uninitialized slots plus an atomic
//! cursor. Writers claim slots with a bounded `fetch_update` so two writers
//! never receive the same index and the cursor never runs past capacity.
//!
//! # Visibility
//!
//! The cursor is advanced *before* the claimed slot is written. A reader
//! therefore cannot trust `[0, cursor)` on its own; it must also know that
//! every writer which claimed a slot has finished its store. Inside the
//! engine that knowledge comes from the per-generation writer counter.
//! Outside the engine, [`Line::drain`] takes `&mut self`, which proves it.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::ptr;
use std::slice;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam::utils::CachePadded;

use crate::error::InvalidCapacity;

/// Fixed-capacity, append-only buffer
pub struct Line<T> {
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
    /// Next free slot; never exceeds `slots.len()`
    cursor: CachePadded<AtomicUsize>,
}

// SAFETY: records are moved in from writer threads (T: Send) and handed to
// consumers as `&[T]` from the flush thread or pool workers (T: Sync).
// Slot indices are unique per claim, so no two threads write the same slot.
unsafe impl<T: Send> Send for Line<T> {}
unsafe impl<T: Send + Sync> Sync for Line<T> {}

impl<T> Line<T> {
    /// Allocate a line with `capacity` slots
    ///
    /// Capacity must be a non-zero power of two.
    pub fn new(capacity: usize) -> Result<Self, InvalidCapacity> {
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(InvalidCapacity(capacity));
        }

        let slots = (0..capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect();

        Ok(Self {
            slots,
            cursor: CachePadded::new(AtomicUsize::new(0)),
        })
    }

    /// Claim the next slot and store `record` in it
    ///
    /// Returns the slot index, or hands the record back if the line is full.
    /// Nothing is written on failure.
    #[inline]
    pub fn push(&self, record: T) -> Result<usize, T> {
        let capacity = self.slots.len();
        let claimed = self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cursor| {
                (cursor < capacity).then_some(cursor + 1)
            });

        match claimed {
            Ok(index) => {
                // SAFETY: `index < capacity` and the successful update makes
                // this call the only claimant of `index` until the next reset.
                unsafe { (*self.slots[index].get()).write(record) };
                Ok(index)
            }
            Err(_) => Err(record),
        }
    }

    /// Number of claimed slots
    #[inline]
    pub fn len(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() == self.slots.len()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// View the written records
    pub fn as_slice(&mut self) -> &[T] {
        let len = *self.cursor.get_mut();
        // SAFETY: `&mut self` rules out concurrent writers, so every slot
        // below the cursor holds a fully written record.
        unsafe { slice::from_raw_parts(self.first_slot(), len) }
    }

    /// Move out the written records in slot order and reset the line
    pub fn drain(&mut self) -> Vec<T> {
        let len = *self.cursor.get_mut();
        let mut records = Vec::with_capacity(len);
        for slot in &mut self.slots[..len] {
            // SAFETY: initialized (below the cursor), and the cursor is reset
            // below so the value is never read or dropped again.
            records.push(unsafe { slot.get_mut().assume_init_read() });
        }
        *self.cursor.get_mut() = 0;
        records
    }

    /// Drop the written records and reset the cursor
    pub fn clear(&mut self) {
        let len = *self.cursor.get_mut();
        // SAFETY: exclusive access, prefix initialized
        unsafe { self.drop_prefix(len) };
    }

    /// Hand the written records to `f`, then drop them and reset
    ///
    /// If `f` panics the line keeps its records and its cursor; they are
    /// dropped with the line.
    ///
    /// # Safety
    ///
    /// No thread may push into this line for the duration of the call, and
    /// every push that claimed a slot must happen-before this call.
    pub unsafe fn consume<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        let len = self.len();
        // SAFETY: caller guarantees the prefix is fully written and that
        // nobody mutates it while `f` runs.
        let records = unsafe { slice::from_raw_parts(self.first_slot(), len) };
        let result = f(records);
        // SAFETY: `records` is no longer borrowed; caller still holds the
        // drain barrier.
        unsafe { self.drop_prefix(len) };
        result
    }

    #[inline]
    fn first_slot(&self) -> *mut T {
        UnsafeCell::raw_get(self.slots.as_ptr()).cast::<T>()
    }

    /// # Safety
    ///
    /// `[0, len)` must be initialized and unobserved by other threads.
    unsafe fn drop_prefix(&self, len: usize) {
        // Reset first so a panicking destructor cannot cause a double drop
        self.cursor.store(0, Ordering::Release);
        if std::mem::needs_drop::<T>() {
            // SAFETY: forwarded from the caller
            unsafe { ptr::drop_in_place(ptr::slice_from_raw_parts_mut(self.first_slot(), len)) };
        }
    }
}

impl<T> Drop for Line<T> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T> std::fmt::Debug for Line<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Line")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
#[path = "line_test.rs"]
mod line_test;
