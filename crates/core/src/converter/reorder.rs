//! Reordering buffer for out-of-order worker completion.
//!
//! Workers finish batches in any order; the accumulator must merge them in
//! the order they were handed to the converter so records of one resource
//! never swap places.

use std::collections::VecDeque;

/// Releases items in sequence order.
///
/// Items can be inserted with any sequence number at or after the next one
/// to release. `try_pop_next` only yields an item once every earlier
/// sequence number has been released.
#[derive(Debug)]
pub(crate) struct ReorderBuffer<T> {
    /// Sparse slots: index `i` holds sequence `next_seq + i`.
    slots: VecDeque<Option<T>>,
    next_seq: u64,
    count: usize,
}

impl<T> ReorderBuffer<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: VecDeque::new(),
            next_seq: 0,
            count: 0,
        }
    }

    /// Buffers an item under its sequence number.
    pub(crate) fn insert(&mut self, seq: u64, item: T) {
        debug_assert!(
            seq >= self.next_seq,
            "Sequence number {seq} already released (next {})",
            self.next_seq
        );
        let index = (seq - self.next_seq) as usize;
        while self.slots.len() <= index {
            self.slots.push_back(None);
        }
        debug_assert!(self.slots[index].is_none(), "Duplicate sequence number: {seq}");
        self.slots[index] = Some(item);
        self.count += 1;
    }

    /// Pops the next sequential item if it has arrived.
    pub(crate) fn try_pop_next(&mut self) -> Option<T> {
        match self.slots.front() {
            Some(Some(_)) => {
                self.next_seq += 1;
                self.count -= 1;
                self.slots.pop_front().flatten()
            }
            _ => None,
        }
    }

    /// Removes everything still buffered, in sequence order, skipping gaps.
    ///
    /// Returns the items and the number of missing sequence numbers skipped.
    pub(crate) fn drain_remaining(&mut self) -> (Vec<T>, usize) {
        let mut gaps = 0;
        let mut items = Vec::with_capacity(self.count);
        while let Some(slot) = self.slots.pop_front() {
            self.next_seq += 1;
            match slot {
                Some(item) => items.push(item),
                None => gaps += 1,
            }
        }
        self.count = 0;
        (items, gaps)
    }

    pub(crate) fn len(&self) -> usize {
        self.count
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.count == 0
    }
}
