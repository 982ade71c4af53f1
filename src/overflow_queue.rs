//! OverflowQueue: unkeyed FIFO side channel for values that found no slot.

use std::collections::VecDeque;

/// Values accepted here are never assigned a key and are never moved into
/// the keyed store automatically; draining is up to the caller.
#[derive(Debug, Clone)]
pub struct OverflowQueue<T> {
    enabled: bool,
    pending: VecDeque<T>,
}

impl<T> Default for OverflowQueue<T> {
    fn default() -> Self {
        Self {
            enabled: false,
            pending: VecDeque::new(),
        }
    }
}

impl<T> OverflowQueue<T> {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Stop accepting values. Already queued values stay.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn push(&mut self, value: T) {
        self.pending.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Oldest value first.
    pub fn pop_front(&mut self) -> Option<T> {
        self.pending.pop_front()
    }

    /// Peek at every queued value in arrival order.
    pub fn iter(&self) -> std::collections::vec_deque::Iter<'_, T> {
        self.pending.iter()
    }

    pub fn drain(&mut self) -> std::collections::vec_deque::Drain<'_, T> {
        self.pending.drain(..)
    }
}
