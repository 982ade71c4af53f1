//! SlotStore: fixed-capacity slot array addressed by direct index.
//!
//! Each slot is an `Option<T>`; the discriminant is the validity flag, so a
//! read can never observe a value whose key was released. The live count is
//! maintained on every write/clear rather than recomputed.

use crate::error::{KeyArrayError, Result};
use std::collections::TryReserveError;

/// `len` elements produced by `fill`, reserving exactly once. Reports an
/// allocation that cannot be satisfied instead of aborting.
pub(crate) fn try_vec_with<T>(
    len: usize,
    fill: impl FnMut() -> T,
) -> core::result::Result<Vec<T>, TryReserveError> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)?;
    v.resize_with(len, fill);
    Ok(v)
}

#[derive(Debug, Clone)]
pub struct SlotStore<T> {
    slots: Vec<Option<T>>,
    live: usize,
}

impl<T> SlotStore<T> {
    /// Store with `capacity` empty slots.
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self { slots, live: 0 }
    }

    /// Like `new`, but fails instead of aborting when the slots cannot be
    /// allocated.
    pub fn try_new(capacity: usize) -> core::result::Result<Self, TryReserveError> {
        Ok(Self {
            slots: try_vec_with(capacity, || None)?,
            live: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    #[inline]
    pub fn is_present(&self, index: usize) -> bool {
        matches!(self.slots.get(index), Some(Some(_)))
    }

    /// Store `value` at `index`, replacing and returning any previous value.
    ///
    /// Panics if `index` is outside the store; callers obtain indices from
    /// the allocator paired with this store.
    pub fn write(&mut self, index: usize, value: T) -> Option<T> {
        let prev = self.slots[index].replace(value);
        if prev.is_none() {
            self.live += 1;
        }
        prev
    }

    /// Mark `index` absent and hand back its value, if it had one.
    pub fn clear(&mut self, index: usize) -> Option<T> {
        let prev = self.slots.get_mut(index)?.take();
        if prev.is_some() {
            self.live -= 1;
        }
        prev
    }

    pub fn get(&self, index: usize) -> Result<&T> {
        match self.slots.get(index) {
            Some(Some(v)) => Ok(v),
            _ => Err(KeyArrayError::InvalidKey { key: index }),
        }
    }

    pub fn get_mut(&mut self, index: usize) -> Result<&mut T> {
        match self.slots.get_mut(index) {
            Some(Some(v)) => Ok(v),
            _ => Err(KeyArrayError::InvalidKey { key: index }),
        }
    }

    /// Exchange the contents of two slots, present or not.
    pub fn swap(&mut self, a: usize, b: usize) {
        self.slots.swap(a, b);
    }

    /// Linear scan; not part of the constant-time surface.
    pub fn contains_value(&self, value: &T) -> bool
    where
        T: PartialEq,
    {
        self.slots.iter().flatten().any(|v| v == value)
    }

    /// Drop every value and mark all slots absent, keeping the capacity.
    pub fn reset_all(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
        self.live = 0;
    }

    /// Present `(index, value)` pairs in ascending index order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (usize, &T)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|v| (i, v)))
    }

    pub fn iter_mut(&mut self) -> impl DoubleEndedIterator<Item = (usize, &mut T)> + '_ {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, s)| s.as_mut().map(|v| (i, v)))
    }
}

impl<T: Clone> SlotStore<T> {
    /// Make slot `index` of `self` match slot `index` of `source`.
    /// Returns whether the slot is now present.
    pub(crate) fn sync_from(&mut self, source: &SlotStore<T>, index: usize) -> bool {
        match source.slots.get(index) {
            Some(Some(v)) => {
                self.write(index, v.clone());
                true
            }
            _ => {
                self.clear(index);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Invariant: `len()` tracks the number of present slots across writes,
    /// overwrites and clears.
    #[test]
    fn live_count_follows_presence() {
        let mut s: SlotStore<&str> = SlotStore::new(4);
        assert!(s.is_empty());
        assert_eq!(s.write(0, "a"), None);
        assert_eq!(s.write(2, "b"), None);
        assert_eq!(s.write(2, "c"), Some("b"));
        assert_eq!(s.len(), 2);
        assert_eq!(s.clear(2), Some("c"));
        assert_eq!(s.clear(2), None);
        assert_eq!(s.clear(99), None);
        assert_eq!(s.len(), 1);
        let counted = (0..s.capacity()).filter(|&i| s.is_present(i)).count();
        assert_eq!(counted, s.len());
    }

    #[test]
    fn reads_are_gated_by_presence_and_bounds() {
        let mut s = SlotStore::new(2);
        s.write(1, 10);
        assert_eq!(s.get(1), Ok(&10));
        assert_eq!(s.get(0), Err(KeyArrayError::InvalidKey { key: 0 }));
        assert_eq!(s.get(2), Err(KeyArrayError::InvalidKey { key: 2 }));
        *s.get_mut(1).unwrap() += 1;
        assert_eq!(s.get(1), Ok(&11));
        assert!(s.get_mut(5).is_err());
        assert!(!s.is_present(7));
    }

    #[test]
    fn contains_value_ignores_cleared_slots() {
        let mut s = SlotStore::new(3);
        s.write(0, "x".to_string());
        s.write(1, "y".to_string());
        s.clear(1);
        assert!(s.contains_value(&"x".to_string()));
        assert!(!s.contains_value(&"y".to_string()));
    }

    #[test]
    fn iteration_is_ascending_and_skips_holes() {
        let mut s = SlotStore::new(5);
        s.write(4, 'd');
        s.write(0, 'a');
        s.write(2, 'c');
        let seen: Vec<_> = s.iter().map(|(i, v)| (i, *v)).collect();
        assert_eq!(seen, vec![(0, 'a'), (2, 'c'), (4, 'd')]);
        for (_, v) in s.iter_mut() {
            *v = v.to_ascii_uppercase();
        }
        assert_eq!(s.get(2), Ok(&'C'));
    }

    #[test]
    fn unallocatable_store_is_an_error() {
        assert!(SlotStore::<u64>::try_new(usize::MAX).is_err());
        let s = SlotStore::<u64>::try_new(3).unwrap();
        assert_eq!(s.capacity(), 3);
        assert!(s.is_empty());
    }

    #[test]
    fn reset_all_keeps_capacity() {
        let mut s = SlotStore::new(3);
        s.write(0, 1);
        s.write(1, 2);
        s.reset_all();
        assert_eq!(s.capacity(), 3);
        assert_eq!(s.len(), 0);
        assert!(s.iter().next().is_none());
    }

    #[test]
    fn sync_from_copies_presence_and_value() {
        let mut src = SlotStore::new(2);
        let mut dst = SlotStore::new(4);
        src.write(0, 5);
        dst.write(1, 9);
        assert!(dst.sync_from(&src, 0));
        assert!(!dst.sync_from(&src, 1));
        assert_eq!(dst.get(0), Ok(&5));
        assert!(!dst.is_present(1));
        assert_eq!(dst.len(), 1);
    }
}
