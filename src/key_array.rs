//! KeyArray: composition root over the allocator, slot store, resize
//! controller and overflow queue.

use crate::error::{KeyArrayError, Result};
use crate::key_allocator::{span, KeyAllocator};
use crate::overflow_queue::OverflowQueue;
use crate::resize::ResizeController;
use crate::slot_store::{try_vec_with, SlotStore};
use core::fmt;
use core::marker::PhantomData;
use tracing::{debug, trace};

/// Key range used by `KeyArray::new()`: `[0, 99]`.
pub const DEFAULT_CAPACITY: usize = 100;

/// Where an inserted value ended up.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Placement {
    /// Stored under this key.
    Key(usize),
    /// No key was available; the value went to the overflow queue.
    Queued,
}

impl Placement {
    pub fn key(self) -> Option<usize> {
        match self {
            Placement::Key(k) => Some(k),
            Placement::Queued => None,
        }
    }
}

/// Integer-keyed container with O(1) insert, remove and lookup.
///
/// Keys are direct slot indices in `[low(), high()]`. Released keys are
/// reissued most-recent-first. When the range is full, `insert` grows the
/// range (if growth is enabled), queues the value (if the overflow queue is
/// enabled), or fails with `Exhausted`.
#[derive(Debug)]
pub struct KeyArray<T> {
    name: String,
    allocator: KeyAllocator,
    store: SlotStore<T>,
    resize: ResizeController<T>,
    queue: OverflowQueue<T>,
}

/// Configuration for a `KeyArray<T>`.
#[derive(Debug, Clone)]
pub struct KeyArrayBuilder<T> {
    name: String,
    bounds: Result<(usize, usize)>,
    growth: bool,
    overflow_queue: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Default for KeyArrayBuilder<T> {
    fn default() -> Self {
        Self {
            name: String::new(),
            bounds: Ok((0, DEFAULT_CAPACITY - 1)),
            growth: false,
            overflow_queue: false,
            _marker: PhantomData,
        }
    }
}

impl<T> KeyArrayBuilder<T> {
    /// Keys `[min(a, b), max(a, b)]`.
    pub fn range(mut self, a: usize, b: usize) -> Self {
        self.bounds = Ok((a.min(b), a.max(b)));
        self
    }

    /// Keys `[0, n - 1]`.
    pub fn capacity(mut self, n: usize) -> Self {
        self.bounds = n
            .checked_sub(1)
            .map(|high| (0, high))
            .ok_or_else(|| KeyArrayError::invalid_argument("capacity must be at least 1"));
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Double the key range instead of failing when it is full.
    pub fn growth(mut self, enabled: bool) -> Self {
        self.growth = enabled;
        self
    }

    /// Queue values that find no key instead of failing.
    pub fn overflow_queue(mut self, enabled: bool) -> Self {
        self.overflow_queue = enabled;
        self
    }

    /// Fails with `InvalidRange` if the range is inverted or its slots
    /// cannot be allocated.
    pub fn build(self) -> Result<KeyArray<T>> {
        let (low, high) = self.bounds?;
        let allocator = KeyAllocator::new(low, high)?;
        let store = SlotStore::try_new(allocator.len())
            .map_err(|_| KeyArrayError::InvalidRange { low, high })?;
        let mut array = KeyArray::from_parts(self.name, allocator, store);
        if self.overflow_queue {
            array.queue.enable();
        }
        if self.growth {
            array.enable_growth()?;
        }
        Ok(array)
    }
}

impl<T> Default for KeyArray<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> KeyArray<T> {
    /// Container over keys `[0, 99]`.
    pub fn new() -> Self {
        let allocator = KeyAllocator::with_len(0, DEFAULT_CAPACITY);
        Self::from_parts(String::new(), allocator, SlotStore::new(DEFAULT_CAPACITY))
    }

    pub fn builder() -> KeyArrayBuilder<T> {
        KeyArrayBuilder::default()
    }

    /// Container over keys `[0, n - 1]`.
    pub fn with_capacity(n: usize) -> Result<Self> {
        Self::builder().capacity(n).build()
    }

    /// Container over keys `[min(a, b), max(a, b)]`.
    pub fn with_range(a: usize, b: usize) -> Result<Self> {
        Self::builder().range(a, b).build()
    }

    fn from_parts(name: String, allocator: KeyAllocator, store: SlotStore<T>) -> Self {
        debug_assert_eq!(allocator.len(), store.capacity());
        Self {
            name,
            allocator,
            store,
            resize: ResizeController::default(),
            queue: OverflowQueue::default(),
        }
    }

    /// Rebuild a container over `[low, high]` holding exactly `entries`.
    ///
    /// Absent keys below the highest present key are reissued lowest first;
    /// keys above it are fresh. Growth and the overflow queue start disabled.
    pub fn from_entries<I>(low: usize, high: usize, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (usize, T)>,
    {
        let len = span(low, high)?;
        let range_error = || KeyArrayError::InvalidRange { low, high };
        let mut store = SlotStore::try_new(len).map_err(|_| range_error())?;
        for (key, value) in entries {
            let index = key
                .checked_sub(low)
                .filter(|&i| i < len)
                .ok_or(KeyArrayError::InvalidKey { key })?;
            if store.write(index, value).is_some() {
                return Err(KeyArrayError::invalid_argument(format!(
                    "duplicate entry for key {key}"
                )));
            }
        }
        let mut outstanding = try_vec_with(len, || false).map_err(|_| range_error())?;
        for (index, issued) in outstanding.iter_mut().enumerate() {
            *issued = store.is_present(index);
        }
        let allocator = KeyAllocator::from_outstanding(low, outstanding);
        debug!(low, high, live = store.len(), "rebuilt from entries");
        Ok(Self::from_parts(String::new(), allocator, store))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Lowest key of the current range.
    pub fn low(&self) -> usize {
        self.allocator.low()
    }

    /// Highest key of the current range (inclusive).
    pub fn high(&self) -> usize {
        self.allocator.high()
    }

    /// Number of keys in the current range.
    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    /// Keys that can still be issued without growing.
    pub fn available(&self) -> usize {
        self.allocator.available()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    fn index_of(&self, key: usize) -> Result<usize> {
        key.checked_sub(self.allocator.low())
            .filter(|&i| i < self.store.capacity())
            .ok_or(KeyArrayError::InvalidKey { key })
    }

    /// True iff `key` currently holds a value.
    pub fn contains_key(&self, key: usize) -> bool {
        self.index_of(key)
            .map(|i| self.store.is_present(i))
            .unwrap_or(false)
    }

    /// Linear scan for `value`.
    pub fn contains(&self, value: &T) -> bool
    where
        T: PartialEq,
    {
        self.store.contains_value(value)
    }

    pub fn get(&self, key: usize) -> Result<&T> {
        let index = self.index_of(key)?;
        self.store
            .get(index)
            .map_err(|_| KeyArrayError::InvalidKey { key })
    }

    pub fn get_mut(&mut self, key: usize) -> Result<&mut T> {
        let index = self.index_of(key)?;
        if !self.store.is_present(index) {
            return Err(KeyArrayError::InvalidKey { key });
        }
        self.resize.touch(index);
        self.store
            .get_mut(index)
            .map_err(|_| KeyArrayError::InvalidKey { key })
    }

    /// Remove the value under `key` and release the key for reuse.
    pub fn remove(&mut self, key: usize) -> Result<T> {
        let index = self.index_of(key)?;
        if !self.store.is_present(index) {
            return Err(KeyArrayError::InvalidKey { key });
        }
        self.allocator.push(key)?;
        let value = self
            .store
            .clear(index)
            .ok_or(KeyArrayError::InvalidKey { key })?;
        self.resize.mirror_clear(index);
        Ok(value)
    }

    /// Exchange the values stored under two present keys.
    pub fn swap(&mut self, a: usize, b: usize) -> Result<()> {
        if !self.contains_key(a) || !self.contains_key(b) {
            return Err(KeyArrayError::invalid_argument(format!(
                "cannot swap keys {a} and {b}: both must be present"
            )));
        }
        if a == b {
            return Ok(());
        }
        let (ia, ib) = (self.index_of(a)?, self.index_of(b)?);
        self.resize.touch(ia);
        self.resize.touch(ib);
        self.store.swap(ia, ib);
        Ok(())
    }

    /// Drop every value and queued entry and start over with the current
    /// key range. Growth stays enabled if it was.
    pub fn clear(&mut self) {
        let (low, len) = (self.allocator.low(), self.allocator.len());
        self.store.reset_all();
        self.allocator.clear();
        self.queue.clear();
        self.resize.reset(low, len);
    }

    /// Present `(key, value)` pairs in ascending key order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (usize, &T)> + '_ {
        let low = self.allocator.low();
        self.store.iter().map(move |(i, v)| (low + i, v))
    }

    pub fn iter_mut(&mut self) -> impl DoubleEndedIterator<Item = (usize, &mut T)> + '_ {
        let low = self.allocator.low();
        self.resize.restart();
        self.store.iter_mut().map(move |(i, v)| (low + i, v))
    }

    pub fn keys(&self) -> impl DoubleEndedIterator<Item = usize> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl DoubleEndedIterator<Item = &T> + '_ {
        self.iter().map(|(_, v)| v)
    }

    // Growth

    /// Start keeping a doubled shadow copy so a full range grows instead of
    /// failing. Fails with `Exhausted` if the doubled range overflows.
    pub fn enable_growth(&mut self) -> Result<()> {
        self.resize
            .enable(self.allocator.low(), self.allocator.len())
    }

    /// Stop growing. With `purge` the shadow copy is released immediately.
    pub fn disable_growth(&mut self, purge: bool) {
        self.resize.disable(purge);
    }

    pub fn is_growth_enabled(&self) -> bool {
        self.resize.is_enabled()
    }

    /// True while the shadow copy is still being built.
    pub fn is_resizing(&self) -> bool {
        self.resize.is_migrating()
    }

    /// True once the shadow copy is complete and can be switched to.
    pub fn is_resize_ready(&self) -> bool {
        self.resize.is_ready()
    }

    /// Capacity the container will have after the next handover.
    pub fn next_capacity(&self) -> Option<usize> {
        self.resize.shadow_capacity()
    }

    /// Hand over to the completed shadow copy now instead of waiting for the
    /// range to fill up. Fails with `NotReady` while the copy is incomplete.
    pub fn switch_to_resized(&mut self) -> Result<()> {
        self.resize.handover(&mut self.store, &mut self.allocator)
    }

    // Overflow queue

    pub fn enable_queue(&mut self) {
        self.queue.enable();
    }

    pub fn disable_queue(&mut self) {
        self.queue.disable();
    }

    pub fn is_queue_enabled(&self) -> bool {
        self.queue.is_enabled()
    }

    pub fn clear_queue(&mut self) {
        self.queue.clear();
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn queue(&self) -> &OverflowQueue<T> {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut OverflowQueue<T> {
        &mut self.queue
    }
}

impl<T: Clone> KeyArray<T> {
    /// Store `value` under a free key.
    ///
    /// On a full range this grows (growth enabled), queues the value
    /// (overflow queue enabled), or fails with `Exhausted`.
    pub fn insert(&mut self, value: T) -> Result<Placement> {
        if self.allocator.is_exhausted() {
            if self.resize.is_enabled() {
                self.grow()?;
            } else if self.queue.is_enabled() {
                self.queue.push(value);
                trace!(queued = self.queue.len(), "range full, value queued");
                return Ok(Placement::Queued);
            } else {
                trace!(
                    low = self.allocator.low(),
                    high = self.allocator.high(),
                    "range full"
                );
                return Err(KeyArrayError::Exhausted);
            }
        }

        let key = self.allocator.pop()?;
        let index = key - self.allocator.low();
        self.resize.mirror_write(index, &value);
        self.store.write(index, value);
        self.resize.step(&self.store);
        Ok(Placement::Key(key))
    }

    /// Copy one more slot into the shadow. `insert` already calls this.
    pub fn continue_copy_step(&mut self) {
        self.resize.step(&self.store);
    }

    fn grow(&mut self) -> Result<()> {
        if !self.resize.is_armed() {
            self.resize
                .arm(self.allocator.low(), self.allocator.len())?;
        }
        self.resize.drain(&self.store);
        self.resize.handover(&mut self.store, &mut self.allocator)
    }
}

impl<T: fmt::Display> fmt::Display for KeyArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyArray")?;
        if !self.name.is_empty() {
            write!(f, " {:?}", self.name)?;
        }
        write!(f, " (size: {}) [", self.len())?;
        for (n, (k, v)) in self.iter().enumerate() {
            if n > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k}: {v}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Invariant: keys are issued densely, a released key is reused before a
    /// fresh one, and a full range without fallbacks fails with `Exhausted`.
    #[test]
    fn reuse_then_exhaust() {
        let mut m = KeyArray::with_range(0, 2).unwrap();
        assert_eq!(m.insert("a").unwrap(), Placement::Key(0));
        assert_eq!(m.insert("b").unwrap(), Placement::Key(1));
        assert_eq!(m.insert("c").unwrap(), Placement::Key(2));
        assert_eq!(m.remove(1).unwrap(), "b");
        assert_eq!(m.insert("d").unwrap(), Placement::Key(1));
        assert_eq!(m.len(), 3);
        assert_eq!(m.insert("e"), Err(KeyArrayError::Exhausted));
        assert_eq!(m.len(), 3);
        assert_eq!(m.get(1), Ok(&"d"));
    }

    /// Invariant: with growth on, filling the range hands over to a doubled
    /// range on the next insert and keeps every earlier value.
    #[test]
    fn growth_hands_over_on_exhaustion() {
        let mut m = KeyArray::builder().range(0, 1).growth(true).build().unwrap();
        assert_eq!(m.insert("a").unwrap().key(), Some(0));
        assert_eq!(m.insert("b").unwrap().key(), Some(1));
        assert_eq!(m.high(), 1);
        assert_eq!(m.insert("c").unwrap().key(), Some(2));
        assert_eq!(m.high(), 3);
        assert_eq!(m.get(0), Ok(&"a"));
        assert_eq!(m.get(1), Ok(&"b"));
        assert_eq!(m.len(), 3);
        assert!(m.is_growth_enabled());
        assert!(m.is_resizing(), "next doubling is armed");
    }

    /// Invariant: keys are `low + index` and keys outside the range are invalid.
    #[test]
    fn offset_range_translates_keys() {
        let mut m = KeyArray::with_range(50, 40).unwrap();
        assert_eq!((m.low(), m.high()), (40, 50));
        let k = m.insert(7).unwrap().key().unwrap();
        assert_eq!(k, 40);
        assert!(m.contains_key(40));
        assert!(!m.contains_key(0));
        assert_eq!(m.get(39), Err(KeyArrayError::InvalidKey { key: 39 }));
        assert_eq!(m.remove(51), Err(KeyArrayError::InvalidKey { key: 51 }));
        assert_eq!(m.remove(41), Err(KeyArrayError::InvalidKey { key: 41 }));
    }

    /// Invariant: a removed key stays absent even after the migration that
    /// was running when it was removed completes.
    #[test]
    fn removal_during_migration_is_not_resurrected() {
        let mut m = KeyArray::builder().capacity(4).growth(true).build().unwrap();
        for v in 0..4 {
            m.insert(v).unwrap();
        }
        assert_eq!(m.remove(0).unwrap(), 0);
        m.insert(10).unwrap(); // reuses key 0
        assert_eq!(m.remove(2).unwrap(), 2);
        m.insert(20).unwrap(); // reuses key 2
        assert_eq!(m.remove(2).unwrap(), 20);
        m.insert(30).unwrap(); // reuses key 2
        m.remove(3).unwrap();
        m.insert(40).unwrap(); // reuses key 3
        assert_eq!(m.insert(50).unwrap().key(), Some(4));
        let all: Vec<_> = m.iter().map(|(k, v)| (k, *v)).collect();
        assert_eq!(all, vec![(0, 10), (1, 1), (2, 30), (3, 40), (4, 50)]);
    }

    /// Invariant: in-place edits made after a slot was copied survive handover.
    #[test]
    fn get_mut_after_copy_survives_handover() {
        let mut m = KeyArray::builder().capacity(2).growth(true).build().unwrap();
        m.insert(1).unwrap();
        m.insert(2).unwrap();
        *m.get_mut(0).unwrap() = 100;
        m.swap(0, 1).unwrap();
        m.insert(3).unwrap();
        assert_eq!(m.get(0), Ok(&2));
        assert_eq!(m.get(1), Ok(&100));
        for (_, v) in m.iter_mut() {
            *v += 1;
        }
        m.insert(4).unwrap();
        m.insert(5).unwrap();
        assert_eq!(m.high(), 7);
        let values: Vec<_> = m.values().copied().collect();
        assert_eq!(values, vec![3, 101, 4, 4, 5]);
    }

    #[test]
    fn manual_switch_requires_completed_copy() {
        let mut m = KeyArray::builder().capacity(3).build().unwrap();
        assert_eq!(m.switch_to_resized(), Err(KeyArrayError::NotReady));
        m.enable_growth().unwrap();
        m.insert('a').unwrap();
        assert!(m.is_resizing());
        assert_eq!(m.switch_to_resized(), Err(KeyArrayError::NotReady));
        m.continue_copy_step();
        m.continue_copy_step();
        assert!(!m.is_resizing());
        assert!(m.is_resize_ready());
        assert_eq!(m.next_capacity(), Some(6));
        m.switch_to_resized().unwrap();
        assert_eq!(m.high(), 5);
        // Unissued keys of the old range come before the new upper half.
        assert_eq!(m.insert('b').unwrap().key(), Some(1));
        assert_eq!(m.get(0), Ok(&'a'));
    }

    #[test]
    fn queue_absorbs_overflow() {
        let mut m = KeyArray::builder()
            .capacity(1)
            .overflow_queue(true)
            .build()
            .unwrap();
        assert_eq!(m.insert("a").unwrap(), Placement::Key(0));
        assert_eq!(m.insert("b").unwrap(), Placement::Queued);
        assert_eq!(m.insert("c").unwrap(), Placement::Queued);
        assert_eq!(m.queue_len(), 2);
        m.remove(0).unwrap();
        // No automatic promotion from the queue.
        assert!(m.is_empty());
        assert_eq!(m.queue_mut().pop_front(), Some("b"));
        m.disable_queue();
        m.insert("d").unwrap();
        assert_eq!(m.insert("e"), Err(KeyArrayError::Exhausted));
        assert_eq!(m.queue_len(), 1);
    }

    #[test]
    fn swap_requires_present_keys() {
        let mut m = KeyArray::with_capacity(3).unwrap();
        m.insert(1).unwrap();
        assert!(matches!(
            m.swap(0, 2),
            Err(KeyArrayError::InvalidArgument { .. })
        ));
        m.swap(0, 0).unwrap();
        assert_eq!(m.get(0), Ok(&1));
    }

    #[test]
    fn clear_resets_keys_and_queue() {
        let mut m = KeyArray::builder()
            .capacity(2)
            .overflow_queue(true)
            .name("pool")
            .build()
            .unwrap();
        m.insert(1).unwrap();
        m.insert(2).unwrap();
        m.remove(0).unwrap();
        m.insert(3).unwrap();
        m.insert(4).unwrap();
        m.clear();
        assert!(m.is_empty());
        assert_eq!(m.queue_len(), 0);
        assert_eq!(m.name(), "pool");
        assert_eq!(m.insert(5).unwrap().key(), Some(0));
    }

    #[test]
    fn from_entries_rebuilds_allocator() {
        let m = KeyArray::from_entries(10, 14, vec![(13, 'x'), (10, 'y')]).unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m.keys().collect::<Vec<_>>(), vec![10, 13]);
        let mut m = m;
        assert_eq!(m.insert('z').unwrap().key(), Some(11));
        assert_eq!(m.insert('z').unwrap().key(), Some(12));
        assert_eq!(m.insert('z').unwrap().key(), Some(14));

        assert!(matches!(
            KeyArray::from_entries(0, 1, vec![(0, 1), (0, 2)]),
            Err(KeyArrayError::InvalidArgument { .. })
        ));
        assert_eq!(
            KeyArray::from_entries(0, 1, vec![(2, 1)]).unwrap_err(),
            KeyArrayError::InvalidKey { key: 2 }
        );
    }

    #[test]
    fn display_lists_entries_in_key_order() {
        let mut m = KeyArray::with_capacity(4).unwrap();
        m.insert("x").unwrap();
        m.insert("y").unwrap();
        m.insert("z").unwrap();
        m.remove(1).unwrap();
        assert_eq!(m.to_string(), "KeyArray (size: 2) [0: x, 2: z]");
        m.set_name("tags");
        assert_eq!(m.to_string(), "KeyArray \"tags\" (size: 2) [0: x, 2: z]");
    }

    #[test]
    fn invalid_builder_ranges() {
        assert!(matches!(
            KeyArray::<u8>::with_capacity(0),
            Err(KeyArrayError::InvalidArgument { .. })
        ));
        assert!(matches!(
            KeyArray::<u8>::with_range(0, usize::MAX),
            Err(KeyArrayError::InvalidRange { .. })
        ));
    }

    /// Invariant: a range that fits in `usize` but cannot be allocated is
    /// rejected with `InvalidRange` by every constructor.
    #[test]
    fn unallocatable_ranges_are_rejected() {
        assert_eq!(
            KeyArray::<u8>::with_range(1, usize::MAX).unwrap_err(),
            KeyArrayError::InvalidRange { low: 1, high: usize::MAX }
        );
        assert_eq!(
            KeyArray::<u8>::from_entries(0, usize::MAX - 1, vec![]).unwrap_err(),
            KeyArrayError::InvalidRange { low: 0, high: usize::MAX - 1 }
        );
        assert!(matches!(
            KeyArray::<u8>::builder().capacity(usize::MAX).build(),
            Err(KeyArrayError::InvalidRange { .. })
        ));
    }
}
