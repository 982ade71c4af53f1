//! KeyAllocator: free-list key source for a fixed inclusive key range.
//!
//! Keys are handed out from a LIFO stack of recycled keys first and from a
//! monotonic watermark second, which keeps the occupied index range dense.
//! The allocator also remembers which keys are outstanding so a key that
//! was never issued, or was already returned, cannot be pushed back and
//! later handed to two owners.

use crate::error::{KeyArrayError, Result};
use crate::slot_store::try_vec_with;

/// Number of keys in the inclusive range `[low, high]`.
pub(crate) fn span(low: usize, high: usize) -> Result<usize> {
    if low > high {
        return Err(KeyArrayError::InvalidRange { low, high });
    }
    (high - low)
        .checked_add(1)
        .ok_or(KeyArrayError::InvalidRange { low, high })
}

#[derive(Debug, Clone)]
pub struct KeyAllocator {
    low: usize,
    // Offset (from `low`) of the next never-issued key.
    fresh: usize,
    // Offsets of released keys, most recent last.
    recycled: Vec<usize>,
    // One flag per key in range; true while the key is issued.
    outstanding: Vec<bool>,
}

impl KeyAllocator {
    /// Allocator over the inclusive range `[low, high]`. Fails with
    /// `InvalidRange` if the range is inverted or too large to track.
    pub fn new(low: usize, high: usize) -> Result<Self> {
        let len = span(low, high)?;
        Self::with_watermark(low, len, 0)
    }

    /// Allocator covering `len` keys from `low` whose fresh keys start at
    /// offset `first_fresh`. Offsets below it are neither issued nor
    /// recyclable until the owner mirrors their state in.
    pub(crate) fn with_watermark(low: usize, len: usize, first_fresh: usize) -> Result<Self> {
        debug_assert!(len > 0 && first_fresh <= len);
        let outstanding = try_vec_with(len, || false).map_err(|_| KeyArrayError::InvalidRange {
            low,
            high: low.saturating_add(len - 1),
        })?;
        Ok(Self {
            low,
            fresh: first_fresh,
            recycled: Vec::new(),
            outstanding,
        })
    }

    /// Allocator over `len` keys from `low` for ranges known to be small.
    /// Aborts on allocation failure like `vec!`.
    pub(crate) fn with_len(low: usize, len: usize) -> Self {
        Self {
            low,
            fresh: 0,
            recycled: Vec::new(),
            outstanding: vec![false; len],
        }
    }

    pub fn low(&self) -> usize {
        self.low
    }

    /// Inclusive upper bound of the key range.
    pub fn high(&self) -> usize {
        self.low + self.outstanding.len() - 1
    }

    pub fn len(&self) -> usize {
        self.outstanding.len()
    }

    /// Smallest key never issued in the current range. Equals `high() + 1`
    /// once the watermark is spent.
    pub fn next_fresh(&self) -> usize {
        self.low + self.fresh
    }

    /// Number of keys `pop` can still hand out.
    pub fn available(&self) -> usize {
        self.recycled.len() + (self.outstanding.len() - self.fresh)
    }

    /// True iff no key is available.
    pub fn is_exhausted(&self) -> bool {
        self.recycled.is_empty() && self.fresh == self.outstanding.len()
    }

    pub fn is_outstanding(&self, key: usize) -> bool {
        self.offset_of(key)
            .map(|o| self.outstanding[o])
            .unwrap_or(false)
    }

    fn offset_of(&self, key: usize) -> Option<usize> {
        key.checked_sub(self.low)
            .filter(|&o| o < self.outstanding.len())
    }

    /// Take an available key, preferring the most recently released one.
    pub fn pop(&mut self) -> Result<usize> {
        let offset = match self.recycled.pop() {
            Some(o) => o,
            None if self.fresh < self.outstanding.len() => {
                let o = self.fresh;
                self.fresh += 1;
                o
            }
            None => return Err(KeyArrayError::Exhausted),
        };
        self.outstanding[offset] = true;
        Ok(self.low + offset)
    }

    /// Return an outstanding key to the pool. Keys outside the range or not
    /// currently issued are rejected and the pool is left untouched.
    pub fn push(&mut self, key: usize) -> Result<()> {
        match self.offset_of(key) {
            Some(o) if self.outstanding[o] => {
                self.outstanding[o] = false;
                self.recycled.push(o);
                Ok(())
            }
            _ => Err(KeyArrayError::InvalidKey { key }),
        }
    }

    /// Forget every issued and recycled key and rebind to `[low, high]`.
    pub fn reset(&mut self, low: usize, high: usize) -> Result<()> {
        *self = Self::new(low, high)?;
        Ok(())
    }

    /// Forget every issued and recycled key, keeping the current range.
    pub fn clear(&mut self) {
        self.fresh = 0;
        self.recycled.clear();
        self.outstanding.fill(false);
    }

    /// Mirror the issued state of one offset from the allocator being
    /// migrated away from. Only used on shadow allocators.
    pub(crate) fn mirror(&mut self, offset: usize, issued: bool) {
        self.outstanding[offset] = issued;
    }

    /// Take over the free keys of `old`, the allocator this shadow replaces.
    ///
    /// The shadow has not issued anything yet, so its fresh watermark still
    /// sits at `old.len()`; the unissued tail of `old` is contiguous with it
    /// and the watermark can simply move down.
    pub(crate) fn absorb(&mut self, old: KeyAllocator) {
        debug_assert_eq!(self.low, old.low);
        debug_assert_eq!(self.fresh, old.outstanding.len());
        debug_assert!(self.recycled.is_empty());
        self.fresh = old.fresh;
        self.recycled = old.recycled;
    }

    /// Rebuild an allocator from the set of issued keys, given as a flag
    /// per offset. Gaps below the highest issued key become recyclable,
    /// lowest first; everything above it is fresh.
    pub(crate) fn from_outstanding(low: usize, outstanding: Vec<bool>) -> Self {
        let fresh = outstanding
            .iter()
            .rposition(|&issued| issued)
            .map_or(0, |last| last + 1);
        let recycled = (0..fresh).rev().filter(|&o| !outstanding[o]).collect();
        Self {
            low,
            fresh,
            recycled,
            outstanding,
        }
    }
}
