//! ResizeController: copy-on-insert doubling of the key range.
//!
//! While growth is enabled the controller keeps a shadow store and a shadow
//! allocator of twice the active range. Every successful insertion migrates
//! one more source slot into the shadow (`step`), and every mutation the
//! container performs is mirrored into the shadow at the same index, so by
//! the time the active allocator runs dry the shadow is a complete copy and
//! can be swapped in without a bulk pause.
//!
//! Invariants while migrating:
//! - Source indices `< cursor` are mirrored in the shadow, except those
//!   queued in `resync` (mutated in place after they were copied).
//! - The shadow allocator's fresh keys start at the old range length; the
//!   lower half's issued flags follow the source store's presence flags.
//! - Nothing is ever issued from the shadow allocator before handover.

use crate::error::{KeyArrayError, Result};
use crate::key_allocator::KeyAllocator;
use crate::slot_store::SlotStore;
use tracing::debug;

#[derive(Debug)]
struct Shadow<T> {
    store: SlotStore<T>,
    allocator: KeyAllocator,
    // Next source index to copy.
    cursor: usize,
    source_len: usize,
    // Source indices below the cursor whose mirror was invalidated.
    resync: Vec<usize>,
}

impl<T> Shadow<T> {
    fn is_complete(&self) -> bool {
        self.cursor >= self.source_len && self.resync.is_empty()
    }
}

impl<T: Clone> Shadow<T> {
    fn sync(&mut self, source: &SlotStore<T>, index: usize) {
        let present = self.store.sync_from(source, index);
        self.allocator.mirror(index, present);
    }

    fn step(&mut self, source: &SlotStore<T>) {
        if self.cursor < self.source_len {
            let index = self.cursor;
            self.sync(source, index);
            self.cursor += 1;
        } else if let Some(index) = self.resync.pop() {
            self.sync(source, index);
        }
    }
}

#[derive(Debug)]
enum State<T> {
    Idle,
    Migrating(Shadow<T>),
    // Growth was switched off without purging; kept but no longer in sync.
    Dormant(Shadow<T>),
}

#[derive(Debug)]
pub struct ResizeController<T> {
    enabled: bool,
    state: State<T>,
}

impl<T> Default for ResizeController<T> {
    fn default() -> Self {
        Self {
            enabled: false,
            state: State::Idle,
        }
    }
}

impl<T> ResizeController<T> {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// True while a shadow pair is being built or re-synced.
    pub fn is_migrating(&self) -> bool {
        matches!(&self.state, State::Migrating(sh) if !sh.is_complete())
    }

    /// True once the shadow pair is complete and waiting for handover.
    pub fn is_ready(&self) -> bool {
        matches!(&self.state, State::Migrating(sh) if sh.is_complete())
    }

    /// Capacity of the shadow store, if one is allocated and live.
    pub fn shadow_capacity(&self) -> Option<usize> {
        match &self.state {
            State::Migrating(sh) => Some(sh.store.capacity()),
            _ => None,
        }
    }

    /// Stop mirroring. With `purge` the shadow allocation is released,
    /// otherwise it is parked until growth is enabled again.
    pub fn disable(&mut self, purge: bool) {
        self.enabled = false;
        let state = std::mem::replace(&mut self.state, State::Idle);
        self.state = match state {
            State::Migrating(sh) | State::Dormant(sh) if !purge => State::Dormant(sh),
            _ => State::Idle,
        };
        debug!(purge, "growth disabled");
    }

    /// Allocate a fresh shadow pair for a source range starting at `low`
    /// with `len` keys. Fails with `Exhausted` if the doubled range does not
    /// fit in `usize` and with `InvalidRange` if it cannot be allocated; the
    /// current state is kept in both cases.
    pub fn arm(&mut self, low: usize, len: usize) -> Result<()> {
        let new_len = len.checked_mul(2).ok_or(KeyArrayError::Exhausted)?;
        let new_high = low
            .checked_add(new_len - 1)
            .ok_or(KeyArrayError::Exhausted)?;
        let store = SlotStore::try_new(new_len).map_err(|_| KeyArrayError::InvalidRange {
            low,
            high: new_high,
        })?;
        let allocator = KeyAllocator::with_watermark(low, new_len, len)?;
        self.state = State::Migrating(Shadow {
            store,
            allocator,
            cursor: 0,
            source_len: len,
            resync: Vec::new(),
        });
        debug!(low, old_high = low + len - 1, new_high, "growth armed");
        Ok(())
    }

    /// Turn growth on over the given source range. A shadow left over from
    /// an earlier enable is discarded, never resumed.
    pub fn enable(&mut self, low: usize, len: usize) -> Result<()> {
        if self.enabled {
            return Ok(());
        }
        self.arm(low, len)?;
        self.enabled = true;
        Ok(())
    }

    /// True when growth is on and a shadow pair exists.
    pub fn is_armed(&self) -> bool {
        self.enabled && matches!(self.state, State::Migrating(_))
    }

    fn shadow_mut(&mut self) -> Option<&mut Shadow<T>> {
        match &mut self.state {
            State::Migrating(sh) if self.enabled => Some(sh),
            _ => None,
        }
    }

    /// Mirror the release of `index` in the shadow pair.
    pub fn mirror_clear(&mut self, index: usize) {
        if let Some(sh) = self.shadow_mut() {
            sh.store.clear(index);
            sh.allocator.mirror(index, false);
        }
    }

    /// The source slot at `index` is about to be mutated in place. Its
    /// mirror, if already copied, is dropped and queued for re-sync.
    pub fn touch(&mut self, index: usize) {
        if let Some(sh) = self.shadow_mut() {
            if index < sh.cursor && sh.store.clear(index).is_some() {
                sh.resync.push(index);
            }
        }
    }

    /// Every source slot may change; copy the whole range again.
    pub fn restart(&mut self) {
        if let Some(sh) = self.shadow_mut() {
            sh.cursor = 0;
            sh.resync.clear();
        }
    }

    /// The source was emptied and rebound to `len` keys from `low`. Any
    /// shadow is stale; re-arm if growth is on, otherwise drop it.
    pub fn reset(&mut self, low: usize, len: usize) {
        if !self.enabled {
            self.state = State::Idle;
        } else if let Err(err) = self.arm(low, len) {
            self.state = State::Idle;
            debug!(%err, "cannot re-arm growth after reset");
        }
    }

    /// Swap the active pair for the completed shadow pair and re-arm for
    /// the next doubling. Fails with `NotReady` unless growth is enabled and
    /// the copy is complete; nothing changes in that case.
    pub fn handover(
        &mut self,
        store: &mut SlotStore<T>,
        allocator: &mut KeyAllocator,
    ) -> Result<()> {
        if !self.enabled {
            return Err(KeyArrayError::NotReady);
        }
        let shadow = match std::mem::replace(&mut self.state, State::Idle) {
            State::Migrating(sh) if sh.is_complete() => sh,
            other => {
                self.state = other;
                return Err(KeyArrayError::NotReady);
            }
        };
        debug_assert_eq!(shadow.store.len(), store.len());

        let old = std::mem::replace(allocator, shadow.allocator);
        allocator.absorb(old);
        *store = shadow.store;
        debug!(
            low = allocator.low(),
            high = allocator.high(),
            live = store.len(),
            "handover to resized storage"
        );

        if let Err(err) = self.arm(allocator.low(), store.capacity()) {
            debug!(%err, "cannot arm next growth cycle");
        }
        Ok(())
    }
}

impl<T: Clone> ResizeController<T> {
    /// Mirror a value just written at `index` of the source.
    pub fn mirror_write(&mut self, index: usize, value: &T) {
        if let Some(sh) = self.shadow_mut() {
            sh.store.write(index, value.clone());
            sh.allocator.mirror(index, true);
        }
    }

    /// One amortized unit of migration work.
    pub fn step(&mut self, source: &SlotStore<T>) {
        if let Some(sh) = self.shadow_mut() {
            sh.step(source);
        }
    }

    /// Run every remaining step now.
    pub fn drain(&mut self, source: &SlotStore<T>) {
        if let Some(sh) = self.shadow_mut() {
            while !sh.is_complete() {
                sh.step(source);
            }
        }
    }
}
