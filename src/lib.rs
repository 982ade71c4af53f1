//! key-array: an integer-keyed slot array with O(1) insert, remove and
//! lookup, free-list key recycling and incremental growth.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: array-speed access by integer key with map-like key reuse, and
//!   no hashing. Keys are direct slot indices offset by the range's low
//!   bound.
//! - Layers:
//!   - KeyAllocator: the only source of truth for which keys can be issued.
//!     Recycled keys are a LIFO stack on top of a monotonic watermark, so
//!     the occupied range stays dense. It tracks outstanding keys and
//!     refuses to take back a key it did not hand out.
//!   - SlotStore<T>: `Vec<Option<T>>` plus a live counter. Knows nothing
//!     about keys or allocation.
//!   - ResizeController<T>: builds a doubled shadow store/allocator pair one
//!     slot per insertion (copy-on-insert) and swaps it in when the active
//!     range runs out.
//!   - OverflowQueue<T>: FIFO side channel for values that found no key
//!     while growth is off.
//!   - KeyArray<T>: public surface wiring the layers together.
//!
//! Constraints
//! - Single-threaded and synchronous; every mutation takes `&mut self`.
//! - Worst-case O(1) for `insert`, `remove`, `get`, `contains_key`, except
//!   the insertion that triggers a handover while the shadow copy is still
//!   incomplete (it finishes the copy first) and `contains`, which scans.
//! - Failed operations leave every layer unchanged.
//!
//! Growth
//! - Enabling growth allocates a shadow pair of twice the active range whose
//!   allocator only issues keys from the new upper half. Inserts and removes
//!   are mirrored into the shadow; each insert also copies one more source
//!   slot. In-place mutation through `get_mut` or `swap` queues the slot for
//!   re-copy, and `iter_mut` restarts the copy.
//! - When the active allocator is exhausted the shadow pair becomes active
//!   and a new shadow of the doubled size is armed right away.
//! - Disabling growth stops mirroring. A later enable always starts a fresh
//!   shadow; a half-built one is never resumed.
//!
//! Notes and non-goals
//! - The overflow queue is never drained automatically; entries in it have
//!   no key.
//! - No file format: `Snapshot` carries the state and derives serde traits.
//! - Values are cloned into the shadow during growth, so insertion requires
//!   `T: Clone`.

pub mod error;
pub mod key_allocator;
mod key_array;
mod key_array_proptest;
pub mod overflow_queue;
mod resize;
pub mod slot_store;
mod snapshot;

// Public surface
pub use error::{KeyArrayError, Result};
pub use key_allocator::KeyAllocator;
pub use key_array::{KeyArray, KeyArrayBuilder, Placement, DEFAULT_CAPACITY};
pub use overflow_queue::OverflowQueue;
pub use slot_store::SlotStore;
pub use snapshot::Snapshot;
