//! Snapshot: the state a persistence layer needs to rebuild a `KeyArray`.
//!
//! The container commits to no file format; `Snapshot` derives serde's
//! traits so callers can pick one.

use crate::error::Result;
use crate::key_array::KeyArray;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot<T> {
    pub name: String,
    pub low: usize,
    pub high: usize,
    pub growth_enabled: bool,
    pub queue_enabled: bool,
    /// Present `(key, value)` pairs in ascending key order.
    pub entries: Vec<(usize, T)>,
    /// Overflow queue contents, oldest first.
    pub queue: Vec<T>,
}

impl<T: Clone> KeyArray<T> {
    /// Capture keys, values, queue and configuration. A migration in
    /// progress is not captured; restoring re-arms growth from scratch.
    pub fn snapshot(&self) -> Snapshot<T> {
        Snapshot {
            name: self.name().to_owned(),
            low: self.low(),
            high: self.high(),
            growth_enabled: self.is_growth_enabled(),
            queue_enabled: self.is_queue_enabled(),
            entries: self.iter().map(|(k, v)| (k, v.clone())).collect(),
            queue: self.queue().iter().cloned().collect(),
        }
    }
}

impl<T> KeyArray<T> {
    /// Rebuild from a snapshot. Fails if the range is invalid or an entry is
    /// out of range or duplicated.
    pub fn from_snapshot(snapshot: Snapshot<T>) -> Result<Self> {
        let Snapshot {
            name,
            low,
            high,
            growth_enabled,
            queue_enabled,
            entries,
            queue,
        } = snapshot;

        let mut array = KeyArray::from_entries(low, high, entries)?;
        array.set_name(name);
        let q = array.queue_mut();
        queue.into_iter().for_each(|v| q.push(v));
        if queue_enabled {
            q.enable();
        }
        if growth_enabled {
            array.enable_growth()?;
        }
        debug!(
            name = array.name(),
            live = array.len(),
            queued = array.queue_len(),
            "restored from snapshot"
        );
        Ok(array)
    }
}
