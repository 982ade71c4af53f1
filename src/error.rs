//! Error type shared by every layer of the container.

use thiserror::Error;

/// Failures surfaced by `KeyArray` and its building blocks.
///
/// Every failing operation leaves the allocator, the store, the migration
/// state and the overflow queue exactly as they were before the call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyArrayError {
    /// No key is available and neither growth nor the overflow queue is enabled.
    #[error("no keys available")]
    Exhausted,

    /// The key is out of range or does not currently hold a value.
    #[error("invalid key: {key}")]
    InvalidKey { key: usize },

    /// A handover was requested before the shadow copy finished.
    #[error("resized storage is not ready")]
    NotReady,

    /// An argument was rejected, e.g. swapping with an absent key.
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// A key range could not be built.
    #[error("invalid key range [{low}, {high}]")]
    InvalidRange { low: usize, high: usize },
}

pub type Result<T> = core::result::Result<T, KeyArrayError>;

impl KeyArrayError {
    pub(crate) fn invalid_argument(reason: impl Into<String>) -> Self {
        KeyArrayError::InvalidArgument {
            reason: reason.into(),
        }
    }
}
