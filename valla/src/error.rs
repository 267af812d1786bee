//! Errors reported by the fallible table operations.
use thiserror::Error;

/// Reasons an insertion cannot proceed without resizing first.
///
/// The `try_*` operations return these instead of resizing on their own. The infallible
/// counterparts resize proactively and only panic on [`StoreError::IndexOverflow`], which cannot be
/// resolved by resizing.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum StoreError {
    /// The table has no growth left, it needs to be rehashed before inserting a new key.
    #[error("hash table capacity exhausted")]
    CapacityExhausted,
    /// The key needs more bits per part than the table currently reserves.
    #[error("key needs {required} bits per part but the table provides {available}")]
    WidthExceeded {
        /// Part width required by the key.
        required: u32,
        /// Part width of the table.
        available: u32,
    },
    /// A value or id does not fit into the index type or the largest supported part width.
    #[error("value {value} does not fit into {bits} bits")]
    IndexOverflow {
        /// The value that does not fit.
        value: u64,
        /// The number of bits available.
        bits: u32,
    },
}
