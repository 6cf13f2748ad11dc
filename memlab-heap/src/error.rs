//! Error types for the heap allocators

use thiserror::Error;

/// Errors that can occur during heap operations
///
/// Both errors are user-facing and non-fatal: the heap state is unchanged
/// when one is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HeapError {
    /// No free block can satisfy the request
    #[error("out of memory: cannot allocate {requested} bytes")]
    OutOfMemory {
        /// Size of the failed request in bytes
        requested: usize,
    },
    /// The id does not name a live allocation
    #[error("invalid block id {0}")]
    InvalidId(u32),
}
