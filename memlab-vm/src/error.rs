//! Error types for translator construction

use thiserror::Error;

/// Rejected translator geometry
///
/// Returned from construction only; a running translator has no error
/// paths. A rejected reconfiguration leaves the previous translator in
/// effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VmConfigError {
    /// Page size of zero bytes
    #[error("page size must be non-zero")]
    ZeroPageSize,
    /// Physical memory too small to hold a single frame
    #[error("physical memory of {physical} bytes holds no complete {page_size}-byte frame")]
    NoFrames {
        /// Configured physical memory in bytes
        physical: usize,
        /// Configured page size in bytes
        page_size: usize,
    },
}
