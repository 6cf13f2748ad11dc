//! Error types for cache construction

use thiserror::Error;

/// Rejected cache level geometry
///
/// The level size must be a non-zero multiple of `block_size *
/// associativity` so that the set count is integral and at least one. A
/// rejected reconfiguration leaves the previous level in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CacheConfigError {
    /// Geometry with a zero dimension or a non-integral set count
    #[error(
        "invalid cache geometry: {size} bytes with {block_size}-byte blocks, {associativity}-way"
    )]
    BadGeometry {
        /// Level size in bytes
        size: usize,
        /// Block size in bytes
        block_size: usize,
        /// Lines per set
        associativity: usize,
    },
}
