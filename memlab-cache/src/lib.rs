//! Memlab Cache Hierarchy
//!
//! A multi-level CPU cache model operating at block granularity:
//!
//! - `level`: one set-associative cache level with LRU or FIFO replacement,
//!   dirty tracking (write-back) and write-allocate on misses
//! - `hierarchy`: three levels composed top-down with fixed latencies and
//!   Average-Memory-Access-Time accounting
//!
//! A miss installs the block only in the level that missed; there is no
//! refill of upper levels, no promotion and no inclusion invariant between
//! levels. Dirty evictions are counted, observable side effects; no backing
//! store exists.

pub mod error;
pub mod hierarchy;
pub mod level;

pub use error::CacheConfigError;
pub use hierarchy::{CacheHierarchy, LevelId, MemoryAccess};
pub use level::{AccessKind, CacheLevel, CachePolicy, LevelStats};
