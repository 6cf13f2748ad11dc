//! Memlab Heap Allocators
//!
//! Two heap disciplines over a notional, metadata-only byte space:
//!
//! - **Block-list heap**: an address-ordered block list with first-fit,
//!   best-fit and worst-fit placement, splitting on allocation and eager
//!   coalescing on free
//! - **Buddy heap**: per-order free lists over a power-of-two region, with
//!   XOR buddy identification and recursive split/merge
//!
//! Both implement the [`Heap`] seam and share the same counter set, so a
//! driver can swap disciplines without changing how it allocates, frees,
//! dumps or reads statistics. No byte contents are stored or moved; the
//! allocators track placement metadata only.

pub mod block;
pub mod buddy;
pub mod error;
pub mod list;
pub mod stats;
pub mod traits;

pub use block::Block;
pub use buddy::BuddyHeap;
pub use error::HeapError;
pub use list::{ListHeap, Placement};
pub use stats::{AllocCounters, HeapStats};
pub use traits::{Allocation, Heap, HeapDump};
