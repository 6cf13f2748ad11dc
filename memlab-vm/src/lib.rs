//! Memlab Virtual Memory Translator
//!
//! A paged virtual-to-physical translator with demand paging:
//!
//! - `policy`: FIFO and LRU page replacement
//! - `translator`: page table, frame-owner table and the translate path
//!
//! Frames are a flat, fixed-count pool indexed by frame number; the
//! translator allocates from it on a page fault and evicts a resident page
//! under the configured policy when the pool is exhausted. A monotonic
//! timer, advanced on every translation, is the sole source of order for
//! replacement decisions.

pub mod error;
pub mod policy;
pub mod translator;

pub use error::VmConfigError;
pub use policy::ReplacementPolicy;
pub use translator::{Translation, Translator, TranslatorConfig, VmStats};
