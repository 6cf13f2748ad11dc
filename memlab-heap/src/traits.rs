//! The allocator seam shared by the list and buddy heaps

use core::fmt;

use crate::block::Block;
use crate::error::HeapError;
use crate::stats::HeapStats;

/// A successful allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    /// Assigned block id; positive and never reused while the block is live
    pub id: u32,
    /// Start offset of the placed block in bytes
    pub addr: usize,
    /// Size of the placed block in bytes
    ///
    /// Equals the requested size for the list heap; rounded up to a power
    /// of two for the buddy heap.
    pub size: usize,
}

/// Human-readable map of a heap's current state
///
/// The two heap disciplines expose different shapes: the list heap is an
/// address-ordered block list, the buddy heap a set of per-order free lists.
#[derive(Debug, Clone)]
pub enum HeapDump {
    /// Address-ordered block list
    Blocks(Vec<Block>),
    /// Per-order free lists; `free_lists[k]` holds the start addresses of
    /// the free order-`k` blocks, in list order
    Orders {
        max_order: u32,
        free_lists: Vec<Vec<usize>>,
    },
}

impl fmt::Display for HeapDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blocks(blocks) => {
                writeln!(f, "--- memory map ---")?;
                for block in blocks {
                    let last = block.start + block.size.saturating_sub(1);
                    if block.free {
                        writeln!(
                            f,
                            "[{:#06x}-{:#06x}] FREE ({} bytes)",
                            block.start, last, block.size
                        )?;
                    } else {
                        writeln!(
                            f,
                            "[{:#06x}-{:#06x}] USED (id={}, {} bytes)",
                            block.start, last, block.id, block.size
                        )?;
                    }
                }
                write!(f, "------------------")
            }
            Self::Orders {
                max_order,
                free_lists,
            } => {
                writeln!(f, "--- buddy free lists ---")?;
                for order in (0..=*max_order).rev() {
                    write!(f, "order {:2} ({} bytes): ", order, 1usize << order)?;
                    match free_lists.get(order as usize) {
                        Some(list) if !list.is_empty() => {
                            for addr in list {
                                write!(f, "[free @ {:#x}] ", addr)?;
                            }
                        }
                        _ => write!(f, "[empty]")?,
                    }
                    writeln!(f)?;
                }
                write!(f, "------------------------")
            }
        }
    }
}

/// Capability set common to every heap discipline
///
/// The driver owns the current heap behind this trait and swaps
/// implementations wholesale when the allocator is changed.
pub trait Heap {
    /// Allocate `size` bytes, returning the assigned id and placement
    fn allocate(&mut self, size: usize) -> Result<Allocation, HeapError>;

    /// Free the allocation named by `id`
    fn deallocate(&mut self, id: u32) -> Result<(), HeapError>;

    /// Render the current heap map
    fn dump(&self) -> HeapDump;

    /// Snapshot state and counters
    fn stats(&self) -> HeapStats;
}
