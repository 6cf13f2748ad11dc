//! Address-ordered block-list heap
//!
//! The heap tracks its byte space as a contiguous, gap-free sequence of
//! blocks. Allocation scans the list in address order under the selected
//! placement discipline, splitting the chosen block when it is larger than
//! the request. Freeing marks the block free and eagerly merges adjacent
//! free neighbours, so two adjacent free blocks never persist.

use log::debug;

use crate::block::Block;
use crate::error::HeapError;
use crate::stats::{AllocCounters, HeapStats};
use crate::traits::{Allocation, Heap, HeapDump};

/// Placement discipline for the list heap
///
/// The three disciplines share the scan and split machinery and differ only
/// in which free candidate they select. Best and worst fit break ties by
/// address order (the scan visits blocks lowest address first and only a
/// strictly better candidate displaces the current one).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// First free block large enough
    FirstFit,
    /// Smallest free block large enough
    BestFit,
    /// Largest free block
    WorstFit,
}

impl Placement {
    /// Parse a placement name as used on the command line
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "first" => Some(Self::FirstFit),
            "best" => Some(Self::BestFit),
            "worst" => Some(Self::WorstFit),
            _ => None,
        }
    }
}

/// Block-list heap with pluggable placement
pub struct ListHeap {
    /// Total managed bytes
    total: usize,
    /// Blocks in address order; a gap-free cover of `[0, total)`
    blocks: Vec<Block>,
    /// Current placement discipline
    placement: Placement,
    /// Next id to assign; monotonically increasing from 1
    next_id: u32,
    /// Allocation counters
    counters: AllocCounters,
}

impl ListHeap {
    /// Create a heap managing `total` bytes as one free block
    #[must_use]
    pub fn new(total: usize, placement: Placement) -> Self {
        Self {
            total,
            blocks: vec![Block::free(0, total)],
            placement,
            next_id: 1,
            counters: AllocCounters::default(),
        }
    }

    /// Change the placement discipline; takes effect on the next allocation
    pub fn set_placement(&mut self, placement: Placement) {
        self.placement = placement;
    }

    /// Current placement discipline
    #[must_use]
    pub fn placement(&self) -> Placement {
        self.placement
    }

    /// Index of the free block the discipline selects for `size` bytes
    fn find_candidate(&self, size: usize) -> Option<usize> {
        let mut candidate: Option<usize> = None;
        let mut candidate_size = 0usize;

        for (idx, block) in self.blocks.iter().enumerate() {
            if !block.free || block.size < size {
                continue;
            }
            match self.placement {
                Placement::FirstFit => return Some(idx),
                Placement::BestFit => {
                    if candidate.is_none() || block.size < candidate_size {
                        candidate = Some(idx);
                        candidate_size = block.size;
                    }
                }
                Placement::WorstFit => {
                    if candidate.is_none() || block.size > candidate_size {
                        candidate = Some(idx);
                        candidate_size = block.size;
                    }
                }
            }
        }

        candidate
    }

    /// Merge adjacent free blocks, left to right
    ///
    /// After each merge the same position is reconsidered, so a run of free
    /// blocks collapses into one. Idempotent.
    fn coalesce(&mut self) {
        let mut idx = 0;
        while idx + 1 < self.blocks.len() {
            if self.blocks[idx].free && self.blocks[idx + 1].free {
                self.blocks[idx].size += self.blocks[idx + 1].size;
                self.blocks.remove(idx + 1);
            } else {
                idx += 1;
            }
        }
    }
}

impl Heap for ListHeap {
    fn allocate(&mut self, size: usize) -> Result<Allocation, HeapError> {
        self.counters.requests += 1;

        let idx = match self.find_candidate(size) {
            Some(idx) => idx,
            None => {
                self.counters.failures += 1;
                return Err(HeapError::OutOfMemory { requested: size });
            }
        };

        let id = self.next_id;
        self.next_id += 1;

        let chosen = &mut self.blocks[idx];
        chosen.free = false;
        chosen.id = id;

        // Split: the low `size` bytes become the allocation, the remainder
        // a new free block immediately after.
        if chosen.size > size {
            let remainder = Block::free(chosen.start + size, chosen.size - size);
            chosen.size = size;
            self.blocks.insert(idx + 1, remainder);
            debug!(
                "split block at {:#x}: {} bytes allocated, {} bytes free",
                self.blocks[idx].start, size, remainder.size
            );
        }

        self.counters.successes += 1;
        let addr = self.blocks[idx].start;
        debug!("allocated id {} at {:#x} ({} bytes)", id, addr, size);

        Ok(Allocation { id, addr, size })
    }

    fn deallocate(&mut self, id: u32) -> Result<(), HeapError> {
        let block = self
            .blocks
            .iter_mut()
            .find(|b| !b.free && b.id == id)
            .ok_or(HeapError::InvalidId(id))?;

        block.free = true;
        block.id = 0;
        self.counters.frees += 1;
        debug!("freed id {}", id);

        self.coalesce();
        Ok(())
    }

    fn dump(&self) -> HeapDump {
        HeapDump::Blocks(self.blocks.clone())
    }

    fn stats(&self) -> HeapStats {
        let mut used = 0;
        let mut free = 0;
        let mut used_blocks = 0;
        let mut free_blocks = 0;
        let mut largest_free_block = 0;

        for block in &self.blocks {
            if block.free {
                free += block.size;
                free_blocks += 1;
                largest_free_block = largest_free_block.max(block.size);
            } else {
                used += block.size;
                used_blocks += 1;
            }
        }

        HeapStats {
            total: self.total,
            used,
            free,
            used_blocks,
            free_blocks,
            largest_free_block,
            internal_fragmentation: 0,
            counters: self.counters,
        }
    }
}
