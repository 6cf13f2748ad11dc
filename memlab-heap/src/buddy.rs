//! Buddy heap over a power-of-two region
//!
//! Free space is kept in one list per order, where an order-`k` block spans
//! `2^k` bytes and starts on a `2^k` boundary. Allocation splits larger
//! blocks down to the requested order; freeing merges a block with its buddy
//! at `addr XOR 2^k` for as long as the buddy is free at the same order.
//!
//! List ordering is load-bearing: splits remove from the *front* of the
//! higher-order list and push both halves (low half first) to the *back* of
//! the lower-order list, and allocation pops from the *front* of the
//! requested order. This makes placement deterministic.

use std::collections::{HashMap, VecDeque};

use log::{debug, info};

use crate::error::HeapError;
use crate::stats::{AllocCounters, HeapStats};
use crate::traits::{Allocation, Heap, HeapDump};

/// Smallest block the heap will carve out, in bytes
const MIN_BLOCK: usize = 1;

/// Buddy heap with per-order free lists
pub struct BuddyHeap {
    /// Total managed bytes; always a power of two
    total: usize,
    /// `log2(total)`; the order of the whole region
    max_order: u32,
    /// `free_lists[k]` holds start addresses of free order-`k` blocks
    free_lists: Vec<VecDeque<usize>>,
    /// Live id -> start address
    id_to_addr: HashMap<u32, usize>,
    /// Allocated start address -> order
    addr_to_order: HashMap<usize, u32>,
    /// Live id -> originally requested size, for internal fragmentation
    requested: HashMap<u32, usize>,
    /// Next id to assign; monotonically increasing from 1
    next_id: u32,
    /// Allocation counters
    counters: AllocCounters,
}

impl BuddyHeap {
    /// Create a heap managing `size` bytes, rounded up to a power of two
    #[must_use]
    pub fn new(size: usize) -> Self {
        let total = size.max(MIN_BLOCK).next_power_of_two();
        if total != size {
            info!("buddy heap rounded from {} to {} bytes", size, total);
        }

        let max_order = total.trailing_zeros();
        let mut free_lists = vec![VecDeque::new(); max_order as usize + 1];
        free_lists[max_order as usize].push_back(0);
        info!(
            "buddy heap initialised: {} bytes, max order {}",
            total, max_order
        );

        Self {
            total,
            max_order,
            free_lists,
            id_to_addr: HashMap::new(),
            addr_to_order: HashMap::new(),
            requested: HashMap::new(),
            next_id: 1,
            counters: AllocCounters::default(),
        }
    }

    /// Total managed bytes after rounding
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Order of the whole region
    #[must_use]
    pub fn max_order(&self) -> u32 {
        self.max_order
    }

    /// Smallest order whose blocks hold at least `size` bytes
    fn order_for(size: usize) -> u32 {
        size.max(MIN_BLOCK).next_power_of_two().trailing_zeros()
    }

    fn fail(&mut self, requested: usize) -> HeapError {
        self.counters.failures += 1;
        HeapError::OutOfMemory { requested }
    }
}

impl Heap for BuddyHeap {
    fn allocate(&mut self, size: usize) -> Result<Allocation, HeapError> {
        self.counters.requests += 1;

        if size > self.total {
            return Err(self.fail(size));
        }
        let req_order = Self::order_for(size);

        // Smallest order >= req_order with a free block.
        let mut order = match (req_order..=self.max_order)
            .find(|&k| !self.free_lists[k as usize].is_empty())
        {
            Some(k) => k,
            None => return Err(self.fail(size)),
        };

        // Split down to the requested order, low half first.
        while order > req_order {
            let addr = match self.free_lists[order as usize].pop_front() {
                Some(addr) => addr,
                None => return Err(self.fail(size)),
            };
            order -= 1;
            let half = 1usize << order;
            self.free_lists[order as usize].push_back(addr);
            self.free_lists[order as usize].push_back(addr + half);
            debug!(
                "split order {} block at {:#x} into two order {} blocks",
                order + 1,
                addr,
                order
            );
        }

        let addr = match self.free_lists[req_order as usize].pop_front() {
            Some(addr) => addr,
            None => return Err(self.fail(size)),
        };

        let id = self.next_id;
        self.next_id += 1;
        self.id_to_addr.insert(id, addr);
        self.addr_to_order.insert(addr, req_order);
        self.requested.insert(id, size);
        self.counters.successes += 1;

        let block_size = 1usize << req_order;
        debug!(
            "allocated id {} at {:#x} (order {}, {} bytes)",
            id, addr, req_order, block_size
        );

        Ok(Allocation {
            id,
            addr,
            size: block_size,
        })
    }

    fn deallocate(&mut self, id: u32) -> Result<(), HeapError> {
        let addr = match self.id_to_addr.remove(&id) {
            Some(addr) => addr,
            None => return Err(HeapError::InvalidId(id)),
        };
        let mut order = match self.addr_to_order.remove(&addr) {
            Some(order) => order,
            None => return Err(HeapError::InvalidId(id)),
        };
        self.requested.remove(&id);
        debug!("freeing id {} at {:#x} (order {})", id, addr, order);

        // Merge with the buddy while it is free at the same order.
        let mut addr = addr;
        while order < self.max_order {
            let buddy = addr ^ (1usize << order);
            let list = &mut self.free_lists[order as usize];
            match list.iter().position(|&a| a == buddy) {
                Some(pos) => {
                    list.remove(pos);
                    debug!(
                        "merged {:#x} and {:#x} into order {} block",
                        addr,
                        buddy,
                        order + 1
                    );
                    addr = addr.min(buddy);
                    order += 1;
                }
                None => break,
            }
        }

        self.free_lists[order as usize].push_back(addr);
        self.counters.frees += 1;
        Ok(())
    }

    fn dump(&self) -> HeapDump {
        HeapDump::Orders {
            max_order: self.max_order,
            free_lists: self
                .free_lists
                .iter()
                .map(|list| list.iter().copied().collect())
                .collect(),
        }
    }

    fn stats(&self) -> HeapStats {
        let mut free = 0usize;
        let mut free_blocks = 0usize;
        let mut largest_free_block = 0usize;
        for (order, list) in self.free_lists.iter().enumerate() {
            if list.is_empty() {
                continue;
            }
            let block_size = 1usize << order;
            free += block_size * list.len();
            free_blocks += list.len();
            largest_free_block = largest_free_block.max(block_size);
        }

        // Rounding waste: block size minus what was actually asked for.
        let internal_fragmentation = self
            .requested
            .iter()
            .map(|(id, &req)| {
                self.id_to_addr
                    .get(id)
                    .and_then(|addr| self.addr_to_order.get(addr))
                    .map(|&order| (1usize << order) - req)
                    .unwrap_or(0)
            })
            .sum();

        HeapStats {
            total: self.total,
            used: self.total - free,
            free,
            used_blocks: self.id_to_addr.len(),
            free_blocks,
            largest_free_block,
            internal_fragmentation,
            counters: self.counters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A free order-`k` block below the top order must never have a free
    /// order-`k` buddy; they would have been merged.
    fn assert_buddy_symmetry(heap: &BuddyHeap) {
        for (order, list) in heap.free_lists.iter().enumerate() {
            if order as u32 == heap.max_order {
                continue;
            }
            for &addr in list {
                let buddy = addr ^ (1usize << order);
                assert!(
                    !list.contains(&buddy),
                    "free order-{} buddies at {:#x} and {:#x}",
                    order,
                    addr,
                    buddy
                );
            }
        }
    }

    #[test]
    fn test_rounds_total_to_power_of_two() {
        let heap = BuddyHeap::new(1000);
        assert_eq!(heap.total(), 1024);
        assert_eq!(heap.max_order(), 10);
    }

    #[test]
    fn test_order_for() {
        assert_eq!(BuddyHeap::order_for(1), 0);
        assert_eq!(BuddyHeap::order_for(2), 1);
        assert_eq!(BuddyHeap::order_for(3), 2);
        assert_eq!(BuddyHeap::order_for(100), 7);
        assert_eq!(BuddyHeap::order_for(128), 7);
        assert_eq!(BuddyHeap::order_for(129), 8);
    }

    #[test]
    fn test_split_and_merge_round_trip() {
        let mut heap = BuddyHeap::new(1024);

        // 100 bytes rounds to order 7; splitting the region leaves one
        // free block at each order from 7 to 9.
        let a = heap.allocate(100).unwrap();
        assert_eq!(a.addr, 0);
        assert_eq!(a.size, 128);

        let b = heap.allocate(100).unwrap();
        assert_eq!(b.addr, 128);
        assert_eq!(b.size, 128);

        heap.deallocate(a.id).unwrap();
        assert_buddy_symmetry(&heap);

        // The second free merges pairwise all the way back up.
        heap.deallocate(b.id).unwrap();
        assert_eq!(heap.free_lists[10], VecDeque::from([0]));
        for order in 0..10 {
            assert!(heap.free_lists[order].is_empty(), "order {} not empty", order);
        }
        assert_buddy_symmetry(&heap);
    }

    #[test]
    fn test_deterministic_placement() {
        let mut heap = BuddyHeap::new(1024);
        // Front-pop/back-push split discipline places consecutive same-order
        // allocations at consecutive addresses.
        assert_eq!(heap.allocate(64).unwrap().addr, 0);
        assert_eq!(heap.allocate(64).unwrap().addr, 64);
        assert_eq!(heap.allocate(64).unwrap().addr, 128);
        assert_eq!(heap.allocate(64).unwrap().addr, 192);
    }

    #[test]
    fn test_partial_merge_stops_at_allocated_buddy() {
        let mut heap = BuddyHeap::new(1024);
        let a = heap.allocate(128).unwrap(); // @ 0
        let b = heap.allocate(128).unwrap(); // @ 128
        let c = heap.allocate(128).unwrap(); // @ 256
        assert_eq!((a.addr, b.addr, c.addr), (0, 128, 256));

        // Freeing a cannot merge: its buddy b is allocated.
        heap.deallocate(a.id).unwrap();
        assert_eq!(heap.free_lists[7], VecDeque::from([384, 0]));
        assert_buddy_symmetry(&heap);

        let stats = heap.stats();
        assert_eq!(stats.used, 256);
        assert_eq!(stats.used_blocks, 2);
    }

    #[test]
    fn test_out_of_memory() {
        let mut heap = BuddyHeap::new(256);
        heap.allocate(256).unwrap();

        let err = heap.allocate(1).unwrap_err();
        assert_eq!(err, HeapError::OutOfMemory { requested: 1 });

        let stats = heap.stats();
        assert_eq!(stats.counters.requests, 2);
        assert_eq!(stats.counters.failures, 1);
    }

    #[test]
    fn test_request_larger_than_region() {
        let mut heap = BuddyHeap::new(256);
        assert_eq!(
            heap.allocate(512),
            Err(HeapError::OutOfMemory { requested: 512 })
        );
    }

    #[test]
    fn test_invalid_id_and_double_free() {
        let mut heap = BuddyHeap::new(256);
        assert_eq!(heap.deallocate(1), Err(HeapError::InvalidId(1)));

        let a = heap.allocate(32).unwrap();
        heap.deallocate(a.id).unwrap();
        assert_eq!(heap.deallocate(a.id), Err(HeapError::InvalidId(a.id)));
        assert_eq!(heap.counters.frees, 1);
    }

    #[test]
    fn test_internal_fragmentation() {
        let mut heap = BuddyHeap::new(1024);
        heap.allocate(100).unwrap(); // order 7: 28 bytes wasted
        heap.allocate(60).unwrap(); // order 6: 4 bytes wasted

        let stats = heap.stats();
        assert_eq!(stats.internal_fragmentation, 32);
        assert_eq!(stats.used, 128 + 64);
    }

    #[test]
    fn test_full_region_allocation() {
        let mut heap = BuddyHeap::new(1024);
        let a = heap.allocate(1024).unwrap();
        assert_eq!(a.addr, 0);
        assert_eq!(a.size, 1024);
        assert_eq!(heap.stats().free, 0);

        heap.deallocate(a.id).unwrap();
        assert_eq!(heap.stats().free, 1024);
        assert_eq!(heap.free_lists[10], VecDeque::from([0]));
    }

    #[test]
    fn test_ids_are_not_reused() {
        let mut heap = BuddyHeap::new(1024);
        let a = heap.allocate(10).unwrap();
        heap.deallocate(a.id).unwrap();
        let b = heap.allocate(10).unwrap();
        assert!(b.id > a.id);
    }

    #[test]
    fn test_allocated_blocks_are_size_aligned() {
        let mut heap = BuddyHeap::new(1024);
        for size in [3usize, 17, 100, 64, 200] {
            let alloc = heap.allocate(size).unwrap();
            assert_eq!(
                alloc.addr % alloc.size,
                0,
                "block at {:#x} not aligned to {}",
                alloc.addr,
                alloc.size
            );
        }
    }

    #[test]
    fn test_dump_lists_free_orders() {
        let mut heap = BuddyHeap::new(1024);
        heap.allocate(100).unwrap();

        match heap.dump() {
            HeapDump::Orders {
                max_order,
                free_lists,
            } => {
                assert_eq!(max_order, 10);
                assert_eq!(free_lists[7], vec![128]);
                assert_eq!(free_lists[8], vec![256]);
                assert_eq!(free_lists[9], vec![512]);
                assert!(free_lists[10].is_empty());
            }
            HeapDump::Blocks(_) => panic!("buddy dump must list orders"),
        }
    }
}
