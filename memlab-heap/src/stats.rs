//! Allocation counters and derived heap statistics

/// Raw allocation counters, shared by both heap disciplines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocCounters {
    /// Allocation requests, successful or not
    pub requests: u64,
    /// Requests that returned a block
    pub successes: u64,
    /// Requests refused for lack of memory
    pub failures: u64,
    /// Successful frees
    pub frees: u64,
}

impl AllocCounters {
    /// Fraction of requests that succeeded, as a percentage
    ///
    /// 0.0 when no requests have been made.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.successes as f64 / self.requests as f64 * 100.0
        }
    }
}

/// Point-in-time snapshot of a heap's state and counters
#[derive(Debug, Clone, Copy)]
pub struct HeapStats {
    /// Total managed bytes
    pub total: usize,
    /// Bytes inside allocated blocks
    pub used: usize,
    /// Bytes inside free blocks
    pub free: usize,
    /// Number of allocated blocks
    pub used_blocks: usize,
    /// Number of free blocks
    pub free_blocks: usize,
    /// Largest single free block in bytes
    pub largest_free_block: usize,
    /// Bytes lost to rounding inside allocated blocks (buddy heap only)
    pub internal_fragmentation: usize,
    /// Allocation counters
    pub counters: AllocCounters,
}

impl HeapStats {
    /// Used fraction of the managed space, as a percentage
    #[must_use]
    pub fn utilisation(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.used as f64 / self.total as f64 * 100.0
        }
    }

    /// External fragmentation index: `1 - largest_free / free`
    ///
    /// 0.0 when there is no free memory, or when the free memory is one
    /// contiguous block.
    #[must_use]
    pub fn external_fragmentation(&self) -> f64 {
        if self.free == 0 {
            0.0
        } else {
            1.0 - self.largest_free_block as f64 / self.free as f64
        }
    }

    /// Success rate of allocation requests, as a percentage
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        self.counters.success_rate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate_no_requests() {
        let counters = AllocCounters::default();
        assert_eq!(counters.success_rate(), 0.0);
    }

    #[test]
    fn test_success_rate() {
        let counters = AllocCounters {
            requests: 4,
            successes: 3,
            failures: 1,
            frees: 0,
        };
        assert_eq!(counters.success_rate(), 75.0);
    }

    #[test]
    fn test_external_fragmentation_unfragmented() {
        // One contiguous free block: index is 0
        let stats = HeapStats {
            total: 1024,
            used: 0,
            free: 1024,
            used_blocks: 0,
            free_blocks: 1,
            largest_free_block: 1024,
            internal_fragmentation: 0,
            counters: AllocCounters::default(),
        };
        assert_eq!(stats.external_fragmentation(), 0.0);
    }

    #[test]
    fn test_external_fragmentation_full_heap() {
        let stats = HeapStats {
            total: 1024,
            used: 1024,
            free: 0,
            used_blocks: 1,
            free_blocks: 0,
            largest_free_block: 0,
            internal_fragmentation: 0,
            counters: AllocCounters::default(),
        };
        assert_eq!(stats.external_fragmentation(), 0.0);
    }

    #[test]
    fn test_external_fragmentation_split_free_space() {
        // Two free halves of 256 in 512 free bytes: 1 - 256/512 = 0.5
        let stats = HeapStats {
            total: 1024,
            used: 512,
            free: 512,
            used_blocks: 2,
            free_blocks: 2,
            largest_free_block: 256,
            internal_fragmentation: 0,
            counters: AllocCounters::default(),
        };
        assert_eq!(stats.external_fragmentation(), 0.5);
    }

    #[test]
    fn test_utilisation() {
        let stats = HeapStats {
            total: 1000,
            used: 300,
            free: 700,
            used_blocks: 1,
            free_blocks: 1,
            largest_free_block: 700,
            internal_fragmentation: 0,
            counters: AllocCounters::default(),
        };
        assert_eq!(stats.utilisation(), 30.0);
    }
}
