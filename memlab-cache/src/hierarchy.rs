//! Three-level cache hierarchy with latency accounting

use core::fmt;

use crate::error::CacheConfigError;
use crate::level::{AccessKind, CacheLevel, CachePolicy};

/// Access latencies in cycles
pub const L1_LATENCY: u64 = 1;
pub const L2_LATENCY: u64 = 10;
pub const L3_LATENCY: u64 = 100;
pub const RAM_LATENCY: u64 = 500;

/// Names one level of the hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelId {
    L1,
    L2,
    L3,
}

impl LevelId {
    /// Parse a level name as used on the command line
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "L1" => Some(Self::L1),
            "L2" => Some(Self::L2),
            "L3" => Some(Self::L3),
            _ => None,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::L1 => "L1",
            Self::L2 => "L2",
            Self::L3 => "L3",
        }
    }
}

impl fmt::Display for LevelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Outcome of routing one request through the hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryAccess {
    /// Level that served the request, or None for main memory
    pub hit_level: Option<LevelId>,
    /// Cycles paid for this request
    pub cycles: u64,
}

/// Three cache levels composed top-down over a notional main memory
///
/// Every request pays L1 latency; each miss adds the latency of the next
/// level down, ending at main memory. Levels evolve independently per the
/// access each one sees.
pub struct CacheHierarchy {
    l1: CacheLevel,
    l2: CacheLevel,
    l3: CacheLevel,
    total_cycles: u64,
    total_requests: u64,
}

impl CacheHierarchy {
    /// Create the hierarchy with its default geometry
    ///
    /// L1 1024 B / 64 B blocks / 2-way / LRU; L2 4096 / 64 / 4-way / LRU;
    /// L3 16384 / 64 / 8-way / FIFO.
    pub fn new() -> Result<Self, CacheConfigError> {
        Ok(Self {
            l1: CacheLevel::new("L1", 1024, 64, 2, CachePolicy::Lru)?,
            l2: CacheLevel::new("L2", 4096, 64, 4, CachePolicy::Lru)?,
            l3: CacheLevel::new("L3", 16384, 64, 8, CachePolicy::Fifo)?,
            total_cycles: 0,
            total_requests: 0,
        })
    }

    /// Replace one level with a freshly constructed one
    ///
    /// Prior contents and statistics of that level are discarded. On a
    /// geometry error the previous level stays in effect.
    pub fn config_level(
        &mut self,
        id: LevelId,
        size: usize,
        block_size: usize,
        associativity: usize,
        policy: CachePolicy,
    ) -> Result<(), CacheConfigError> {
        let level = CacheLevel::new(id.name(), size, block_size, associativity, policy)?;
        match id {
            LevelId::L1 => self.l1 = level,
            LevelId::L2 => self.l2 = level,
            LevelId::L3 => self.l3 = level,
        }
        Ok(())
    }

    /// Route one request top-down through the hierarchy
    pub fn access(&mut self, address: u64, kind: AccessKind) -> MemoryAccess {
        self.total_requests += 1;

        let mut cycles = L1_LATENCY;
        let mut hit_level = None;

        if self.l1.access(address, kind) {
            hit_level = Some(LevelId::L1);
        } else {
            cycles += L2_LATENCY;
            if self.l2.access(address, kind) {
                hit_level = Some(LevelId::L2);
            } else {
                cycles += L3_LATENCY;
                if self.l3.access(address, kind) {
                    hit_level = Some(LevelId::L3);
                } else {
                    cycles += RAM_LATENCY;
                }
            }
        }

        self.total_cycles += cycles;
        MemoryAccess { hit_level, cycles }
    }

    /// The named level
    #[must_use]
    pub fn level(&self, id: LevelId) -> &CacheLevel {
        match id {
            LevelId::L1 => &self.l1,
            LevelId::L2 => &self.l2,
            LevelId::L3 => &self.l3,
        }
    }

    /// Requests routed so far
    #[must_use]
    pub fn total_requests(&self) -> u64 {
        self.total_requests
    }

    /// Cycles paid so far
    #[must_use]
    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    /// Average memory access time in cycles; 0.0 before the first request
    #[must_use]
    pub fn amat(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.total_cycles as f64 / self.total_requests as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::LevelStats;

    #[test]
    fn test_cold_access_pays_full_path() {
        let mut caches = CacheHierarchy::new().unwrap();
        let access = caches.access(0, AccessKind::Read);
        assert_eq!(access.hit_level, None);
        assert_eq!(access.cycles, 1 + 10 + 100 + 500);
    }

    #[test]
    fn test_l1_hit_costs_one_cycle() {
        let mut caches = CacheHierarchy::new().unwrap();
        caches.access(0, AccessKind::Read);
        let access = caches.access(0, AccessKind::Read);
        assert_eq!(access.hit_level, Some(LevelId::L1));
        assert_eq!(access.cycles, 1);
    }

    #[test]
    fn test_miss_installs_in_every_missing_level() {
        let mut caches = CacheHierarchy::new().unwrap();
        caches.access(0, AccessKind::Read);
        // The cold miss installed the block in L1, L2 and L3 alike, each
        // level having seen (and missed) the access.
        assert_eq!(caches.level(LevelId::L1).stats().misses, 1);
        assert_eq!(caches.level(LevelId::L2).stats().misses, 1);
        assert_eq!(caches.level(LevelId::L3).stats().misses, 1);
    }

    #[test]
    fn test_l2_hit_skips_l3() {
        // Shrink L1 to one set so a second block evicts the first, while
        // L2 keeps both.
        let mut caches = CacheHierarchy::new().unwrap();
        caches.config_level(LevelId::L1, 64, 64, 1, CachePolicy::Lru).unwrap();

        caches.access(0, AccessKind::Read);
        caches.access(64, AccessKind::Read); // evicts block 0 from L1
        let l3_misses = caches.level(LevelId::L3).stats().misses;

        let access = caches.access(0, AccessKind::Read);
        assert_eq!(access.hit_level, Some(LevelId::L2));
        assert_eq!(access.cycles, 1 + 10);
        // L3 never saw the request.
        assert_eq!(caches.level(LevelId::L3).stats().misses, l3_misses);
    }

    #[test]
    fn test_amat_accumulates() {
        let mut caches = CacheHierarchy::new().unwrap();
        assert_eq!(caches.amat(), 0.0);

        caches.access(0, AccessKind::Read); // 611 cycles
        caches.access(0, AccessKind::Read); // 1 cycle
        assert_eq!(caches.total_requests(), 2);
        assert_eq!(caches.total_cycles(), 612);
        assert_eq!(caches.amat(), 306.0);
    }

    #[test]
    fn test_reconfigure_discards_stats() {
        let mut caches = CacheHierarchy::new().unwrap();
        caches.access(0, AccessKind::Read);
        assert_eq!(caches.level(LevelId::L1).stats().misses, 1);

        caches.config_level(LevelId::L1, 2048, 64, 2, CachePolicy::Lru).unwrap();
        assert_eq!(caches.level(LevelId::L1).stats(), LevelStats::default());
    }

    #[test]
    fn test_bad_reconfigure_keeps_previous_level() {
        let mut caches = CacheHierarchy::new().unwrap();
        caches.access(0, AccessKind::Read);

        let err = caches.config_level(LevelId::L1, 100, 64, 2, CachePolicy::Lru);
        assert!(err.is_err());
        // The old level, statistics included, is still in place.
        assert_eq!(caches.level(LevelId::L1).stats().misses, 1);
    }

    #[test]
    fn test_level_id_from_name() {
        assert_eq!(LevelId::from_name("L1"), Some(LevelId::L1));
        assert_eq!(LevelId::from_name("L3"), Some(LevelId::L3));
        assert_eq!(LevelId::from_name("l1"), None);
        assert_eq!(LevelId::from_name("L4"), None);
    }
}
