//! Page table, frame table and the translate path

use std::collections::{HashMap, VecDeque};

use log::{debug, warn};

use crate::error::VmConfigError;
use crate::policy::ReplacementPolicy;

/// Translator geometry and policy, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslatorConfig {
    /// Width of the virtual address space in bits
    pub va_bits: u32,
    /// Page size in bytes
    pub page_size: usize,
    /// Physical memory size in bytes
    pub physical_memory: usize,
    /// Replacement policy
    pub policy: ReplacementPolicy,
}

/// One page-table entry
#[derive(Debug, Clone, Copy)]
struct PageTableEntry {
    /// Whether the page is resident
    valid: bool,
    /// Frame number; meaningful only while valid
    frame: usize,
    /// Timer value of the most recent access, for LRU
    last_used: u64,
}

/// Result of one translation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Translation {
    /// The physical address
    pub physical: u64,
    /// Virtual page number the address falls in
    pub page: u64,
    /// Whether the access faulted before resolving
    pub fault: bool,
}

/// Translation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VmStats {
    /// Translations served from a resident page
    pub page_hits: u64,
    /// Translations that faulted
    pub page_faults: u64,
    /// Simulated disk transfers (one per fault)
    pub disk_accesses: u64,
}

impl VmStats {
    /// Faulting fraction of all translations, as a percentage
    ///
    /// 0.0 when no translations have been made.
    #[must_use]
    pub fn fault_rate(&self) -> f64 {
        let translations = self.page_hits + self.page_faults;
        if translations == 0 {
            0.0
        } else {
            self.page_faults as f64 / translations as f64 * 100.0
        }
    }
}

/// Paged virtual-to-physical translator with demand paging
pub struct Translator {
    config: TranslatorConfig,
    /// Number of frames in the pool
    num_frames: usize,
    /// Monotonic clock; advanced once per translate call
    timer: u64,
    /// Virtual page number -> entry
    page_table: HashMap<u64, PageTableEntry>,
    /// Frame index -> owning virtual page, None while free
    frame_owner: Vec<Option<u64>>,
    /// Resident pages in arrival order; maintained under FIFO only
    fifo_queue: VecDeque<u64>,
    stats: VmStats,
}

impl Translator {
    /// Create a translator for the given geometry
    ///
    /// # Returns
    /// The translator, or a config error when the page size is zero or the
    /// physical memory holds no complete frame.
    pub fn new(config: TranslatorConfig) -> Result<Self, VmConfigError> {
        if config.page_size == 0 {
            return Err(VmConfigError::ZeroPageSize);
        }
        let num_frames = config.physical_memory / config.page_size;
        if num_frames == 0 {
            return Err(VmConfigError::NoFrames {
                physical: config.physical_memory,
                page_size: config.page_size,
            });
        }

        Ok(Self {
            config,
            num_frames,
            timer: 0,
            page_table: HashMap::new(),
            frame_owner: vec![None; num_frames],
            fifo_queue: VecDeque::new(),
            stats: VmStats::default(),
        })
    }

    /// Configured replacement policy
    #[must_use]
    pub fn policy(&self) -> ReplacementPolicy {
        self.config.policy
    }

    /// Number of frames in the pool
    #[must_use]
    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    /// Translation counters
    #[must_use]
    pub fn stats(&self) -> VmStats {
        self.stats
    }

    /// Translate a virtual address, faulting the page in if needed
    pub fn translate(&mut self, virtual_address: u64) -> Translation {
        self.timer += 1;

        if self.config.va_bits < u64::BITS && virtual_address >= 1u64 << self.config.va_bits {
            warn!(
                "virtual address {:#x} exceeds the {}-bit address space",
                virtual_address, self.config.va_bits
            );
        }

        let page_size = self.config.page_size as u64;
        let page = virtual_address / page_size;
        let offset = virtual_address % page_size;

        let resident = self.page_table.get(&page).is_some_and(|e| e.valid);
        let fault = !resident;
        if resident {
            self.stats.page_hits += 1;
        } else {
            self.stats.page_faults += 1;
            debug!("page fault: page {} not resident", page);
            self.handle_page_fault(page);
        }

        let timer = self.timer;
        let frame = match self.page_table.get_mut(&page) {
            Some(entry) => {
                entry.last_used = timer;
                entry.frame
            }
            // handle_page_fault always installs the page
            None => 0,
        };

        Translation {
            physical: frame as u64 * page_size + offset,
            page,
            fault,
        }
    }

    /// Bring `page` into a frame, evicting if the pool is exhausted
    fn handle_page_fault(&mut self, page: u64) {
        self.stats.disk_accesses += 1;

        let frame = match self.frame_owner.iter().position(Option::is_none) {
            Some(frame) => frame,
            None => self.evict(),
        };

        self.page_table.insert(
            page,
            PageTableEntry {
                valid: true,
                frame,
                last_used: self.timer,
            },
        );
        self.frame_owner[frame] = Some(page);
        if self.config.policy == ReplacementPolicy::Fifo {
            self.fifo_queue.push_back(page);
        }
        debug!("page {} loaded into frame {}", page, frame);
    }

    /// Evict one resident page and return its reclaimed frame
    fn evict(&mut self) -> usize {
        let victim = match self.config.policy {
            ReplacementPolicy::Fifo => self.fifo_queue.pop_front(),
            ReplacementPolicy::Lru => self
                .page_table
                .iter()
                .filter(|(_, entry)| entry.valid)
                .min_by_key(|(&page, entry)| (entry.last_used, page))
                .map(|(&page, _)| page),
        };

        // A victim always exists here: eviction only runs once every frame
        // has an owner, so at least one page is resident.
        let Some(victim) = victim else {
            return 0;
        };

        let frame = match self.page_table.get_mut(&victim) {
            Some(entry) => {
                entry.valid = false;
                entry.frame
            }
            None => 0,
        };
        self.frame_owner[frame] = None;
        debug!("evicted page {} from frame {}", victim, frame);
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translator(policy: ReplacementPolicy) -> Translator {
        // 256 bytes of physical memory in 64-byte pages: 4 frames.
        Translator::new(TranslatorConfig {
            va_bits: 16,
            page_size: 64,
            physical_memory: 256,
            policy,
        })
        .unwrap()
    }

    /// frame_owner[f] == Some(p) iff page_table[p] is valid with frame f
    fn assert_frame_exclusivity(t: &Translator) {
        for (frame, owner) in t.frame_owner.iter().enumerate() {
            if let Some(page) = owner {
                let entry = t.page_table.get(page).expect("owner page missing");
                assert!(entry.valid);
                assert_eq!(entry.frame, frame);
            }
        }
        let resident = t.page_table.values().filter(|e| e.valid).count();
        let owned = t.frame_owner.iter().filter(|o| o.is_some()).count();
        assert_eq!(resident, owned);
        assert!(resident <= t.num_frames());
    }

    #[test]
    fn test_geometry_validation() {
        let bad = Translator::new(TranslatorConfig {
            va_bits: 16,
            page_size: 64,
            physical_memory: 32,
            policy: ReplacementPolicy::Fifo,
        });
        assert_eq!(
            bad.err(),
            Some(VmConfigError::NoFrames {
                physical: 32,
                page_size: 64
            })
        );

        let zero = Translator::new(TranslatorConfig {
            va_bits: 16,
            page_size: 0,
            physical_memory: 256,
            policy: ReplacementPolicy::Fifo,
        });
        assert_eq!(zero.err(), Some(VmConfigError::ZeroPageSize));
    }

    #[test]
    fn test_offset_preserved_across_translation() {
        let mut t = translator(ReplacementPolicy::Fifo);
        let translation = t.translate(70); // page 1, offset 6
        assert_eq!(translation.page, 1);
        assert!(translation.fault);
        // First fault loads into frame 0.
        assert_eq!(translation.physical, 6);
    }

    #[test]
    fn test_resident_page_hits() {
        let mut t = translator(ReplacementPolicy::Fifo);
        t.translate(0);
        let second = t.translate(10);
        assert!(!second.fault);
        assert_eq!(t.stats(), VmStats {
            page_hits: 1,
            page_faults: 1,
            disk_accesses: 1,
        });
    }

    #[test]
    fn test_fifo_evicts_in_arrival_order() {
        let mut t = translator(ReplacementPolicy::Fifo);
        // Touch pages 0..=3, filling all four frames, then page 4.
        for page in 0..5u64 {
            t.translate(page * 64);
        }
        // Page 0 was evicted; touching it evicts page 1 in turn.
        assert!(t.translate(0).fault);
        assert_eq!(t.stats().page_faults, 6);
        assert_eq!(t.stats().disk_accesses, 6);
        assert!(!t.page_table[&1].valid);
        assert_frame_exclusivity(&t);
    }

    #[test]
    fn test_lru_evicts_least_recently_used() {
        let mut t = translator(ReplacementPolicy::Lru);
        for page in 0..4u64 {
            t.translate(page * 64);
        }
        t.translate(0); // page 0 becomes most recently used
        t.translate(4 * 64); // evicts page 1, not page 0

        assert_eq!(t.stats().page_faults, 5);
        assert!(t.page_table[&0].valid);
        assert!(!t.page_table[&1].valid);
        assert_frame_exclusivity(&t);
    }

    #[test]
    fn test_lru_tie_breaks_by_lowest_page() {
        // One frame, two candidate victims can never tie; use a fresh
        // translator where several pages share last_used via distinct
        // translations and check the lowest page goes first.
        let mut t = translator(ReplacementPolicy::Lru);
        for page in 0..4u64 {
            t.translate(page * 64);
        }
        // last_used: page0=1, page1=2, page2=3, page3=4. Evict -> page 0.
        t.translate(4 * 64);
        assert!(!t.page_table[&0].valid);
        assert_frame_exclusivity(&t);
    }

    #[test]
    fn test_evicted_page_can_return() {
        let mut t = translator(ReplacementPolicy::Fifo);
        for page in 0..5u64 {
            t.translate(page * 64);
        }
        // Page 0 is out; bringing it back faults and re-loads it.
        let back = t.translate(0);
        assert!(back.fault);
        assert!(t.page_table[&0].valid);
        assert_frame_exclusivity(&t);
    }

    #[test]
    fn test_fifo_queue_tracks_resident_pages() {
        let mut t = translator(ReplacementPolicy::Fifo);
        for page in 0..6u64 {
            t.translate(page * 64);
        }
        let resident: Vec<u64> = t.fifo_queue.iter().copied().collect();
        assert_eq!(resident, vec![2, 3, 4, 5]);
        for page in resident {
            assert!(t.page_table[&page].valid);
        }
    }

    #[test]
    fn test_timer_is_monotonic() {
        let mut t = translator(ReplacementPolicy::Lru);
        let mut last = 0;
        for page in [0u64, 1, 0, 2, 5, 0] {
            t.translate(page * 64);
            assert!(t.timer > last);
            last = t.timer;
        }
    }

    #[test]
    fn test_fault_rate() {
        let mut t = translator(ReplacementPolicy::Fifo);
        t.translate(0);
        t.translate(1);
        t.translate(2);
        t.translate(64);
        // 2 faults out of 4 translations.
        assert_eq!(t.stats().fault_rate(), 50.0);
    }
}
