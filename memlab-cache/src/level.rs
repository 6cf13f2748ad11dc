//! One set-associative cache level

use core::fmt;

use log::{debug, info};

use crate::error::CacheConfigError;

/// Whether an access reads or writes the block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
}

/// Line replacement policy within a set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Evict the line unused longest
    Lru,
    /// Evict the line installed longest ago
    Fifo,
}

impl fmt::Display for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lru => write!(f, "LRU"),
            Self::Fifo => write!(f, "FIFO"),
        }
    }
}

/// One cache line
#[derive(Debug, Clone, Copy, Default)]
struct CacheLine {
    valid: bool,
    dirty: bool,
    tag: u64,
    /// Clock value of the most recent use, for LRU
    last_used: u64,
    /// Clock value at installation, for FIFO
    inserted: u64,
}

/// Hit, miss and write-back counters for one level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LevelStats {
    pub hits: u64,
    pub misses: u64,
    /// Dirty lines written back on eviction
    pub write_backs: u64,
}

impl LevelStats {
    /// Hit fraction of all accesses, as a percentage
    ///
    /// 0.0 when the level has seen no accesses.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64 * 100.0
        }
    }
}

/// Set-associative cache level with write-back and write-allocate
pub struct CacheLevel {
    name: String,
    block_size: usize,
    num_sets: usize,
    policy: CachePolicy,
    /// `num_sets` sets of `associativity` lines each
    sets: Vec<Vec<CacheLine>>,
    /// Monotonic clock; advanced once per access
    clock: u64,
    stats: LevelStats,
}

impl CacheLevel {
    /// Create a level with the given geometry
    ///
    /// # Arguments
    /// * `name` - Display name, used in log events
    /// * `size` - Total level size in bytes
    /// * `block_size` - Block size in bytes
    /// * `associativity` - Lines per set
    /// * `policy` - Replacement policy
    ///
    /// # Returns
    /// The level, or a geometry error when `size` is not a non-zero
    /// multiple of `block_size * associativity`.
    pub fn new(
        name: &str,
        size: usize,
        block_size: usize,
        associativity: usize,
        policy: CachePolicy,
    ) -> Result<Self, CacheConfigError> {
        let set_bytes = block_size.checked_mul(associativity).unwrap_or(0);
        if set_bytes == 0 || size % set_bytes != 0 || size / set_bytes == 0 {
            return Err(CacheConfigError::BadGeometry {
                size,
                block_size,
                associativity,
            });
        }

        let num_sets = size / set_bytes;
        info!(
            "[{}] initialised: {} bytes, {} sets, {}-way, {}",
            name, size, num_sets, associativity, policy
        );

        Ok(Self {
            name: name.to_string(),
            block_size,
            num_sets,
            policy,
            sets: vec![vec![CacheLine::default(); associativity]; num_sets],
            clock: 0,
            stats: LevelStats::default(),
        })
    }

    /// Display name of the level
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Counters for the level
    #[must_use]
    pub fn stats(&self) -> LevelStats {
        self.stats
    }

    /// Access one block, returning whether it hit
    ///
    /// Operates at block granularity: `set = (addr / block) mod sets`,
    /// `tag = addr / (block * sets)`, no offset bits. A miss installs the
    /// tag in this level (write-allocate: the installed line is dirty when
    /// the access was a write).
    pub fn access(&mut self, address: u64, kind: AccessKind) -> bool {
        self.clock += 1;

        let block = self.block_size as u64;
        let set_index = ((address / block) % self.num_sets as u64) as usize;
        let tag = address / (block * self.num_sets as u64);

        let clock = self.clock;
        let policy = self.policy;
        if let Some(line) = self.sets[set_index]
            .iter_mut()
            .find(|line| line.valid && line.tag == tag)
        {
            self.stats.hits += 1;
            if policy == CachePolicy::Lru {
                line.last_used = clock;
            }
            if kind == AccessKind::Write {
                line.dirty = true;
            }
            return true;
        }

        self.stats.misses += 1;
        self.install(set_index, tag, kind);
        false
    }

    /// Install `tag` into the set, evicting a victim if every line is valid
    fn install(&mut self, set_index: usize, tag: u64, kind: AccessKind) {
        let clock = self.clock;
        let policy = self.policy;
        let set = &mut self.sets[set_index];

        let slot = match set.iter().position(|line| !line.valid) {
            Some(slot) => slot,
            None => {
                // Oldest line per policy; scan order breaks ties.
                let slot = set
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, line)| match policy {
                        CachePolicy::Fifo => line.inserted,
                        CachePolicy::Lru => line.last_used,
                    })
                    .map(|(idx, _)| idx)
                    .unwrap_or(0);
                if set[slot].dirty {
                    self.stats.write_backs += 1;
                    debug!(
                        "[{}] writing back dirty block, tag {:#x}",
                        self.name, set[slot].tag
                    );
                }
                slot
            }
        };

        set[slot] = CacheLine {
            valid: true,
            dirty: kind == AccessKind::Write,
            tag,
            last_used: clock,
            inserted: clock,
        };
    }
}
