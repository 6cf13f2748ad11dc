//! Driver façade over the heap, translator and cache hierarchy
//!
//! The simulator owns one instance of each subsystem and replaces them by
//! value on reconfiguration: the replacement is constructed first, so a
//! rejected configuration leaves the previous instance untouched. After a
//! successful replacement, all ids, page-table entries and cache lines of
//! the replaced instance are gone.

use thiserror::Error;

use memlab_cache::{
    AccessKind, CacheConfigError, CacheHierarchy, CachePolicy, LevelId, MemoryAccess,
};
use memlab_heap::{Allocation, BuddyHeap, Heap, HeapDump, HeapError, HeapStats, ListHeap, Placement};
use memlab_vm::{ReplacementPolicy, Translation, Translator, TranslatorConfig, VmConfigError, VmStats};

use crate::command::AllocatorKind;

/// Startup defaults, matching a 1 KiB machine with 64-byte pages
pub const DEFAULT_MEMORY_SIZE: usize = 1024;
pub const PAGE_SIZE: usize = 64;
pub const VA_BITS: u32 = 16;

/// Any subsystem error surfaced through the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SimError {
    #[error(transparent)]
    Heap(#[from] HeapError),
    #[error(transparent)]
    Vm(#[from] VmConfigError),
    #[error(transparent)]
    Cache(#[from] CacheConfigError),
}

/// Result of one `read` or `write`: the translation, then the cache path
#[derive(Debug, Clone, Copy)]
pub struct AccessResult {
    pub translation: Translation,
    pub memory: MemoryAccess,
}

/// The composed simulator
pub struct Simulator {
    memory_size: usize,
    allocator: AllocatorKind,
    heap: Box<dyn Heap>,
    vm: Translator,
    caches: CacheHierarchy,
}

fn build_heap(kind: AllocatorKind, size: usize) -> Box<dyn Heap> {
    match kind {
        AllocatorKind::First => Box::new(ListHeap::new(size, Placement::FirstFit)),
        AllocatorKind::Best => Box::new(ListHeap::new(size, Placement::BestFit)),
        AllocatorKind::Worst => Box::new(ListHeap::new(size, Placement::WorstFit)),
        AllocatorKind::Buddy => Box::new(BuddyHeap::new(size)),
    }
}

fn build_translator(
    size: usize,
    policy: ReplacementPolicy,
) -> Result<Translator, VmConfigError> {
    Translator::new(TranslatorConfig {
        va_bits: VA_BITS,
        page_size: PAGE_SIZE,
        physical_memory: size,
        policy,
    })
}

impl Simulator {
    /// Construct the simulator with its startup defaults
    pub fn new() -> Result<Self, SimError> {
        Ok(Self {
            memory_size: DEFAULT_MEMORY_SIZE,
            allocator: AllocatorKind::First,
            heap: build_heap(AllocatorKind::First, DEFAULT_MEMORY_SIZE),
            vm: build_translator(DEFAULT_MEMORY_SIZE, ReplacementPolicy::Fifo)?,
            caches: CacheHierarchy::new()?,
        })
    }

    /// Re-create heap and translator with a new byte size
    ///
    /// The selected allocator discipline and replacement policy carry over;
    /// all ids and page-table entries are invalidated.
    pub fn init(&mut self, size: usize) -> Result<(), SimError> {
        let vm = build_translator(size, self.vm.policy())?;
        self.heap = build_heap(self.allocator, size);
        self.vm = vm;
        self.memory_size = size;
        Ok(())
    }

    /// Replace the heap with a fresh instance of the given discipline
    pub fn set_allocator(&mut self, kind: AllocatorKind) {
        self.allocator = kind;
        self.heap = build_heap(kind, self.memory_size);
    }

    /// Replace the translator with a fresh instance under the given policy
    pub fn set_policy(&mut self, policy: ReplacementPolicy) -> Result<(), SimError> {
        self.vm = build_translator(self.memory_size, policy)?;
        Ok(())
    }

    /// Rebuild one cache level; LRU, as the command line fixes the policy
    pub fn config_cache(
        &mut self,
        level: LevelId,
        size: usize,
        block_size: usize,
        associativity: usize,
    ) -> Result<(), SimError> {
        self.caches
            .config_level(level, size, block_size, associativity, CachePolicy::Lru)?;
        Ok(())
    }

    /// Allocate through the current heap
    pub fn malloc(&mut self, size: usize) -> Result<Allocation, SimError> {
        Ok(self.heap.allocate(size)?)
    }

    /// Free through the current heap
    pub fn free(&mut self, id: u32) -> Result<(), SimError> {
        Ok(self.heap.deallocate(id)?)
    }

    /// Translate, then drive the cache hierarchy with a read
    pub fn read(&mut self, addr: u64) -> AccessResult {
        self.access(addr, AccessKind::Read)
    }

    /// Translate, then drive the cache hierarchy with a write
    pub fn write(&mut self, addr: u64) -> AccessResult {
        self.access(addr, AccessKind::Write)
    }

    fn access(&mut self, addr: u64, kind: AccessKind) -> AccessResult {
        let translation = self.vm.translate(addr);
        let memory = self.caches.access(translation.physical, kind);
        AccessResult {
            translation,
            memory,
        }
    }

    /// Current heap map
    #[must_use]
    pub fn dump(&self) -> HeapDump {
        self.heap.dump()
    }

    /// Current heap statistics
    #[must_use]
    pub fn heap_stats(&self) -> HeapStats {
        self.heap.stats()
    }

    /// Current translation statistics
    #[must_use]
    pub fn vm_stats(&self) -> VmStats {
        self.vm.stats()
    }

    /// The cache hierarchy, for statistics rendering
    #[must_use]
    pub fn caches(&self) -> &CacheHierarchy {
        &self.caches
    }

    /// Selected allocator discipline
    #[must_use]
    pub fn allocator(&self) -> AllocatorKind {
        self.allocator
    }

    /// Selected replacement policy
    #[must_use]
    pub fn policy(&self) -> ReplacementPolicy {
        self.vm.policy()
    }

    /// Configured memory size in bytes
    #[must_use]
    pub fn memory_size(&self) -> usize {
        self.memory_size
    }
}
