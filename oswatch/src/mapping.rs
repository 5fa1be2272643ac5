//! Kernel-level mmap/brk region tracking. Small allocations are
//! deliberately not tracked here — see `AppConfig::mmap_library_floor_bytes`
//! — since they're allocator noise covered by the malloc hash table.

use crate::time::Timestamp;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MappingKind {
    MmapLibrary,
    Brk,
}

impl MappingKind {
    pub fn label(&self) -> &'static str {
        match self {
            MappingKind::MmapLibrary => "mmap (library)",
            MappingKind::Brk => "brk",
        }
    }
}

#[derive(Clone, Debug)]
pub struct MemoryBlock {
    pub address: u64,
    pub size: u64,
    pub kind: MappingKind,
    pub created_at: Timestamp,
}

/// Live mmap-class regions keyed by start address. The original tool
/// used a singly-linked list walked front-to-back; a map keyed by
/// address gives the same "unique per address" invariant without
/// hand-rolling pointer-chasing for a collection nothing else depends
/// on the internal layout of.
#[derive(Default)]
pub struct MappingTracker {
    blocks: HashMap<u64, MemoryBlock>,
    pub total_allocated: u64,
    pub total_freed: u64,
    pub current_usage: u64,
    pub peak_usage: u64,
    pub double_free_count: u64,
}

impl MappingTracker {
    pub fn new() -> MappingTracker {
        MappingTracker::default()
    }

    pub fn insert(&mut self, address: u64, size: u64, kind: MappingKind) {
        self.blocks.insert(
            address,
            MemoryBlock {
                address,
                size,
                kind,
                created_at: Timestamp::now(),
            },
        );

        self.total_allocated += size;
        self.current_usage += size;
        if self.current_usage > self.peak_usage {
            self.peak_usage = self.current_usage;
        }
    }

    /// Remove the block at `address`, if present. Returns `false` (and
    /// bumps the double-free counter) when no matching block exists —
    /// expected for runtime unmaps the kernel pass never tracked.
    pub fn remove(&mut self, address: u64) -> bool {
        match self.blocks.remove(&address) {
            Some(block) => {
                self.total_freed += block.size;
                self.current_usage = self.current_usage.saturating_sub(block.size);
                true
            }
            None => {
                self.double_free_count += 1;
                false
            }
        }
    }

    pub fn residual_blocks(&self) -> impl Iterator<Item = &MemoryBlock> {
        self.blocks.values()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
