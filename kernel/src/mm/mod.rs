//! Memory Management Subsystem
//!
//! Paged memory over a fixed pool of equally sized frames:
//! - Frame pool with LRU eviction
//! - Per-process page tables (ordered frame indices)
//! - Standalone LRU reference string replay
//!
//! # Pool Layout
//!
//! ```text
//! total_memory_kb / page_size_kb frames
//!
//! ┌─────────┬─────────┬─────────┬─────────┬─────────┐
//! │  a:0    │  a:1    │  free   │  b:0    │  free   │ ...
//! └─────────┴─────────┴─────────┴─────────┴─────────┘
//!   frame 0   frame 1   frame 2   frame 3   frame 4
//! ```
//!
//! Changing the page size rebuilds the pool; every existing allocation
//! is dropped.

pub mod frame;
pub mod lru;

use crate::config::SimConfig;
use crate::sys::process::Pid;
use crate::{KernelError, KernelResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use frame::{FramePool, Page};
pub use lru::{LruTrace, TraceStep};

/// Frame taken from one process to satisfy another
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eviction {
    /// Process that lost the frame
    pub pid: Pid,
    /// Frame index
    pub frame: usize,
}

/// Result of an allocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allocation {
    /// Frames assigned, in page order
    pub frames: Vec<usize>,
    /// Frames reclaimed from other processes
    pub evicted: Vec<Eviction>,
}

impl Allocation {
    /// Processes that lost at least one frame, without duplicates
    pub fn victims(&self) -> Vec<Pid> {
        let mut victims: Vec<Pid> = Vec::new();
        for e in &self.evicted {
            if !victims.contains(&e.pid) {
                victims.push(e.pid.clone());
            }
        }
        victims
    }
}

/// One entry of the memory map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSlot {
    /// Frame index
    pub frame: usize,
    /// Resident page (None = free)
    pub occupant: Option<Page>,
}

impl FrameSlot {
    /// "pid:page" or "free"
    pub fn describe(&self) -> String {
        self.occupant
            .as_ref()
            .map_or_else(|| "free".to_string(), |p| p.to_string())
    }
}

/// Memory statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub page_size_kb: u32,
    pub total_memory_kb: u32,
    pub total_frames: usize,
    pub free_frames: usize,
}

/// Paging memory manager
#[derive(Debug)]
pub struct MemoryManager {
    /// Page size (KB)
    page_size_kb: u32,
    /// Memory size (KB)
    total_memory_kb: u32,
    /// Frame pool
    pool: FramePool,
    /// Page tables keyed by process
    page_tables: BTreeMap<Pid, Vec<usize>>,
}

impl MemoryManager {
    /// Create memory manager from configuration
    pub fn new(config: &SimConfig) -> Self {
        let total_frames = config.total_frames();

        tracing::debug!(
            "Memory manager: {} frames of {} KB",
            total_frames,
            config.page_size_kb
        );

        Self {
            page_size_kb: config.page_size_kb,
            total_memory_kb: config.total_memory_kb,
            pool: FramePool::new(total_frames),
            page_tables: BTreeMap::new(),
        }
    }

    /// Change the page size, discarding every allocation
    pub fn set_page_size(&mut self, page_size_kb: u32) -> KernelResult<()> {
        self.check_page_size(page_size_kb)?;

        self.page_size_kb = page_size_kb;
        self.pool = FramePool::new((self.total_memory_kb / page_size_kb) as usize);
        self.page_tables.clear();

        tracing::info!(
            "Page size set to {} KB ({} frames)",
            page_size_kb,
            self.pool.total_frames()
        );

        Ok(())
    }

    /// Check that `page_size_kb` fits this pool, without changing anything
    pub fn check_page_size(&self, page_size_kb: u32) -> KernelResult<()> {
        if page_size_kb == 0 {
            return Err(KernelError::invalid("page size must be positive"));
        }

        if page_size_kb > self.total_memory_kb {
            return Err(KernelError::invalid(format!(
                "page size {} KB exceeds total memory {} KB",
                page_size_kb, self.total_memory_kb
            )));
        }

        Ok(())
    }

    /// Pages needed to hold `memory_kb`
    pub fn pages_needed(&self, memory_kb: u32) -> usize {
        memory_kb.div_ceil(self.page_size_kb) as usize
    }

    /// Allocate frames for a process
    ///
    /// Any frames the process already holds are released first. When the
    /// pool is full the least recently used frames are reclaimed from
    /// their owners. Requests larger than the whole pool are refused.
    pub fn allocate(&mut self, pid: &Pid, memory_kb: u32) -> KernelResult<Allocation> {
        let needed = self.pages_needed(memory_kb);
        if needed > self.pool.total_frames() {
            return Err(KernelError::MemoryExhausted);
        }

        self.deallocate(pid);

        let mut allocation = Allocation::default();

        for page_number in 0..needed {
            let (idx, evicted) = self.pool.claim()?;

            if let Some(victim) = evicted {
                self.forget_frame(&victim.pid, idx);
                allocation.evicted.push(Eviction { pid: victim.pid, frame: idx });
            }

            self.pool.install(idx, Page { pid: pid.clone(), page_number });
            allocation.frames.push(idx);
        }

        self.page_tables.insert(pid.clone(), allocation.frames.clone());

        tracing::debug!(
            "Allocated {} pages to {} in frames {:?}",
            needed,
            pid,
            allocation.frames
        );

        Ok(allocation)
    }

    /// Free every frame a process holds
    ///
    /// Returns the freed frames; empty if the process had no mapping.
    pub fn deallocate(&mut self, pid: &Pid) -> Vec<usize> {
        let Some(frames) = self.page_tables.remove(pid) else {
            return Vec::new();
        };

        for &idx in &frames {
            self.pool.release(idx);
        }

        tracing::debug!("Released frames {:?} of {}", frames, pid);
        frames
    }

    /// Mark the frame holding `page_number` of `pid` most recently used
    pub fn touch(&mut self, pid: &Pid, page_number: usize) -> KernelResult<usize> {
        let idx = self.pool.find(pid, page_number).ok_or_else(|| {
            KernelError::invalid(format!("page {} of {} is not resident", page_number, pid))
        })?;

        self.pool.touch(idx);
        Ok(idx)
    }

    /// Current page table of a process
    pub fn page_table(&self, pid: &Pid) -> Vec<usize> {
        self.page_tables.get(pid).cloned().unwrap_or_default()
    }

    /// Every frame and its occupant, in index order
    pub fn memory_map(&self) -> Vec<FrameSlot> {
        self.pool
            .iter()
            .enumerate()
            .map(|(frame, occupant)| FrameSlot { frame, occupant: occupant.cloned() })
            .collect()
    }

    /// Occupied frames, least recently used first
    pub fn lru_order(&self) -> Vec<usize> {
        self.pool.recency().collect()
    }

    /// Memory statistics
    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            page_size_kb: self.page_size_kb,
            total_memory_kb: self.total_memory_kb,
            total_frames: self.pool.total_frames(),
            free_frames: self.pool.free_frames(),
        }
    }

    /// Replay a reference string under LRU, independent of the pool
    pub fn simulate_reference_string(pages: &[u32], capacity: usize) -> KernelResult<LruTrace> {
        lru::simulate(pages, capacity)
    }

    /// Drop a reclaimed frame from its previous owner's page table
    fn forget_frame(&mut self, pid: &Pid, idx: usize) {
        if let Some(frames) = self.page_tables.get_mut(pid) {
            frames.retain(|&f| f != idx);
            if frames.is_empty() {
                self.page_tables.remove(pid);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(page_size_kb: u32, total_memory_kb: u32) -> MemoryManager {
        MemoryManager::new(&SimConfig { page_size_kb, total_memory_kb })
    }

    fn pid(s: &str) -> Pid {
        Pid::from(s)
    }

    #[test]
    fn test_pages_needed_rounds_up() {
        let mm = manager(64, 1024);
        assert_eq!(mm.pages_needed(128), 2);
        assert_eq!(mm.pages_needed(129), 3);
        assert_eq!(mm.pages_needed(1), 1);
        assert_eq!(mm.pages_needed(0), 0);
    }

    #[test]
    fn test_allocate_assigns_distinct_frames() {
        let mut mm = manager(64, 1024);
        let a = mm.allocate(&pid("a"), 128).unwrap();
        let b = mm.allocate(&pid("b"), 200).unwrap();

        assert_eq!(a.frames, vec![0, 1]);
        assert_eq!(b.frames, vec![2, 3, 4, 5]);
        assert!(a.evicted.is_empty() && b.evicted.is_empty());
        assert_eq!(mm.page_table(&pid("b")).len(), 4);
        assert_eq!(mm.stats().free_frames, 10);
    }

    #[test]
    fn test_full_pool_evicts_lru() {
        let mut mm = manager(64, 256);
        mm.allocate(&pid("a"), 128).unwrap();
        mm.allocate(&pid("b"), 128).unwrap();

        // a's page 1 becomes most recent, so frame 0 is the oldest
        mm.touch(&pid("a"), 1).unwrap();
        assert_eq!(mm.lru_order(), vec![0, 2, 3, 1]);

        let c = mm.allocate(&pid("c"), 64).unwrap();
        assert_eq!(c.frames, vec![0]);
        assert_eq!(c.evicted, vec![Eviction { pid: pid("a"), frame: 0 }]);
        assert_eq!(mm.page_table(&pid("a")), vec![1]);
        assert_eq!(mm.memory_map()[0].describe(), "c:0");
    }

    #[test]
    fn test_eviction_empties_victim() {
        let mut mm = manager(64, 128);
        mm.allocate(&pid("a"), 128).unwrap();
        let b = mm.allocate(&pid("b"), 128).unwrap();

        assert_eq!(b.victims(), vec![pid("a")]);
        assert!(mm.page_table(&pid("a")).is_empty());
        assert!(mm.deallocate(&pid("a")).is_empty());
    }

    #[test]
    fn test_reallocate_releases_old_frames() {
        let mut mm = manager(64, 256);
        mm.allocate(&pid("a"), 256).unwrap();
        let again = mm.allocate(&pid("a"), 128).unwrap();

        assert!(again.evicted.is_empty());
        assert_eq!(again.frames, vec![0, 1]);
        assert_eq!(mm.stats().free_frames, 2);
    }

    #[test]
    fn test_oversized_request_refused() {
        let mut mm = manager(64, 128);
        mm.allocate(&pid("a"), 64).unwrap();
        assert_eq!(mm.allocate(&pid("b"), 512), Err(KernelError::MemoryExhausted));
        assert_eq!(mm.page_table(&pid("a")), vec![0]);
    }

    #[test]
    fn test_deallocate_frees_frames() {
        let mut mm = manager(64, 1024);
        mm.allocate(&pid("a"), 128).unwrap();
        assert_eq!(mm.deallocate(&pid("a")), vec![0, 1]);
        assert!(mm.memory_map().iter().all(|s| s.occupant.is_none()));
        assert!(mm.lru_order().is_empty());
        assert!(mm.deallocate(&pid("a")).is_empty());
    }

    #[test]
    fn test_set_page_size_clears_everything() {
        let mut mm = manager(64, 1024);
        mm.allocate(&pid("a"), 128).unwrap();

        mm.set_page_size(128).unwrap();
        assert_eq!(mm.stats().total_frames, 8);
        assert_eq!(mm.stats().free_frames, 8);
        assert!(mm.page_table(&pid("a")).is_empty());
        assert!(mm.lru_order().is_empty());

        assert!(mm.set_page_size(0).is_err());
        assert!(mm.set_page_size(4096).is_err());
    }

    #[test]
    fn test_touch_missing_page() {
        let mut mm = manager(64, 1024);
        mm.allocate(&pid("a"), 64).unwrap();
        assert!(mm.touch(&pid("a"), 5).is_err());
    }
}
