//! Frame Pool
//!
//! Fixed array of frames plus a recency tracker used for LRU eviction.
//! Free frames are handed out lowest index first; once none is free the
//! least recently used frame is reclaimed.

use crate::sys::process::Pid;
use crate::{KernelError, KernelResult};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Page resident in a frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Owning process
    pub pid: Pid,
    /// Page number within the owner
    pub page_number: usize,
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.pid, self.page_number)
    }
}

/// Frame pool with LRU tracking
#[derive(Debug, Default)]
pub struct FramePool {
    /// Frame contents (None = free)
    frames: Vec<Option<Page>>,
    /// Occupied frame indices, least recently used first
    recency: VecDeque<usize>,
}

impl FramePool {
    /// Create pool with `total_frames` free frames
    pub fn new(total_frames: usize) -> Self {
        Self {
            frames: vec![None; total_frames],
            recency: VecDeque::with_capacity(total_frames),
        }
    }

    /// Obtain a frame, evicting the LRU occupant if the pool is full
    ///
    /// Returns the frame index and the evicted page, if any. The returned
    /// frame is empty.
    pub fn claim(&mut self) -> KernelResult<(usize, Option<Page>)> {
        if let Some(idx) = self.frames.iter().position(Option::is_none) {
            return Ok((idx, None));
        }

        let victim = self.recency.pop_front().ok_or(KernelError::MemoryExhausted)?;
        let evicted = self.frames[victim].take();

        if let Some(page) = &evicted {
            tracing::debug!("Evicted {} from frame {}", page, victim);
        }

        Ok((victim, evicted))
    }

    /// Place a page in a frame and mark it most recently used
    pub fn install(&mut self, idx: usize, page: Page) {
        self.frames[idx] = Some(page);
        self.touch(idx);
    }

    /// Free a frame
    pub fn release(&mut self, idx: usize) {
        if let Some(slot) = self.frames.get_mut(idx) {
            *slot = None;
        }
        self.recency.retain(|&f| f != idx);
    }

    /// Mark a frame most recently used
    pub fn touch(&mut self, idx: usize) {
        self.recency.retain(|&f| f != idx);
        self.recency.push_back(idx);
    }

    /// Occupant of a frame
    pub fn get(&self, idx: usize) -> Option<&Page> {
        self.frames.get(idx).and_then(|f| f.as_ref())
    }

    /// Find the frame holding a given page
    pub fn find(&self, pid: &Pid, page_number: usize) -> Option<usize> {
        self.frames.iter().position(|f| {
            f.as_ref()
                .is_some_and(|p| &p.pid == pid && p.page_number == page_number)
        })
    }

    /// Iterate over frames in index order
    pub fn iter(&self) -> impl Iterator<Item = Option<&Page>> {
        self.frames.iter().map(|f| f.as_ref())
    }

    /// Occupied frames, least recently used first
    pub fn recency(&self) -> impl Iterator<Item = usize> + '_ {
        self.recency.iter().copied()
    }

    /// Total number of frames
    pub fn total_frames(&self) -> usize {
        self.frames.len()
    }

    /// Number of free frames
    pub fn free_frames(&self) -> usize {
        self.frames.iter().filter(|f| f.is_none()).count()
    }
}
