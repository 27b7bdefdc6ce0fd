//! Reference String Replay
//!
//! Classic LRU paging over a page reference string, decoupled from the
//! live frame pool. Each reference produces a snapshot of the slots and
//! the running fault count.

use crate::{KernelError, KernelResult};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// State after one reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceStep {
    /// Page referenced
    pub page: u32,
    /// Slot contents after the reference
    pub slots: Vec<Option<u32>>,
    /// Whether this reference faulted
    pub fault: bool,
    /// Cumulative faults so far
    pub faults: usize,
}

/// Complete replay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LruTrace {
    pub steps: Vec<TraceStep>,
    pub total_faults: usize,
}

impl LruTrace {
    /// Slot contents after the last reference
    pub fn resident(&self) -> Vec<Option<u32>> {
        self.steps.last().map(|s| s.slots.clone()).unwrap_or_default()
    }
}

/// Replay `pages` through `capacity` slots under LRU
pub fn simulate(pages: &[u32], capacity: usize) -> KernelResult<LruTrace> {
    if capacity == 0 {
        return Err(KernelError::invalid("frame capacity must be positive"));
    }

    let mut slots: Vec<Option<u32>> = vec![None; capacity];
    // Resident pages, least recently used first
    let mut recency: VecDeque<u32> = VecDeque::with_capacity(capacity);
    let mut faults = 0;
    let mut steps = Vec::with_capacity(pages.len());

    for &page in pages {
        let hit = recency.contains(&page);

        if hit {
            recency.retain(|&p| p != page);
        } else {
            faults += 1;

            if recency.len() == capacity {
                if let Some(victim) = recency.pop_front() {
                    if let Some(slot) = slots.iter_mut().find(|s| **s == Some(victim)) {
                        *slot = None;
                    }
                }
            }

            if let Some(slot) = slots.iter_mut().find(|s| s.is_none()) {
                *slot = Some(page);
            }
        }

        recency.push_back(page);
        steps.push(TraceStep {
            page,
            slots: slots.clone(),
            fault: !hit,
            faults,
        });
    }

    Ok(LruTrace {
        steps,
        total_faults: faults,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_textbook_reference_string() {
        let pages = [7, 0, 1, 2, 0, 3, 0, 4, 2, 3, 0, 3];
        let trace = simulate(&pages, 4).unwrap();

        assert_eq!(trace.total_faults, 6);
        assert_eq!(trace.resident(), vec![Some(3), Some(0), Some(4), Some(2)]);

        let faulted: Vec<u32> = trace.steps.iter().filter(|s| s.fault).map(|s| s.page).collect();
        assert_eq!(faulted, vec![7, 0, 1, 2, 3, 4]);

        // 3 replaces 7 in slot 0, 4 replaces 1 in slot 2
        assert_eq!(trace.steps[5].slots, vec![Some(3), Some(0), Some(1), Some(2)]);
        assert_eq!(trace.steps[7].slots, vec![Some(3), Some(0), Some(4), Some(2)]);
    }

    #[test]
    fn test_partial_fill() {
        let trace = simulate(&[1, 2, 1], 3).unwrap();
        assert_eq!(trace.total_faults, 2);
        assert_eq!(trace.resident(), vec![Some(1), Some(2), None]);
        assert_eq!(trace.steps.iter().map(|s| s.faults).collect::<Vec<_>>(), vec![1, 2, 2]);
    }

    #[test]
    fn test_single_slot_thrash() {
        let trace = simulate(&[1, 2, 1, 2], 1).unwrap();
        assert_eq!(trace.total_faults, 4);
        assert_eq!(trace.resident(), vec![Some(2)]);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(simulate(&[1], 0).is_err());
    }

    #[test]
    fn test_empty_reference_string() {
        let trace = simulate(&[], 2).unwrap();
        assert_eq!(trace.total_faults, 0);
        assert!(trace.resident().is_empty());
    }
}
