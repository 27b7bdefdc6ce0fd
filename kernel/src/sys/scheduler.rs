//! Scheduler
//!
//! Bookkeeping scheduler over four containers:
//! - Ready queue (FIFO, insertion order matters)
//! - Blocked queue
//! - Suspended queue
//! - A single running slot
//!
//! # Dispatch Policies
//!
//! 1. FCFS: the front of the ready queue runs next
//! 2. Priority: the numerically smallest priority runs next; ties go to
//!    whichever entered the ready queue first
//!
//! In both cases a running process is first demoted to the back of the
//! ready queue. Dispatch only moves pids between containers and updates
//! process states; nothing executes.

use super::process::{Pid, ProcessState, ProcessTable};
use crate::KernelError;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

/// Dispatch policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Policy {
    /// First come, first served
    Fcfs,
    /// Smallest priority value first
    Priority,
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::Fcfs => f.write_str("fcfs"),
            Policy::Priority => f.write_str("priority"),
        }
    }
}

impl FromStr for Policy {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fcfs" => Ok(Policy::Fcfs),
            "priority" => Ok(Policy::Priority),
            other => Err(KernelError::InvalidParameters(format!("unknown policy: {}", other))),
        }
    }
}

/// Container holding a process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Queue {
    /// Ready queue
    Ready,
    /// Blocked queue
    Blocked,
    /// Suspended queue
    Suspended,
    /// Running slot
    Running,
}

/// Point-in-time copy of every container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub ready: Vec<Pid>,
    pub blocked: Vec<Pid>,
    pub suspended: Vec<Pid>,
    pub running: Vec<Pid>,
}

impl QueueSnapshot {
    /// Queue name to pids, in display order
    pub fn entries(&self) -> [(&'static str, &[Pid]); 4] {
        [
            ("Ready", self.ready.as_slice()),
            ("Blocked", self.blocked.as_slice()),
            ("Suspended", self.suspended.as_slice()),
            ("Running", self.running.as_slice()),
        ]
    }

    /// Check whether a pid appears anywhere
    pub fn contains(&self, pid: &Pid) -> bool {
        self.entries().iter().any(|(_, pids)| pids.contains(pid))
    }
}

/// Scheduler
#[derive(Debug, Default)]
pub struct Scheduler {
    /// Ready queue
    ready: VecDeque<Pid>,
    /// Blocked processes
    blocked: VecDeque<Pid>,
    /// Suspended processes
    suspended: VecDeque<Pid>,
    /// Current running process
    running: Option<Pid>,
}

impl Scheduler {
    /// Create new scheduler
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a new process to the ready queue
    ///
    /// Returns false (and changes nothing) unless the process exists and
    /// is in the `New` state.
    pub fn admit(&mut self, table: &mut ProcessTable, pid: &Pid) -> bool {
        match table.get_mut(pid) {
            Some(p) if p.state == ProcessState::New => {
                p.state = ProcessState::Ready;
                self.ready.push_back(pid.clone());
                tracing::debug!("Admitted {} to ready queue", pid);
                true
            }
            _ => false,
        }
    }

    /// Container currently holding a pid
    pub fn locate(&self, pid: &Pid) -> Option<Queue> {
        if self.running.as_ref() == Some(pid) {
            Some(Queue::Running)
        } else if self.ready.contains(pid) {
            Some(Queue::Ready)
        } else if self.blocked.contains(pid) {
            Some(Queue::Blocked)
        } else if self.suspended.contains(pid) {
            Some(Queue::Suspended)
        } else {
            None
        }
    }

    /// Remove a pid from whichever container holds it
    ///
    /// Absent pids are ignored.
    pub fn remove(&mut self, pid: &Pid) -> Option<Queue> {
        let queue = self.locate(pid)?;
        match queue {
            Queue::Running => self.running = None,
            Queue::Ready => self.ready.retain(|p| p != pid),
            Queue::Blocked => self.blocked.retain(|p| p != pid),
            Queue::Suspended => self.suspended.retain(|p| p != pid),
        }
        Some(queue)
    }

    /// Move a process to the container implied by `state`
    ///
    /// `New` and `Terminated` processes belong to no container.
    pub fn transition(&mut self, table: &mut ProcessTable, pid: &Pid, state: ProcessState) {
        self.remove(pid);
        table.set_state(pid, state);

        match state {
            ProcessState::Ready => self.ready.push_back(pid.clone()),
            ProcessState::Blocked => self.blocked.push_back(pid.clone()),
            ProcessState::Suspended => self.suspended.push_back(pid.clone()),
            ProcessState::Running => {
                self.preempt(table);
                self.running = Some(pid.clone());
            }
            ProcessState::New | ProcessState::Terminated => {}
        }

        tracing::debug!("Process {} -> {}", pid, state);
    }

    /// Pick the next process to run under `policy`
    pub fn dispatch(&mut self, table: &mut ProcessTable, policy: Policy) -> Option<Pid> {
        self.preempt(table);

        let idx = match policy {
            Policy::Fcfs => {
                if self.ready.is_empty() {
                    None
                } else {
                    Some(0)
                }
            }
            Policy::Priority => self.highest_priority(table),
        };

        let next = idx.and_then(|i| self.ready.remove(i));
        if let Some(pid) = &next {
            table.set_state(pid, ProcessState::Running);
            tracing::debug!("Dispatched {} ({})", pid, policy);
        }

        self.running = next.clone();
        next
    }

    /// Current running process
    pub fn running(&self) -> Option<&Pid> {
        self.running.as_ref()
    }

    /// Snapshot of all containers
    pub fn queues(&self) -> QueueSnapshot {
        QueueSnapshot {
            ready: self.ready.iter().cloned().collect(),
            blocked: self.blocked.iter().cloned().collect(),
            suspended: self.suspended.iter().cloned().collect(),
            running: self.running.iter().cloned().collect(),
        }
    }

    /// Demote the running process to the back of the ready queue
    fn preempt(&mut self, table: &mut ProcessTable) {
        if let Some(prev) = self.running.take() {
            table.set_state(&prev, ProcessState::Ready);
            self.ready.push_back(prev);
        }
    }

    /// Index of the most urgent ready entry, earliest on ties
    fn highest_priority(&self, table: &ProcessTable) -> Option<usize> {
        self.ready
            .iter()
            .enumerate()
            .min_by_key(|(idx, pid)| {
                let priority = table.get(pid).map_or(u8::MAX, |p| p.priority);
                (priority, *idx)
            })
            .map(|(idx, _)| idx)
    }
}
