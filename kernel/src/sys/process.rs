//! Process Management
//!
//! A process is a simulated protection domain described by its PCB:
//! - Identity, name and owner
//! - Scheduling attributes (state, priority, burst, arrival)
//! - Memory requirement and the frames currently backing it
//! - Opaque register set, processor label and I/O state

use crate::{KernelError, KernelResult};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lowest (most urgent) priority value
pub const MIN_PRIORITY: i64 = 0;

/// Highest (least urgent) priority value
pub const MAX_PRIORITY: i64 = 10;

/// Memory required by a process unless stated otherwise (KB)
pub const DEFAULT_MEMORY_KB: u32 = 128;

/// Processor label assigned to every process
pub const DEFAULT_PROCESSOR: &str = "CPU-1";

/// Owner assigned to every process
pub const DEFAULT_OWNER: &str = "admin";

/// Process ID
///
/// Eight lowercase hex digits. Uniqueness among live processes is
/// enforced by [`ProcessTable::fresh_pid`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pid(String);

impl Pid {
    /// Draw a random pid
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(format!("{:08x}", rng.gen::<u32>()))
    }

    /// Pid as string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Pid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Pid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Process state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    /// Created, not yet admitted
    New,
    /// Waiting in the ready queue
    Ready,
    /// Occupying the running slot
    Running,
    /// Waiting in the blocked queue
    Blocked,
    /// Swapped out to the suspended queue
    Suspended,
    /// Finished; held by no queue
    Terminated,
}

impl ProcessState {
    /// All states, in lifecycle order
    pub const ALL: [ProcessState; 6] = [
        ProcessState::New,
        ProcessState::Ready,
        ProcessState::Running,
        ProcessState::Blocked,
        ProcessState::Suspended,
        ProcessState::Terminated,
    ];

    /// Lowercase state name
    pub fn name(&self) -> &'static str {
        match self {
            ProcessState::New => "new",
            ProcessState::Ready => "ready",
            ProcessState::Running => "running",
            ProcessState::Blocked => "blocked",
            ProcessState::Suspended => "suspended",
            ProcessState::Terminated => "terminated",
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProcessState {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|state| state.name() == wanted)
            .ok_or_else(|| KernelError::InvalidState(s.to_string()))
    }
}

/// I/O state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IoState {
    /// No outstanding I/O
    #[default]
    Idle,
    /// Waiting on a device
    Waiting,
}

/// Simulated register set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// Program counter
    pub pc: u64,
    /// Accumulator
    pub acc: u64,
    /// Stack pointer
    pub sp: u64,
}

/// Creation request, as received from a caller
///
/// Numeric fields are signed so that out-of-range input can be rejected
/// with a proper error instead of being unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    /// Process name (non-empty)
    pub name: String,
    /// Priority in `[0, 10]`, lower is more urgent
    pub priority: i64,
    /// Declared burst duration (> 0)
    pub burst: i64,
    /// Logical arrival time (>= 0)
    pub arrival: i64,
    /// Memory requirement in KB
    pub memory_kb: u32,
    /// Parent process
    pub parent: Option<Pid>,
}

impl ProcessSpec {
    /// Create spec with default memory and no parent
    pub fn new(name: &str, priority: i64, burst: i64, arrival: i64) -> Self {
        Self {
            name: name.to_string(),
            priority,
            burst,
            arrival,
            memory_kb: DEFAULT_MEMORY_KB,
            parent: None,
        }
    }

    /// Set memory requirement
    pub fn with_memory(mut self, memory_kb: u32) -> Self {
        self.memory_kb = memory_kb;
        self
    }

    /// Set parent
    pub fn with_parent(mut self, parent: Pid) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Check the creation constraints
    pub fn validate(&self) -> KernelResult<()> {
        if self.name.trim().is_empty() {
            return Err(KernelError::invalid("name must not be empty"));
        }

        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&self.priority) {
            return Err(KernelError::invalid(format!(
                "priority {} outside [{}, {}]",
                self.priority, MIN_PRIORITY, MAX_PRIORITY
            )));
        }

        if self.burst <= 0 {
            return Err(KernelError::invalid(format!("burst {} must be positive", self.burst)));
        }

        if self.arrival < 0 {
            return Err(KernelError::invalid(format!(
                "arrival {} must be non-negative",
                self.arrival
            )));
        }

        let limit = i64::from(u32::MAX);
        for (field, value) in [("burst", self.burst), ("arrival", self.arrival)] {
            if value > limit {
                return Err(KernelError::invalid(format!(
                    "{} {} exceeds maximum {}",
                    field, value, limit
                )));
            }
        }

        Ok(())
    }
}

/// Process control block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Process {
    /// Process ID
    pub pid: Pid,
    /// Process name
    pub name: String,
    /// Process state
    pub state: ProcessState,
    /// Priority, lower is more urgent
    pub priority: u8,
    /// Declared burst duration
    pub burst: u32,
    /// Logical arrival time
    pub arrival: u32,
    /// Parent process (lookup by id only)
    pub parent: Option<Pid>,
    /// Child processes, in creation order
    pub children: Vec<Pid>,
    /// Memory required (KB)
    pub memory_required: u32,
    /// Human readable allocation summary
    pub memory_allocated: Option<String>,
    /// Frames backing this process, mirrored from the memory manager
    pub page_table: Vec<usize>,
    /// Simulated registers
    pub registers: Registers,
    /// Processor label
    pub processor: String,
    /// I/O state
    pub io_state: IoState,
    /// Owner
    pub owner: String,
}

impl Process {
    /// Create new process from a validated spec
    pub fn new(pid: Pid, spec: &ProcessSpec) -> KernelResult<Self> {
        spec.validate()?;

        Ok(Self {
            pid,
            name: spec.name.clone(),
            state: ProcessState::New,
            priority: spec.priority as u8,
            burst: spec.burst as u32,
            arrival: spec.arrival as u32,
            parent: spec.parent.clone(),
            children: Vec::new(),
            memory_required: spec.memory_kb,
            memory_allocated: None,
            page_table: Vec::new(),
            registers: Registers::default(),
            processor: DEFAULT_PROCESSOR.to_string(),
            io_state: IoState::Idle,
            owner: DEFAULT_OWNER.to_string(),
        })
    }

    /// Add child process
    pub fn add_child(&mut self, pid: Pid) {
        if !self.children.contains(&pid) {
            self.children.push(pid);
        }
    }

    /// Remove child process
    pub fn remove_child(&mut self, pid: &Pid) {
        self.children.retain(|c| c != pid);
    }

    /// Mirror the memory manager's view of this process
    pub fn set_frames(&mut self, frames: Vec<usize>) {
        self.memory_allocated = if frames.is_empty() {
            None
        } else {
            Some(format!("{} pages in frames {:?}", frames.len(), frames))
        };
        self.page_table = frames;
    }

    /// Snapshot as a PCB info record
    pub fn pcb_info(&self) -> PcbInfo {
        PcbInfo::from(self)
    }
}

impl fmt::Display for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} ({})", self.pid, self.name, self.state)
    }
}

/// Serializable PCB snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcbInfo {
    pub pid: Pid,
    pub name: String,
    pub state: ProcessState,
    pub owner: String,
    pub priority: u8,
    pub burst: u32,
    pub arrival: u32,
    pub parent: Option<Pid>,
    pub children: Vec<Pid>,
    pub memory_required_kb: u32,
    pub memory_allocated: Option<String>,
    pub page_table: Vec<usize>,
    pub registers: Registers,
    pub processor: String,
    pub io_state: IoState,
}

impl From<&Process> for PcbInfo {
    fn from(p: &Process) -> Self {
        Self {
            pid: p.pid.clone(),
            name: p.name.clone(),
            state: p.state,
            owner: p.owner.clone(),
            priority: p.priority,
            burst: p.burst,
            arrival: p.arrival,
            parent: p.parent.clone(),
            children: p.children.clone(),
            memory_required_kb: p.memory_required,
            memory_allocated: p.memory_allocated.clone(),
            page_table: p.page_table.clone(),
            registers: p.registers,
            processor: p.processor.clone(),
            io_state: p.io_state,
        }
    }
}

/// Process table, in creation order
#[derive(Debug, Default)]
pub struct ProcessTable {
    processes: Vec<Process>,
}

impl ProcessTable {
    /// Create empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw a pid not used by any live process
    pub fn fresh_pid<R: Rng + ?Sized>(&self, rng: &mut R) -> Pid {
        loop {
            let pid = Pid::random(rng);
            if !self.contains(&pid) {
                return pid;
            }
        }
    }

    /// Append process
    pub fn insert(&mut self, process: Process) {
        self.processes.push(process);
    }

    /// Remove process, returning it
    pub fn remove(&mut self, pid: &Pid) -> Option<Process> {
        let idx = self.processes.iter().position(|p| &p.pid == pid)?;
        Some(self.processes.remove(idx))
    }

    /// Get process by ID
    pub fn get(&self, pid: &Pid) -> Option<&Process> {
        self.processes.iter().find(|p| &p.pid == pid)
    }

    /// Get mutable process by ID
    pub fn get_mut(&mut self, pid: &Pid) -> Option<&mut Process> {
        self.processes.iter_mut().find(|p| &p.pid == pid)
    }

    /// Check if a pid is live
    pub fn contains(&self, pid: &Pid) -> bool {
        self.get(pid).is_some()
    }

    /// Set state of a process, if present
    pub fn set_state(&mut self, pid: &Pid, state: ProcessState) {
        if let Some(p) = self.get_mut(pid) {
            p.state = state;
        }
    }

    /// Iterate in creation order
    pub fn iter(&self) -> impl Iterator<Item = &Process> {
        self.processes.iter()
    }

    /// Iterate mutably in creation order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Process> {
        self.processes.iter_mut()
    }

    /// Number of live processes
    pub fn len(&self) -> usize {
        self.processes.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ProcessSpec {
        ProcessSpec::new("editor", 3, 5, 0)
    }

    #[test]
    fn test_new_process_defaults() {
        let p = Process::new(Pid::from("00000001"), &spec()).unwrap();
        assert_eq!(p.state, ProcessState::New);
        assert_eq!(p.memory_required, DEFAULT_MEMORY_KB);
        assert_eq!(p.processor, "CPU-1");
        assert_eq!(p.owner, "admin");
        assert_eq!(p.io_state, IoState::Idle);
        assert!(p.page_table.is_empty());
        assert!(p.memory_allocated.is_none());
    }

    #[test]
    fn test_spec_validation() {
        assert!(spec().validate().is_ok());
        assert!(ProcessSpec::new("", 3, 5, 0).validate().is_err());
        assert!(ProcessSpec::new("   ", 3, 5, 0).validate().is_err());
        assert!(ProcessSpec::new("x", -1, 5, 0).validate().is_err());
        assert!(ProcessSpec::new("x", 11, 5, 0).validate().is_err());
        assert!(ProcessSpec::new("x", 10, 0, 0).validate().is_err());
        assert!(ProcessSpec::new("x", 0, 1, -3).validate().is_err());

        let err = ProcessSpec::new("x", 0, 0, 0).validate().unwrap_err();
        assert_eq!(err.kind(), "InvalidParameters");
    }

    #[test]
    fn test_spec_rejects_oversized_times() {
        let too_big = i64::from(u32::MAX) + 1;
        assert!(ProcessSpec::new("x", 0, i64::from(u32::MAX), 0).validate().is_ok());

        let err = ProcessSpec::new("x", 0, too_big, 0).validate().unwrap_err();
        assert_eq!(err.kind(), "InvalidParameters");
        assert!(err.to_string().contains("burst 4294967296 exceeds maximum"));
        assert!(!err.to_string().contains("positive"));

        let err = ProcessSpec::new("x", 0, 1, too_big).validate().unwrap_err();
        assert!(err.to_string().contains("arrival 4294967296 exceeds maximum"));
        assert!(!err.to_string().contains("non-negative"));
    }

    #[test]
    fn test_state_parse() {
        assert_eq!("ready".parse::<ProcessState>().unwrap(), ProcessState::Ready);
        assert_eq!("Suspended".parse::<ProcessState>().unwrap(), ProcessState::Suspended);
        assert_eq!(
            "zombie".parse::<ProcessState>(),
            Err(KernelError::InvalidState("zombie".into()))
        );
        for state in ProcessState::ALL {
            assert_eq!(state.name().parse::<ProcessState>().unwrap(), state);
        }
    }

    #[test]
    fn test_state_serializes_lowercase() {
        let json = serde_json::to_string(&ProcessState::Running).unwrap();
        assert_eq!(json, "\"running\"");
    }

    #[test]
    fn test_set_frames_describes_allocation() {
        let mut p = Process::new(Pid::from("00000001"), &spec()).unwrap();
        p.set_frames(vec![3, 4]);
        assert_eq!(p.memory_allocated.as_deref(), Some("2 pages in frames [3, 4]"));

        p.set_frames(Vec::new());
        assert!(p.memory_allocated.is_none());
    }

    #[test]
    fn test_children() {
        let mut p = Process::new(Pid::from("00000001"), &spec()).unwrap();
        p.add_child(Pid::from("00000002"));
        p.add_child(Pid::from("00000002"));
        p.add_child(Pid::from("00000003"));
        assert_eq!(p.children.len(), 2);

        p.remove_child(&Pid::from("00000002"));
        assert_eq!(p.children, vec![Pid::from("00000003")]);
    }

    #[test]
    fn test_fresh_pid_unique() {
        let mut table = ProcessTable::new();
        let mut rng = rand::thread_rng();

        for _ in 0..500 {
            let pid = table.fresh_pid(&mut rng);
            assert_eq!(pid.as_str().len(), 8);
            table.insert(Process::new(pid, &spec()).unwrap());
        }

        let mut pids: Vec<_> = table.iter().map(|p| p.pid.clone()).collect();
        pids.sort();
        pids.dedup();
        assert_eq!(pids.len(), 500);
    }

    #[test]
    fn test_table_remove() {
        let mut table = ProcessTable::new();
        table.insert(Process::new(Pid::from("a"), &spec()).unwrap());
        table.insert(Process::new(Pid::from("b"), &spec()).unwrap());

        assert!(table.remove(&Pid::from("a")).is_some());
        assert!(table.remove(&Pid::from("a")).is_none());
        assert_eq!(table.len(), 1);
        assert!(table.contains(&Pid::from("b")));
    }
}
