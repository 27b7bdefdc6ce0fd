//! Kernel Façade
//!
//! The only externally callable surface. All process, scheduler, memory
//! and IPC state lives behind one lock so that every operation observes
//! and leaves a consistent view:
//!
//! - a process is in the table iff it was created and not destroyed
//! - a live process sits in at most one scheduler container
//! - a process's page-table mirror matches the memory manager
//!
//! The resource semaphore is separate. Blocking acquires wait on it with
//! the kernel lock released; lock order is always kernel, then resource.

use crate::config::SimConfig;
use crate::ipc::{CommMode, CommOutcome, Ipc, Message, SharedEntry};
use crate::mm::{FrameSlot, LruTrace, MemoryManager, MemoryStats};
use crate::sync::{ResourceManager, ResourceStatus};
use crate::sys::process::{PcbInfo, Pid, Process, ProcessSpec, ProcessState, ProcessTable};
use crate::sys::process::{MAX_PRIORITY, MIN_PRIORITY};
use crate::sys::scheduler::{Policy, QueueSnapshot, Scheduler};
use crate::sys::timeline::{self, ScheduleReport};
use crate::{KernelError, KernelResult};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// State guarded by the kernel lock
#[derive(Debug)]
struct KernelState {
    table: ProcessTable,
    scheduler: Scheduler,
    memory: MemoryManager,
    ipc: Ipc,
    config: SimConfig,
}

impl KernelState {
    /// Copy the memory manager's page tables into the given processes
    fn refresh_frames(&mut self, pids: &[Pid]) {
        for pid in pids {
            let frames = self.memory.page_table(pid);
            if let Some(p) = self.table.get_mut(pid) {
                p.set_frames(frames);
            }
        }
    }

    fn require(&self, pid: &Pid) -> KernelResult<&Process> {
        self.table
            .get(pid)
            .ok_or_else(|| KernelError::ProcessNotFound(pid.clone()))
    }
}

/// Simulated kernel
#[derive(Debug)]
pub struct Kernel {
    state: Mutex<KernelState>,
    resource: ResourceManager,
    config_path: Option<PathBuf>,
}

impl Kernel {
    /// Create kernel with an in-memory configuration
    pub fn new(config: SimConfig) -> KernelResult<Self> {
        config.validate()?;

        tracing::info!(
            "Kernel starting: {} KB memory, {} KB pages",
            config.total_memory_kb,
            config.page_size_kb
        );

        Ok(Self {
            state: Mutex::new(KernelState {
                table: ProcessTable::new(),
                scheduler: Scheduler::new(),
                memory: MemoryManager::new(&config),
                ipc: Ipc::new(),
                config,
            }),
            resource: ResourceManager::default(),
            config_path: None,
        })
    }

    /// Create kernel backed by a configuration file
    ///
    /// The file is created with defaults if absent, and rewritten on
    /// every page size change.
    pub fn with_config_file(path: impl AsRef<Path>) -> KernelResult<Self> {
        let path = path.as_ref();
        let config = SimConfig::load_or_init(path)?;

        let mut kernel = Self::new(config)?;
        kernel.config_path = Some(path.to_path_buf());
        Ok(kernel)
    }

    /// Replace the managed resource
    pub fn with_resource(mut self, resource: ResourceManager) -> Self {
        self.resource = resource;
        self
    }

    /// Current configuration
    pub fn config(&self) -> SimConfig {
        self.state.lock().config
    }

    /// Configuration file, if any
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    // ========================================================================
    // Processes
    // ========================================================================

    /// Create a process with default memory and no parent
    pub fn create_process(
        &self,
        name: &str,
        priority: i64,
        burst: i64,
        arrival: i64,
    ) -> KernelResult<Process> {
        self.spawn(ProcessSpec::new(name, priority, burst, arrival))
    }

    /// Create a process from a full spec
    ///
    /// Memory is allocated before the process enters the table, so a
    /// failed allocation leaves nothing behind.
    pub fn spawn(&self, spec: ProcessSpec) -> KernelResult<Process> {
        spec.validate()?;

        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Some(parent) = &spec.parent {
            state.require(parent)?;
        }

        let pid = state.table.fresh_pid(&mut rand::thread_rng());
        let mut process = Process::new(pid.clone(), &spec)?;

        let allocation = state.memory.allocate(&pid, spec.memory_kb)?;
        process.set_frames(allocation.frames.clone());
        state.refresh_frames(&allocation.victims());

        state.table.insert(process);
        if let Some(parent) = spec.parent.as_ref().and_then(|p| state.table.get_mut(p)) {
            parent.add_child(pid.clone());
        }
        state.scheduler.admit(&mut state.table, &pid);

        tracing::info!("Created process {} ({})", pid, spec.name);

        state
            .table
            .get(&pid)
            .cloned()
            .ok_or(KernelError::ProcessNotFound(pid))
    }

    /// Destroy a process
    ///
    /// Frees its memory, removes it from the scheduler, reclaims any
    /// resource permits and pending messages, and unlinks it from its
    /// parent and children. Returns false for an unknown pid.
    pub fn destroy_process(&self, pid: &Pid) -> bool {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let Some(process) = state.table.remove(pid) else {
            return false;
        };

        state.memory.deallocate(pid);
        state.scheduler.remove(pid);
        self.resource.release_all(pid);
        state.ipc.mailbox.discard_for(pid);

        if let Some(parent) = process.parent.as_ref().and_then(|p| state.table.get_mut(p)) {
            parent.remove_child(pid);
        }
        for child in &process.children {
            if let Some(c) = state.table.get_mut(child) {
                c.parent = None;
            }
        }

        tracing::info!("Destroyed process {} ({})", pid, process.name);
        true
    }

    /// Move a process to `new_state`
    ///
    /// Returns false for an unknown pid.
    pub fn set_state(&self, pid: &Pid, new_state: ProcessState) -> bool {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if !state.table.contains(pid) {
            return false;
        }

        state.scheduler.transition(&mut state.table, pid, new_state);
        true
    }

    /// Move a process to the state named `new_state`
    pub fn change_state(&self, pid: &Pid, new_state: &str) -> KernelResult<bool> {
        let new_state: ProcessState = new_state.parse()?;
        Ok(self.set_state(pid, new_state))
    }

    /// Change the priority of a process
    ///
    /// Returns false for an unknown pid. The new priority takes effect at
    /// the next priority dispatch.
    pub fn change_priority(&self, pid: &Pid, priority: i64) -> KernelResult<bool> {
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
            return Err(KernelError::invalid(format!(
                "priority {} outside [{}, {}]",
                priority, MIN_PRIORITY, MAX_PRIORITY
            )));
        }

        let mut state = self.state.lock();
        match state.table.get_mut(pid) {
            Some(p) => {
                p.priority = priority as u8;
                tracing::debug!("Priority of {} set to {}", pid, priority);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Pick the next process to run
    pub fn dispatch(&self, policy: Policy) -> Option<Process> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let pid = state.scheduler.dispatch(&mut state.table, policy)?;
        state.table.get(&pid).cloned()
    }

    /// All processes, in creation order
    pub fn list_all_processes(&self) -> Vec<Process> {
        self.state.lock().table.iter().cloned().collect()
    }

    /// Snapshot of one process
    pub fn process(&self, pid: &Pid) -> Option<Process> {
        self.state.lock().table.get(pid).cloned()
    }

    /// PCB record of one process
    pub fn pcb_info(&self, pid: &Pid) -> Option<PcbInfo> {
        self.state.lock().table.get(pid).map(PcbInfo::from)
    }

    /// Snapshot of the scheduler containers
    pub fn queues(&self) -> QueueSnapshot {
        self.state.lock().scheduler.queues()
    }

    /// Non-preemptive timeline of the current process table
    pub fn schedule_report(&self, policy: Policy) -> ScheduleReport {
        let processes = self.list_all_processes();
        timeline::simulate(policy, &processes)
    }

    // ========================================================================
    // Resource
    // ========================================================================

    /// Block until `pid` holds the resource
    pub fn acquire_resource(&self, pid: &Pid) -> KernelResult<()> {
        self.ensure_process(pid)?;
        self.resource.acquire(pid);
        self.confirm_acquire(pid)
    }

    /// Take the resource if it is free right now
    pub fn try_acquire_resource(&self, pid: &Pid) -> KernelResult<bool> {
        self.ensure_process(pid)?;
        if !self.resource.try_acquire(pid) {
            return Ok(false);
        }
        self.confirm_acquire(pid).map(|_| true)
    }

    /// Wait at most `timeout` for the resource
    pub fn acquire_resource_timeout(&self, pid: &Pid, timeout: Duration) -> KernelResult<bool> {
        self.ensure_process(pid)?;
        if !self.resource.acquire_timeout(pid, timeout) {
            return Ok(false);
        }
        self.confirm_acquire(pid).map(|_| true)
    }

    /// Return a permit held by `pid`
    pub fn release_resource(&self, pid: &Pid) -> KernelResult<()> {
        self.resource.release(pid)
    }

    /// Current resource holders
    pub fn resource_status(&self) -> ResourceStatus {
        let _state = self.state.lock();
        self.resource.status()
    }

    fn ensure_process(&self, pid: &Pid) -> KernelResult<()> {
        self.state.lock().require(pid).map(|_| ())
    }

    /// Undo an acquire whose process was destroyed while it waited
    fn confirm_acquire(&self, pid: &Pid) -> KernelResult<()> {
        let state = self.state.lock();
        if state.table.contains(pid) {
            return Ok(());
        }

        self.resource.release_all(pid);
        tracing::warn!("{} destroyed while acquiring '{}'", pid, self.resource.name());
        Err(KernelError::ProcessNotFound(pid.clone()))
    }

    // ========================================================================
    // IPC
    // ========================================================================

    /// Queue a message for `receiver`
    pub fn send_message(&self, sender: &Pid, receiver: &Pid, payload: &str) -> KernelResult<()> {
        let mut state = self.state.lock();
        state.require(receiver)?;

        state.ipc.mailbox.send(Message {
            sender: sender.clone(),
            receiver: receiver.clone(),
            payload: payload.to_string(),
        });
        Ok(())
    }

    /// Take the oldest message addressed to `pid`
    pub fn receive_message(&self, pid: &Pid) -> Option<Message> {
        self.state.lock().ipc.mailbox.receive(pid)
    }

    /// Overwrite the shared buffer
    pub fn write_shared_memory(&self, pid: &Pid, data: &str) {
        self.state.lock().ipc.shared.write(pid.clone(), data.to_string());
    }

    /// Read the shared buffer
    pub fn read_shared_memory(&self, pid: &Pid) -> Option<SharedEntry> {
        let state = self.state.lock();
        let entry = state.ipc.shared.read().cloned();
        tracing::debug!("Shared memory read by {}", pid);
        entry
    }

    /// Communicate using the mode named `mode`
    pub fn communicate(
        &self,
        sender: &Pid,
        receiver: Option<&Pid>,
        payload: &str,
        mode: &str,
    ) -> KernelResult<CommOutcome> {
        match mode.parse::<CommMode>()? {
            CommMode::Message => {
                let receiver =
                    receiver.ok_or_else(|| KernelError::invalid("message mode needs a receiver"))?;
                self.send_message(sender, receiver, payload)?;
                Ok(CommOutcome::Sent)
            }
            CommMode::SharedMemoryWrite => {
                self.write_shared_memory(sender, payload);
                Ok(CommOutcome::Written)
            }
            CommMode::SharedMemoryRead => Ok(CommOutcome::Read(self.read_shared_memory(sender))),
        }
    }

    // ========================================================================
    // Memory
    // ========================================================================

    /// (Re)allocate frames for a process
    pub fn allocate_memory(&self, pid: &Pid) -> KernelResult<Vec<usize>> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let memory_kb = state.require(pid)?.memory_required;
        let allocation = state.memory.allocate(pid, memory_kb)?;

        let mut touched = allocation.victims();
        touched.push(pid.clone());
        state.refresh_frames(&touched);

        Ok(allocation.frames)
    }

    /// Free every frame of a process
    pub fn deallocate_memory(&self, pid: &Pid) -> KernelResult<Vec<usize>> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        state.require(pid)?;
        let freed = state.memory.deallocate(pid);
        state.refresh_frames(std::slice::from_ref(pid));
        Ok(freed)
    }

    /// Frames currently backing a process
    pub fn page_table(&self, pid: &Pid) -> KernelResult<Vec<usize>> {
        let state = self.state.lock();
        state.require(pid)?;
        Ok(state.memory.page_table(pid))
    }

    /// Mark a page of a process most recently used
    pub fn touch_page(&self, pid: &Pid, page_number: usize) -> KernelResult<usize> {
        let mut state = self.state.lock();
        state.require(pid)?;
        state.memory.touch(pid, page_number)
    }

    /// Every frame and its occupant
    pub fn memory_map(&self) -> Vec<FrameSlot> {
        self.state.lock().memory.memory_map()
    }

    /// Memory statistics
    pub fn memory_stats(&self) -> MemoryStats {
        self.state.lock().memory.stats()
    }

    /// Replay a reference string under LRU
    pub fn simulate_reference_string(&self, pages: &[u32], capacity: usize) -> KernelResult<LruTrace> {
        MemoryManager::simulate_reference_string(pages, capacity)
    }

    /// Change the page size
    ///
    /// Every allocation is dropped. The configuration file, if any, is
    /// rewritten first; if that fails nothing changes.
    pub fn set_page_size(&self, page_size_kb: u32) -> KernelResult<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        state.memory.check_page_size(page_size_kb)?;
        let config = SimConfig { page_size_kb, ..state.config };
        config.validate()?;
        if let Some(path) = &self.config_path {
            config.save(path)?;
        }

        state.memory.set_page_size(page_size_kb)?;
        for p in state.table.iter_mut() {
            p.set_frames(Vec::new());
        }
        state.config = config;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kernel() -> Kernel {
        Kernel::new(SimConfig::default()).unwrap()
    }

    #[test]
    fn test_kernel_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Kernel>();
    }

    #[test]
    fn test_create_admits_and_allocates() {
        let k = kernel();
        let p = k.create_process("shell", 2, 5, 0).unwrap();

        assert_eq!(p.state, ProcessState::Ready);
        assert_eq!(p.page_table, vec![0, 1]);
        assert_eq!(k.queues().ready, vec![p.pid.clone()]);
        assert_eq!(k.memory_stats().free_frames, 14);
    }

    #[test]
    fn test_create_rejects_bad_input() {
        let k = kernel();
        let err = k.create_process("x", 11, 5, 0).unwrap_err();
        assert_eq!(err.kind(), "InvalidParameters");
        assert!(k.list_all_processes().is_empty());
    }

    #[test]
    fn test_oversized_create_leaves_nothing() {
        let k = kernel();
        let spec = ProcessSpec::new("big", 1, 1, 0).with_memory(4096);
        assert_eq!(k.spawn(spec).unwrap_err(), KernelError::MemoryExhausted);
        assert!(k.list_all_processes().is_empty());
        assert!(k.queues().ready.is_empty());
    }

    #[test]
    fn test_spawn_links_parent() {
        let k = kernel();
        let parent = k.create_process("init", 0, 1, 0).unwrap();
        let child = k
            .spawn(ProcessSpec::new("worker", 5, 2, 1).with_parent(parent.pid.clone()))
            .unwrap();

        assert_eq!(k.pcb_info(&parent.pid).unwrap().children, vec![child.pid.clone()]);
        assert_eq!(child.parent.as_ref(), Some(&parent.pid));

        let orphan = ProcessSpec::new("lost", 5, 2, 1).with_parent(Pid::from("deadbeef"));
        assert_eq!(k.spawn(orphan).unwrap_err().kind(), "ProcessNotFound");
    }

    #[test]
    fn test_change_state_unknown() {
        let k = kernel();
        assert_eq!(k.change_state(&Pid::from("nope"), "ready"), Ok(false));
        assert!(matches!(
            k.change_state(&Pid::from("nope"), "zombie"),
            Err(KernelError::InvalidState(_))
        ));
    }

    #[test]
    fn test_change_priority() {
        let k = kernel();
        let p = k.create_process("a", 5, 1, 0).unwrap();

        assert_eq!(k.change_priority(&p.pid, 1), Ok(true));
        assert_eq!(k.process(&p.pid).unwrap().priority, 1);
        assert_eq!(k.change_priority(&Pid::from("nope"), 1), Ok(false));
        assert!(k.change_priority(&p.pid, 42).is_err());
    }

    #[test]
    fn test_communicate_modes() {
        let k = kernel();
        let a = k.create_process("a", 1, 1, 0).unwrap().pid;
        let b = k.create_process("b", 1, 1, 0).unwrap().pid;

        assert_eq!(k.communicate(&a, Some(&b), "hi", "message"), Ok(CommOutcome::Sent));
        assert_eq!(k.receive_message(&b).unwrap().payload, "hi");

        assert_eq!(k.communicate(&a, None, "d", "shared_memory_write"), Ok(CommOutcome::Written));
        match k.communicate(&b, None, "", "shared_memory_read").unwrap() {
            CommOutcome::Read(Some(entry)) => assert_eq!(entry.writer, a),
            other => panic!("unexpected {:?}", other),
        }

        assert_eq!(k.communicate(&a, None, "x", "message").unwrap_err().kind(), "InvalidParameters");
        assert_eq!(
            k.communicate(&a, Some(&b), "x", "telepathy").unwrap_err(),
            KernelError::InvalidCommunicationMode("telepathy".into())
        );
    }

    #[test]
    fn test_send_to_unknown_receiver() {
        let k = kernel();
        let a = k.create_process("a", 1, 1, 0).unwrap().pid;
        assert_eq!(
            k.send_message(&a, &Pid::from("ghost"), "x"),
            Err(KernelError::ProcessNotFound(Pid::from("ghost")))
        );
    }

    #[test]
    fn test_eviction_refreshes_victim_mirror() {
        let k = Kernel::new(SimConfig { page_size_kb: 64, total_memory_kb: 256 }).unwrap();
        let a = k.create_process("a", 1, 1, 0).unwrap().pid;
        let b = k.create_process("b", 1, 1, 0).unwrap().pid;

        k.touch_page(&a, 0).unwrap();
        k.touch_page(&a, 1).unwrap();

        let c = k.spawn(ProcessSpec::new("c", 1, 1, 0).with_memory(64)).unwrap();
        assert_eq!(c.page_table, vec![2]);

        let victim = k.process(&b).unwrap();
        assert_eq!(victim.page_table, vec![3]);
        assert_eq!(k.page_table(&b).unwrap(), vec![3]);
        assert_eq!(victim.memory_allocated.as_deref(), Some("1 pages in frames [3]"));
    }

    #[test]
    fn test_deallocate_clears_descriptor() {
        let k = kernel();
        let p = k.create_process("a", 1, 1, 0).unwrap().pid;

        assert_eq!(k.deallocate_memory(&p).unwrap(), vec![0, 1]);
        assert!(k.pcb_info(&p).unwrap().memory_allocated.is_none());
        assert_eq!(k.allocate_memory(&p).unwrap(), vec![0, 1]);
        assert_eq!(k.page_table(&Pid::from("nope")).unwrap_err().kind(), "ProcessNotFound");
    }

    #[test]
    fn test_set_page_size_clears_mirrors() {
        let k = kernel();
        let p = k.create_process("a", 1, 1, 0).unwrap().pid;

        k.set_page_size(128).unwrap();
        assert!(k.process(&p).unwrap().page_table.is_empty());
        assert_eq!(k.memory_stats().total_frames, 8);
        assert_eq!(k.config().page_size_kb, 128);

        assert!(k.set_page_size(0).is_err());
        assert_eq!(k.config().page_size_kb, 128);
    }
}
