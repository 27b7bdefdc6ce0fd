//! simkernel: Educational Operating System Kernel Simulator
//!
//! A bookkeeping model of a small kernel:
//! - Process control blocks and a process table
//! - Ready/blocked/suspended queues with FCFS and priority dispatch
//! - Paged memory over a fixed frame pool with LRU eviction
//! - A counting-semaphore resource
//! - Mailbox and shared-buffer IPC
//!
//! Nothing executes; operations only move records between containers.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Callers (CLI, remote connections)              │
//! └──────────────────────────────┬──────────────────────────────┘
//!                                │
//!                                ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Kernel (one exclusion lock)                │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────┐   │
//! │  │   Process    │  │  Scheduler   │  │  Memory Manager  │   │
//! │  │    Table     │  │   (queues)   │  │  (frames + LRU)  │   │
//! │  └──────────────┘  └──────────────┘  └──────────────────┘   │
//! │  ┌──────────────┐                                           │
//! │  │     IPC      │                                           │
//! │  │ (mailbox/shm)│                                           │
//! │  └──────────────┘                                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │           Resource Manager (own semaphore lock)             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod ipc;
pub mod kernel;
pub mod mm;
pub mod sync;
pub mod sys;

pub use config::SimConfig;
pub use error::{KernelError, KernelResult};
pub use kernel::Kernel;
pub use sys::process::{Pid, Process, ProcessSpec, ProcessState};
pub use sys::scheduler::Policy;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Kernel name
pub const NAME: &str = "μKernel simulator";
