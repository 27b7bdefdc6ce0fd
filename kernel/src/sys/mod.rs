//! Core Kernel Services
//!
//! Provides the process-facing services:
//! - Process records and the process table
//! - Scheduler queues and dispatch
//! - What-if schedule timelines

pub mod process;
pub mod scheduler;
pub mod timeline;

pub use process::{Pid, Process, ProcessSpec, ProcessState, ProcessTable, PcbInfo};
pub use scheduler::{Policy, Queue, QueueSnapshot, Scheduler};
pub use timeline::{ScheduleReport, TimelineEntry};
