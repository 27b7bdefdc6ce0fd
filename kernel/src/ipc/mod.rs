//! Inter-Process Communication (IPC)
//!
//! Two independent primitives:
//! - Mailbox: one system-wide FIFO of addressed messages
//! - Shared buffer: a single last-writer-wins slot
//!
//! # Mailbox Scan
//!
//! ```text
//! front                                          back
//! ┌──────────┬──────────┬──────────┬──────────┐
//! │ a -> X   │ b -> Y   │ c -> X   │ d -> Z   │
//! └──────────┴──────────┴──────────┴──────────┘
//!
//! receive(Y) takes "b -> Y"; the others keep their relative order
//! ```
//!
//! Receiver existence is checked by the kernel, which owns the process
//! table. Both primitives rely on the kernel lock for exclusion.

use crate::sys::process::Pid;
use crate::KernelError;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

/// Addressed message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Sending process
    pub sender: Pid,
    /// Addressee
    pub receiver: Pid,
    /// Message body
    pub payload: String,
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Message from {}: {}", self.sender, self.payload)
    }
}

/// System-wide message queue
#[derive(Debug, Default)]
pub struct Mailbox {
    /// Pending messages, oldest first
    pending: VecDeque<Message>,
}

impl Mailbox {
    /// Create empty mailbox
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a message
    pub fn send(&mut self, message: Message) {
        tracing::debug!("Queued message {} -> {}", message.sender, message.receiver);
        self.pending.push_back(message);
    }

    /// Dequeue the oldest message addressed to `pid`
    pub fn receive(&mut self, pid: &Pid) -> Option<Message> {
        let idx = self.pending.iter().position(|m| &m.receiver == pid)?;
        let message = self.pending.remove(idx)?;
        tracing::debug!("Delivered message {} -> {}", message.sender, message.receiver);
        Some(message)
    }

    /// Drop every message addressed to `pid`
    pub fn discard_for(&mut self, pid: &Pid) -> usize {
        let before = self.pending.len();
        self.pending.retain(|m| &m.receiver != pid);
        before - self.pending.len()
    }

    /// Number of pending messages
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Content of the shared buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedEntry {
    /// Last writer
    pub writer: Pid,
    /// Stored data
    pub data: String,
}

/// Single-slot shared buffer
#[derive(Debug, Default)]
pub struct SharedBuffer {
    slot: Option<SharedEntry>,
}

impl SharedBuffer {
    /// Create empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the buffer
    pub fn write(&mut self, writer: Pid, data: String) {
        tracing::debug!("Shared memory written by {}", writer);
        self.slot = Some(SharedEntry { writer, data });
    }

    /// Current content, if ever written
    pub fn read(&self) -> Option<&SharedEntry> {
        self.slot.as_ref()
    }
}

/// Communication mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommMode {
    /// Mailbox send
    Message,
    /// Shared buffer write
    SharedMemoryWrite,
    /// Shared buffer read
    SharedMemoryRead,
}

impl CommMode {
    /// Mode name as accepted by [`FromStr`]
    pub fn name(&self) -> &'static str {
        match self {
            CommMode::Message => "message",
            CommMode::SharedMemoryWrite => "shared_memory_write",
            CommMode::SharedMemoryRead => "shared_memory_read",
        }
    }
}

impl fmt::Display for CommMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CommMode {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "message" => Ok(CommMode::Message),
            "shared_memory_write" => Ok(CommMode::SharedMemoryWrite),
            "shared_memory_read" => Ok(CommMode::SharedMemoryRead),
            _ => Err(KernelError::InvalidCommunicationMode(s.to_string())),
        }
    }
}

/// Outcome of a generic communication request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommOutcome {
    /// Message queued for the receiver
    Sent,
    /// Shared buffer overwritten
    Written,
    /// Shared buffer content (None = never written)
    Read(Option<SharedEntry>),
}

/// IPC state owned by the kernel
#[derive(Debug, Default)]
pub struct Ipc {
    pub mailbox: Mailbox,
    pub shared: SharedBuffer,
}

impl Ipc {
    /// Create empty IPC state
    pub fn new() -> Self {
        Self::default()
    }
}
