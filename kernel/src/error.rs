//! Error types for the μKernel simulator
//!
//! Every public kernel operation returns either a value or one of these
//! kinds. None of them is fatal to the simulation.

use crate::sys::process::Pid;
use thiserror::Error;

/// Result type for kernel operations
pub type KernelResult<T> = Result<T, KernelError>;

/// Kernel error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
    /// Malformed creation or priority input
    #[error("Invalid process parameters: {0}")]
    InvalidParameters(String),

    /// Unknown pid
    #[error("Process not found: {0}")]
    ProcessNotFound(Pid),

    /// Unrecognized state name
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// No free frame and nothing to evict
    #[error("No available frames")]
    MemoryExhausted,

    /// Release attempted by a process that holds no permit
    #[error("{pid} does not hold '{resource}'")]
    ResourceNotHeld {
        /// Process that attempted the release
        pid: Pid,
        /// Resource name
        resource: String,
    },

    /// Unrecognized IPC mode
    #[error("Invalid communication mode: {0}")]
    InvalidCommunicationMode(String),

    /// Configuration could not be read, parsed or written
    #[error("Configuration error: {0}")]
    Config(String),
}

impl KernelError {
    /// Stable label of the error kind, independent of the payload
    pub fn kind(&self) -> &'static str {
        match self {
            KernelError::InvalidParameters(_) => "InvalidParameters",
            KernelError::ProcessNotFound(_) => "ProcessNotFound",
            KernelError::InvalidState(_) => "InvalidState",
            KernelError::MemoryExhausted => "MemoryExhausted",
            KernelError::ResourceNotHeld { .. } => "ResourceNotHeld",
            KernelError::InvalidCommunicationMode(_) => "InvalidCommunicationMode",
            KernelError::Config(_) => "Config",
        }
    }

    /// Shorthand for an `InvalidParameters` error
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        KernelError::InvalidParameters(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = KernelError::ProcessNotFound(Pid::from("ab12cd34"));
        assert_eq!(err.to_string(), "Process not found: ab12cd34");

        let err = KernelError::ResourceNotHeld {
            pid: Pid::from("0000beef"),
            resource: "Printer".into(),
        };
        assert_eq!(err.to_string(), "0000beef does not hold 'Printer'");
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(KernelError::MemoryExhausted.kind(), "MemoryExhausted");
        assert_eq!(KernelError::InvalidState("zombie".into()).kind(), "InvalidState");
        assert_eq!(KernelError::invalid("burst").kind(), "InvalidParameters");
    }
}
