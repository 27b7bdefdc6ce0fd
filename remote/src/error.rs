//! Error types for the remote transport

use thiserror::Error;

/// Result type for remote operations
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Remote transport error types
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Socket failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload is not valid protocol JSON
    #[error("Protocol error: {0}")]
    Protocol(#[from] serde_json::Error),

    /// Request exceeded the size limit
    #[error("Request too large: {0} bytes (max {1})")]
    RequestTooLarge(usize, usize),

    /// Peer closed the connection without a response
    #[error("Connection closed")]
    ConnectionClosed,

    /// Server answered with an error status
    #[error("Server error: {0}")]
    Server(String),

    /// Server answered with a reply of the wrong shape
    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),

    /// Kernel could not be started
    #[error("Kernel error: {0}")]
    Kernel(#[from] simkernel::KernelError),
}

impl RemoteError {
    /// Check if the failure came from the network rather than the peer
    pub fn is_transport(&self) -> bool {
        matches!(self, RemoteError::Io(_) | RemoteError::ConnectionClosed)
    }
}
