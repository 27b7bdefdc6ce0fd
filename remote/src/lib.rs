//! simremote: Remote Control for the μKernel Simulator
//!
//! A line-oriented JSON request/response service over TCP:
//! - One request and one response per connection
//! - Process creation, listing, destruction, dispatch and PCB queries
//! - Async client for the same protocol
//!
//! # Usage
//!
//! ```rust,ignore
//! use simremote::{Client, Server};
//! use simkernel::{Kernel, SimConfig};
//! use std::sync::Arc;
//!
//! let kernel = Arc::new(Kernel::new(SimConfig::default())?);
//! let server = Server::bind("127.0.0.1:9999", kernel).await?;
//! tokio::spawn(server.run());
//!
//! let client = Client::new("127.0.0.1:9999");
//! let pid = client.create_process("shell", 1, 4, 0).await?;
//! ```

pub mod client;
pub mod error;
pub mod protocol;
pub mod server;

pub use client::Client;
pub use error::{RemoteError, RemoteResult};
pub use protocol::{ProcessSummary, Reply, Request, Response};
pub use server::Server;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
