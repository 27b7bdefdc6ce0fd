//! Line Protocol Server
//!
//! Accepts connections and answers exactly one request per connection:
//! read one request, write one response line, close. Each connection
//! runs on its own task; no session state survives a connection.
//!
//! A request ends at the first newline, at EOF, or as soon as the bytes
//! received so far form a complete JSON value (for clients that neither
//! terminate the line nor half-close the socket).

use crate::error::{RemoteError, RemoteResult};
use crate::protocol::{self, Response};
use simkernel::Kernel;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

/// Default listen address
pub const DEFAULT_ADDR: &str = "127.0.0.1:9999";

/// Largest accepted request
pub const MAX_REQUEST_SIZE: usize = 64 * 1024;

/// Read buffer size
const CHUNK_SIZE: usize = 1024;

/// Remote control server
pub struct Server {
    listener: TcpListener,
    kernel: Arc<Kernel>,
}

impl Server {
    /// Bind to `addr`
    pub async fn bind(addr: &str, kernel: Arc<Kernel>) -> RemoteResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server started on {}", listener.local_addr()?);
        Ok(Self { listener, kernel })
    }

    /// Bound address
    pub fn local_addr(&self) -> RemoteResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared kernel
    pub fn kernel(&self) -> &Arc<Kernel> {
        &self.kernel
    }

    /// Accept connections until the listener fails
    pub async fn run(self) -> RemoteResult<()> {
        loop {
            let (stream, peer) = self.listener.accept().await?;
            info!("Connection from {}", peer);

            let kernel = Arc::clone(&self.kernel);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, kernel).await {
                    warn!("Error handling client {}: {}", peer, e);
                }
            });
        }
    }
}

/// Serve one request on an accepted connection
pub async fn handle_connection(mut stream: TcpStream, kernel: Arc<Kernel>) -> RemoteResult<()> {
    let response = match read_request(&mut stream).await {
        Ok(line) => protocol::handle(&kernel, &line),
        Err(e @ RemoteError::RequestTooLarge(..)) => Response::error(e.to_string()),
        Err(e) => return Err(e),
    };

    write_response(&mut stream, &response).await?;
    stream.shutdown().await?;
    Ok(())
}

/// Read one request from a stream
pub async fn read_request<R: AsyncRead + Unpin>(reader: &mut R) -> RemoteResult<String> {
    let mut buf = Vec::with_capacity(CHUNK_SIZE);
    let mut chunk = [0u8; CHUNK_SIZE];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }

        buf.extend_from_slice(&chunk[..n]);

        if let Some(end) = buf.iter().position(|&b| b == b'\n') {
            buf.truncate(end);
            break;
        }

        if buf.len() > MAX_REQUEST_SIZE {
            return Err(RemoteError::RequestTooLarge(buf.len(), MAX_REQUEST_SIZE));
        }

        if serde_json::from_slice::<serde_json::Value>(&buf).is_ok() {
            break;
        }
    }

    if buf.is_empty() {
        return Err(RemoteError::ConnectionClosed);
    }

    let line = String::from_utf8_lossy(&buf).into_owned();
    debug!("Request: {}", line.trim_end());
    Ok(line)
}

/// Write a response as one line
pub async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &Response,
) -> RemoteResult<()> {
    let mut line = serde_json::to_vec(response)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}
