//! Line Protocol Client
//!
//! Opens one connection per request, as the server expects.

use crate::error::{RemoteError, RemoteResult};
use crate::protocol::{ProcessSummary, Reply, Request, Response};
use crate::server::DEFAULT_ADDR;
use simkernel::sys::PcbInfo;
use simkernel::{Pid, Policy};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// Remote kernel client
#[derive(Debug, Clone)]
pub struct Client {
    addr: String,
}

impl Default for Client {
    fn default() -> Self {
        Self::new(DEFAULT_ADDR)
    }
}

impl Client {
    /// Create client for a server address
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    /// Server address
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Send one request and wait for its response
    pub async fn request(&self, request: &Request) -> RemoteResult<Response> {
        let mut stream = TcpStream::connect(&self.addr).await?;

        let mut line = serde_json::to_vec(request)?;
        line.push(b'\n');
        stream.write_all(&line).await?;
        stream.flush().await?;

        let mut reader = BufReader::new(stream);
        let mut reply = String::new();
        if reader.read_line(&mut reply).await? == 0 {
            return Err(RemoteError::ConnectionClosed);
        }

        Ok(serde_json::from_str(reply.trim_end())?)
    }

    /// Send a request, turning an error status into `RemoteError::Server`
    async fn call(&self, request: Request) -> RemoteResult<Reply> {
        match self.request(&request).await? {
            Response::Success(reply) => Ok(reply),
            Response::Error { message } => Err(RemoteError::Server(message)),
        }
    }

    /// Create a process
    pub async fn create_process(
        &self,
        name: &str,
        priority: i64,
        burst: i64,
        arrival: i64,
    ) -> RemoteResult<Pid> {
        let request = Request::CreateProcess {
            name: name.to_string(),
            priority,
            burst,
            arrival,
        };

        match self.call(request).await? {
            Reply::Created { pid } => Ok(pid),
            other => Err(unexpected(other)),
        }
    }

    /// List every process
    pub async fn list_processes(&self) -> RemoteResult<Vec<ProcessSummary>> {
        match self.call(Request::ListProcesses).await? {
            Reply::Processes { processes } => Ok(processes),
            other => Err(unexpected(other)),
        }
    }

    /// Destroy a process
    pub async fn destroy_process(&self, pid: &Pid) -> RemoteResult<bool> {
        match self.call(Request::DestroyProcess { pid: pid.clone() }).await? {
            Reply::Destroyed { destroyed } => Ok(destroyed),
            other => Err(unexpected(other)),
        }
    }

    /// Dispatch the next process
    pub async fn dispatch(&self, policy: Policy) -> RemoteResult<Option<Pid>> {
        match self.call(Request::Dispatch { policy }).await? {
            Reply::Dispatched { dispatched } => Ok(dispatched),
            other => Err(unexpected(other)),
        }
    }

    /// Fetch a PCB record
    pub async fn pcb_info(&self, pid: &Pid) -> RemoteResult<PcbInfo> {
        match self.call(Request::PcbInfo { pid: pid.clone() }).await? {
            Reply::Pcb { pcb } => Ok(pcb),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(reply: Reply) -> RemoteError {
    RemoteError::UnexpectedReply(format!("{:?}", reply))
}
