//! Wire Protocol
//!
//! One JSON object per request and per response, UTF-8, newline
//! terminated. Requests are tagged by `action`, responses by `status`.
//!
//! ```text
//! → {"action":"create_process","name":"sh","priority":1,"burst":4,"arrival":0}
//! ← {"status":"success","pid":"3fa1c09e"}
//!
//! → {"action":"list_processes"}
//! ← {"status":"success","processes":[{"pid":"3fa1c09e","name":"sh","state":"ready"}]}
//!
//! → {"action":"bogus"}
//! ← {"status":"error","message":"Invalid request"}
//! ```

use serde::{Deserialize, Serialize};
use simkernel::sys::PcbInfo;
use simkernel::{Kernel, KernelError, Pid, Policy, Process, ProcessState};

/// Message for anything that does not parse as a known action
pub const INVALID_REQUEST: &str = "Invalid request";

/// Client request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Request {
    /// Create a process with default memory
    CreateProcess {
        name: String,
        priority: i64,
        burst: i64,
        arrival: i64,
    },
    /// List every process
    ListProcesses,
    /// Destroy a process
    DestroyProcess { pid: Pid },
    /// Dispatch the next process
    Dispatch { policy: Policy },
    /// Fetch a PCB record
    PcbInfo { pid: Pid },
}

/// Process entry of a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSummary {
    pub pid: Pid,
    pub name: String,
    pub state: ProcessState,
}

impl From<&Process> for ProcessSummary {
    fn from(p: &Process) -> Self {
        Self {
            pid: p.pid.clone(),
            name: p.name.clone(),
            state: p.state,
        }
    }
}

/// Successful reply payload, flattened next to `status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    Created { pid: Pid },
    Processes { processes: Vec<ProcessSummary> },
    Pcb { pcb: PcbInfo },
    Destroyed { destroyed: bool },
    Dispatched { dispatched: Option<Pid> },
}

/// Server response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Response {
    Success(Reply),
    Error { message: String },
}

impl Response {
    /// Error response with a message
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error { message: message.into() }
    }

    /// Check for success status
    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success(_))
    }
}

impl From<KernelError> for Response {
    fn from(err: KernelError) -> Self {
        Response::error(err.to_string())
    }
}

/// Parse one request line and execute it against the kernel
pub fn handle(kernel: &Kernel, line: &str) -> Response {
    match serde_json::from_str::<Request>(line.trim()) {
        Ok(request) => execute(kernel, request),
        Err(e) => {
            tracing::warn!("Rejected request: {}", e);
            Response::error(INVALID_REQUEST)
        }
    }
}

/// Execute a parsed request
pub fn execute(kernel: &Kernel, request: Request) -> Response {
    match request {
        Request::CreateProcess { name, priority, burst, arrival } => {
            match kernel.create_process(&name, priority, burst, arrival) {
                Ok(p) => {
                    tracing::info!("Remote process created: {}", p);
                    Response::Success(Reply::Created { pid: p.pid })
                }
                Err(e) => e.into(),
            }
        }
        Request::ListProcesses => {
            let processes = kernel
                .list_all_processes()
                .iter()
                .map(ProcessSummary::from)
                .collect();
            Response::Success(Reply::Processes { processes })
        }
        Request::DestroyProcess { pid } => Response::Success(Reply::Destroyed {
            destroyed: kernel.destroy_process(&pid),
        }),
        Request::Dispatch { policy } => Response::Success(Reply::Dispatched {
            dispatched: kernel.dispatch(policy).map(|p| p.pid),
        }),
        Request::PcbInfo { pid } => match kernel.pcb_info(&pid) {
            Some(pcb) => Response::Success(Reply::Pcb { pcb }),
            None => KernelError::ProcessNotFound(pid).into(),
        },
    }
}
