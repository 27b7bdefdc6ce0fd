//! Integration tests for simremote
//!
//! A real server on an ephemeral port, driven by the client and by raw
//! sockets.

use simkernel::{Kernel, Pid, Policy, ProcessState, SimConfig};
use simremote::{Client, RemoteError, Server};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn start() -> (Client, Arc<Kernel>) {
    let kernel = Arc::new(Kernel::new(SimConfig::default()).unwrap());
    let server = Server::bind("127.0.0.1:0", Arc::clone(&kernel)).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    (Client::new(addr.to_string()), kernel)
}

async fn raw_exchange(client: &Client, payload: &[u8]) -> String {
    let mut stream = TcpStream::connect(client.addr()).await.unwrap();
    stream.write_all(payload).await.unwrap();
    stream.shutdown().await.unwrap();

    let mut reply = String::new();
    stream.read_to_string(&mut reply).await.unwrap();
    reply
}

mod client_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_then_list() {
        let (client, kernel) = start().await;

        let pid = client.create_process("shell", 1, 4, 0).await.unwrap();
        let listed = client.list_processes().await.unwrap();

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].pid, pid);
        assert_eq!(listed[0].name, "shell");
        assert_eq!(listed[0].state, ProcessState::Ready);
        assert!(kernel.process(&pid).is_some());
    }

    #[tokio::test]
    async fn test_invalid_create_reports_error() {
        let (client, kernel) = start().await;

        let err = client.create_process("bad", 42, 4, 0).await.unwrap_err();
        match err {
            RemoteError::Server(message) => {
                assert!(message.starts_with("Invalid process parameters"))
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(kernel.list_all_processes().is_empty());

        // the server keeps serving after a failure
        assert!(client.list_processes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_pcb_destroy() {
        let (client, _kernel) = start().await;
        let low = client.create_process("low", 8, 1, 0).await.unwrap();
        let high = client.create_process("high", 1, 1, 1).await.unwrap();

        assert_eq!(client.dispatch(Policy::Priority).await.unwrap(), Some(high.clone()));

        let pcb = client.pcb_info(&high).await.unwrap();
        assert_eq!(pcb.state, ProcessState::Running);
        assert_eq!(pcb.priority, 1);

        assert!(client.destroy_process(&low).await.unwrap());
        assert!(!client.destroy_process(&low).await.unwrap());
        assert!(matches!(
            client.pcb_info(&low).await,
            Err(RemoteError::Server(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_creates_are_unique() {
        let (client, kernel) = start().await;

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let client = client.clone();
                tokio::spawn(async move {
                    client.create_process(&format!("p{}", i), 5, 1, i).await
                })
            })
            .collect();

        let mut pids: Vec<Pid> = Vec::new();
        for h in handles {
            pids.push(h.await.unwrap().unwrap());
        }
        pids.sort();
        pids.dedup();

        assert_eq!(pids.len(), 16);
        assert_eq!(kernel.list_all_processes().len(), 16);
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let client = Client::new("127.0.0.1:1");
        let err = client.list_processes().await.unwrap_err();
        assert!(err.is_transport());
    }
}

mod wire_tests {
    use super::*;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_unterminated_create_request() {
        let (client, _kernel) = start().await;

        let request = json!({
            "action": "create_process",
            "name": "remote",
            "priority": 3,
            "burst": 2,
            "arrival": 0
        });
        let reply = raw_exchange(&client, request.to_string().as_bytes()).await;

        assert!(reply.ends_with('\n'));
        let value: Value = serde_json::from_str(reply.trim_end()).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["pid"].as_str().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_unknown_action() {
        let (client, _kernel) = start().await;

        let reply = raw_exchange(&client, b"{\"action\":\"shutdown\"}\n").await;
        let value: Value = serde_json::from_str(reply.trim_end()).unwrap();
        assert_eq!(value, json!({"status": "error", "message": "Invalid request"}));
    }

    #[tokio::test]
    async fn test_garbage_request() {
        let (client, _kernel) = start().await;

        let reply = raw_exchange(&client, b"hello there").await;
        let value: Value = serde_json::from_str(reply.trim_end()).unwrap();
        assert_eq!(value["message"], "Invalid request");
    }
}
