//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::Instant;

use resource_breaker::config::AppConfig;
use resource_breaker::controller::{
    ControlOperation, ControlStatus, ControllerError, ResourceController,
};
use resource_breaker::workflow::{InstanceStatus, WorkflowRuntime};

/// One call seen by the mock controller.
#[derive(Debug, Clone)]
pub struct ControlCall {
    pub operation: ControlOperation,
    pub resource_id: String,
    pub at: Instant,
}

/// In-process controller that records calls and answers from a script.
///
/// Scripted responses are consumed per operation; once exhausted every call
/// succeeds.
#[derive(Default)]
pub struct MockController {
    calls: Mutex<Vec<ControlCall>>,
    stop_script: Mutex<Vec<ControlStatus>>,
    start_script: Mutex<Vec<ControlStatus>>,
}

impl MockController {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer the next stop calls with `statuses`, in order.
    pub fn script_stop(&self, statuses: Vec<ControlStatus>) {
        let mut script = statuses;
        script.reverse();
        *self.stop_script.lock().unwrap() = script;
    }

    pub fn script_start(&self, statuses: Vec<ControlStatus>) {
        let mut script = statuses;
        script.reverse();
        *self.start_script.lock().unwrap() = script;
    }

    pub fn calls(&self) -> Vec<ControlCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, operation: ControlOperation) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    pub fn first(&self, operation: ControlOperation) -> Option<ControlCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.operation == operation)
            .cloned()
    }

    fn answer(&self, operation: ControlOperation, resource_id: &str) -> ControlStatus {
        self.calls.lock().unwrap().push(ControlCall {
            operation,
            resource_id: resource_id.to_string(),
            at: Instant::now(),
        });
        let script = match operation {
            ControlOperation::Stop => &self.stop_script,
            ControlOperation::Start => &self.start_script,
        };
        script.lock().unwrap().pop().unwrap_or_else(ControlStatus::ok)
    }
}

impl ResourceController for MockController {
    async fn stop(&self, resource_id: &str) -> Result<ControlStatus, ControllerError> {
        Ok(self.answer(ControlOperation::Stop, resource_id))
    }

    async fn start(&self, resource_id: &str) -> Result<ControlStatus, ControllerError> {
        Ok(self.answer(ControlOperation::Start, resource_id))
    }
}

/// Config with a threshold of 3 failures in 30s, no retries, memory-only storage.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.circuit.window_size_secs = 30;
    config.circuit.failure_threshold = 3;
    config.circuit.backoff_duration_secs = 300;
    config.retries.max_attempts = 1;
    config.retries.base_delay_ms = 100;
    config.retries.max_delay_ms = 1000;
    config
}

/// Same as `test_config`, persisted under `dir`.
pub fn durable_config(dir: &Path) -> AppConfig {
    let mut config = test_config();
    config.storage.data_dir = Some(dir.to_path_buf());
    config
}

/// Poll until the instance is terminal and its circuit close, if any, is recorded.
pub async fn wait_terminal<C: ResourceController>(
    runtime: &WorkflowRuntime<C>,
    instance_id: &str,
) -> InstanceStatus {
    let deadline = Instant::now() + Duration::from_secs(3600);
    loop {
        if let Some(status) = runtime.status(instance_id) {
            if status.state.is_terminal() && !status.close_pending {
                return status;
            }
        }
        assert!(Instant::now() < deadline, "instance {instance_id} never finished");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Requests seen by a programmable backend: request line plus headers.
pub type SeenRequests = Arc<Mutex<Vec<String>>>;

/// Start a raw-TCP HTTP backend that answers every request with `f()`.
pub async fn start_programmable_backend<F>(f: F) -> (SocketAddr, SeenRequests)
where
    F: Fn() -> (u16, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen: SeenRequests = Arc::new(Mutex::new(Vec::new()));
    let f = Arc::new(f);

    let recorded = seen.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            let recorded = recorded.clone();
            tokio::spawn(async move {
                let head = read_head(&mut socket).await;
                recorded.lock().unwrap().push(head);

                let (status, body) = f();
                let status_text = match status {
                    200 => "200 OK",
                    202 => "202 Accepted",
                    404 => "404 Not Found",
                    409 => "409 Conflict",
                    429 => "429 Too Many Requests",
                    500 => "500 Internal Server Error",
                    503 => "503 Service Unavailable",
                    _ => "200 OK",
                };
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_text,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, seen)
}

/// Start a backend that accepts connections and never answers.
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

async fn read_head(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}
