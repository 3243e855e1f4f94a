//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use pool_warden::connection::{BoxError, ConnectionManager, Connector, PoolSettings};
use pool_warden::BackoffPolicy;

#[derive(Default)]
struct Script {
    fail_first: u32,
    down: AtomicBool,
    connect_delay: Duration,
    connects: AtomicU32,
    closes: AtomicU32,
    pings: AtomicU32,
    unhealthy: AtomicBool,
}

/// In-memory connector with a scripted failure pattern.
///
/// Handles are the 1-based number of the connect call that produced them.
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    script: Arc<Script>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse the first `n` connects.
    pub fn failing_first(n: u32) -> Self {
        Self::build(n, false, Duration::ZERO)
    }

    /// Refuse every connect.
    pub fn unreachable() -> Self {
        Self::build(0, true, Duration::ZERO)
    }

    /// Every connect takes `delay` before succeeding.
    pub fn slow(delay: Duration) -> Self {
        Self::build(0, false, delay)
    }

    /// Every connect takes `delay` before failing.
    pub fn slow_unreachable(delay: Duration) -> Self {
        Self::build(0, true, delay)
    }

    fn build(fail_first: u32, down: bool, connect_delay: Duration) -> Self {
        Self {
            script: Arc::new(Script {
                fail_first,
                down: AtomicBool::new(down),
                connect_delay,
                ..Script::default()
            }),
        }
    }

    pub fn connects(&self) -> u32 {
        self.script.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> u32 {
        self.script.closes.load(Ordering::SeqCst)
    }

    pub fn pings(&self) -> u32 {
        self.script.pings.load(Ordering::SeqCst)
    }

    /// Make later connects succeed or fail.
    pub fn set_reachable(&self, reachable: bool) {
        self.script.down.store(!reachable, Ordering::SeqCst);
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.script.unhealthy.store(!healthy, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    type Handle = u32;

    async fn connect(&self, _settings: &PoolSettings) -> Result<u32, BoxError> {
        let n = self.script.connects.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.script.connect_delay.is_zero() {
            tokio::time::sleep(self.script.connect_delay).await;
        }
        if self.script.down.load(Ordering::SeqCst) || n <= self.script.fail_first {
            Err(format!("connection refused (attempt {n})").into())
        } else {
            Ok(n)
        }
    }

    async fn ping(&self, _handle: &u32) -> Result<(), BoxError> {
        self.script.pings.fetch_add(1, Ordering::SeqCst);
        if self.script.unhealthy.load(Ordering::SeqCst) {
            Err("ping refused".into())
        } else {
            Ok(())
        }
    }

    async fn close(&self, _handle: u32) {
        self.script.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Jitter-free policy for predictable timings.
pub fn policy(base_ms: u64, max_ms: u64, max_attempts: Option<u32>) -> BackoffPolicy {
    BackoffPolicy::new(
        Duration::from_millis(base_ms),
        Duration::from_millis(max_ms),
        max_attempts,
        0.0,
    )
    .unwrap()
}

pub fn manager(
    connector: ScriptedConnector,
    policy: BackoffPolicy,
) -> ConnectionManager<ScriptedConnector> {
    ConnectionManager::new("test", connector, PoolSettings::default(), policy).unwrap()
}

/// Start a simple mock backend that returns a fixed response.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    start_programmable_backend(move || async move { (200, response.to_string()) }).await
}

/// Start a programmable mock backend on a loopback port.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let (addr, _task) = start_routed_backend(move |_path| f()).await;
    addr
}

/// Start a mock backend that answers by request path.
///
/// Aborting the returned task closes the listening socket.
pub async fn start_routed_backend<F, Fut>(f: F) -> (SocketAddr, JoinHandle<()>)
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    let task = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let Some(path) = read_request_path(&mut socket).await else {
                            return;
                        };
                        let (status, body) = f(path).await;
                        respond(socket, status, &body).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, task)
}

/// Consume the request head so closing the socket does not reset it.
async fn read_request_path(socket: &mut TcpStream) -> Option<String> {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return None,
            Ok(n) => {
                request.extend_from_slice(&buf[..n]);
                if request.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
        }
    }

    let head = String::from_utf8_lossy(&request);
    let path = head.lines().next()?.split_whitespace().nth(1)?;
    Some(path.to_string())
}

async fn respond(mut socket: TcpStream, status: u16, body: &str) {
    let status_text = match status {
        200 => "200 OK",
        404 => "404 Not Found",
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
}

/// A loopback address with nothing listening on it.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
