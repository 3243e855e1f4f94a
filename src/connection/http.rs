//! HTTP backing-service connector.
//!
//! # Responsibilities
//! - Build a pooled hyper client bounded by the pool settings
//! - Verify reachability by warming `min_size` connections on connect
//! - Probe a health path for liveness
//!
//! # Design Decisions
//! - The hyper client pools and reuses connections internally
//! - A semaphore caps concurrently held connections at `max_size`
//! - Health checks bypass the semaphore: a busy pool is not a dead one
//! - Connect-level errors are reported as "connection lost"

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

use crate::connection::connector::{BoxError, Connector, PoolSettings};
use crate::connection::error::OperationError;

const USER_AGENT: &str = "pool-warden-health-check";

/// Pool handle for an HTTP backing service.
#[derive(Clone, Debug)]
pub struct HttpPool {
    client: Client<HttpConnector, Body>,
    base_url: Url,
    permits: Arc<Semaphore>,
}

impl HttpPool {
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Connections currently free to use.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Send a GET for `path` relative to the base URL.
    pub async fn get(&self, path: &str) -> Result<Response<Incoming>, OperationError> {
        let request = self.get_request(path)?;
        self.send(request).await
    }

    /// Send a request while holding one pool permit.
    pub async fn send(&self, request: Request<Body>) -> Result<Response<Incoming>, OperationError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| OperationError::ConnectionLost("pool closed".to_string()))?;

        self.dispatch(request).await
    }

    /// GET `path` without waiting for a permit.
    async fn check_path(&self, path: &str) -> Result<Response<Incoming>, OperationError> {
        let request = self.get_request(path)?;
        self.dispatch(request).await
    }

    fn get_request(&self, path: &str) -> Result<Request<Body>, OperationError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| OperationError::Failed(format!("invalid path '{path}': {e}")))?;

        Request::builder()
            .method("GET")
            .uri(url.as_str())
            .header("user-agent", USER_AGENT)
            .body(Body::empty())
            .map_err(|e| OperationError::Failed(format!("failed to build request: {e}")))
    }

    async fn dispatch(&self, request: Request<Body>) -> Result<Response<Incoming>, OperationError> {
        self.client.request(request).await.map_err(|e| {
            if e.is_connect() {
                OperationError::ConnectionLost(e.to_string())
            } else {
                OperationError::Failed(e.to_string())
            }
        })
    }

    fn close(&self) {
        self.permits.close();
    }
}

/// Connects to a backing service reachable over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: Url,
    probe_path: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, probe_path: impl Into<String>) -> Result<Self, url::ParseError> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            probe_path: probe_path.into(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn check(pool: &HttpPool, path: &str) -> Result<(), BoxError> {
        let response = pool.check_path(path).await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(UnhealthyStatus(status).into())
        }
    }
}

#[async_trait]
impl Connector for HttpBackend {
    type Handle = HttpPool;

    async fn connect(&self, settings: &PoolSettings) -> Result<HttpPool, BoxError> {
        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(settings.max_size)
            .build(HttpConnector::new());

        let pool = HttpPool {
            client,
            base_url: self.base_url.clone(),
            permits: Arc::new(Semaphore::new(settings.max_size)),
        };

        // Warm the pool: every request must succeed for the attempt to count.
        let mut warmups = JoinSet::new();
        for _ in 0..settings.min_size.max(1) {
            let pool = pool.clone();
            let path = self.probe_path.clone();
            warmups.spawn(async move { Self::check(&pool, &path).await });
        }
        while let Some(joined) = warmups.join_next().await {
            joined.map_err(|e| -> BoxError { Box::new(e) })??;
        }

        tracing::info!(
            base_url = %self.base_url,
            min_size = settings.min_size,
            max_size = settings.max_size,
            "HTTP pool established"
        );
        Ok(pool)
    }

    async fn ping(&self, handle: &HttpPool) -> Result<(), BoxError> {
        Self::check(handle, &self.probe_path).await
    }

    async fn close(&self, handle: HttpPool) {
        handle.close();
        tracing::info!(base_url = %self.base_url, "HTTP pool closed");
    }
}

#[derive(Debug, Error)]
#[error("non-success status {0}")]
struct UnhealthyStatus(StatusCode);
