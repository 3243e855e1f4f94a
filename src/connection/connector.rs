//! Backing-service seam.
//!
//! # Responsibilities
//! - Acquire a pool handle for the target
//! - Probe an acquired handle for liveness
//! - Release a handle's resources
//!
//! # Design Decisions
//! - The handle is opaque to the manager and assumed internally thread-safe
//! - Connectors never retry; retry policy lives in the manager
//! - Timeouts are applied by the caller, not the connector

use std::time::Duration;

use async_trait::async_trait;

use crate::config::schema::PoolConfig;

/// Error type returned by connector implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Pool bounds and timeouts handed to the connector and enforced by the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    pub min_size: usize,
    pub max_size: usize,
    pub connect_timeout: Duration,
    pub operation_timeout: Duration,
}

impl PoolSettings {
    pub fn from_config(config: &PoolConfig) -> Self {
        Self {
            min_size: config.min_size,
            max_size: config.max_size,
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            operation_timeout: Duration::from_millis(config.operation_timeout_ms),
        }
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self::from_config(&PoolConfig::default())
    }
}

/// Opens, probes and releases pools for one backing-service target.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Pool handle shared by every lease.
    type Handle: Clone + Send + Sync + 'static;

    /// Open a pool. Called once per connect attempt.
    async fn connect(&self, settings: &PoolSettings) -> Result<Self::Handle, BoxError>;

    /// Lightweight liveness check against an open pool.
    async fn ping(&self, handle: &Self::Handle) -> Result<(), BoxError>;

    /// Release the pool. Called at most once per handle.
    async fn close(&self, handle: Self::Handle);
}
