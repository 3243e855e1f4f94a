//! Active health monitoring.
//!
//! # Responsibilities
//! - Periodically probe the backing service
//! - Bound every probe with its own timeout
//! - Report results over a channel; never touch connection state

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::schema::HealthCheckConfig;
use crate::connection::connector::BoxError;
use crate::connection::error::ConnectionError;
use crate::health::result::HealthCheckResult;

/// Lightweight liveness check.
#[async_trait]
pub trait Probe: Send + Sync + 'static {
    async fn probe(&self) -> Result<(), BoxError>;
}

/// Probe schedule and reconnect threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthSettings {
    pub interval: Duration,
    pub timeout: Duration,
    pub unhealthy_threshold: u32,
}

impl HealthSettings {
    pub fn from_config(config: &HealthCheckConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.interval_ms),
            timeout: Duration::from_millis(config.timeout_ms),
            unhealthy_threshold: config.unhealthy_threshold,
        }
    }
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self::from_config(&HealthCheckConfig::default())
    }
}

pub struct HealthMonitor {
    probe: Arc<dyn Probe>,
    settings: HealthSettings,
    results: mpsc::Sender<HealthCheckResult>,
}

impl HealthMonitor {
    pub fn new(
        probe: Arc<dyn Probe>,
        settings: HealthSettings,
        results: mpsc::Sender<HealthCheckResult>,
    ) -> Self {
        Self {
            probe,
            settings,
            results,
        }
    }

    /// Start probing on the current runtime until `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> MonitorHandle {
        let token = cancel.clone();
        let task = tokio::spawn(async move { self.run(token).await });
        MonitorHandle { cancel, task }
    }

    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            interval = ?self.settings.interval,
            timeout = ?self.settings.timeout,
            "Health monitor starting"
        );

        let mut ticker = time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("Health monitor cancelled, exiting loop");
                    break;
                }
                _ = ticker.tick() => {
                    let result = self.check_once().await;
                    if self.results.send(result).await.is_err() {
                        tracing::debug!("Health result receiver dropped, exiting loop");
                        break;
                    }
                }
            }
        }
    }

    /// Run one probe under the configured timeout.
    pub async fn check_once(&self) -> HealthCheckResult {
        let start = Instant::now();

        match time::timeout(self.settings.timeout, self.probe.probe()).await {
            Ok(Ok(())) => HealthCheckResult::healthy(start.elapsed()),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Health check failed: probe error");
                HealthCheckResult::unhealthy(start.elapsed(), e.to_string())
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.settings.timeout, "Health check failed: timeout");
                HealthCheckResult::unhealthy(
                    start.elapsed(),
                    ConnectionError::ProbeTimeout(self.settings.timeout).to_string(),
                )
            }
        }
    }
}

/// Stops a running monitor as a unit.
#[derive(Debug)]
pub struct MonitorHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Halt all future probes. An in-flight probe ends within its timeout.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop and wait for the monitor task to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Health monitor task failed");
        }
    }
}
