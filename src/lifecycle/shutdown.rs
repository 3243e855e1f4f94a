//! Graceful shutdown coordination.
//!
//! # Responsibilities
//! - Turn the first termination request into exactly one drain sequence
//! - Bound the drain by the grace period, then force-close the pool
//! - Let a second signal cut the remaining wait to zero
//! - Publish the outcome to every waiter
//!
//! # Design Decisions
//! - Signal handlers are installed once per process, from `arm()` only
//! - The drain runs on its own task so signal delivery never blocks on it
//! - Phase changes happen under one mutex; the outcome is published on a
//!   watch channel

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::schema::ShutdownConfig;
use crate::connection::connector::Connector;
use crate::connection::manager::ConnectionManager;
use crate::lifecycle::signals::TerminationSignals;

/// Set by the first successful `arm()` in this process.
static SIGNALS_ARMED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("termination signal handlers are already installed")]
    AlreadyArmed,

    #[error("failed to install signal handlers: {0}")]
    Signal(#[from] io::Error),

    #[error("drain task ended without an outcome")]
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    /// Ready; no termination requested yet.
    Armed,
    Draining,
    Done,
}

/// One termination event.
#[derive(Debug, Clone)]
pub struct ShutdownRequest {
    pub reason: String,
    pub deadline: Instant,
}

/// How the drain ended.
#[derive(Debug, Clone, PartialEq)]
pub struct ShutdownOutcome {
    pub reason: String,
    /// True if the grace period ran out (or was cut short) with work pending.
    pub forced: bool,
    /// Leases still held when the pool was closed.
    pub outstanding: usize,
    pub elapsed: Duration,
}

struct Inner<C: Connector> {
    manager: ConnectionManager<C>,
    grace_period: Duration,
    phase: Mutex<ShutdownPhase>,
    /// Cuts the grace period short.
    force: CancellationToken,
    done: watch::Sender<Option<ShutdownOutcome>>,
}

/// Drains and closes one connection manager on termination.
pub struct ShutdownCoordinator<C: Connector> {
    inner: Arc<Inner<C>>,
}

impl<C: Connector> Clone for ShutdownCoordinator<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connector> ShutdownCoordinator<C> {
    pub fn new(manager: ConnectionManager<C>, grace_period: Duration) -> Self {
        let (done, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                manager,
                grace_period,
                phase: Mutex::new(ShutdownPhase::Armed),
                force: CancellationToken::new(),
                done,
            }),
        }
    }

    pub fn from_config(manager: ConnectionManager<C>, config: &ShutdownConfig) -> Self {
        Self::new(manager, Duration::from_millis(config.grace_period_ms))
    }

    pub fn grace_period(&self) -> Duration {
        self.inner.grace_period
    }

    pub fn phase(&self) -> ShutdownPhase {
        *self.inner.phase()
    }

    /// Install SIGINT/SIGTERM handlers that feed this coordinator.
    ///
    /// Must be called from within a Tokio runtime. Succeeds once per process.
    pub fn arm(&self) -> Result<(), ShutdownError> {
        if SIGNALS_ARMED.swap(true, Ordering::SeqCst) {
            return Err(ShutdownError::AlreadyArmed);
        }

        let mut signals = match TerminationSignals::install() {
            Ok(signals) => signals,
            Err(e) => {
                SIGNALS_ARMED.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        };

        let coordinator = self.clone();
        tokio::spawn(async move {
            loop {
                match signals.recv().await {
                    Ok(name) => coordinator.handle_signal(name),
                    Err(e) => {
                        tracing::error!(error = %e, "Signal stream failed");
                        break;
                    }
                }
            }
        });

        tracing::info!(grace_period = ?self.inner.grace_period, "Shutdown handlers armed");
        Ok(())
    }

    /// React to one termination signal.
    ///
    /// The first starts the drain; one arriving mid-drain forces it.
    pub fn handle_signal(&self, name: &str) {
        if self.request(format!("received {name}")) {
            return;
        }
        match self.phase() {
            ShutdownPhase::Draining => {
                tracing::warn!(
                    signal = name,
                    "Second signal while draining, skipping grace period"
                );
                self.inner.force.cancel();
            }
            phase => tracing::debug!(signal = name, ?phase, "Signal ignored"),
        }
    }

    /// Start the drain. Returns false if one was already requested.
    pub fn request(&self, reason: impl Into<String>) -> bool {
        let request = {
            let mut phase = self.inner.phase();
            if *phase != ShutdownPhase::Armed {
                tracing::debug!(phase = ?*phase, "Shutdown already requested");
                return false;
            }
            *phase = ShutdownPhase::Draining;
            ShutdownRequest {
                reason: reason.into(),
                deadline: Instant::now() + self.inner.grace_period,
            }
        };

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.drain(request).await });
        true
    }

    /// Wait for the drain to finish. Does not start one.
    pub async fn wait(&self) -> Result<ShutdownOutcome, ShutdownError> {
        let mut rx = self.inner.done.subscribe();
        let outcome = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| ShutdownError::Interrupted)?;
        outcome.clone().ok_or(ShutdownError::Interrupted)
    }

    /// Request shutdown and wait for it, joining one already running.
    pub async fn shutdown(
        &self,
        reason: impl Into<String>,
    ) -> Result<ShutdownOutcome, ShutdownError> {
        self.request(reason);
        self.wait().await
    }
}

impl<C: Connector> Inner<C> {
    fn phase(&self) -> MutexGuard<'_, ShutdownPhase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn drain(self: Arc<Self>, request: ShutdownRequest) {
        let started = Instant::now();
        tracing::info!(
            reason = %request.reason,
            grace_period = ?self.grace_period,
            in_flight = self.manager.in_flight(),
            "Shutdown requested, draining"
        );

        if let Err(e) = self.manager.begin_drain(&request.reason) {
            tracing::error!(error = %e, "Failed to enter draining state");
        }

        let outstanding = self.manager.wait_idle(request.deadline, &self.force).await;
        let forced = outstanding > 0;
        if forced {
            tracing::warn!(
                outstanding,
                elapsed = ?started.elapsed(),
                "Grace period over with operations in flight, forcing shutdown"
            );
            self.manager.cancel_in_flight();
        }

        if !self.manager.close(forced, outstanding).await {
            tracing::warn!("Pool was already closed");
        }

        let outcome = ShutdownOutcome {
            reason: request.reason,
            forced,
            outstanding,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            forced,
            outstanding,
            elapsed = ?outcome.elapsed,
            "Shutdown complete"
        );

        *self.phase() = ShutdownPhase::Done;
        self.done.send_replace(Some(outcome));
    }
}

impl<C: Connector> std::fmt::Debug for ShutdownCoordinator<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownCoordinator")
            .field("phase", &self.phase())
            .field("grace_period", &self.inner.grace_period)
            .finish()
    }
}
