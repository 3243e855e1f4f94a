//! Connection manager.
//!
//! # Responsibilities
//! - Own the pool handle for one backing-service target
//! - Drive connect/reconnect with bounded, jittered retry
//! - Coalesce concurrent connect calls into one attempt (single-flight)
//! - Hand out leases only while connected
//! - Consume health results and trigger reconnect on persistent failure
//!
//! # Design Decisions
//! - State transitions happen under one mutex; listeners are fed under it
//! - The connect loop runs in its own task; callers only wait on its outcome
//! - A caller-initiated sequence is abandoned once nobody is waiting for it
//! - Draining and closing are crate-private: only the shutdown coordinator
//!   may end the manager's life

use std::sync::atomic::{AtomicU32, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, watch, Notify};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::connection::connector::{BoxError, Connector, PoolSettings};
use crate::connection::error::ConnectionError;
use crate::connection::events::{LifecycleEvent, ListenerId, Listeners, StateChange};
use crate::connection::lease::{Lease, LeaseOwner};
use crate::connection::state::ConnectionState;
use crate::health::monitor::{HealthMonitor, HealthSettings, MonitorHandle, Probe};
use crate::health::result::{unix_millis, HealthCheckResult, HealthReport};
use crate::observability::metrics;
use crate::resilience::backoff::BackoffPolicy;

type Outcome = Result<(), ConnectionError>;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
enum Sequence {
    /// Started by `connect()` callers; abandoned when they all leave.
    Connect,
    /// Started by the health path after the manager gave up.
    Recover,
    Reconnect { reason: String },
}

/// Result of one iteration of the retry loop.
enum Step<H> {
    Acquired(H),
    Failed(ConnectionError),
    Abandoned,
    Shutdown,
}

struct Core<H> {
    state: ConnectionState,
    handle: Option<H>,
    /// Bumped every time a new pool is installed.
    generation: u64,
    attempt_count: u32,
    last_error: Option<ConnectionError>,
    inflight: Option<Arc<watch::Sender<Option<Outcome>>>>,
}

struct Inner<C: Connector> {
    name: String,
    connector: C,
    settings: PoolSettings,
    policy: BackoffPolicy,
    core: Mutex<Core<C::Handle>>,
    /// Mirror of `core.state` for lock-free reads.
    state: AtomicU8,
    listeners: Listeners,
    events: broadcast::Sender<LifecycleEvent>,
    unhealthy_threshold: AtomicU32,
    consecutive_failures: AtomicU32,
    last_health: ArcSwapOption<HealthCheckResult>,
    in_flight: AtomicUsize,
    idle: Notify,
    /// Fired when draining starts: stops connect loops and health probes.
    shutdown: CancellationToken,
    /// Fired when the grace period expires: cancels leased operations.
    forced: CancellationToken,
    monitor: Mutex<Option<MonitorHandle>>,
}

/// Lifecycle manager for one pooled backing-service connection.
///
/// Cheap to clone; every clone drives the same state machine.
pub struct ConnectionManager<C: Connector> {
    inner: Arc<Inner<C>>,
}

impl<C: Connector> Clone for ConnectionManager<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connector> ConnectionManager<C> {
    /// Create a manager in the `Disconnected` state.
    pub fn new(
        name: impl Into<String>,
        connector: C,
        settings: PoolSettings,
        policy: BackoffPolicy,
    ) -> Result<Self, ConnectionError> {
        if settings.max_size == 0 || settings.min_size > settings.max_size {
            return Err(ConnectionError::InvalidConfig(format!(
                "pool bounds min={} max={}",
                settings.min_size, settings.max_size
            )));
        }
        if settings.connect_timeout.is_zero() || settings.operation_timeout.is_zero() {
            return Err(ConnectionError::InvalidConfig(
                "pool timeouts must be greater than zero".to_string(),
            ));
        }

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let name = name.into();
        metrics::record_state(&name, ConnectionState::Disconnected);

        Ok(Self {
            inner: Arc::new(Inner {
                name,
                connector,
                settings,
                policy,
                core: Mutex::new(Core {
                    state: ConnectionState::Disconnected,
                    handle: None,
                    generation: 0,
                    attempt_count: 0,
                    last_error: None,
                    inflight: None,
                }),
                state: AtomicU8::new(ConnectionState::Disconnected as u8),
                listeners: Listeners::default(),
                events,
                unhealthy_threshold: AtomicU32::new(HealthSettings::default().unhealthy_threshold),
                consecutive_failures: AtomicU32::new(0),
                last_health: ArcSwapOption::empty(),
                in_flight: AtomicUsize::new(0),
                idle: Notify::new(),
                shutdown: CancellationToken::new(),
                forced: CancellationToken::new(),
                monitor: Mutex::new(None),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.inner.settings
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.inner.policy
    }

    /// Connect, joining any attempt already in flight.
    ///
    /// Returns immediately when already connected. Cancelling `cancel` only
    /// releases this caller; the attempt keeps running for other waiters.
    pub async fn connect(&self, cancel: &CancellationToken) -> Result<(), ConnectionError> {
        let mut outcome = {
            let mut core = self.inner.core();
            match core.state {
                ConnectionState::Connected => return Ok(()),
                state if state.is_terminal() => return Err(ConnectionError::Closed),
                ConnectionState::Draining => return Err(ConnectionError::ShuttingDown),
                _ => {}
            }
            let joined = core.inflight.as_ref().map(|tx| tx.subscribe());
            match joined {
                Some(rx) => rx,
                None => self.inner.start_sequence(&mut core, Sequence::Connect, None)?,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ConnectionError::Cancelled),
            result = outcome.wait_for(Option::is_some) => match result {
                Ok(value) => value.clone().unwrap_or(Err(ConnectionError::Closed)),
                Err(_) => Err(ConnectionError::Connect(
                    "connect task ended without an outcome".to_string(),
                )),
            },
        }
    }

    /// Current state. Never blocks.
    pub fn status(&self) -> ConnectionState {
        self.inner.status()
    }

    /// Borrow the pool handle. Fails fast unless `Connected`.
    pub fn acquire(&self) -> Result<Lease<C::Handle>, ConnectionError> {
        let core = self.inner.core();
        match (core.state, &core.handle) {
            (ConnectionState::Connected, Some(handle)) => {
                let count = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                metrics::record_in_flight(&self.inner.name, count);
                let owner: Arc<dyn LeaseOwner> = self.inner.clone();
                Ok(Lease::new(handle.clone(), core.generation, owner))
            }
            (state, _) if state.is_shutting_down() => Err(ConnectionError::ShuttingDown),
            (state, _) => Err(ConnectionError::Unavailable { state }),
        }
    }

    /// Register a state-change listener.
    ///
    /// Must be called from within a Tokio runtime. The handler runs on its own
    /// task and sees transitions in the order they happened.
    pub fn on_state_change<F>(&self, handler: F) -> ListenerId
    where
        F: Fn(StateChange) + Send + Sync + 'static,
    {
        self.inner.listeners.register(handler)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.listeners.remove(id)
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.inner.events.subscribe()
    }

    /// Classify the connection as lost and start reconnecting.
    ///
    /// No-op unless currently `Connected`.
    pub fn report_connection_lost(&self, reason: impl Into<String>) {
        self.inner.begin_reconnect(reason.into(), None);
    }

    /// Feed one probe result into the rolling failure counter.
    ///
    /// While `Disconnected`, any result starts a fresh connect sequence.
    pub fn record_health(&self, result: HealthCheckResult) {
        self.inner.record_health(result);
    }

    /// Probe on a schedule and feed the results back into this manager.
    ///
    /// Replaces any monitor already running. Stops when draining starts.
    /// Also drives recovery once connect attempts have been exhausted.
    pub fn start_health_monitor(&self, settings: HealthSettings) {
        self.inner
            .unhealthy_threshold
            .store(settings.unhealthy_threshold.max(1), Ordering::SeqCst);

        let (tx, mut rx) = mpsc::channel(8);
        let probe: Arc<dyn Probe> = Arc::new(ManagerProbe {
            inner: Arc::clone(&self.inner),
        });
        let handle =
            HealthMonitor::new(probe, settings, tx).spawn(self.inner.shutdown.child_token());

        let manager = self.clone();
        tokio::spawn(async move {
            while let Some(result) = rx.recv().await {
                manager.record_health(result);
            }
        });

        let previous = self
            .inner
            .monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.stop();
        }
    }

    pub fn stop_health_monitor(&self) {
        let handle = self
            .inner
            .monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.stop();
        }
    }

    pub fn health_report(&self) -> HealthReport {
        let core = self.inner.core();
        let last = self.inner.last_health.load_full();
        let probes_ok = self.inner.consecutive_failures.load(Ordering::SeqCst) == 0;

        HealthReport {
            healthy: core.state == ConnectionState::Connected && probes_ok,
            state: core.state,
            last_check: last.as_ref().map(|r| unix_millis(r.timestamp)),
            last_error: core
                .last_error
                .as_ref()
                .map(ToString::to_string)
                .or_else(|| last.as_ref().and_then(|r| r.error.clone())),
            attempt_count: core.attempt_count,
        }
    }

    /// Failed attempts since the last successful connect.
    pub fn attempt_count(&self) -> u32 {
        self.inner.core().attempt_count
    }

    pub fn last_error(&self) -> Option<ConnectionError> {
        self.inner.core().last_error.clone()
    }

    pub fn last_health(&self) -> Option<HealthCheckResult> {
        self.inner.last_health.load_full().map(|r| (*r).clone())
    }

    pub fn consecutive_health_failures(&self) -> u32 {
        self.inner.consecutive_failures.load(Ordering::SeqCst)
    }

    /// Operations currently holding a lease.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Stop accepting work: `→ Draining`, abort connect attempts and probes.
    pub(crate) fn begin_drain(&self, reason: &str) -> Result<(), ConnectionError> {
        {
            let mut core = self.inner.core();
            if core.state.is_shutting_down() {
                return Ok(());
            }
            self.inner.set_state(&mut core, ConnectionState::Draining)?;
        }
        self.inner.shutdown.cancel();
        self.stop_health_monitor();
        self.inner.emit(LifecycleEvent::ShuttingDown {
            reason: reason.to_string(),
        });
        Ok(())
    }

    /// Wait until no lease is outstanding, the deadline passes, or `force`
    /// fires. Returns the number of leases still outstanding.
    pub(crate) async fn wait_idle(&self, deadline: Instant, force: &CancellationToken) -> usize {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.in_flight() == 0 {
                return 0;
            }

            tokio::select! {
                _ = &mut notified => continue,
                _ = tokio::time::sleep_until(deadline) => return self.in_flight(),
                _ = force.cancelled() => return self.in_flight(),
            }
        }
    }

    /// Cancel every leased operation with `ShuttingDown`.
    pub(crate) fn cancel_in_flight(&self) {
        self.inner.forced.cancel();
    }

    /// Release the pool and enter `Closed`. Returns false if already closed.
    pub(crate) async fn close(&self, forced: bool, outstanding: usize) -> bool {
        let handle = {
            let mut core = self.inner.core();
            if core.state != ConnectionState::Draining {
                return false;
            }
            core.handle.take()
        };

        if let Some(handle) = handle {
            self.inner.connector.close(handle).await;
        }

        {
            let mut core = self.inner.core();
            if self.inner.set_state(&mut core, ConnectionState::Closed).is_err() {
                return false;
            }
        }
        self.inner.emit(LifecycleEvent::ShutdownComplete { forced, outstanding });
        true
    }
}

impl<C: Connector> std::fmt::Debug for ConnectionManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("name", &self.inner.name)
            .field("state", &self.status())
            .field("settings", &self.inner.settings)
            .field("listeners", &self.inner.listeners.len())
            .finish()
    }
}

impl<C: Connector> Inner<C> {
    fn core(&self) -> MutexGuard<'_, Core<C::Handle>> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn status(&self) -> ConnectionState {
        ConnectionState::from(self.state.load(Ordering::SeqCst))
    }

    /// Take one edge of the state machine. Caller holds the core lock.
    fn set_state(
        &self,
        core: &mut Core<C::Handle>,
        to: ConnectionState,
    ) -> Result<(), ConnectionError> {
        let from = core.state;
        let next = from.transition(to).map_err(|e| {
            tracing::error!(
                target_name = %self.name,
                %from,
                %to,
                "Illegal state transition requested"
            );
            ConnectionError::from(e)
        })?;

        core.state = next;
        if next == ConnectionState::Connected {
            core.attempt_count = 0;
        }
        self.state.store(next as u8, Ordering::SeqCst);

        tracing::info!(target_name = %self.name, %from, %to, "Connection state changed");
        metrics::record_state(&self.name, next);
        self.listeners.notify(StateChange {
            from,
            to,
            at: SystemTime::now(),
        });
        Ok(())
    }

    fn emit(&self, event: LifecycleEvent) {
        tracing::debug!(target_name = %self.name, event = event.name(), "Lifecycle event");
        metrics::record_event(&self.name, event.name());
        if let Err(e) = self.events.send(event) {
            tracing::trace!(target_name = %self.name, event = e.0.name(), "No event subscribers");
        }
    }

    /// Enter `Connecting`/`Reconnecting` and spawn the retry loop.
    fn start_sequence(
        self: &Arc<Self>,
        core: &mut Core<C::Handle>,
        kind: Sequence,
        stale: Option<C::Handle>,
    ) -> Result<watch::Receiver<Option<Outcome>>, ConnectionError> {
        let (to, event) = match &kind {
            Sequence::Connect | Sequence::Recover => {
                (ConnectionState::Connecting, LifecycleEvent::Connecting)
            }
            Sequence::Reconnect { reason } => (
                ConnectionState::Reconnecting,
                LifecycleEvent::Reconnecting {
                    reason: reason.clone(),
                },
            ),
        };
        self.set_state(core, to)?;

        let (tx, rx) = watch::channel(None);
        let tx = Arc::new(tx);
        core.inflight = Some(Arc::clone(&tx));
        self.emit(event);

        let inner = Arc::clone(self);
        tokio::spawn(async move { inner.run_sequence(kind, tx, stale).await });

        Ok(rx)
    }

    async fn run_sequence(
        self: Arc<Self>,
        kind: Sequence,
        tx: Arc<watch::Sender<Option<Outcome>>>,
        stale: Option<C::Handle>,
    ) {
        if let Some(handle) = stale {
            tracing::debug!(target_name = %self.name, "Closing stale pool before reconnecting");
            self.connector.close(handle).await;
        }

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;

            match self.attempt(&kind, &tx).await {
                Step::Acquired(handle) => {
                    metrics::record_connect_attempt(&self.name, "success");
                    self.finish_connected(&kind, &tx, handle).await;
                    return;
                }
                Step::Shutdown => {
                    self.finish_shutdown(&tx);
                    return;
                }
                Step::Abandoned => {
                    if self.finish_abandoned(&tx) {
                        return;
                    }
                    // A caller joined in time; this attempt does not count.
                    attempt -= 1;
                }
                Step::Failed(err) => {
                    metrics::record_connect_attempt(&self.name, "failure");
                    self.record_attempt_failure(&err);

                    if self.policy.is_exhausted(attempt) {
                        self.finish_exhausted(&tx, err, attempt);
                        return;
                    }

                    let delay = self.policy.next_delay(attempt);
                    tracing::warn!(
                        target_name = %self.name,
                        attempt,
                        delay = ?delay,
                        error = %err,
                        "Connect attempt failed, retrying"
                    );

                    let sleep = tokio::time::sleep(delay);
                    tokio::pin!(sleep);
                    loop {
                        tokio::select! {
                            biased;
                            _ = self.shutdown.cancelled() => {
                                self.finish_shutdown(&tx);
                                return;
                            }
                            _ = wait_abandoned(&kind, &tx) => {
                                if self.finish_abandoned(&tx) {
                                    return;
                                }
                            }
                            _ = &mut sleep => break,
                        }
                    }
                }
            }
        }
    }

    async fn attempt(
        &self,
        kind: &Sequence,
        tx: &watch::Sender<Option<Outcome>>,
    ) -> Step<C::Handle> {
        let timeout = self.settings.connect_timeout;

        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Step::Shutdown,
            _ = wait_abandoned(kind, tx) => Step::Abandoned,
            result = tokio::time::timeout(timeout, self.connector.connect(&self.settings)) => {
                match result {
                    Ok(Ok(handle)) => Step::Acquired(handle),
                    Ok(Err(e)) => Step::Failed(ConnectionError::Connect(e.to_string())),
                    Err(_) => Step::Failed(ConnectionError::ConnectTimeout(timeout)),
                }
            }
        }
    }

    fn record_attempt_failure(&self, err: &ConnectionError) {
        let mut core = self.core();
        core.attempt_count = core.attempt_count.saturating_add(1);
        core.last_error = Some(err.clone());
    }

    async fn finish_connected(
        &self,
        kind: &Sequence,
        tx: &watch::Sender<Option<Outcome>>,
        handle: C::Handle,
    ) {
        let rejected = {
            let mut core = self.core();
            core.inflight = None;

            if core.state.is_shutting_down() {
                tx.send_replace(Some(Err(ConnectionError::ShuttingDown)));
                Some(handle)
            } else {
                match self.set_state(&mut core, ConnectionState::Connected) {
                    Ok(()) => {
                        core.handle = Some(handle);
                        core.generation += 1;
                        core.last_error = None;
                        self.consecutive_failures.store(0, Ordering::SeqCst);
                        tx.send_replace(Some(Ok(())));
                        self.emit(match kind {
                            Sequence::Connect | Sequence::Recover => LifecycleEvent::Connected,
                            Sequence::Reconnect { .. } => LifecycleEvent::Reconnected,
                        });
                        None
                    }
                    Err(e) => {
                        tx.send_replace(Some(Err(e)));
                        Some(handle)
                    }
                }
            }
        };

        if let Some(handle) = rejected {
            tracing::info!(
                target_name = %self.name,
                "Discarding pool acquired after shutdown began"
            );
            self.connector.close(handle).await;
        }
    }

    fn finish_exhausted(
        &self,
        tx: &watch::Sender<Option<Outcome>>,
        err: ConnectionError,
        attempts: u32,
    ) {
        let mut core = self.core();
        core.inflight = None;

        if core.state.is_shutting_down() {
            tx.send_replace(Some(Err(ConnectionError::ShuttingDown)));
            return;
        }

        tracing::error!(
            target_name = %self.name,
            attempts,
            error = %err,
            "Connect attempts exhausted"
        );
        let outcome = self
            .set_state(&mut core, ConnectionState::Disconnected)
            .map(|()| err.clone())
            .unwrap_or_else(|e| e);
        tx.send_replace(Some(Err(outcome)));
        self.emit(LifecycleEvent::Disconnected {
            error: Some(err.to_string()),
        });
    }

    fn finish_shutdown(&self, tx: &watch::Sender<Option<Outcome>>) {
        let mut core = self.core();
        core.inflight = None;
        tx.send_replace(Some(Err(ConnectionError::ShuttingDown)));
    }

    /// Give up on a sequence nobody waits for. False if a waiter arrived.
    fn finish_abandoned(&self, tx: &watch::Sender<Option<Outcome>>) -> bool {
        let mut core = self.core();
        if tx.receiver_count() > 0 {
            return false;
        }
        core.inflight = None;

        if core.state.is_shutting_down() {
            return true;
        }

        tracing::info!(
            target_name = %self.name,
            "All connect callers cancelled, abandoning attempt"
        );
        core.last_error = Some(ConnectionError::Cancelled);
        if self.set_state(&mut core, ConnectionState::Disconnected).is_ok() {
            self.emit(LifecycleEvent::Disconnected {
                error: Some(ConnectionError::Cancelled.to_string()),
            });
        }
        true
    }

    /// Start reconnecting. With `generation`, only if that pool is still installed.
    fn begin_reconnect(self: &Arc<Self>, reason: String, generation: Option<u64>) {
        let mut core = self.core();
        if core.state != ConnectionState::Connected {
            tracing::debug!(target_name = %self.name, state = %core.state, "Reconnect not started");
            return;
        }
        if let Some(generation) = generation.filter(|g| *g != core.generation) {
            tracing::debug!(
                target_name = %self.name,
                reported = generation,
                current = core.generation,
                reason = %reason,
                "Ignoring connection loss reported against a replaced pool"
            );
            return;
        }

        tracing::warn!(target_name = %self.name, reason = %reason, "Connection lost, reconnecting");
        core.last_error = Some(ConnectionError::ConnectionLost(reason.clone()));
        let stale = core.handle.take();
        if let Err(e) = self.start_sequence(&mut core, Sequence::Reconnect { reason }, stale) {
            tracing::error!(target_name = %self.name, error = %e, "Failed to start reconnect");
        }
    }

    /// Start a connect sequence nobody waits on. No-op unless `Disconnected`.
    fn begin_recovery(self: &Arc<Self>) {
        let mut core = self.core();
        if core.state != ConnectionState::Disconnected || core.inflight.is_some() {
            return;
        }

        tracing::info!(target_name = %self.name, "Connection down, starting recovery");
        match self.start_sequence(&mut core, Sequence::Recover, None) {
            // The sequence publishes its outcome through events and state.
            Ok(_outcome) => {}
            Err(e) => {
                tracing::error!(target_name = %self.name, error = %e, "Failed to start recovery")
            }
        }
    }

    fn record_health(self: &Arc<Self>, result: HealthCheckResult) {
        metrics::record_health_check(&self.name, result.healthy, result.latency);
        let healthy = result.healthy;
        let error = result.error.clone();
        self.last_health.store(Some(Arc::new(result)));

        if self.status() == ConnectionState::Disconnected {
            self.begin_recovery();
            return;
        }

        if healthy {
            self.consecutive_failures.store(0, Ordering::SeqCst);
            return;
        }
        if self.status() != ConnectionState::Connected {
            return;
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        let threshold = self.unhealthy_threshold.load(Ordering::SeqCst);
        tracing::warn!(
            target_name = %self.name,
            consecutive = failures,
            threshold,
            error = error.as_deref().unwrap_or("unknown"),
            "Health check failed"
        );
        self.emit(LifecycleEvent::HealthCheckFailed {
            consecutive: failures,
            error,
        });

        if failures >= threshold {
            self.consecutive_failures.store(0, Ordering::SeqCst);
            self.begin_reconnect(format!("{failures} consecutive failed health checks"), None);
        }
    }
}

impl<C: Connector> LeaseOwner for Inner<C> {
    fn release(&self) {
        let remaining = self.in_flight.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        metrics::record_in_flight(&self.name, remaining);
        if remaining == 0 {
            self.idle.notify_waiters();
        }
    }

    fn operation_timeout(&self) -> Duration {
        self.settings.operation_timeout
    }

    fn forced(&self) -> &CancellationToken {
        &self.forced
    }

    fn record_error(&self, error: &ConnectionError) {
        self.core().last_error = Some(error.clone());
    }

    fn connection_lost(self: Arc<Self>, generation: u64, reason: String) {
        self.begin_reconnect(reason, Some(generation));
    }
}

/// Resolves once every caller waiting on a connect sequence has gone away.
/// Recovery and reconnect sequences have no callers and are never abandoned.
async fn wait_abandoned(kind: &Sequence, tx: &watch::Sender<Option<Outcome>>) {
    match kind {
        Sequence::Connect => tx.closed().await,
        Sequence::Recover | Sequence::Reconnect { .. } => std::future::pending().await,
    }
}

/// Pings whatever handle the manager currently holds.
struct ManagerProbe<C: Connector> {
    inner: Arc<Inner<C>>,
}

#[async_trait]
impl<C: Connector> Probe for ManagerProbe<C> {
    async fn probe(&self) -> Result<(), BoxError> {
        let handle = {
            let core = self.inner.core();
            match (core.state, &core.handle) {
                (ConnectionState::Connected, Some(handle)) => handle.clone(),
                (state, _) => return Err(format!("not connected (state: {state})").into()),
            }
        };
        self.inner.connector.ping(&handle).await
    }
}
