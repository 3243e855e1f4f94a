//! Lifecycle events and state-change listeners.
//!
//! # Responsibilities
//! - Define the events emitted by the manager
//! - Own the per-manager observer list
//! - Dispatch transitions to listeners without blocking the manager
//!
//! # Design Decisions
//! - Every listener gets its own unbounded queue and dispatch task, so a slow
//!   listener delays only itself and each sees transitions in order
//! - Listeners are scoped to one manager; there is no global emitter

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::connection::state::ConnectionState;

/// Events consumed by logging/metrics collaborators.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum LifecycleEvent {
    Connecting,
    Connected,
    Disconnected { error: Option<String> },
    Reconnecting { reason: String },
    Reconnected,
    HealthCheckFailed { consecutive: u32, error: Option<String> },
    ShuttingDown { reason: String },
    ShutdownComplete { forced: bool, outstanding: usize },
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::Connecting => "connecting",
            LifecycleEvent::Connected => "connected",
            LifecycleEvent::Disconnected { .. } => "disconnected",
            LifecycleEvent::Reconnecting { .. } => "reconnecting",
            LifecycleEvent::Reconnected => "reconnected",
            LifecycleEvent::HealthCheckFailed { .. } => "healthCheckFailed",
            LifecycleEvent::ShuttingDown { .. } => "shuttingDown",
            LifecycleEvent::ShutdownComplete { .. } => "shutdownComplete",
        }
    }
}

/// One state transition, as delivered to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub from: ConnectionState,
    pub to: ConnectionState,
    pub at: SystemTime,
}

/// Identifies a registered listener for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Observer list owned by a manager.
#[derive(Debug, Default)]
pub(crate) struct Listeners {
    next_id: AtomicU64,
    senders: DashMap<ListenerId, mpsc::UnboundedSender<StateChange>>,
}

impl Listeners {
    /// Register a handler. Spawns its dispatch task on the current runtime.
    pub(crate) fn register<F>(&self, handler: F) -> ListenerId
    where
        F: Fn(StateChange) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, mut rx) = mpsc::unbounded_channel::<StateChange>();

        tokio::spawn(async move {
            while let Some(change) = rx.recv().await {
                handler(change);
            }
        });

        self.senders.insert(id, tx);
        id
    }

    /// Drop a listener; its dispatch task drains what is queued and exits.
    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        self.senders.remove(&id).is_some()
    }

    /// Queue a transition for every listener. Never blocks.
    pub(crate) fn notify(&self, change: StateChange) {
        self.senders.retain(|_, tx| tx.send(change).is_ok());
    }

    pub(crate) fn len(&self) -> usize {
        self.senders.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn change(from: ConnectionState, to: ConnectionState) -> StateChange {
        StateChange {
            from,
            to,
            at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn test_listener_sees_changes_in_order() {
        let listeners = Listeners::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        listeners.register(move |c| sink.lock().unwrap().push(c.to));

        listeners.notify(change(ConnectionState::Disconnected, ConnectionState::Connecting));
        listeners.notify(change(ConnectionState::Connecting, ConnectionState::Connected));
        listeners.notify(change(ConnectionState::Connected, ConnectionState::Draining));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ConnectionState::Connecting,
                ConnectionState::Connected,
                ConnectionState::Draining
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_slow_listener_does_not_block_notify() {
        let listeners = Listeners::default();
        listeners.register(|_| std::thread::sleep(Duration::from_millis(20)));

        let start = std::time::Instant::now();
        for _ in 0..10 {
            listeners.notify(change(ConnectionState::Disconnected, ConnectionState::Connecting));
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_removed_listener_stops_receiving() {
        let listeners = Listeners::default();
        let count = Arc::new(Mutex::new(0));
        let sink = count.clone();
        let id = listeners.register(move |_| *sink.lock().unwrap() += 1);

        listeners.notify(change(ConnectionState::Disconnected, ConnectionState::Connecting));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(listeners.remove(id));
        assert!(!listeners.remove(id));
        listeners.notify(change(ConnectionState::Connecting, ConnectionState::Connected));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(*count.lock().unwrap(), 1);
        assert_eq!(listeners.len(), 0);
    }

    #[test]
    fn test_event_names() {
        assert_eq!(LifecycleEvent::Reconnected.name(), "reconnected");
        assert_eq!(
            LifecycleEvent::ShutdownComplete {
                forced: false,
                outstanding: 0
            }
            .name(),
            "shutdownComplete"
        );
    }
}
