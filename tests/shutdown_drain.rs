//! Graceful drain and forced shutdown.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use pool_warden::connection::{ConnectionError, ConnectionState, LifecycleEvent};
use pool_warden::lifecycle::ShutdownPhase;
use pool_warden::ShutdownCoordinator;

mod common;

use common::{manager, policy, ScriptedConnector};

/// Start two leased operations that each take `op_ms`.
fn spawn_ops(
    m: &pool_warden::ConnectionManager<ScriptedConnector>,
    op_ms: u64,
) -> Vec<tokio::task::JoinHandle<Result<u32, ConnectionError>>> {
    (0..2)
        .map(|_| {
            let lease = m.acquire().unwrap();
            tokio::spawn(async move {
                lease
                    .run(move |handle| async move {
                        tokio::time::sleep(Duration::from_millis(op_ms)).await;
                        Ok(handle)
                    })
                    .await
            })
        })
        .collect()
}

#[tokio::test]
async fn test_short_operations_drain_cleanly() {
    let connector = ScriptedConnector::new();
    let m = manager(connector.clone(), policy(10, 100, Some(3)));
    m.connect(&CancellationToken::new()).await.unwrap();

    let ops = spawn_ops(&m, 50);
    assert_eq!(m.in_flight(), 2);

    let coordinator = ShutdownCoordinator::new(m.clone(), Duration::from_millis(200));
    let outcome = coordinator.shutdown("test").await.unwrap();

    assert!(!outcome.forced);
    assert_eq!(outcome.outstanding, 0);
    assert!(outcome.elapsed < Duration::from_millis(200));
    for op in ops {
        assert_eq!(op.await.unwrap(), Ok(1));
    }
    assert_eq!(m.status(), ConnectionState::Closed);
    assert_eq!(connector.closes(), 1);
}

#[tokio::test]
async fn test_long_operations_are_forced_at_grace_period() {
    let connector = ScriptedConnector::new();
    let m = manager(connector.clone(), policy(10, 100, Some(3)));
    m.connect(&CancellationToken::new()).await.unwrap();
    let mut events = m.subscribe_events();

    let ops = spawn_ops(&m, 500);
    let coordinator = ShutdownCoordinator::new(m.clone(), Duration::from_millis(200));

    let start = Instant::now();
    let outcome = coordinator.shutdown("test").await.unwrap();

    assert!(outcome.forced);
    assert_eq!(outcome.outstanding, 2);
    assert!(outcome.elapsed >= Duration::from_millis(180));
    assert!(outcome.elapsed < Duration::from_millis(450));

    for op in ops {
        assert_eq!(op.await.unwrap(), Err(ConnectionError::ShuttingDown));
    }
    assert!(start.elapsed() < Duration::from_millis(450));
    assert_eq!(connector.closes(), 1);

    let mut complete = None;
    while let Ok(event) = events.try_recv() {
        if let LifecycleEvent::ShutdownComplete { forced, outstanding } = event {
            complete = Some((forced, outstanding));
        }
    }
    assert_eq!(complete, Some((true, 2)));
}

#[tokio::test]
async fn test_repeated_signals_complete_once() {
    let connector = ScriptedConnector::new();
    let m = manager(connector.clone(), policy(10, 100, Some(3)));
    m.connect(&CancellationToken::new()).await.unwrap();
    let mut events = m.subscribe_events();

    let coordinator = ShutdownCoordinator::new(m.clone(), Duration::from_millis(200));
    coordinator.handle_signal("SIGTERM");
    coordinator.handle_signal("SIGTERM");
    let first = coordinator.wait().await.unwrap();

    coordinator.handle_signal("SIGINT");
    let again = coordinator.shutdown("late").await.unwrap();
    assert_eq!(again, first);
    assert_eq!(coordinator.phase(), ShutdownPhase::Done);

    let completions = std::iter::from_fn(|| events.try_recv().ok())
        .filter(|e| matches!(e, LifecycleEvent::ShutdownComplete { .. }))
        .count();
    assert_eq!(completions, 1);
    assert_eq!(connector.closes(), 1);
}

#[tokio::test]
async fn test_concurrent_waiters_share_outcome() {
    let m = manager(ScriptedConnector::new(), policy(10, 100, Some(3)));
    m.connect(&CancellationToken::new()).await.unwrap();
    let coordinator = ShutdownCoordinator::new(m, Duration::from_millis(100));

    let waiter = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.wait().await })
    };
    assert!(coordinator.request("first"));
    assert!(!coordinator.request("second"));

    let outcome = waiter.await.unwrap().unwrap();
    assert_eq!(outcome.reason, "first");
    assert_eq!(coordinator.wait().await.unwrap(), outcome);
}

#[tokio::test]
async fn test_draining_rejects_new_work() {
    let m = manager(ScriptedConnector::new(), policy(10, 100, Some(3)));
    m.connect(&CancellationToken::new()).await.unwrap();
    let held = m.acquire().unwrap();

    let coordinator = ShutdownCoordinator::new(m.clone(), Duration::from_secs(5));
    coordinator.request("test");
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(m.status(), ConnectionState::Draining);
    assert_eq!(m.acquire().unwrap_err(), ConnectionError::ShuttingDown);
    assert_eq!(
        m.connect(&CancellationToken::new()).await,
        Err(ConnectionError::ShuttingDown)
    );

    // Releasing the last lease lets the drain finish early.
    drop(held);
    let outcome = coordinator.wait().await.unwrap();
    assert!(!outcome.forced);
    assert!(outcome.elapsed < Duration::from_secs(1));
}

#[tokio::test]
async fn test_shutdown_interrupts_connect_backoff() {
    let connector = ScriptedConnector::unreachable();
    let m = manager(connector.clone(), policy(50, 1_000, None));

    let connecting = {
        let m = m.clone();
        tokio::spawn(async move { m.connect(&CancellationToken::new()).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    let outcome = ShutdownCoordinator::new(m.clone(), Duration::from_millis(100))
        .shutdown("test")
        .await
        .unwrap();

    assert!(!outcome.forced);
    assert_eq!(connecting.await.unwrap(), Err(ConnectionError::ShuttingDown));
    assert_eq!(m.status(), ConnectionState::Closed);
    assert_eq!(connector.closes(), 0, "no pool was ever acquired");
}
