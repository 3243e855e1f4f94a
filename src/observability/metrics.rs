//! Metrics collection and exposition.
//!
//! # Metrics
//! - `warden_state` (gauge): numeric connection state per target
//! - `warden_connect_attempts_total` (counter): by outcome
//! - `warden_health_checks_total` (counter): by result
//! - `warden_health_probe_latency_seconds` (histogram)
//! - `warden_events_total` (counter): lifecycle events by name
//! - `warden_inflight_operations` (gauge): outstanding leases
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::connection::state::ConnectionState;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_state(target: &str, state: ConnectionState) {
    gauge!("warden_state", "target" => target.to_string()).set(f64::from(state as u8));
}

pub fn record_connect_attempt(target: &str, outcome: &'static str) {
    counter!(
        "warden_connect_attempts_total",
        "target" => target.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_health_check(target: &str, healthy: bool, latency: Duration) {
    let result = if healthy { "healthy" } else { "unhealthy" };
    counter!(
        "warden_health_checks_total",
        "target" => target.to_string(),
        "result" => result
    )
    .increment(1);
    histogram!("warden_health_probe_latency_seconds", "target" => target.to_string())
        .record(latency.as_secs_f64());
}

pub fn record_event(target: &str, event: &'static str) {
    counter!(
        "warden_events_total",
        "target" => target.to_string(),
        "event" => event
    )
    .increment(1);
}

pub fn record_in_flight(target: &str, count: usize) {
    gauge!("warden_inflight_operations", "target" => target.to_string()).set(count as f64);
}
