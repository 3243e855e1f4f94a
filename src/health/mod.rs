//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (monitor.rs):
//!     Periodic timer
//!     → Probe the backing service (bounded by probe timeout)
//!     → HealthCheckResult over a channel
//!     → ConnectionManager::record_health
//!     → N consecutive failures → reconnect
//!
//! Health surface (result.rs):
//!     ConnectionManager::health_report → HealthReport → http::server
//! ```
//!
//! # Design Decisions
//! - The monitor reports; it never mutates connection state
//! - Each probe has its own timeout, shorter than the interval
//! - One stop call halts all future probes

pub mod monitor;
pub mod result;

pub use monitor::{HealthMonitor, HealthSettings, MonitorHandle, Probe};
pub use result::{HealthCheckResult, HealthReport};
