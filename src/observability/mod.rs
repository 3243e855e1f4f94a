//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Connection manager, health monitor, shutdown coordinator:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields on every log line (target name, state, attempt)
//! - Metrics are cheap (atomic increments) and optional

pub mod logging;
pub mod metrics;
