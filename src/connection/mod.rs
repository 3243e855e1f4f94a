//! Connection lifecycle subsystem.
//!
//! # Data Flow
//! ```text
//! connect():
//!     Disconnected → Connecting
//!     → connector.rs (open pool, bounded by connect timeout)
//!     → on failure: resilience::backoff → sleep → retry
//!     → Connected | Disconnected (attempts exhausted)
//!
//! acquire():
//!     Connected → lease.rs (counted borrow of the handle)
//!     otherwise → fail fast
//!
//! Reconnect (connection lost, or N failed health probes):
//!     Connected → Reconnecting → same retry loop → Connected
//!
//! Shutdown (lifecycle::shutdown only):
//!     any → Draining → wait for leases → Closed
//! ```
//!
//! # Design Decisions
//! - One manager per backing-service target, passed by handle
//! - Single-flight: concurrent connect calls share one attempt
//! - Acquire never waits; degraded periods are the caller's decision
//! - Listeners and events are scoped to the manager instance

pub mod connector;
pub mod error;
pub mod events;
pub mod http;
pub mod lease;
pub mod manager;
pub mod state;

pub use connector::{BoxError, Connector, PoolSettings};
pub use error::{ConnectionError, OperationError};
pub use events::{LifecycleEvent, ListenerId, StateChange};
pub use http::{HttpBackend, HttpPool};
pub use lease::Lease;
pub use manager::ConnectionManager;
pub use state::{ConnectionState, IllegalTransition};
