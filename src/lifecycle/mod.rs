//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validate config → Build manager → Arm shutdown → Serve health
//!     → Connect → Start health monitor → Wait for shutdown
//!
//! Shutdown (shutdown.rs):
//!     Request received → Draining (reject new leases)
//!     → Wait for leases up to grace period → Force-cancel leftovers
//!     → Close pool → Closed
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → first: start drain, second: skip grace period
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then manager, then listeners
//! - Ordered shutdown: stop accepting, drain, close
//! - Shutdown has a deadline: forced close after the grace period

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{
    ShutdownCoordinator, ShutdownError, ShutdownOutcome, ShutdownPhase, ShutdownRequest,
};
pub use startup::{StartupError, Warden};
