//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Connect attempt to the backing service:
//!     → connection timeout (enforced by the manager)
//!     → On failure: backoff.rs (exponential delay with jitter)
//!     → retry until max_attempts is exhausted
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Jittered backoff prevents synchronized retry storms
//! - Malformed policies are rejected at construction, never at call time

pub mod backoff;

pub use backoff::{BackoffError, BackoffPolicy};
