//! Health HTTP surface.
//!
//! # Data Flow
//! ```text
//! GET /health
//!     → server.rs (Axum router, trace + timeout layers)
//!     → ConnectionManager::health_report (lock-free snapshot)
//!     → 200 or 503 with JSON body
//!
//! GET /health/live
//!     → 200 while the process serves requests
//! ```

pub mod server;

pub use server::{health_router, HealthServer};
