//! Pool Warden Library
//!
//! Lifecycle management for one pooled backing-service connection: bounded
//! jittered retry, health monitoring with reconnect, and graceful drain.

pub mod config;
pub mod connection;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::WardenConfig;
pub use connection::{ConnectionError, ConnectionManager, ConnectionState, Connector, Lease};
pub use health::{HealthMonitor, HealthReport};
pub use http::HealthServer;
pub use lifecycle::{ShutdownCoordinator, Warden};
pub use resilience::BackoffPolicy;
