//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the warden.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the connection warden.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct WardenConfig {
    /// Backing-service target.
    pub target: TargetConfig,

    /// Pool bounds and timeouts.
    pub pool: PoolConfig,

    /// Connect retry policy.
    pub backoff: BackoffConfig,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Drain settings.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Health endpoint settings.
    pub http: HttpConfig,
}

/// Backing-service target.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Target identifier for logging/metrics.
    pub name: String,

    /// Base URL of the backing service (e.g., "http://127.0.0.1:3000").
    pub url: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            name: "primary".to_string(),
            url: "http://127.0.0.1:3000".to_string(),
        }
    }
}

/// Pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Connections opened when the pool is acquired.
    pub min_size: usize,

    /// Maximum concurrently held connections.
    pub max_size: usize,

    /// Timeout for a single connect attempt in milliseconds.
    pub connect_timeout_ms: u64,

    /// Default timeout for operations issued through a lease in milliseconds.
    pub operation_timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_size: 1,
            max_size: 10,
            connect_timeout_ms: 5_000,
            operation_timeout_ms: 30_000,
        }
    }
}

/// Connect retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Maximum connect attempts per sequence, 0 for unlimited.
    pub max_attempts: u32,

    /// Multiplicative jitter, e.g. 0.2 for ±20%.
    pub jitter_fraction: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 100,
            max_delay_ms: 10_000,
            max_attempts: 5,
            jitter_fraction: 0.2,
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable periodic health probes.
    pub enabled: bool,

    /// Probe interval in milliseconds.
    pub interval_ms: u64,

    /// Probe timeout in milliseconds (must be shorter than the interval).
    pub timeout_ms: u64,

    /// Consecutive unhealthy probes before reconnecting.
    pub unhealthy_threshold: u32,

    /// Path probed by the HTTP connector.
    pub path: String,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 30_000,
            timeout_ms: 5_000,
            unhealthy_threshold: 3,
            path: "/health".to_string(),
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Drain window before the pool is force-closed, in milliseconds.
    pub grace_period_ms: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: 10_000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Health endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Serve the health endpoint.
    pub enabled: bool,

    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: WardenConfig = toml::from_str("").unwrap();
        assert_eq!(config.health_check.interval_ms, 30_000);
        assert_eq!(config.health_check.unhealthy_threshold, 3);
        assert_eq!(config.shutdown.grace_period_ms, 10_000);
        assert_eq!(config.backoff.max_attempts, 5);
    }

    #[test]
    fn test_partial_sections() {
        let config: WardenConfig = toml::from_str(
            r#"
            [target]
            url = "http://db.internal:7000"

            [backoff]
            base_delay_ms = 250

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.target.url, "http://db.internal:7000");
        assert_eq!(config.target.name, "primary");
        assert_eq!(config.backoff.base_delay_ms, 250);
        assert_eq!(config.backoff.max_delay_ms, 10_000);
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }
}
