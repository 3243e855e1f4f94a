//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, pool bounds ordered)
//! - Check that the probe timeout fits inside the probe interval
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: WardenConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::WardenConfig;
use crate::resilience::backoff::BackoffPolicy;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("target.url '{url}' is invalid: {reason}")]
    InvalidTargetUrl { url: String, reason: String },

    #[error("pool.max_size must be greater than zero")]
    EmptyPool,

    #[error("pool.min_size ({min}) exceeds pool.max_size ({max})")]
    PoolBounds { min: usize, max: usize },

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error(
        "health_check.timeout_ms ({timeout_ms}) must be shorter than interval_ms ({interval_ms})"
    )]
    ProbeTimeoutTooLong { timeout_ms: u64, interval_ms: u64 },

    #[error("health_check.unhealthy_threshold must be at least 1")]
    ZeroThreshold,

    #[error("backoff: {0}")]
    Backoff(String),

    #[error("{field} '{value}' is not a socket address")]
    InvalidAddress { field: &'static str, value: String },
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &WardenConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match url::Url::parse(&config.target.url) {
        Ok(url) if url.host().is_none() => errors.push(ValidationError::InvalidTargetUrl {
            url: config.target.url.clone(),
            reason: "missing host".to_string(),
        }),
        Ok(_) => {}
        Err(e) => errors.push(ValidationError::InvalidTargetUrl {
            url: config.target.url.clone(),
            reason: e.to_string(),
        }),
    }

    if config.pool.max_size == 0 {
        errors.push(ValidationError::EmptyPool);
    } else if config.pool.min_size > config.pool.max_size {
        errors.push(ValidationError::PoolBounds {
            min: config.pool.min_size,
            max: config.pool.max_size,
        });
    }

    let durations = [
        ("pool.connect_timeout_ms", config.pool.connect_timeout_ms),
        ("pool.operation_timeout_ms", config.pool.operation_timeout_ms),
        ("health_check.interval_ms", config.health_check.interval_ms),
        ("health_check.timeout_ms", config.health_check.timeout_ms),
        ("shutdown.grace_period_ms", config.shutdown.grace_period_ms),
    ];
    for (field, value) in durations {
        if value == 0 {
            errors.push(ValidationError::ZeroDuration(field));
        }
    }

    let health = &config.health_check;
    if health.timeout_ms > 0 && health.timeout_ms >= health.interval_ms {
        errors.push(ValidationError::ProbeTimeoutTooLong {
            timeout_ms: health.timeout_ms,
            interval_ms: health.interval_ms,
        });
    }
    if health.unhealthy_threshold == 0 {
        errors.push(ValidationError::ZeroThreshold);
    }

    if let Err(e) = BackoffPolicy::from_config(&config.backoff) {
        errors.push(ValidationError::Backoff(e.to_string()));
    }

    if config.http.enabled && config.http.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "http.bind_address",
            value: config.http.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&WardenConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = WardenConfig::default();
        config.target.url = "not a url".to_string();
        config.pool.min_size = 20;
        config.pool.max_size = 5;
        config.health_check.timeout_ms = 40_000;
        config.health_check.unhealthy_threshold = 0;
        config.backoff.jitter_fraction = 2.0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5, "{errors:?}");
        assert!(errors.contains(&ValidationError::PoolBounds { min: 20, max: 5 }));
        assert!(errors.contains(&ValidationError::ZeroThreshold));
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let mut config = WardenConfig::default();
        config.pool.connect_timeout_ms = 0;
        config.shutdown.grace_period_ms = 0;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::ZeroDuration("pool.connect_timeout_ms")));
        assert!(errors.contains(&ValidationError::ZeroDuration("shutdown.grace_period_ms")));
    }

    #[test]
    fn test_unlimited_attempts_allowed() {
        let mut config = WardenConfig::default();
        config.backoff.max_attempts = 0;
        assert_eq!(validate_config(&config), Ok(()));
    }
}
