//! Probe results and the health report served to collaborators.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::connection::state::ConnectionState;

/// Outcome of a single health probe.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthCheckResult {
    pub timestamp: SystemTime,
    pub healthy: bool,
    pub latency: Duration,
    pub error: Option<String>,
}

impl HealthCheckResult {
    pub fn healthy(latency: Duration) -> Self {
        Self {
            timestamp: SystemTime::now(),
            healthy: true,
            latency,
            error: None,
        }
    }

    pub fn unhealthy(latency: Duration, error: impl Into<String>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            healthy: false,
            latency,
            error: Some(error.into()),
        }
    }
}

/// Snapshot returned by the health surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub state: ConnectionState,
    /// Unix time of the latest probe in milliseconds.
    pub last_check: Option<u64>,
    pub last_error: Option<String>,
    pub attempt_count: u32,
}

pub(crate) fn unix_millis(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_serializes_state_lowercase() {
        let report = HealthReport {
            healthy: false,
            state: ConnectionState::Reconnecting,
            last_check: None,
            last_error: Some("connect failed: refused".into()),
            attempt_count: 2,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["state"], "reconnecting");
        assert_eq!(json["healthy"], false);
        assert!(json["last_check"].is_null());
    }

    #[test]
    fn test_unix_millis() {
        let at = UNIX_EPOCH + Duration::from_millis(1_500);
        assert_eq!(unix_millis(at), 1_500);
    }
}
