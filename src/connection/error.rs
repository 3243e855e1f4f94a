//! Connection error taxonomy.

use std::time::Duration;

use thiserror::Error;

use crate::connection::state::{ConnectionState, IllegalTransition};

/// Errors surfaced by the connection manager and its leases.
///
/// `Clone` so that one single-flight outcome can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConnectionError {
    /// A connect attempt did not finish within the connect timeout.
    #[error("connect attempt timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// The backing service refused or dropped a connect attempt.
    #[error("connect failed: {0}")]
    Connect(String),

    /// A health probe did not finish within its timeout.
    #[error("health probe timed out after {0:?}")]
    ProbeTimeout(Duration),

    /// Settings rejected at construction.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Programming error: the state machine was asked to take an illegal edge.
    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),

    /// The manager is not connected; retry later or fall back.
    #[error("service unavailable (state: {state})")]
    Unavailable { state: ConnectionState },

    /// The caller's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// An operation issued through a lease exceeded its deadline.
    #[error("operation timed out after {0:?}")]
    OperationTimeout(Duration),

    /// An operation issued through a lease failed.
    #[error("operation failed: {0}")]
    Operation(String),

    /// An operation reported the connection as lost; reconnect was started.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// Shutdown is in progress; no new work is accepted.
    #[error("shutting down")]
    ShuttingDown,

    /// The manager has been closed.
    #[error("connection manager closed")]
    Closed,
}

impl ConnectionError {
    /// Failures the retry loop handles locally.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ConnectionError::ConnectTimeout(_)
                | ConnectionError::Connect(_)
                | ConnectionError::ProbeTimeout(_)
        )
    }

    /// Misuse rather than an operational failure.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ConnectionError::InvalidConfig(_) | ConnectionError::IllegalTransition(_)
        )
    }

    /// "Service unavailable" class: fail the request, do not wait.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            ConnectionError::Unavailable { .. }
                | ConnectionError::ShuttingDown
                | ConnectionError::Closed
        )
    }
}

/// Failure reported by an operation run through a lease.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OperationError {
    /// The underlying connection is gone; the manager should reconnect.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// Any other failure; the connection is still usable.
    #[error("{0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(ConnectionError::ConnectTimeout(Duration::from_secs(1)).is_transient());
        assert!(ConnectionError::Connect("refused".into()).is_transient());
        assert!(!ConnectionError::Cancelled.is_transient());

        let illegal = IllegalTransition {
            from: ConnectionState::Closed,
            to: ConnectionState::Connecting,
        };
        assert!(ConnectionError::from(illegal).is_fatal());
        assert!(!ConnectionError::ShuttingDown.is_fatal());

        assert!(ConnectionError::Unavailable {
            state: ConnectionState::Reconnecting
        }
        .is_unavailable());
        assert!(!ConnectionError::OperationTimeout(Duration::from_secs(1)).is_unavailable());
    }

    #[test]
    fn test_unavailable_message_names_state() {
        let err = ConnectionError::Unavailable {
            state: ConnectionState::Disconnected,
        };
        assert_eq!(err.to_string(), "service unavailable (state: disconnected)");
    }
}
