//! Connection lifecycle state machine.
//!
//! # States
//! - Disconnected: no pool held, connect may be requested
//! - Connecting: first connect sequence in progress
//! - Connected: pool held, operations may proceed
//! - Reconnecting: pool lost, recovery sequence in progress
//! - Draining: shutdown started, no new work accepted
//! - Closed: pool released (terminal)
//!
//! # State Transitions
//! ```text
//! Disconnected → Connecting | Draining
//! Connecting   → Connected | Disconnected | Draining
//! Connected    → Reconnecting | Draining
//! Reconnecting → Connected | Disconnected | Draining
//! Draining     → Closed
//! Closed       → (none)
//! ```

use serde::Serialize;
use thiserror::Error;

/// Lifecycle state of a managed connection.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Reconnecting = 3,
    Draining = 4,
    Closed = 5,
}

impl From<u8> for ConnectionState {
    fn from(val: u8) -> Self {
        match val {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Reconnecting,
            4 => ConnectionState::Draining,
            5 => ConnectionState::Closed,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// Attempted edge outside the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal state transition {from} -> {to}")]
pub struct IllegalTransition {
    pub from: ConnectionState,
    pub to: ConnectionState,
}

impl ConnectionState {
    /// Whether `from → to` is a legal edge.
    pub fn can_transition(from: ConnectionState, to: ConnectionState) -> bool {
        use ConnectionState::*;

        matches!(
            (from, to),
            (Disconnected, Connecting)
                | (Disconnected, Draining)
                | (Connecting, Connected)
                | (Connecting, Disconnected)
                | (Connecting, Draining)
                | (Connected, Reconnecting)
                | (Connected, Draining)
                | (Reconnecting, Connected)
                | (Reconnecting, Disconnected)
                | (Reconnecting, Draining)
                | (Draining, Closed)
        )
    }

    /// Validate and return the next state.
    pub fn transition(self, to: ConnectionState) -> Result<ConnectionState, IllegalTransition> {
        if Self::can_transition(self, to) {
            Ok(to)
        } else {
            Err(IllegalTransition { from: self, to })
        }
    }

    pub fn is_terminal(self) -> bool {
        self == ConnectionState::Closed
    }

    /// Shutdown has begun.
    pub fn is_shutting_down(self) -> bool {
        matches!(self, ConnectionState::Draining | ConnectionState::Closed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Draining => "draining",
            ConnectionState::Closed => "closed",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
