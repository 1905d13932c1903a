//! Connection State
//!
//! Lifecycle states of the channel and the transitions allowed between them.

use serde::Serialize;
use std::fmt;

/// Lifecycle state of the channel connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Not started, or stopped retrying after the attempt limit
    Disconnected,
    /// A connect attempt is in flight
    Connecting,
    /// Connected and delivering messages
    Open,
    /// Waiting for the backoff timer before the next attempt
    Reconnecting,
    /// Torn down; terminal
    Closed,
}

impl ConnectionState {
    /// Whether the state machine permits moving to `next`
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Open)
                | (Connecting, Reconnecting)
                | (Open, Reconnecting)
                | (Reconnecting, Connecting)
                | (Reconnecting, Disconnected)
                | (Disconnected, Closed)
                | (Connecting, Closed)
                | (Open, Closed)
                | (Reconnecting, Closed)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == ConnectionState::Closed
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
