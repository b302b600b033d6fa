//! Basic type definitions for the chat client
//!
//! - `ConnectionId`: UUID-based identifier for one socket connection
//! - `SessionState`: lifecycle state of the session controller

use uuid::Uuid;

/// Unique connection identifier (newtype pattern)
///
/// Every `connect` call gets a fresh id so events from a released
/// connection can be told apart from the live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session lifecycle state
///
/// Leaving a room and losing the connection both land back in `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No connection, join form editable
    #[default]
    Idle,
    /// Connection requested, waiting for the socket to open
    Connecting,
    /// Socket open, messages flowing
    Joined,
}

impl SessionState {
    /// Whether a connection is owned in this state
    pub fn is_active(self) -> bool {
        !matches!(self, SessionState::Idle)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Joined => "joined",
        };
        f.write_str(name)
    }
}
