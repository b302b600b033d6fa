//! Error types for the chat client
//!
//! Defines application-level errors and join form validation errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// Socket failures never reach the session controller as errors: they are
/// collapsed into a `Closed` event by the connection manager.
#[derive(Debug, Error)]
pub enum AppError {
    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configured server URL cannot be used as a socket base
    #[error("Invalid server URL '{url}': {reason}")]
    InvalidServerUrl { url: String, reason: String },

    /// Join form rejected before any connection attempt
    #[error("Invalid join form: {0}")]
    Validation(#[from] ValidationError),

    /// Join requested while a session is connecting or joined
    #[error("Session already active")]
    SessionActive,

    /// Command line argument missing
    #[error("Missing argument: {0}")]
    MissingArgument(&'static str),
}

/// Join form validation errors
///
/// The only client-side validation: username, room and password must be non-empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("username is empty")]
    EmptyUsername,

    #[error("room is empty")]
    EmptyRoom,

    #[error("password is empty")]
    EmptyPassword,
}
