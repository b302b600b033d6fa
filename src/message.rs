//! Message protocol definitions
//!
//! The wire format is a flat JSON record `{"username": ..., "message": ...}`
//! in both directions. Inbound frames that don't match it are kept as raw
//! text attributed to the system sender.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AppError;

/// Username used for inbound payloads that are not chat records
pub const SYSTEM_USERNAME: &str = "système";

/// Chat message, both directions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub username: String,
    pub message: String,
}

impl ChatMessage {
    pub fn new(username: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            message: message.into(),
        }
    }

    /// System-attributed message carrying raw text
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(SYSTEM_USERNAME, text)
    }

    /// Serialize to the outbound wire format
    pub fn to_json(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Inbound payload, classified once at the parse boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundPayload {
    /// Well-formed chat record
    Chat(ChatMessage),
    /// Anything else, kept verbatim
    Raw(String),
}

impl InboundPayload {
    /// Classify an inbound text frame
    ///
    /// Valid JSON missing either string field is treated as raw text too.
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str::<ChatMessage>(text) {
            Ok(msg) => InboundPayload::Chat(msg),
            Err(e) => {
                debug!("Inbound payload is not a chat record: {}", e);
                InboundPayload::Raw(text.to_string())
            }
        }
    }

    /// Convert to the message appended to the log
    pub fn into_message(self) -> ChatMessage {
        match self {
            InboundPayload::Chat(msg) => msg,
            InboundPayload::Raw(text) => ChatMessage::system(text),
        }
    }
}
