//! WebSocket Chat Room Client Library
//!
//! A client for a chat room service reachable at
//! `ws://host/ws/chat/{room}/`, built with tokio-tungstenite.
//!
//! # Features
//! - Join form validation (username, room, password)
//! - Optional room creation on join
//! - Fire-and-forget message sending
//! - Inbound messages in arrival order, with raw-text fallback
//! - Leave / server close handling
//!
//! # Architecture
//! Two layers:
//! - `ConnectionManager` owns the single socket (run in a spawned task) and
//!   turns it into `Ready` / `MessageReceived` / `Closed` events
//! - `SessionController` holds the form, input and message log, and moves
//!   between `Idle`, `Connecting` and `Joined` on user actions and events
//!
//! # Example
//! ```ignore
//! use chat_client::{ClientConfig, ConnectionManager, SessionController};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ClientConfig::from_env().unwrap();
//!     let mut session = SessionController::new(ConnectionManager::new(&config));
//!
//!     let form = session.form_mut();
//!     form.username = "Alice".into();
//!     form.room = "general".into();
//!     form.password = "secret".into();
//!     session.join().unwrap();
//!
//!     while let Some(event) = session.next_event().await {
//!         session.handle_event(event);
//!     }
//! }
//! ```

pub mod config;
pub mod connection;
pub mod credentials;
pub mod error;
mod handler;
pub mod message;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use config::ClientConfig;
pub use connection::{Connection, ConnectionEvent, ConnectionManager};
pub use credentials::{Credentials, JoinForm};
pub use error::{AppError, ValidationError};
pub use message::{ChatMessage, InboundPayload, SYSTEM_USERNAME};
pub use session::{MessageLog, RenderedMessage, SessionController};
pub use types::{ConnectionId, SessionState};
