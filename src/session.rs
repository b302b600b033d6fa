//! Session controller
//!
//! Holds the UI-facing state (join form, message input, message log, session
//! state) and drives a `Connection` from user actions. Connection events are
//! fed back through `handle_event`, which applies the lifecycle transitions:
//!
//! ```text
//! Idle --join--> Connecting --Ready--> Joined
//!  ^                 |                   |
//!  +-----Closed------+---Closed/leave----+
//! ```

use tracing::{debug, info, warn};

use crate::connection::{Connection, ConnectionEvent};
use crate::credentials::{Credentials, JoinForm};
use crate::error::AppError;
use crate::message::ChatMessage;
use crate::types::SessionState;

/// Append-only log of the current session's messages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageLog {
    messages: Vec<ChatMessage>,
}

impl MessageLog {
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChatMessage> {
        self.messages.iter()
    }

    pub fn as_slice(&self) -> &[ChatMessage] {
        &self.messages
    }
}

/// A log entry paired with its "own message" flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderedMessage<'a> {
    pub message: &'a ChatMessage,
    /// Sender name equals the session username
    pub own: bool,
}

/// Session lifecycle state machine over a `Connection`
pub struct SessionController<C> {
    connection: C,
    state: SessionState,
    form: JoinForm,
    input: String,
    credentials: Option<Credentials>,
    messages: MessageLog,
}

impl<C: Connection> SessionController<C> {
    pub fn new(connection: C) -> Self {
        Self {
            connection,
            state: SessionState::Idle,
            form: JoinForm::default(),
            input: String::new(),
            credentials: None,
            messages: MessageLog::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_joined(&self) -> bool {
        self.state == SessionState::Joined
    }

    pub fn form(&self) -> &JoinForm {
        &self.form
    }

    /// Join form fields, editable by the user
    pub fn form_mut(&mut self) -> &mut JoinForm {
        &mut self.form
    }

    /// Whether the join action is enabled
    pub fn can_join(&self) -> bool {
        self.state == SessionState::Idle && self.form.is_complete()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, input: impl Into<String>) {
        self.input = input.into();
    }

    pub fn messages(&self) -> &MessageLog {
        &self.messages
    }

    /// Username of the current session, if connecting or joined
    pub fn session_username(&self) -> Option<&str> {
        self.credentials.as_ref().map(Credentials::username)
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// Start joining the room described by the form
    ///
    /// Rejected without any state change if a field is empty or a session is
    /// already active.
    pub fn join(&mut self) -> Result<(), AppError> {
        if self.state.is_active() {
            warn!("join ignored: session is {}", self.state);
            return Err(AppError::SessionActive);
        }

        let credentials = Credentials::from_form(&self.form)?;
        info!(
            "Joining room '{}' as '{}'",
            credentials.room(),
            credentials.username()
        );

        self.connection.connect(&credentials);
        self.credentials = Some(credentials);
        self.state = SessionState::Connecting;
        Ok(())
    }

    /// Send the current input, fire-and-forget
    ///
    /// The message is not appended locally; it shows up when the server echoes
    /// it back. Outside `Joined` this does nothing and keeps the input.
    pub fn send_message(&mut self) {
        if self.state != SessionState::Joined {
            debug!("send ignored: session is {}", self.state);
            return;
        }
        let Some(credentials) = &self.credentials else {
            return;
        };

        let input = std::mem::take(&mut self.input);
        self.connection
            .send(&ChatMessage::new(credentials.username(), input));
    }

    /// Leave the room: close the connection and reset to `Idle`
    ///
    /// Safe to call in any state, any number of times.
    pub fn leave(&mut self) {
        if self.state.is_active() {
            info!("Leaving session ({})", self.state);
        }
        self.connection.disconnect();
        self.reset();
    }

    /// Apply a connection event to the session state
    pub fn handle_event(&mut self, event: ConnectionEvent) {
        match (self.state, event) {
            (SessionState::Connecting, ConnectionEvent::Ready) => {
                info!("Joined room");
                self.messages.clear();
                self.state = SessionState::Joined;
            }
            (SessionState::Joined, ConnectionEvent::MessageReceived(message)) => {
                self.messages.push(message);
            }
            (SessionState::Connecting, ConnectionEvent::Closed) => {
                warn!("Join attempt failed: connection closed");
                self.connection.disconnect();
                self.reset();
            }
            (SessionState::Joined, ConnectionEvent::Closed) => {
                info!("Connection closed, session ended");
                self.connection.disconnect();
                self.reset();
            }
            (state, event) => {
                debug!("Ignoring {:?} while {}", event, state);
            }
        }
    }

    /// Wait for the next connection event
    pub async fn next_event(&mut self) -> Option<ConnectionEvent> {
        self.connection.next_event().await
    }

    /// Whether a message counts as "own": same username as this session
    pub fn is_own(&self, message: &ChatMessage) -> bool {
        self.session_username() == Some(message.username.as_str())
    }

    /// Log entries in arrival order with their "own" flag
    pub fn rendered(&self) -> impl Iterator<Item = RenderedMessage<'_>> {
        self.messages.iter().map(move |message| RenderedMessage {
            message,
            own: self.is_own(message),
        })
    }

    fn reset(&mut self) {
        self.state = SessionState::Idle;
        self.messages.clear();
        self.credentials = None;
    }
}
