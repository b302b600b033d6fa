//! Join form and connection credentials
//!
//! `JoinForm` holds what the user is typing; `Credentials` is the validated,
//! immutable snapshot handed to the connection manager.

use url::form_urlencoded;

use crate::error::ValidationError;

/// Editable join form fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinForm {
    pub username: String,
    pub room: String,
    pub password: String,
    /// Ask the server to create the room if it doesn't exist
    pub create_if_missing: bool,
}

impl JoinForm {
    /// Whether the join action is enabled
    pub fn is_complete(&self) -> bool {
        self.validate().is_ok()
    }

    /// Check that username, room and password are all non-empty
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.username.is_empty() {
            return Err(ValidationError::EmptyUsername);
        }
        if self.room.is_empty() {
            return Err(ValidationError::EmptyRoom);
        }
        if self.password.is_empty() {
            return Err(ValidationError::EmptyPassword);
        }
        Ok(())
    }
}

/// Validated credentials for one connection attempt
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    room: String,
    password: String,
    create_if_missing: bool,
}

impl Credentials {
    /// Snapshot a join form, rejecting empty fields
    pub fn from_form(form: &JoinForm) -> Result<Self, ValidationError> {
        form.validate()?;
        Ok(Self {
            username: form.username.clone(),
            room: form.room.clone(),
            password: form.password.clone(),
            create_if_missing: form.create_if_missing,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn create_if_missing(&self) -> bool {
        self.create_if_missing
    }

    /// Build the socket URL for these credentials
    ///
    /// `{server_url}/ws/chat/{room}/?username={u}&password={p}[&create=1]`
    pub fn target_url(&self, server_url: &str) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query
            .append_pair("username", &self.username)
            .append_pair("password", &self.password);
        if self.create_if_missing {
            query.append_pair("create", "1");
        }

        format!(
            "{}/ws/chat/{}/?{}",
            server_url.trim_end_matches('/'),
            urlencoding::encode(&self.room),
            query.finish()
        )
    }
}

// Keeps the password out of logs
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("room", &self.room)
            .field("password", &"***")
            .field("create_if_missing", &self.create_if_missing)
            .finish()
    }
}
