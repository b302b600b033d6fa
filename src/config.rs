//! Client configuration
//!
//! Server address and channel sizing, read from the environment.

use std::env;

use url::Url;

use crate::error::AppError;

/// Default chat server address
pub const DEFAULT_SERVER_URL: &str = "ws://localhost:8000";

/// Default buffer size for connection events
pub const DEFAULT_EVENT_BUFFER: usize = 64;

/// Environment variable overriding the server address
pub const SERVER_URL_ENV: &str = "CHAT_SERVER_URL";

/// Environment variable overriding the event buffer size
pub const EVENT_BUFFER_ENV: &str = "CHAT_EVENT_BUFFER";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Socket base URL, `ws://` or `wss://`, without trailing slash
    pub server_url: String,
    /// Capacity of the connection event channel
    pub event_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl ClientConfig {
    /// Build a config for the given server, validating the URL
    pub fn new(server_url: &str) -> Result<Self, AppError> {
        Ok(Self {
            server_url: parse_server_url(server_url)?,
            ..Self::default()
        })
    }

    /// Read `CHAT_SERVER_URL` and `CHAT_EVENT_BUFFER`, falling back to defaults
    pub fn from_env() -> Result<Self, AppError> {
        let mut config = match env::var(SERVER_URL_ENV) {
            Ok(url) => Self::new(&url)?,
            Err(_) => Self::default(),
        };

        if let Some(buffer) = env::var(EVENT_BUFFER_ENV)
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
        {
            config.event_buffer = buffer;
        }

        // tokio panics on a zero-capacity channel
        config.event_buffer = config.event_buffer.max(1);
        Ok(config)
    }
}

fn parse_server_url(raw: &str) -> Result<String, AppError> {
    let invalid = |reason: String| AppError::InvalidServerUrl {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "ws" | "wss" => {}
        other => return Err(invalid(format!("unsupported scheme '{}'", other))),
    }
    if url.query().is_some() {
        return Err(invalid("query string not allowed".to_string()));
    }

    Ok(raw.trim_end_matches('/').to_string())
}
