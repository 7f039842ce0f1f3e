//! Configuration for the chat client
//!
//! Only two endpoints are externally supplied: the REST base URL and the
//! WebSocket URL. Everything else has defaults matching the web front end.

use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::error::{ClientError, Result};

/// Default REST API base URL
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api";

/// Default WebSocket endpoint
pub const DEFAULT_SOCKET_URL: &str = "ws://localhost:8080/ws/chat";

/// Default delay between reconnection attempts
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);

/// Default maximum number of reconnection attempts
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Default timeout for REST requests
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the conversation REST API (e.g. `http://host:8080/api`)
    pub api_base_url: String,
    /// WebSocket endpoint for live message exchange
    pub socket_url: String,
    /// Fixed delay between reconnection attempts
    pub reconnect_delay: Duration,
    /// Maximum reconnection attempts before giving up (0 = never reconnect)
    pub max_reconnect_attempts: u32,
    /// Timeout for individual REST requests
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            socket_url: DEFAULT_SOCKET_URL.to_string(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Create config from environment, loading a `.env` file first if present.
    ///
    /// | Variable                      | Default                        |
    /// |-------------------------------|--------------------------------|
    /// | `CHAT_API_BASE_URL`           | `http://localhost:8080/api`    |
    /// | `CHAT_SOCKET_URL`             | `ws://localhost:8080/ws/chat`  |
    /// | `CHAT_RECONNECT_DELAY_MS`     | `3000`                         |
    /// | `CHAT_MAX_RECONNECT_ATTEMPTS` | `5`                            |
    /// | `CHAT_REQUEST_TIMEOUT_MS`     | `30000`                        |
    pub fn from_env() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "Loaded .env file");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    ///
    /// Unparseable numeric values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let millis = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(default)
        };

        Self {
            api_base_url: lookup("CHAT_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            socket_url: lookup("CHAT_SOCKET_URL").unwrap_or_else(|| DEFAULT_SOCKET_URL.to_string()),
            reconnect_delay: millis("CHAT_RECONNECT_DELAY_MS", DEFAULT_RECONNECT_DELAY),
            max_reconnect_attempts: lookup("CHAT_MAX_RECONNECT_ATTEMPTS")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(DEFAULT_MAX_RECONNECT_ATTEMPTS),
            request_timeout: millis("CHAT_REQUEST_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT),
        }
    }

    /// Validate URL schemes.
    pub fn validate(&self) -> Result<()> {
        check_scheme("api_base_url", &self.api_base_url, &["http", "https"])?;
        check_scheme("socket_url", &self.socket_url, &["ws", "wss"])?;
        Ok(())
    }
}

fn check_scheme(field: &str, value: &str, allowed: &[&str]) -> Result<()> {
    let url = Url::parse(value)
        .map_err(|e| ClientError::Config(format!("{} '{}' is not a URL: {}", field, value, e)))?;

    if !allowed.contains(&url.scheme()) {
        return Err(ClientError::Config(format!(
            "{} must use one of {:?}, got '{}'",
            field,
            allowed,
            url.scheme()
        )));
    }
    Ok(())
}
