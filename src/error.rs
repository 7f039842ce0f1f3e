//! Error types for the chat client

use thiserror::Error;

/// Chat client error
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed before a response was received
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server returned a non-success status
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Conversation not found
    #[error("Conversation not found: {0}")]
    NotFound(String),

    /// WebSocket transport failure
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Send attempted while the session is not open
    #[error("WebSocket is not connected")]
    NotConnected,

    /// Operation needs a current conversation
    #[error("No conversation selected")]
    NoConversation,

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        ClientError::WebSocket(e.to_string())
    }
}

/// Result type for chat client operations
pub type Result<T> = std::result::Result<T, ClientError>;
