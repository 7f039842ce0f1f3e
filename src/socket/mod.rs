//! Live Message Socket
//!
//! Each submodule has a single responsibility:
//!
//! | Module      | Responsibility                                   |
//! |-------------|--------------------------------------------------|
//! | `transport` | WebSocket connect / send / receive               |
//! | `session`   | One logical connection with bounded reconnection |
//!
//! # Usage
//!
//! ```ignore
//! use chat_client::socket::{SessionConfig, SessionEvent, SocketSession};
//!
//! let mut session = SocketSession::new(SessionConfig {
//!     url: "ws://localhost:8080/ws/chat".to_string(),
//!     ..Default::default()
//! });
//! let mut events = session.subscribe();
//! session.connect().await;
//!
//! while let Ok(event) = events.recv().await {
//!     if let SessionEvent::Opened = event {
//!         session.send("conversation-id", "Hello")?;
//!     }
//! }
//! ```
//!
//! Inbound frames are handed out raw as `SessionEvent::Message`; decoding them
//! is up to the consumer.

mod transport;

mod session;

pub use session::{SessionConfig, SessionEvent, SessionState, SocketSession};
