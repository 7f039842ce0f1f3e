//! Chat client core
//!
//! Keeps a chat transcript in sync with a backend over two channels:
//!
//! - **REST** for conversation records (`/conversations`)
//! - **WebSocket** for live message exchange, with bounded reconnection
//!
//! ## Components
//!
//! | Module          | Responsibility                                          |
//! |-----------------|---------------------------------------------------------|
//! | `socket`        | One logical WebSocket connection, reconnects on drops   |
//! | `messages`      | Ordered transcript, bulk load and incremental append    |
//! | `conversations` | Cached conversation records and the current pointer     |
//! | `api`           | `ConversationApi` trait, HTTP and in-memory backends    |
//! | `chat`          | Glue: optimistic send, frame decoding, echo matching    |
//!
//! Observable state is published on `tokio::sync::broadcast` channels
//! (`subscribe()` on each component) and, for the socket state, a `watch`
//! channel.
//!
//! ## Example
//!
//! ```rust,no_run
//! use chat_client::{Chat, ClientConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut chat = Chat::from_config(&ClientConfig::from_env())?;
//! let mut events = chat.subscribe();
//!
//! chat.store_mut().list().await?;
//! let conversation = chat.start_new(Default::default()).await?;
//!
//! // Wait for the socket before sending
//! while let Some(event) = chat.next_event(&mut events).await {
//!     if event == chat_client::SessionEvent::Opened {
//!         break;
//!     }
//! }
//! chat.send("Hello!")?;
//! # let _ = conversation;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod chat;
pub mod config;
pub mod conversations;
pub mod error;
pub mod logging;
pub mod messages;
pub mod socket;
pub mod types;

// Re-exports
pub use api::{ConversationApi, HttpApiConfig, HttpConversationApi, MockConversationApi};
pub use chat::Chat;
pub use config::ClientConfig;
pub use conversations::{ConversationStore, StoreEvent};
pub use error::{ClientError, Result};
pub use messages::{Category, LogEvent, Message, MessageId, MessageLog};
pub use socket::{SessionConfig, SessionEvent, SessionState, SocketSession};
pub use types::{
    Conversation, ConversationDetail, CreateConversation, MessagePair, MessageRecord, PairMessage,
    RecordId,
};
