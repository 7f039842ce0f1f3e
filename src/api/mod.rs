//! Conversation REST API
//!
//! The store talks to the backend only through [`ConversationApi`], so a
//! client instance is injected rather than shared globally.

mod http;
mod mock;
mod traits;

pub use http::{HttpApiConfig, HttpConversationApi};
pub use mock::MockConversationApi;
pub use traits::ConversationApi;
