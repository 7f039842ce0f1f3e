//! The `ConversationApi` trait - the seam between the store and the backend.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Conversation, ConversationDetail, CreateConversation};

/// Remote conversation service.
///
/// Implementations must not retry; failures are reported to the caller as-is.
#[async_trait]
pub trait ConversationApi: Send + Sync {
    /// `GET /conversations`
    async fn list_conversations(&self) -> Result<Vec<Conversation>>;

    /// `POST /conversations`
    async fn create_conversation(&self, request: &CreateConversation) -> Result<Conversation>;

    /// `GET /conversations/{id}`, including the message history
    async fn get_conversation(&self, id: &str) -> Result<ConversationDetail>;

    /// `DELETE /conversations/{id}`
    async fn delete_conversation(&self, id: &str) -> Result<()>;
}
