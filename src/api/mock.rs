//! In-memory conversation service for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::traits::ConversationApi;
use crate::error::{ClientError, Result};
use crate::types::{Conversation, ConversationDetail, CreateConversation};

/// Mock conversation service.
///
/// Conversations live in memory, newest first. Failure can be switched on to
/// exercise error paths, and a delay added to exercise slow or cancelled calls.
pub struct MockConversationApi {
    conversations: Mutex<Vec<ConversationDetail>>,
    failing: AtomicBool,
    delay_ms: AtomicU64,
    next_id: AtomicU32,
    call_count: AtomicU32,
}

impl MockConversationApi {
    pub fn new() -> Self {
        Self {
            conversations: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            delay_ms: AtomicU64::new(0),
            next_id: AtomicU32::new(1),
            call_count: AtomicU32::new(0),
        }
    }

    /// Seed a conversation with a message history.
    pub fn with_conversation(self, conversation: Conversation, messages: serde_json::Value) -> Self {
        self.lock().push(ConversationDetail {
            conversation,
            messages,
        });
        self
    }

    /// Make every subsequent call fail with a 500.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delay every subsequent call by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of calls made, including failed ones.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ConversationDetail>> {
        self.conversations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn begin_call(&self) -> Result<()> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(ClientError::Server {
                status: 500,
                message: "mock failure".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for MockConversationApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationApi for MockConversationApi {
    async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        self.begin_call().await?;
        Ok(self.lock().iter().map(|d| d.conversation.clone()).collect())
    }

    async fn create_conversation(&self, request: &CreateConversation) -> Result<Conversation> {
        self.begin_call().await?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let conversation = Conversation {
            id: format!("mock-{}", id),
            title: request.title.clone(),
            model_name: request.model_name.clone(),
            created_at: Some(Utc::now()),
        };
        self.lock().insert(
            0,
            ConversationDetail {
                conversation: conversation.clone(),
                messages: serde_json::Value::Array(Vec::new()),
            },
        );
        Ok(conversation)
    }

    async fn get_conversation(&self, id: &str) -> Result<ConversationDetail> {
        self.begin_call().await?;
        self.lock()
            .iter()
            .find(|d| d.conversation.id == id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(id.to_string()))
    }

    async fn delete_conversation(&self, id: &str) -> Result<()> {
        self.begin_call().await?;
        let mut conversations = self.lock();
        let before = conversations.len();
        conversations.retain(|d| d.conversation.id != id);
        if conversations.len() == before {
            return Err(ClientError::NotFound(id.to_string()));
        }
        Ok(())
    }
}
