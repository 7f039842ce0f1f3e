//! Conversation Store
//!
//! Cache of conversation metadata mirrored from the remote service, with one
//! designated current conversation.
//!
//! Every network operation follows the same shape:
//! 1. clear `error`, set `loading` through a [`LoadingGuard`]
//! 2. await the remote call with the guard held
//! 3. the guard clears `loading` on every exit, cancellation included
//! 4. on success mutate the cache, on failure record `error` and leave the
//!    cache as it was, then hand the result back to the caller

use std::future::Future;

use tokio::sync::broadcast;
use tracing::{debug, error, info};

use crate::api::ConversationApi;
use crate::error::Result;
use crate::types::{Conversation, ConversationDetail, CreateConversation};

const EVENT_CAPACITY: usize = 256;

/// Change notification published on every store mutation
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// Cached set replaced
    Listed { count: usize },
    /// Conversation created and made current
    Created(Conversation),
    /// Current conversation changed (`None` = cleared)
    CurrentChanged(Option<String>),
    /// Conversation removed from the cache
    Deleted(String),
    /// Cached title changed
    Renamed { id: String, title: String },
    /// Loading indicator toggled
    Loading(bool),
    /// Request failed
    Failed(String),
}

/// Conversation metadata cache backed by a [`ConversationApi`]
pub struct ConversationStore<A> {
    api: A,
    conversations: Vec<Conversation>,
    current: Option<Conversation>,
    loading: bool,
    error: Option<String>,
    events: broadcast::Sender<StoreEvent>,
}

impl<A: ConversationApi> ConversationStore<A> {
    pub fn new(api: A) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            api,
            conversations: Vec::new(),
            current: None,
            loading: false,
            error: None,
            events,
        }
    }

    /// Get a receiver for store changes
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn current(&self) -> Option<&Conversation> {
        self.current.as_ref()
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current.as_ref().map(|c| c.id.as_str())
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Message of the last failed request, cleared when a new one starts
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Fetch and replace the cached set.
    pub async fn list(&mut self) -> Result<&[Conversation]> {
        self.error = None;
        let call = self.api.list_conversations();
        let result = tracked(&mut self.loading, &self.events, call).await;
        self.finish("list conversations", &result);

        let conversations = result?;
        debug!(count = conversations.len(), "Conversations loaded");
        self.conversations = conversations;
        self.publish(StoreEvent::Listed {
            count: self.conversations.len(),
        });
        Ok(&self.conversations)
    }

    /// Create a conversation remotely, prepend it and make it current.
    pub async fn create(&mut self, request: CreateConversation) -> Result<Conversation> {
        self.error = None;
        let call = self.api.create_conversation(&request);
        let result = tracked(&mut self.loading, &self.events, call).await;
        self.finish("create conversation", &result);

        let conversation = result?;
        info!(id = %conversation.id, title = %conversation.title, "Conversation created");
        self.conversations.insert(0, conversation.clone());
        self.current = Some(conversation.clone());
        self.publish(StoreEvent::Created(conversation.clone()));
        self.publish(StoreEvent::CurrentChanged(Some(conversation.id.clone())));
        Ok(conversation)
    }

    /// Fetch a conversation with its history and make it current.
    pub async fn get(&mut self, id: &str) -> Result<ConversationDetail> {
        self.error = None;
        let call = self.api.get_conversation(id);
        let result = tracked(&mut self.loading, &self.events, call).await;
        self.finish("load conversation", &result);

        let detail = result?;
        debug!(id = %detail.id(), "Setting current conversation");
        self.current = Some(detail.conversation.clone());
        self.publish(StoreEvent::CurrentChanged(Some(detail.conversation.id.clone())));
        Ok(detail)
    }

    /// Same as [`get`](Self::get).
    pub async fn select(&mut self, id: &str) -> Result<ConversationDetail> {
        self.get(id).await
    }

    /// Delete a conversation remotely and drop it from the cache.
    ///
    /// Clears the current conversation if it was the one deleted.
    pub async fn delete(&mut self, id: &str) -> Result<()> {
        self.error = None;
        let call = self.api.delete_conversation(id);
        let result = tracked(&mut self.loading, &self.events, call).await;
        self.finish("delete conversation", &result);
        result?;

        self.conversations.retain(|c| c.id != id);
        self.publish(StoreEvent::Deleted(id.to_string()));

        if self.current_id() == Some(id) {
            self.current = None;
            self.publish(StoreEvent::CurrentChanged(None));
        }
        info!(id = %id, "Conversation deleted");
        Ok(())
    }

    /// Update a cached title without calling the remote service.
    pub fn rename_local(&mut self, id: &str, title: impl Into<String>) {
        let title = title.into();
        let mut renamed = false;

        if let Some(conversation) = self.conversations.iter_mut().find(|c| c.id == id) {
            conversation.title = title.clone();
            renamed = true;
        }
        if let Some(current) = self.current.as_mut().filter(|c| c.id == id) {
            current.title = title.clone();
            renamed = true;
        }

        if renamed {
            self.publish(StoreEvent::Renamed {
                id: id.to_string(),
                title,
            });
        }
    }

    fn finish<T>(&mut self, operation: &str, result: &Result<T>) {
        if let Err(e) = result {
            error!(operation, error = %e, "Conversation request failed");
            self.error = Some(e.to_string());
            self.publish(StoreEvent::Failed(e.to_string()));
        }
    }

    fn publish(&self, event: StoreEvent) {
        let _ = self.events.send(event);
    }
}

/// Holds the store's `loading` flag up for the lifetime of one request.
struct LoadingGuard<'a> {
    loading: &'a mut bool,
    events: &'a broadcast::Sender<StoreEvent>,
}

impl<'a> LoadingGuard<'a> {
    fn start(loading: &'a mut bool, events: &'a broadcast::Sender<StoreEvent>) -> Self {
        if !*loading {
            *loading = true;
            let _ = events.send(StoreEvent::Loading(true));
        }
        Self { loading, events }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if *self.loading {
            *self.loading = false;
            let _ = self.events.send(StoreEvent::Loading(false));
        }
    }
}

/// Await a remote call with `loading` set; dropping the future clears it.
async fn tracked<F: Future>(
    loading: &mut bool,
    events: &broadcast::Sender<StoreEvent>,
    call: F,
) -> F::Output {
    let _guard = LoadingGuard::start(loading, events);
    call.await
}
