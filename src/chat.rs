//! Chat - wires the conversation store, message log and socket session together
//!
//! ```text
//!   user input ──► SocketSession::send ──► (ok) ──► MessageLog::append (optimistic)
//!
//!   SessionEvent::Message ──► MessagePair ──► drop confirmed echo ──► MessageLog::append_pair
//!
//!   open(id) ──► ConversationStore::select ──► MessageLog::load ──► SocketSession::connect
//! ```
//!
//! The session never touches the log directly; frames only reach it through
//! [`Chat::handle_event`].

use std::collections::VecDeque;

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::api::{ConversationApi, HttpApiConfig, HttpConversationApi};
use crate::config::ClientConfig;
use crate::conversations::ConversationStore;
use crate::error::{ClientError, Result};
use crate::messages::{Category, Message, MessageLog};
use crate::socket::{SessionConfig, SessionEvent, SessionState, SocketSession};
use crate::types::{Conversation, CreateConversation, MessagePair};

/// A chat front end bound to one conversation service and one socket endpoint
pub struct Chat<A> {
    store: ConversationStore<A>,
    log: MessageLog,
    session: SocketSession,
    /// Contents of optimistic user messages not yet confirmed by the server
    pending_echoes: VecDeque<String>,
    last_error: Option<String>,
}

impl Chat<HttpConversationApi> {
    /// Build a chat backed by the HTTP API from validated configuration.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let api = HttpConversationApi::new(HttpApiConfig::from(config))?;
        Ok(Self::new(api, SessionConfig::from(config)))
    }
}

impl<A: ConversationApi> Chat<A> {
    pub fn new(api: A, session_config: SessionConfig) -> Self {
        Self {
            store: ConversationStore::new(api),
            log: MessageLog::new(),
            session: SocketSession::new(session_config),
            pending_echoes: VecDeque::new(),
            last_error: None,
        }
    }

    pub fn store(&self) -> &ConversationStore<A> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ConversationStore<A> {
        &mut self.store
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    pub fn session(&self) -> &SocketSession {
        &self.session
    }

    /// Last socket or decoding error seen by [`handle_event`](Self::handle_event)
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Get a receiver for socket events, to be fed back into `handle_event`.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.session.subscribe()
    }

    /// Make `id` current, load its history and make sure the socket is up.
    ///
    /// On failure the log and the current conversation are left as they were.
    pub async fn open(&mut self, id: &str) -> Result<()> {
        let result = {
            let _loading = self.log.loading_scope();
            self.store.select(id).await
        };
        let detail = result?;

        self.pending_echoes.clear();
        self.log.load(Some(&detail.messages));
        info!(id = %id, messages = self.log.len(), "Conversation opened");

        self.ensure_connected().await;
        Ok(())
    }

    /// Create a conversation, make it current and start with an empty log.
    pub async fn start_new(&mut self, request: CreateConversation) -> Result<Conversation> {
        let conversation = self.store.create(request).await?;
        self.pending_echoes.clear();
        self.log.clear();
        self.ensure_connected().await;
        Ok(conversation)
    }

    /// Send user input for the current conversation.
    ///
    /// The message is appended to the log only once the session accepted it,
    /// so a failed send leaves the log untouched.
    pub fn send(&mut self, content: &str) -> Result<Message> {
        let conversation_id = self
            .store
            .current_id()
            .ok_or(ClientError::NoConversation)?;

        self.session.send(conversation_id, content)?;

        let message = self.log.append(content, Category::User, None);
        self.pending_echoes.push_back(content.to_string());
        self.log.set_loading(true);
        Ok(message)
    }

    /// Delete a conversation; clears the log if it was the open one.
    pub async fn remove(&mut self, id: &str) -> Result<()> {
        let was_current = self.store.current_id() == Some(id);
        self.store.delete(id).await?;

        if was_current {
            self.pending_echoes.clear();
            self.log.clear();
        }
        Ok(())
    }

    /// Apply one session event to the log.
    pub fn handle_event(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::Message(text) => self.handle_frame(text),
            SessionEvent::Opened => {
                self.last_error = None;
            }
            SessionEvent::Closed {
                initiated_locally: false,
                ..
            } => {
                // No reply or echo will arrive for what was sent on this connection
                if !self.pending_echoes.is_empty() {
                    debug!(
                        dropped = self.pending_echoes.len(),
                        "Dropping unconfirmed echoes"
                    );
                    self.pending_echoes.clear();
                }
                self.log.set_loading(false);
            }
            SessionEvent::Error(detail) => {
                self.last_error = Some(detail.clone());
            }
            _ => {}
        }
    }

    /// Wait for the next session event, apply it and return it.
    ///
    /// Returns `None` once the event channel is closed.
    pub async fn next_event(
        &mut self,
        events: &mut broadcast::Receiver<SessionEvent>,
    ) -> Option<SessionEvent> {
        loop {
            match events.recv().await {
                Ok(event) => {
                    self.handle_event(&event);
                    return Some(event);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Session events dropped, consumer too slow");
                    self.last_error = Some(format!("{} session events dropped", skipped));
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Close the socket. No reconnection follows.
    pub async fn close(&mut self) {
        self.session.close().await;
    }

    fn handle_frame(&mut self, text: &str) {
        let mut pair: MessagePair = match serde_json::from_str(text) {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "Ignoring undecodable frame");
                self.last_error = Some(format!("Undecodable frame: {}", e));
                return;
            }
        };

        // The server confirming an optimistic echo: it is already displayed.
        // Echoes queued ahead of the confirmed one will never be confirmed.
        let confirmed = pair.user_message.as_ref().and_then(|user| {
            self.pending_echoes
                .iter()
                .position(|pending| *pending == user.content)
        });
        if let Some(position) = confirmed {
            if position > 0 {
                debug!(skipped = position, "Dropping echoes that were never confirmed");
            }
            self.pending_echoes.drain(..=position);
            pair.user_message = None;
        }

        let appended = self.log.append_pair(&pair);
        debug!(appended = appended.len(), "Applied message pair");

        if pair.assistant_message.is_some() {
            self.log.set_loading(false);
        }
    }

    async fn ensure_connected(&mut self) {
        match self.session.state() {
            SessionState::Open | SessionState::Connecting | SessionState::Reconnecting => {}
            SessionState::Disconnected | SessionState::Failed => self.session.connect().await,
        }
    }
}
