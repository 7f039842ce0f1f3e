//! Message Log
//!
//! The ordered transcript shown for the current conversation. Entries come from
//! two places:
//!
//! - `load()` replaces everything with the backend's history
//! - `append()` / `append_pair()` add optimistic local echoes and streamed replies
//!
//! Locally generated ids live in their own space (`MessageId::Local`), so they
//! can never collide with backend ids.

use chrono::{DateTime, Local, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::types::{MessagePair, MessageRecord, RecordId};

/// Time-of-day format used for rendered timestamps
pub const TIME_FORMAT: &str = "%-I:%M:%S %p";

const EVENT_CAPACITY: usize = 256;

/// Display category of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    User,
    Bot,
}

impl Category {
    /// `user` stays `User`; every other role collapses to `Bot`.
    pub fn from_role(role: &str) -> Self {
        if role == "user" {
            Category::User
        } else {
            Category::Bot
        }
    }
}

/// Identifier of a message in the log
///
/// Serializes like its `Display` form for local ids (`"local-3"`) and as the
/// backend value for remote ones, so the two spaces stay apart on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageId {
    /// Generated by this log's counter
    Local(u64),
    /// Assigned by the backend
    Remote(RecordId),
}

impl MessageId {
    pub fn is_local(&self) -> bool {
        matches!(self, MessageId::Local(_))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Local(n) => write!(f, "local-{}", n),
            MessageId::Remote(id) => write!(f, "{}", id),
        }
    }
}

impl Serialize for MessageId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MessageId::Local(_) => serializer.collect_str(self),
            MessageId::Remote(id) => id.serialize(serializer),
        }
    }
}

impl From<RecordId> for MessageId {
    fn from(id: RecordId) -> Self {
        MessageId::Remote(id)
    }
}

/// A fully constructed transcript entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub id: MessageId,
    pub content: String,
    pub category: Category,
    pub created_at: DateTime<Utc>,
    /// Local time of day, rendered with [`TIME_FORMAT`]
    pub timestamp: String,
}

impl Message {
    fn new(id: MessageId, content: String, category: Category, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            content,
            category,
            created_at,
            timestamp: render_time(created_at),
        }
    }
}

/// Render an instant as a local time of day.
pub fn render_time(instant: DateTime<Utc>) -> String {
    instant.with_timezone(&Local).format(TIME_FORMAT).to_string()
}

/// Change notification published on every mutation
#[derive(Debug, Clone, PartialEq)]
pub enum LogEvent {
    /// Log replaced by a bulk load
    Loaded { count: usize },
    /// Message added at the end
    Appended(Message),
    /// Log emptied
    Cleared,
    /// Loading indicator toggled
    Loading(bool),
}

/// Ordered transcript of one conversation
pub struct MessageLog {
    messages: Vec<Message>,
    loading: bool,
    next_local_id: u64,
    events: broadcast::Sender<LogEvent>,
}

impl MessageLog {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            messages: Vec::new(),
            loading: false,
            next_local_id: 1,
            events,
        }
    }

    /// Get a receiver for log changes
    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.events.subscribe()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.messages.iter().any(|m| &m.id == id)
    }

    /// Replace the log with a backend history.
    ///
    /// Anything other than a JSON array (including `None`) clears the log.
    /// Array elements that are not message records are skipped.
    pub fn load(&mut self, records: Option<&serde_json::Value>) {
        let Some(items) = records.and_then(|v| v.as_array()) else {
            debug!("No message history or not an array, clearing log");
            self.messages.clear();
            self.publish(LogEvent::Loaded { count: 0 });
            return;
        };

        let parsed: Vec<MessageRecord> = items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| {
                match serde_json::from_value::<MessageRecord>(item.clone()) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!(index, error = %e, "Skipping malformed message record");
                        None
                    }
                }
            })
            .collect();

        self.load_records(&parsed);
    }

    /// Replace the log with already-decoded backend records.
    pub fn load_records(&mut self, records: &[MessageRecord]) {
        let now = Utc::now();
        self.messages = records
            .iter()
            .map(|record| {
                Message::new(
                    MessageId::Remote(record.id.clone()),
                    record.content.clone(),
                    Category::from_role(&record.role),
                    record.created_at.unwrap_or(now),
                )
            })
            .collect();

        debug!(count = self.messages.len(), "Message log loaded");
        self.publish(LogEvent::Loaded {
            count: self.messages.len(),
        });
    }

    /// Append a message stamped with the current time.
    ///
    /// Without an id a local one is generated. If `id` is already present
    /// the existing message is returned and nothing is inserted.
    pub fn append(
        &mut self,
        content: impl Into<String>,
        category: Category,
        id: Option<MessageId>,
    ) -> Message {
        if let Some(existing) = id
            .as_ref()
            .and_then(|id| self.messages.iter().find(|m| &m.id == id))
        {
            debug!(id = %existing.id, "Message already in log, not appending");
            return existing.clone();
        }

        let id = id.unwrap_or_else(|| self.generate_id());
        let message = Message::new(id, content.into(), category, Utc::now());
        self.messages.push(message.clone());
        self.publish(LogEvent::Appended(message.clone()));
        message
    }

    /// Append the sides of a backend pair, user first, skipping absent sides.
    pub fn append_pair(&mut self, pair: &MessagePair) -> Vec<Message> {
        let mut appended = Vec::with_capacity(2);
        if let Some(user) = &pair.user_message {
            appended.push(self.append(
                user.content.clone(),
                Category::User,
                Some(MessageId::Remote(user.id.clone())),
            ));
        }
        if let Some(assistant) = &pair.assistant_message {
            appended.push(self.append(
                assistant.content.clone(),
                Category::Bot,
                Some(MessageId::Remote(assistant.id.clone())),
            ));
        }
        appended
    }

    /// Empty the log and restart local id generation.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.next_local_id = 1;
        self.publish(LogEvent::Cleared);
    }

    pub fn set_loading(&mut self, loading: bool) {
        if self.loading != loading {
            self.loading = loading;
            self.publish(LogEvent::Loading(loading));
        }
    }

    /// Keep `loading` set until the returned guard is dropped, including
    /// when the surrounding future is cancelled.
    pub fn loading_scope(&mut self) -> LoadingScope<'_> {
        self.set_loading(true);
        LoadingScope { log: self }
    }

    fn generate_id(&mut self) -> MessageId {
        let id = MessageId::Local(self.next_local_id);
        self.next_local_id += 1;
        id
    }

    fn publish(&self, event: LogEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Clears the log's loading flag on drop
pub struct LoadingScope<'a> {
    log: &'a mut MessageLog,
}

impl Drop for LoadingScope<'_> {
    fn drop(&mut self) {
        self.log.set_loading(false);
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PairMessage;
    use serde_json::json;
    use std::collections::HashSet;

    fn history() -> serde_json::Value {
        json!([
            {"id": 1, "conversationId": "c1", "role": "user", "content": "Hi", "createdAt": "2025-03-01T10:15:00Z"},
            {"id": 2, "conversationId": "c1", "role": "assistant", "content": "Hello!", "createdAt": "2025-03-01T10:15:02Z"},
            {"id": 3, "conversationId": "c1", "role": "system", "content": "note", "createdAt": "2025-03-01T10:15:03"}
        ])
    }

    #[test]
    fn test_load_maps_roles_and_preserves_order() {
        let mut log = MessageLog::new();
        log.load(Some(&history()));

        assert_eq!(log.len(), 3);
        let categories: Vec<Category> = log.messages().iter().map(|m| m.category).collect();
        assert_eq!(categories, vec![Category::User, Category::Bot, Category::Bot]);
        assert_eq!(log.messages()[0].id, MessageId::Remote(RecordId::Number(1)));
        assert_eq!(log.messages()[1].content, "Hello!");
        assert_eq!(
            log.messages()[0].timestamp,
            render_time("2025-03-01T10:15:00Z".parse().unwrap())
        );
    }

    #[test]
    fn test_load_replaces_previous_content() {
        let mut log = MessageLog::new();
        log.append("draft", Category::User, None);
        log.load(Some(&history()));
        assert_eq!(log.len(), 3);
        assert!(log.messages().iter().all(|m| !m.id.is_local()));
    }

    #[test]
    fn test_load_non_sequence_clears() {
        let mut log = MessageLog::new();
        log.load(Some(&history()));
        log.load(None);
        assert!(log.is_empty());

        log.load(Some(&history()));
        log.load(Some(&json!("not an array")));
        assert!(log.is_empty());

        log.load(Some(&json!({"id": 1})));
        assert!(log.is_empty());
    }

    #[test]
    fn test_load_skips_malformed_records() {
        let mut log = MessageLog::new();
        log.load(Some(&json!([
            {"id": "a", "role": "user", "content": "ok"},
            {"role": "user"},
            42
        ])));
        assert_eq!(log.len(), 1);
        assert_eq!(log.messages()[0].id, MessageId::Remote(RecordId::Text("a".into())));
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        let mut log = MessageLog::new();
        let ids: HashSet<MessageId> = (0..100)
            .map(|i| log.append(format!("m{}", i), Category::User, None).id)
            .collect();
        assert_eq!(ids.len(), 100);
        assert_eq!(log.len(), 100);
    }

    #[test]
    fn test_local_ids_never_collide_with_backend_ids() {
        let mut log = MessageLog::new();
        log.load(Some(&json!([{"id": 1, "role": "user", "content": "x"}])));
        let local = log.append("y", Category::User, None);
        assert_eq!(local.id, MessageId::Local(1));
        assert_ne!(local.id, log.messages()[0].id);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_serialized_ids_stay_distinct() {
        let local = serde_json::to_value(MessageId::Local(1)).unwrap();
        let remote = serde_json::to_value(MessageId::Remote(RecordId::Number(1))).unwrap();
        assert_eq!(local, json!("local-1"));
        assert_eq!(remote, json!(1));

        let mut log = MessageLog::new();
        let message = log.append("hi", Category::User, None);
        assert_eq!(serde_json::to_value(&message).unwrap()["id"], "local-1");
    }

    #[test]
    fn test_loading_scope_clears_on_drop() {
        let mut log = MessageLog::new();
        let mut rx = log.subscribe();
        {
            let _loading = log.loading_scope();
        }
        assert!(!log.is_loading());
        assert_eq!(rx.try_recv().unwrap(), LogEvent::Loading(true));
        assert_eq!(rx.try_recv().unwrap(), LogEvent::Loading(false));
    }

    #[test]
    fn test_append_with_existing_id_is_noop() {
        let mut log = MessageLog::new();
        let id = MessageId::Remote(RecordId::Text("m-1".into()));
        log.append("first", Category::Bot, Some(id.clone()));
        let again = log.append("second", Category::Bot, Some(id));
        assert_eq!(log.len(), 1);
        assert_eq!(again.content, "first");
    }

    #[test]
    fn test_append_pair() {
        let mut log = MessageLog::new();
        assert!(log.append_pair(&MessagePair::default()).is_empty());
        assert!(log.is_empty());

        let only_user = MessagePair {
            user_message: Some(PairMessage { id: RecordId::Number(1), content: "q".into() }),
            assistant_message: None,
        };
        let appended = log.append_pair(&only_user);
        assert_eq!(appended.len(), 1);
        assert_eq!(appended[0].category, Category::User);

        let both = MessagePair {
            user_message: Some(PairMessage { id: RecordId::Number(2), content: "q2".into() }),
            assistant_message: Some(PairMessage { id: RecordId::Number(3), content: "a2".into() }),
        };
        let appended = log.append_pair(&both);
        assert_eq!(appended.len(), 2);
        assert_eq!(appended[0].category, Category::User);
        assert_eq!(appended[1].category, Category::Bot);
        assert_eq!(log.len(), 3);
        assert_eq!(log.last().unwrap().content, "a2");
    }

    #[test]
    fn test_clear_resets_counter() {
        let mut log = MessageLog::new();
        log.append("a", Category::User, None);
        log.append("b", Category::User, None);
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.append("c", Category::User, None).id, MessageId::Local(1));
    }

    #[test]
    fn test_events_and_loading() {
        let mut log = MessageLog::new();
        let mut rx = log.subscribe();

        log.set_loading(true);
        log.set_loading(true);
        let message = log.append("hi", Category::User, None);
        log.clear();
        log.set_loading(false);

        assert_eq!(rx.try_recv().unwrap(), LogEvent::Loading(true));
        assert_eq!(rx.try_recv().unwrap(), LogEvent::Appended(message));
        assert_eq!(rx.try_recv().unwrap(), LogEvent::Cleared);
        assert_eq!(rx.try_recv().unwrap(), LogEvent::Loading(false));
        assert!(rx.try_recv().is_err());
        assert!(!log.is_loading());
    }
}
