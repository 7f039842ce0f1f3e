//! Wire types shared by the REST API and the WebSocket protocol

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default title for new conversations
pub const DEFAULT_TITLE: &str = "New Chat";

/// Default model for new conversations
pub const DEFAULT_MODEL_NAME: &str = "llama3.2";

/// Backend-assigned record id (either a string or an integer)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Number(n) => write!(f, "{}", n),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId::Text(s.to_string())
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        RecordId::Number(n)
    }
}

/// Conversation metadata record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Conversation ID
    pub id: String,
    /// Display title
    pub title: String,
    /// Model serving this conversation
    pub model_name: String,
    /// Creation time
    #[serde(default, with = "lenient_time")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Conversation with its embedded message history.
///
/// `messages` is kept as raw JSON so that a malformed history degrades to an
/// empty transcript instead of failing the whole request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub conversation: Conversation,
    #[serde(default)]
    pub messages: serde_json::Value,
}

impl ConversationDetail {
    pub fn id(&self) -> &str {
        &self.conversation.id
    }
}

/// Request body for creating a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversation {
    pub title: String,
    pub model_name: String,
}

impl CreateConversation {
    pub fn new(title: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            model_name: model_name.into(),
        }
    }
}

impl Default for CreateConversation {
    fn default() -> Self {
        Self::new(DEFAULT_TITLE, DEFAULT_MODEL_NAME)
    }
}

/// Message as stored by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<RecordId>,
    /// `user`, `assistant`, `system`, ...
    #[serde(default)]
    pub role: String,
    pub content: String,
    #[serde(default, with = "lenient_time")]
    pub created_at: Option<DateTime<Utc>>,
}

/// One side of a message pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairMessage {
    pub id: RecordId,
    pub content: String,
}

/// Server reply carrying the confirmed user message and/or the assistant reply
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePair {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_message: Option<PairMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_message: Option<PairMessage>,
}

impl MessagePair {
    pub fn is_empty(&self) -> bool {
        self.user_message.is_none() && self.assistant_message.is_none()
    }
}

/// Client to server socket frame
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundFrame<'a> {
    pub conversation_id: &'a str,
    pub user_message: &'a str,
}

/// Timestamps arrive either as RFC 3339 or as a naive `YYYY-MM-DDTHH:MM:SS[.fff]`
/// (treated as UTC). Anything else deserializes to `None`.
mod lenient_time {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => serializer.serialize_str(&ts.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(raw.as_ref().and_then(|v| v.as_str()).and_then(parse))
    }

    pub fn parse(s: &str) -> Option<DateTime<Utc>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
            return Some(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }
}
