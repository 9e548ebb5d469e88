use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sender {
    User,
    Assistant,
    System,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "USER",
            Sender::Assistant => "ASSISTANT",
            Sender::System => "SYSTEM",
        }
    }
}

/// Free-form snippet metadata: scalars or nested objects
pub type Metadata = Map<String, Value>;

/// A retrieval result attached to an assistant reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSnippet {
    pub source_id: String,
    pub snippet: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl ContextSnippet {
    pub fn new(source_id: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            snippet: snippet.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A persisted, immutable turn of a session.
///
/// Every field except `context` is assigned by the store; the client never
/// builds one of these directly outside of store adapters and tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub session_id: String,
    pub sender: Sender,
    pub content: String,
    /// Owner id for USER messages, absent for everything else
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Vec<ContextSnippet>>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Sort key within a session: creation time, then id.
    pub fn order_key(&self) -> (DateTime<Utc>, &str) {
        (self.created_at, self.id.as_str())
    }

    pub fn is_system(&self) -> bool {
        self.sender == Sender::System
    }
}

/// Append request sent to the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub sender: Sender,
    pub content: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Vec<ContextSnippet>>,
}

impl NewMessage {
    pub fn user(user_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            content: content.into(),
            user_id: user_id.into(),
            context: None,
        }
    }

    pub fn assistant(
        user_id: impl Into<String>,
        content: impl Into<String>,
        context: Option<Vec<ContextSnippet>>,
    ) -> Self {
        Self {
            sender: Sender::Assistant,
            content: content.into(),
            user_id: user_id.into(),
            context,
        }
    }
}

/// One page of a session's history, oldest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    pub content: Vec<Message>,
    pub page: u32,
    pub size: u32,
    pub total_elements: u64,
    pub total_pages: u32,
    pub last: bool,
}

/// Reply produced by a response provider
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reply {
    pub content: String,
    pub context: Option<Vec<ContextSnippet>>,
}

impl Reply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            context: None,
        }
    }
}

/// Restore the `(created_at, id)` order of a message buffer.
pub fn sort_messages(messages: &mut [Message]) {
    messages.sort_by(|a, b| a.order_key().cmp(&b.order_key()));
}

/// Insert `message` at the position that keeps `messages` ordered.
pub fn insert_ordered(messages: &mut Vec<Message>, message: Message) {
    let idx = messages.partition_point(|m| m.order_key() <= message.order_key());
    messages.insert(idx, message);
}
