//! Port traits: the boundary between the core and its collaborators.
//!
//! The core only depends on these traits. Adapters (HTTP store, in-memory
//! store, simulated and remote response providers) live in `ragchat-platform`.
//! Everything is single-threaded, hence `?Send`.

use async_trait::async_trait;
use ragchat_types::{
    Result,
    message::{Message, MessagePage, NewMessage, Reply},
    session::Session,
};

// ─── Remote Store Port ───────────────────────────────────────

/// Authoritative source of sessions and messages.
#[async_trait(?Send)]
pub trait RemoteStore {
    /// Sessions of a user, most recently updated first
    async fn list_sessions(&self, user_id: &str, favorite: Option<bool>) -> Result<Vec<Session>>;

    async fn create_session(&self, user_id: &str, title: &str) -> Result<Session>;

    async fn rename_session(&self, session_id: &str, title: &str) -> Result<Session>;

    async fn set_favorite(&self, session_id: &str, favorite: bool) -> Result<Session>;

    /// Deletes the session and every message in it
    async fn delete_session(&self, session_id: &str) -> Result<()>;

    /// One page of history, oldest first
    async fn list_messages(&self, session_id: &str, page: u32, size: u32) -> Result<MessagePage>;

    async fn append_message(&self, session_id: &str, message: NewMessage) -> Result<Message>;

    /// Name of this backend (for logging/debug)
    fn backend_name(&self) -> &str;
}

// ─── Response Provider Port ──────────────────────────────────

/// Turns a conversation history into a reply.
///
/// Implementations must leave SYSTEM messages out of whatever prompt they
/// build, and must fail instead of returning an empty reply.
#[async_trait(?Send)]
pub trait ResponseProvider {
    async fn generate(&self, history: &[Message], include_context: bool) -> Result<Reply>;

    /// Name of this provider (for logging/debug)
    fn provider_name(&self) -> &str;
}
