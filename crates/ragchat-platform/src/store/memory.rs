//! In-memory store backend.
//! Behaves like the chat-storage service but lives in process and is lost
//! on reload. Used when no service is configured, and as the store for
//! integration tests.

use std::cell::RefCell;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use ragchat_core::ports::RemoteStore;
use ragchat_types::{
    ChatError, Result,
    message::{Message, MessagePage, NewMessage, Sender},
    session::Session,
};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

type ListKey = (String, Option<bool>);

pub struct MemoryStore {
    sessions: RefCell<HashMap<String, Session>>,
    /// Per session, in creation order
    messages: RefCell<HashMap<String, Vec<Message>>>,
    /// `list_sessions` results, evicted whenever one of the user's sessions changes
    list_cache: RefCell<HashMap<ListKey, Vec<Session>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            sessions: RefCell::new(HashMap::new()),
            messages: RefCell::new(HashMap::new()),
            list_cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.borrow().len()
    }

    /// Messages stored for a session, including ones the client never loaded.
    pub fn message_count(&self, session_id: &str) -> usize {
        self.messages
            .borrow()
            .get(session_id)
            .map(Vec::len)
            .unwrap_or(0)
    }

    fn evict_user(&self, user_id: &str) {
        self.list_cache
            .borrow_mut()
            .retain(|(cached_user, _), _| cached_user != user_id);
    }

    fn update(&self, session_id: &str, apply: impl FnOnce(&mut Session)) -> Result<Session> {
        let updated = {
            let mut sessions = self.sessions.borrow_mut();
            let session = sessions
                .get_mut(session_id)
                .ok_or_else(|| not_found(session_id))?;
            apply(session);
            session.updated_at = advance(session.updated_at);
            session.clone()
        };
        self.evict_user(&updated.user_id);
        Ok(updated)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl RemoteStore for MemoryStore {
    async fn list_sessions(&self, user_id: &str, favorite: Option<bool>) -> Result<Vec<Session>> {
        let key = (user_id.to_string(), favorite);
        if let Some(cached) = self.list_cache.borrow().get(&key) {
            return Ok(cached.clone());
        }

        let mut found: Vec<Session> = self
            .sessions
            .borrow()
            .values()
            .filter(|s| s.user_id == user_id)
            .filter(|s| favorite.map_or(true, |f| s.favorite == f))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));

        self.list_cache.borrow_mut().insert(key, found.clone());
        Ok(found)
    }

    async fn create_session(&self, user_id: &str, title: &str) -> Result<Session> {
        if user_id.trim().is_empty() {
            return Err(ChatError::Validation("userId must not be blank".to_string()));
        }
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            favorite: false,
            created_at: now,
            updated_at: now,
        };
        self.sessions
            .borrow_mut()
            .insert(session.id.clone(), session.clone());
        self.evict_user(user_id);
        log::debug!("Created session {} for {}", session.id, user_id);
        Ok(session)
    }

    async fn rename_session(&self, session_id: &str, title: &str) -> Result<Session> {
        self.update(session_id, |s| s.title = title.to_string())
    }

    async fn set_favorite(&self, session_id: &str, favorite: bool) -> Result<Session> {
        self.update(session_id, |s| s.favorite = favorite)
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        let removed = self
            .sessions
            .borrow_mut()
            .remove(session_id)
            .ok_or_else(|| not_found(session_id))?;
        self.messages.borrow_mut().remove(session_id);
        self.evict_user(&removed.user_id);
        log::debug!("Deleted session {} and its messages", session_id);
        Ok(())
    }

    async fn list_messages(&self, session_id: &str, page: u32, size: u32) -> Result<MessagePage> {
        if !self.sessions.borrow().contains_key(session_id) {
            return Err(not_found(session_id));
        }
        let size = match size {
            0 => DEFAULT_PAGE_SIZE,
            n => n.min(MAX_PAGE_SIZE),
        };

        let messages = self.messages.borrow();
        let all = messages.get(session_id).map(Vec::as_slice).unwrap_or(&[]);
        let total_elements = all.len() as u64;
        let total_pages = total_elements.div_ceil(size as u64) as u32;
        let offset = (page as u64).saturating_mul(size as u64);
        let content = if offset >= total_elements {
            Vec::new()
        } else {
            all.iter()
                .skip(offset as usize)
                .take(size as usize)
                .cloned()
                .collect()
        };

        Ok(MessagePage {
            content,
            page,
            size,
            total_elements,
            total_pages,
            last: page.saturating_add(1) >= total_pages,
        })
    }

    async fn append_message(&self, session_id: &str, message: NewMessage) -> Result<Message> {
        let owner = self
            .sessions
            .borrow()
            .get(session_id)
            .map(|s| s.user_id.clone())
            .ok_or_else(|| not_found(session_id))?;
        if message.content.trim().is_empty() {
            return Err(ChatError::Validation("content must not be blank".to_string()));
        }

        let user_id = match message.sender {
            Sender::User if message.user_id != owner => {
                return Err(ChatError::NotFound(
                    "User ID does not match session owner".to_string(),
                ));
            }
            Sender::User => Some(message.user_id),
            Sender::Assistant | Sender::System => None,
        };

        let mut messages = self.messages.borrow_mut();
        let history = messages.entry(session_id.to_string()).or_default();
        let created_at = match history.last() {
            Some(prev) => advance(prev.created_at),
            None => Utc::now(),
        };
        let saved = Message {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            sender: message.sender,
            content: message.content,
            user_id,
            context: message.context,
            created_at,
        };
        history.push(saved.clone());
        Ok(saved)
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}

/// Current time, but strictly after `prev` so ordering by timestamp
/// never depends on the random id tie-break.
fn advance(prev: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > prev {
        now
    } else {
        prev + Duration::microseconds(1)
    }
}

fn not_found(session_id: &str) -> ChatError {
    ChatError::NotFound(format!("Session not found: {}", session_id))
}
