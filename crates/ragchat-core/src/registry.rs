//! Session registry: local mirror of a user's session list.
//!
//! Every mutation goes to the store first. The mirror only ever takes the
//! session the store returned (full replace on `list`, head insert on
//! `create`, replace-by-id on `rename`/`set_favorite`, remove-by-id on
//! `delete`). A failed store call leaves the mirror exactly as it was.

use std::cell::RefCell;
use std::rc::Rc;

use ragchat_types::{ChatError, Result, event::ChatEvent, session::Session};

use crate::event_bus::EventBus;
use crate::ports::RemoteStore;

pub struct SessionRegistry {
    store: Rc<dyn RemoteStore>,
    event_bus: EventBus,
    sessions: RefCell<Vec<Session>>,
}

impl SessionRegistry {
    pub fn new(store: Rc<dyn RemoteStore>, event_bus: EventBus) -> Self {
        Self {
            store,
            event_bus,
            sessions: RefCell::new(Vec::new()),
        }
    }

    /// Snapshot of the mirror, in display order.
    pub fn sessions(&self) -> Vec<Session> {
        self.sessions.borrow().clone()
    }

    pub fn get(&self, session_id: &str) -> Option<Session> {
        self.sessions
            .borrow()
            .iter()
            .find(|s| s.id == session_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.sessions.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.borrow().is_empty()
    }

    /// Fetch the user's sessions and rebuild the mirror from them.
    pub async fn list(&self, user_id: &str, favorite: Option<bool>) -> Result<Vec<Session>> {
        require_user(user_id)?;

        let fetched = self
            .store
            .list_sessions(user_id, favorite)
            .await
            .map_err(|e| self.fail(None, ChatError::fetch(e)))?;

        log::debug!(
            "Loaded {} sessions for {} (favorite={:?}) from {}",
            fetched.len(),
            user_id,
            favorite,
            self.store.backend_name()
        );
        *self.sessions.borrow_mut() = fetched.clone();
        self.event_bus.emit(ChatEvent::SessionsLoaded { count: fetched.len() });
        Ok(fetched)
    }

    /// Create a session and put it at the head of the mirror.
    pub async fn create(&self, user_id: &str, title: &str) -> Result<Session> {
        require_user(user_id)?;

        let created = self
            .store
            .create_session(user_id, title)
            .await
            .map_err(|e| self.fail(None, ChatError::persist(e)))?;

        log::info!("Created session {} for {}", created.id, user_id);
        self.sessions.borrow_mut().insert(0, created.clone());
        self.event_bus.emit(ChatEvent::SessionCreated {
            session_id: created.id.clone(),
        });
        Ok(created)
    }

    pub async fn rename(&self, session_id: &str, title: &str) -> Result<Session> {
        if title.trim().is_empty() {
            return Err(ChatError::Validation("Session title must not be empty".to_string()));
        }

        let updated = self
            .store
            .rename_session(session_id, title)
            .await
            .map_err(|e| self.fail(Some(session_id), ChatError::persist(e)))?;

        self.replace(updated.clone());
        Ok(updated)
    }

    pub async fn set_favorite(&self, session_id: &str, favorite: bool) -> Result<Session> {
        let updated = self
            .store
            .set_favorite(session_id, favorite)
            .await
            .map_err(|e| self.fail(Some(session_id), ChatError::persist(e)))?;

        self.replace(updated.clone());
        Ok(updated)
    }

    /// Delete a session. Emits `SessionDeleted` so whoever tracks the
    /// current selection can clear it.
    pub async fn delete(&self, session_id: &str) -> Result<()> {
        self.store
            .delete_session(session_id)
            .await
            .map_err(|e| self.fail(Some(session_id), ChatError::persist(e)))?;

        self.sessions.borrow_mut().retain(|s| s.id != session_id);
        log::info!("Deleted session {}", session_id);
        self.event_bus.emit(ChatEvent::SessionDeleted {
            session_id: session_id.to_string(),
        });
        Ok(())
    }

    /// Swap in the store's copy of a session, keeping its position.
    /// A session that is not mirrored locally is stale state and is dropped.
    fn replace(&self, updated: Session) {
        let position = self.sessions.borrow().iter().position(|s| s.id == updated.id);
        match position {
            Some(idx) => {
                let session_id = updated.id.clone();
                self.sessions.borrow_mut()[idx] = updated;
                self.event_bus.emit(ChatEvent::SessionUpdated { session_id });
            }
            None => {
                log::debug!("Session {} not in mirror, ignoring store result", updated.id);
            }
        }
    }

    fn fail(&self, session_id: Option<&str>, err: ChatError) -> ChatError {
        log::warn!("Session operation failed: {}", err);
        self.event_bus.emit(ChatEvent::Error {
            session_id: session_id.map(String::from),
            message: err.to_string(),
        });
        err
    }
}

fn require_user(user_id: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(ChatError::Validation("User id must not be empty".to_string()));
    }
    Ok(())
}
