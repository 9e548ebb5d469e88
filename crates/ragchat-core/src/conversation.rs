//! Conversation controller: the per-session exchange state machine.
//!
//! One `submit` runs one exchange:
//! 1. Persist the USER message and show it as soon as the store acknowledges it
//! 2. Send the non-SYSTEM history to the response provider
//! 3. Persist the ASSISTANT reply with its context snippets and show it
//!
//! States: `Idle → SendingUser → AwaitingReply → PersistingReply → Idle`.
//! A failure in any active state reports `Failed` and drops back to `Idle`.
//! Messages that were already persisted stay in the buffer.
//!
//! Methods take `&self` so the display layer can hold the controller behind
//! an `Rc` and start a `submit` without blocking other sessions. The state
//! guard, not the borrow checker, keeps a second `submit` on the same session
//! from running while one is in flight.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use ragchat_types::{
    ChatError, Result,
    event::{ChatEvent, ExchangeState},
    message::{Message, NewMessage, insert_ordered, sort_messages},
    session::PageRequest,
};

use crate::event_bus::EventBus;
use crate::ports::{RemoteStore, ResponseProvider};

/// Result of an accepted or ignored `submit`
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Both turns were persisted and appended to the buffer
    Completed { user: Message, assistant: Message },
    /// An exchange was already in flight for this session; nothing happened
    Busy,
}

struct Conversation {
    state: ExchangeState,
    messages: Vec<Message>,
    /// `forget` was called mid-exchange; drop the entry once it settles
    forget_when_idle: bool,
}

impl Conversation {
    fn new() -> Self {
        Self {
            state: ExchangeState::Idle,
            messages: Vec::new(),
            forget_when_idle: false,
        }
    }
}

pub struct ConversationController {
    store: Rc<dyn RemoteStore>,
    provider: Rc<dyn ResponseProvider>,
    event_bus: EventBus,
    history_page: PageRequest,
    include_context: bool,
    conversations: RefCell<HashMap<String, Conversation>>,
}

impl ConversationController {
    pub fn new(
        store: Rc<dyn RemoteStore>,
        provider: Rc<dyn ResponseProvider>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            store,
            provider,
            event_bus,
            history_page: PageRequest::default(),
            include_context: true,
            conversations: RefCell::new(HashMap::new()),
        }
    }

    /// Page loaded by [`load_history`](Self::load_history).
    pub fn with_history_page(mut self, page: PageRequest) -> Self {
        self.history_page = page;
        self
    }

    pub fn with_include_context(mut self, include_context: bool) -> Self {
        self.include_context = include_context;
        self
    }

    /// Ordered snapshot of a session's buffer.
    pub fn messages(&self, session_id: &str) -> Vec<Message> {
        self.conversations
            .borrow()
            .get(session_id)
            .map(|c| c.messages.clone())
            .unwrap_or_default()
    }

    pub fn state(&self, session_id: &str) -> ExchangeState {
        self.conversations
            .borrow()
            .get(session_id)
            .map(|c| c.state)
            .unwrap_or(ExchangeState::Idle)
    }

    /// Load the configured history page, replacing the session's buffer.
    pub async fn load_history(&self, session_id: &str) -> Result<Vec<Message>> {
        self.load_history_page(session_id, self.history_page).await
    }

    /// Load an explicit page, replacing the session's buffer. Pages are
    /// never merged; infinite scroll is up to the caller.
    pub async fn load_history_page(&self, session_id: &str, page: PageRequest) -> Result<Vec<Message>> {
        let fetched = self
            .store
            .list_messages(session_id, page.page, page.size)
            .await
            .map_err(|e| self.fail(session_id, ChatError::fetch(e)))?;

        let mut messages = fetched.content;
        sort_messages(&mut messages);

        self.conversations
            .borrow_mut()
            .entry(session_id.to_string())
            .or_insert_with(Conversation::new)
            .messages = messages.clone();

        log::debug!(
            "Loaded {} messages for session {} (page {}, size {})",
            messages.len(),
            session_id,
            page.page,
            page.size
        );
        self.event_bus.emit(ChatEvent::HistoryLoaded {
            session_id: session_id.to_string(),
            count: messages.len(),
        });
        Ok(messages)
    }

    /// Run one exchange for `session_id`.
    ///
    /// Blank text is rejected before any store call. A call made while an
    /// exchange is already in flight on the same session returns
    /// [`SubmitOutcome::Busy`] without touching anything.
    pub async fn submit(&self, session_id: &str, user_id: &str, text: &str) -> Result<SubmitOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::Validation("Message must not be empty".to_string()));
        }

        if !self.begin_exchange(session_id) {
            log::debug!("Exchange already in flight for session {}, ignoring submit", session_id);
            return Ok(SubmitOutcome::Busy);
        }

        let result = match self.run_exchange(session_id, user_id, text).await {
            Ok((user, assistant)) => {
                self.set_state(session_id, ExchangeState::Idle);
                Ok(SubmitOutcome::Completed { user, assistant })
            }
            Err(e) => {
                self.set_state(session_id, ExchangeState::Failed);
                let err = self.fail(session_id, e);
                self.set_state(session_id, ExchangeState::Idle);
                Err(err)
            }
        };
        self.drop_if_forgotten(session_id);
        result
    }

    /// Drop a session's buffer, e.g. after the session was deleted.
    ///
    /// While an exchange is in flight the buffer is kept until that exchange
    /// finishes, then dropped; returns false in that case.
    pub fn forget(&self, session_id: &str) -> bool {
        let mut conversations = self.conversations.borrow_mut();
        if let Some(conversation) = conversations.get_mut(session_id) {
            if conversation.state.is_active() {
                conversation.forget_when_idle = true;
                return false;
            }
        }
        conversations.remove(session_id);
        true
    }

    fn drop_if_forgotten(&self, session_id: &str) {
        let mut conversations = self.conversations.borrow_mut();
        if conversations
            .get(session_id)
            .is_some_and(|c| c.forget_when_idle)
        {
            conversations.remove(session_id);
            log::debug!("Dropped buffer of forgotten session {}", session_id);
        }
    }

    async fn run_exchange(&self, session_id: &str, user_id: &str, text: &str) -> Result<(Message, Message)> {
        let user = self
            .store
            .append_message(session_id, NewMessage::user(user_id, text))
            .await
            .map_err(ChatError::persist)?;
        self.append(session_id, user.clone());

        self.set_state(session_id, ExchangeState::AwaitingReply);
        let history = self.prompt_history(session_id, &user);
        let reply = self
            .provider
            .generate(&history, self.include_context)
            .await
            .map_err(ChatError::provider)?;
        if reply.content.trim().is_empty() {
            return Err(ChatError::Provider(format!(
                "{} returned an empty reply",
                self.provider.provider_name()
            )));
        }

        self.set_state(session_id, ExchangeState::PersistingReply);
        let assistant = self
            .store
            .append_message(
                session_id,
                NewMessage::assistant(user_id, reply.content, reply.context),
            )
            .await
            .map_err(ChatError::persist)?;
        self.append(session_id, assistant.clone());

        log::info!(
            "Exchange complete for session {}: {} -> {}",
            session_id,
            user.id,
            assistant.id
        );
        Ok((user, assistant))
    }

    /// Buffered non-SYSTEM messages in order, with the just-persisted
    /// USER message last.
    fn prompt_history(&self, session_id: &str, submitted: &Message) -> Vec<Message> {
        let conversations = self.conversations.borrow();
        let mut history: Vec<Message> = conversations
            .get(session_id)
            .map(|c| {
                c.messages
                    .iter()
                    .filter(|m| !m.is_system() && m.id != submitted.id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        history.push(submitted.clone());
        history
    }

    /// Claim the session for a new exchange. False if one is in flight.
    fn begin_exchange(&self, session_id: &str) -> bool {
        {
            let mut conversations = self.conversations.borrow_mut();
            let conversation = conversations
                .entry(session_id.to_string())
                .or_insert_with(Conversation::new);
            if conversation.state.is_active() {
                return false;
            }
            conversation.state = ExchangeState::SendingUser;
        }
        self.event_bus.emit(ChatEvent::ExchangeStateChanged {
            session_id: session_id.to_string(),
            state: ExchangeState::SendingUser,
        });
        true
    }

    fn set_state(&self, session_id: &str, state: ExchangeState) {
        self.conversations
            .borrow_mut()
            .entry(session_id.to_string())
            .or_insert_with(Conversation::new)
            .state = state;
        self.event_bus.emit(ChatEvent::ExchangeStateChanged {
            session_id: session_id.to_string(),
            state,
        });
    }

    /// Insert a store-acknowledged message in order. A message already in
    /// the buffer (e.g. picked up by a concurrent history load) is not
    /// added twice.
    fn append(&self, session_id: &str, message: Message) {
        let message_id = message.id.clone();
        let sender = message.sender;
        {
            let mut conversations = self.conversations.borrow_mut();
            let conversation = conversations
                .entry(session_id.to_string())
                .or_insert_with(Conversation::new);
            if conversation.messages.iter().any(|m| m.id == message_id) {
                return;
            }
            insert_ordered(&mut conversation.messages, message);
        }
        self.event_bus.emit(ChatEvent::MessageAppended {
            session_id: session_id.to_string(),
            message_id,
            sender,
        });
    }

    fn fail(&self, session_id: &str, err: ChatError) -> ChatError {
        log::warn!("Conversation {} failed: {}", session_id, err);
        self.event_bus.emit(ChatEvent::Error {
            session_id: Some(session_id.to_string()),
            message: err.to_string(),
        });
        err
    }
}
