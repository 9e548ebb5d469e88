use serde::{Deserialize, Serialize};

use crate::message::Sender;

/// Phase of the per-session exchange state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExchangeState {
    Idle,
    SendingUser,
    AwaitingReply,
    PersistingReply,
    /// Transient: reported once after a failure, then the session returns to `Idle`
    Failed,
}

impl ExchangeState {
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ExchangeState::SendingUser | ExchangeState::AwaitingReply | ExchangeState::PersistingReply
        )
    }
}

/// Events emitted by the session registry and conversation controller.
/// The display layer drains these to know what to re-render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChatEvent {
    /// The session mirror was rebuilt from the store
    SessionsLoaded { count: usize },

    SessionCreated { session_id: String },

    /// Renamed or (un)favorited
    SessionUpdated { session_id: String },

    /// Display layer must drop its selection if this was the current session
    SessionDeleted { session_id: String },

    HistoryLoaded { session_id: String, count: usize },

    ExchangeStateChanged { session_id: String, state: ExchangeState },

    MessageAppended { session_id: String, message_id: String, sender: Sender },

    Error { session_id: Option<String>, message: String },
}

impl ChatEvent {
    /// Session the event is about, if any
    pub fn session_id(&self) -> Option<&str> {
        match self {
            ChatEvent::SessionsLoaded { .. } => None,
            ChatEvent::SessionCreated { session_id }
            | ChatEvent::SessionUpdated { session_id }
            | ChatEvent::SessionDeleted { session_id }
            | ChatEvent::HistoryLoaded { session_id, .. }
            | ChatEvent::ExchangeStateChanged { session_id, .. }
            | ChatEvent::MessageAppended { session_id, .. } => Some(session_id),
            ChatEvent::Error { session_id, .. } => session_id.as_deref(),
        }
    }
}
