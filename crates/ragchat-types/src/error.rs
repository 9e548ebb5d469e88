use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChatError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Persist error: {0}")]
    Persist(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification of a [`ChatError`], for callers that branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Fetch,
    Persist,
    Provider,
    Store,
    Config,
}

impl ChatError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChatError::Validation(_) => ErrorKind::Validation,
            ChatError::Fetch(_) => ErrorKind::Fetch,
            ChatError::Persist(_) => ErrorKind::Persist,
            ChatError::Provider(_) => ErrorKind::Provider,
            ChatError::NotFound(_)
            | ChatError::Http { .. }
            | ChatError::Network(_)
            | ChatError::Serialization(_) => ErrorKind::Store,
            ChatError::Config(_) => ErrorKind::Config,
        }
    }

    /// Wrap a store failure from a read path.
    pub fn fetch(cause: ChatError) -> Self {
        match cause {
            e @ (ChatError::Fetch(_) | ChatError::Validation(_)) => e,
            other => ChatError::Fetch(other.to_string()),
        }
    }

    /// Wrap a store failure from a write path.
    pub fn persist(cause: ChatError) -> Self {
        match cause {
            e @ (ChatError::Persist(_) | ChatError::Validation(_)) => e,
            other => ChatError::Persist(other.to_string()),
        }
    }

    /// Wrap a response provider failure.
    pub fn provider(cause: ChatError) -> Self {
        match cause {
            e @ ChatError::Provider(_) => e,
            other => ChatError::Provider(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(e: serde_json::Error) -> Self {
        ChatError::Serialization(e.to_string())
    }
}
