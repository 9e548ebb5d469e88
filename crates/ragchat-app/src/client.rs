//! `ChatClient`: one configured client with store, provider, event bus,
//! session registry and conversation controller.

use std::rc::Rc;

use ragchat_core::{ConversationController, EventBus, SessionRegistry};
use ragchat_platform::{provider::build_provider, store::build_store};
use ragchat_types::{
    Result,
    config::ChatConfig,
    message::Message,
    session::Session,
};

pub struct ChatClient {
    config: ChatConfig,
    event_bus: EventBus,
    registry: Rc<SessionRegistry>,
    controller: Rc<ConversationController>,
}

impl ChatClient {
    /// Validate `config` and wire up the backends it selects.
    pub fn from_config(config: ChatConfig) -> Result<Self> {
        config.validate()?;

        let store = build_store(&config.store);
        let provider = build_provider(&config.provider);
        let event_bus = EventBus::new();

        let registry = SessionRegistry::new(store.clone(), event_bus.clone());
        let controller = ConversationController::new(store, provider, event_bus.clone())
            .with_history_page(config.history)
            .with_include_context(config.include_context);

        log::info!(
            "Chat client ready (history page size {}, context {})",
            config.history.size,
            if config.include_context { "on" } else { "off" }
        );

        Ok(Self {
            config,
            event_bus,
            registry: Rc::new(registry),
            controller: Rc::new(controller),
        })
    }

    /// Parse a serialized `ChatConfig` and build a client from it.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        Self::from_config(ChatConfig::from_json(data)?)
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn registry(&self) -> Rc<SessionRegistry> {
        self.registry.clone()
    }

    pub fn controller(&self) -> Rc<ConversationController> {
        self.controller.clone()
    }

    /// Create a session titled with the configured default title.
    pub async fn new_session(&self, user_id: &str) -> Result<Session> {
        self.registry
            .create(user_id, &self.config.default_session_title)
            .await
    }

    /// Make `session_id` the active conversation by loading its history.
    pub async fn open_session(&self, session_id: &str) -> Result<Vec<Message>> {
        self.controller.load_history(session_id).await
    }

    /// Delete a session and drop its message buffer.
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.registry.delete(session_id).await?;
        if !self.controller.forget(session_id) {
            log::info!(
                "Session {} deleted mid-exchange; buffer is dropped once the exchange finishes",
                session_id
            );
        }
        Ok(())
    }
}
