pub mod ports;
pub mod event_bus;
pub mod registry;
pub mod conversation;

#[cfg(test)]
mod tests;

pub use conversation::{ConversationController, SubmitOutcome};
pub use event_bus::EventBus;
pub use registry::SessionRegistry;
