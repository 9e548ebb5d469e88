pub mod openai_compat;
pub mod simulated;

pub use openai_compat::OpenAiCompatProvider;
pub use simulated::SimulatedProvider;

use std::rc::Rc;

use ragchat_core::ports::ResponseProvider;
use ragchat_types::config::{ProviderConfig, ProviderKind};

/// Build the response provider selected by configuration.
pub fn build_provider(config: &ProviderConfig) -> Rc<dyn ResponseProvider> {
    match config.kind {
        ProviderKind::Simulated => {
            log::info!("Response provider: simulated");
            Rc::new(SimulatedProvider::new(config.thinking_delay_ms))
        }
        ProviderKind::Remote => {
            log::info!(
                "Response provider: {} ({})",
                config.remote.label(),
                config.model
            );
            if config.api_key.is_empty() {
                log::warn!("No API key configured for {}; replies will fail", config.remote.label());
            }
            Rc::new(OpenAiCompatProvider::new(config.clone()))
        }
    }
}
