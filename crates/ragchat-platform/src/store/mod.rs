pub mod http;
pub mod memory;

pub use http::HttpStore;
pub use memory::MemoryStore;

use std::rc::Rc;

use ragchat_core::ports::RemoteStore;
use ragchat_types::config::{StoreBackend, StoreConfig};

/// Build the store selected by configuration.
/// Returns a trait object so callers are backend-agnostic.
pub fn build_store(config: &StoreConfig) -> Rc<dyn RemoteStore> {
    match config.backend {
        StoreBackend::Memory => {
            log::info!("Store backend: memory");
            Rc::new(MemoryStore::new())
        }
        StoreBackend::Http => {
            log::info!("Store backend: http ({})", config.base_url);
            Rc::new(HttpStore::new(config))
        }
    }
}
