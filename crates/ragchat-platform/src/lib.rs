//! Adapters for the ragchat-core ports.
//!
//! Stores: in-memory and the REST chat-storage service (browser `fetch`).
//! Providers: a deterministic simulator and any OpenAI-compatible endpoint.

pub mod provider;
pub mod store;
