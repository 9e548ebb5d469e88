use serde::{Deserialize, Serialize};

use crate::session::PageRequest;
use crate::{ChatError, Result};

/// Top-level client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub store: StoreConfig,
    pub provider: ProviderConfig,
    /// Page loaded by `load_history`
    pub history: PageRequest,
    /// Ask the provider for RAG context snippets
    pub include_context: bool,
    pub default_session_title: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            provider: ProviderConfig::default(),
            history: PageRequest::default(),
            include_context: true,
            default_session_title: "New Chat".to_string(),
        }
    }
}

impl ChatConfig {
    /// Parse a serialized config and check it for obvious mistakes.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let config: ChatConfig = serde_json::from_slice(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.history.size == 0 {
            return Err(ChatError::Config("history.size must be at least 1".to_string()));
        }
        if self.store.backend == StoreBackend::Http && self.store.base_url.trim().is_empty() {
            return Err(ChatError::Config("store.base_url is required for the HTTP store".to_string()));
        }
        if self.provider.kind == ProviderKind::Remote && self.provider.base_url().is_empty() {
            return Err(ChatError::Config(
                "provider.api_base is required for a custom remote model".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub base_url: String,
    /// Sent as `X-API-KEY`
    pub api_key: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            base_url: "http://localhost:8080".to_string(),
            api_key: "changeme".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreBackend {
    /// In-process store, lost on reload
    Memory,
    /// REST chat-storage service
    Http,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub remote: RemoteModel,
    pub model: String,
    pub api_key: String,
    pub api_base: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub system_prompt: String,
    /// Artificial latency of the simulated provider, 0 disables it
    pub thinking_delay_ms: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Simulated,
            remote: RemoteModel::Groq,
            model: "llama-3.3-70b-versatile".to_string(),
            api_key: String::new(),
            api_base: None,
            max_tokens: 1000,
            temperature: 0.7,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            thinking_delay_ms: 0,
        }
    }
}

impl ProviderConfig {
    /// Explicit `api_base` wins over the model vendor's default.
    pub fn base_url(&self) -> String {
        self.api_base
            .clone()
            .unwrap_or_else(|| self.remote.default_base_url().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderKind {
    Simulated,
    Remote,
}

/// Vendors reachable through the OpenAI chat-completions protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteModel {
    Groq,
    OpenAI,
    Custom,
}

impl RemoteModel {
    pub fn default_base_url(&self) -> &str {
        match self {
            RemoteModel::Groq => "https://api.groq.com/openai",
            RemoteModel::OpenAI => "https://api.openai.com",
            RemoteModel::Custom => "",
        }
    }

    pub fn label(&self) -> &str {
        match self {
            RemoteModel::Groq => "Groq",
            RemoteModel::OpenAI => "OpenAI",
            RemoteModel::Custom => "Custom",
        }
    }
}

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant. Provide clear, concise, and accurate responses.";
