//! OpenAI-compatible response provider.
//!
//! Works with Groq, OpenAI, and any provider using the OpenAI chat
//! completions API format.
//! Uses browser `fetch()` via gloo-net for WASM compatibility.

use async_trait::async_trait;
use gloo_net::http::Request;
use serde::Deserialize;
use serde_json::{Value, json};

use ragchat_core::ports::ResponseProvider;
use ragchat_types::{
    ChatError, Result,
    config::ProviderConfig,
    message::{ContextSnippet, Message, Reply, Sender},
};

/// Provider that speaks the OpenAI chat completions protocol.
pub struct OpenAiCompatProvider {
    config: ProviderConfig,
    base_url: String,
}

impl OpenAiCompatProvider {
    pub fn new(config: ProviderConfig) -> Self {
        let base_url = config.base_url().trim_end_matches('/').to_string();
        Self { config, base_url }
    }

    pub(crate) fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    /// System prompt first, then the conversation. SYSTEM turns from the
    /// store never reach the model.
    pub(crate) fn build_request_body(&self, history: &[Message]) -> Value {
        let mut messages = Vec::with_capacity(history.len() + 1);
        if !self.config.system_prompt.is_empty() {
            messages.push(json!({
                "role": "system",
                "content": self.config.system_prompt,
            }));
        }
        messages.extend(history.iter().filter(|m| !m.is_system()).map(message_to_json));

        json!({
            "model": self.config.model,
            "messages": messages,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
        })
    }

    pub(crate) fn context_for(&self, history: &[Message]) -> Vec<ContextSnippet> {
        let query: String = history
            .iter()
            .rev()
            .find(|m| m.sender == Sender::User)
            .map(|m| m.content.chars().take(50).collect())
            .unwrap_or_default();
        let seq = history.len();

        vec![ContextSnippet::new(
            format!("doc-{}", seq),
            format!("Context retrieved for: \"{}...\"", query),
        )
        .with_metadata("source", "Knowledge Base")
        .with_metadata("model", self.config.model.clone())
        .with_metadata("provider", self.config.remote.label())]
    }
}

#[async_trait(?Send)]
impl ResponseProvider for OpenAiCompatProvider {
    async fn generate(&self, history: &[Message], include_context: bool) -> Result<Reply> {
        if self.config.api_key.trim().is_empty() {
            return Err(ChatError::Provider(format!(
                "{} API key not configured",
                self.config.remote.label()
            )));
        }

        let body = self.build_request_body(history);
        let response = Request::post(&self.completions_url())
            .header("Content-Type", "application/json")
            .header("Authorization", &format!("Bearer {}", self.config.api_key))
            .json(&body)
            .map_err(|e| ChatError::Serialization(e.to_string()))?
            .send()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;

        if !response.ok() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(api_error(status, &text));
        }

        let data: ApiResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Provider(e.to_string()))?;
        let content = reply_content(data)?;

        Ok(Reply {
            content,
            context: include_context.then(|| self.context_for(history)),
        })
    }

    fn provider_name(&self) -> &str {
        self.config.remote.label()
    }
}

// ─── API response types ──────────────────────────────────────

#[derive(Deserialize)]
pub(crate) struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ─── Serialization helpers ───────────────────────────────────

fn message_to_json(msg: &Message) -> Value {
    let role = match msg.sender {
        Sender::User => "user",
        Sender::Assistant | Sender::System => "assistant",
    };
    json!({
        "role": role,
        "content": msg.content,
    })
}

/// First choice's text; anything else is unusable.
pub(crate) fn reply_content(data: ApiResponse) -> Result<String> {
    let choice = data
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ChatError::Provider("No choices in response".to_string()))?;
    match choice.message.content {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(ChatError::Provider("Model returned an empty reply".to_string())),
    }
}

pub(crate) fn api_error(status: u16, body: &str) -> ChatError {
    let detail = serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| format!("API error: {}", status));
    ChatError::Provider(format!("HTTP {}: {}", status, detail))
}
