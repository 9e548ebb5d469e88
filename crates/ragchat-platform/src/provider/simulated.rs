//! Simulated response provider.
//!
//! Canned replies chosen by keywords in the last user message, plus fixed
//! context snippets. Deterministic apart from an optional thinking delay,
//! which only applies in the browser.

use std::cell::Cell;

use async_trait::async_trait;
use serde_json::json;

use ragchat_core::ports::ResponseProvider;
use ragchat_types::{
    ChatError, Result,
    message::{ContextSnippet, Message, Reply},
};

pub struct SimulatedProvider {
    delay_ms: u32,
    replies: Cell<u64>,
}

impl SimulatedProvider {
    pub fn new(delay_ms: u32) -> Self {
        Self {
            delay_ms,
            replies: Cell::new(0),
        }
    }

    async fn think(&self) {
        if self.delay_ms == 0 {
            return;
        }
        #[cfg(target_arch = "wasm32")]
        gloo_timers::future::TimeoutFuture::new(self.delay_ms).await;
        #[cfg(not(target_arch = "wasm32"))]
        log::debug!("Thinking delay of {}ms skipped outside the browser", self.delay_ms);
    }
}

impl Default for SimulatedProvider {
    fn default() -> Self {
        Self::new(0)
    }
}

#[async_trait(?Send)]
impl ResponseProvider for SimulatedProvider {
    async fn generate(&self, history: &[Message], include_context: bool) -> Result<Reply> {
        let query = history
            .iter()
            .rev()
            .find(|m| !m.is_system())
            .map(|m| m.content.as_str())
            .ok_or_else(|| ChatError::Provider("Cannot reply to an empty conversation".to_string()))?;

        self.think().await;

        let seq = self.replies.get() + 1;
        self.replies.set(seq);

        Ok(Reply {
            content: canned_reply(query),
            context: include_context.then(|| canned_context(query, seq)),
        })
    }

    fn provider_name(&self) -> &str {
        "simulated"
    }
}

pub(crate) fn canned_reply(query: &str) -> String {
    let lower = query.to_lowercase();

    if lower.contains("hello") || lower.contains("hi") {
        return "Hello! I'm a simulated assistant. I'm here to help you try out the RAG chat client. How can I assist you today?".to_string();
    }
    if lower.contains("what") && lower.contains("ai") {
        return "Artificial Intelligence (AI) refers to the simulation of human intelligence in machines that are programmed to think and learn. AI systems can perform tasks such as visual perception, speech recognition, decision-making, and language translation.".to_string();
    }
    if lower.contains("rag") {
        return "RAG (Retrieval-Augmented Generation) enhances AI responses by retrieving relevant information from a knowledge base before generating an answer. This client stores chat histories together with that retrieval context.".to_string();
    }
    if lower.contains("test") {
        return "This is a simulated response for testing purposes. Your message and this reply were both stored, along with simulated RAG context.".to_string();
    }

    format!(
        "I understand you're asking about \"{}\". This is a simulated response; configure a remote provider to get real answers.",
        query
    )
}

pub(crate) fn canned_context(query: &str, seq: u64) -> Vec<ContextSnippet> {
    let excerpt: String = query.chars().take(50).collect();
    vec![
        ContextSnippet::new(
            format!("doc-{}-1", seq),
            format!(
                "Retrieved context for query: \"{}...\". This simulates information retrieved from a knowledge base.",
                excerpt
            ),
        )
        .with_metadata("source", "Simulated Knowledge Base")
        .with_metadata("document", "test_document.pdf")
        .with_metadata("page", (seq % 100) + 1)
        .with_metadata("confidence", 0.92)
        .with_metadata("relevanceScore", 0.90),
        ContextSnippet::new(
            format!("doc-{}-2", seq),
            "Additional context: a second piece of retrieved information, showing multi-source context storage.",
        )
        .with_metadata("source", "Simulated Database")
        .with_metadata("document", "reference_guide.txt")
        .with_metadata("confidence", 0.83)
        .with_metadata("relevanceScore", 0.75)
        .with_metadata("origin", json!({ "kind": "database", "table": "documents" })),
    ]
}
