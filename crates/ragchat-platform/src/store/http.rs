//! REST client for the chat-storage service.
//!
//! Uses browser `fetch()` via gloo-net for WASM compatibility.
//! Every request carries the `X-API-KEY` header.

use async_trait::async_trait;
use gloo_net::http::{Request, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use ragchat_core::ports::RemoteStore;
use ragchat_types::{
    ChatError, Result,
    config::StoreConfig,
    message::{Message, MessagePage, NewMessage},
    session::Session,
};

const API_PREFIX: &str = "/api/v1/sessions";

pub struct HttpStore {
    base_url: String,
    api_key: String,
}

impl HttpStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    pub(crate) fn sessions_url(&self) -> String {
        format!("{}{}", self.base_url, API_PREFIX)
    }

    pub(crate) fn session_url(&self, session_id: &str, suffix: &str) -> String {
        format!("{}{}/{}{}", self.base_url, API_PREFIX, session_id, suffix)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("X-API-KEY", &self.api_key)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: Request) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;
        let response = check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| ChatError::Serialization(e.to_string()))
    }

    fn with_body<B: Serialize>(&self, builder: RequestBuilder, body: &B) -> Result<Request> {
        self.authorized(builder)
            .json(body)
            .map_err(|e| ChatError::Serialization(e.to_string()))
    }
}

#[async_trait(?Send)]
impl RemoteStore for HttpStore {
    async fn list_sessions(&self, user_id: &str, favorite: Option<bool>) -> Result<Vec<Session>> {
        let mut params = vec![("userId", user_id.to_string())];
        if let Some(f) = favorite {
            params.push(("favorite", f.to_string()));
        }
        let request = self
            .authorized(Request::get(&self.sessions_url()).query(params))
            .build()
            .map_err(|e| ChatError::Network(e.to_string()))?;
        self.send_json(request).await
    }

    async fn create_session(&self, user_id: &str, title: &str) -> Result<Session> {
        let body = CreateSessionBody { user_id, title };
        let request = self.with_body(Request::post(&self.sessions_url()), &body)?;
        self.send_json(request).await
    }

    async fn rename_session(&self, session_id: &str, title: &str) -> Result<Session> {
        let url = self.session_url(session_id, "/rename");
        let request = self.with_body(Request::patch(&url), &RenameBody { title })?;
        self.send_json(request).await
    }

    async fn set_favorite(&self, session_id: &str, favorite: bool) -> Result<Session> {
        let url = self.session_url(session_id, "/favorite");
        let request = self.with_body(Request::patch(&url), &FavoriteBody { favorite })?;
        self.send_json(request).await
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        let url = self.session_url(session_id, "");
        let response = self
            .authorized(Request::delete(&url))
            .send()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;
        check_status(response).await?;
        Ok(())
    }

    async fn list_messages(&self, session_id: &str, page: u32, size: u32) -> Result<MessagePage> {
        let url = self.session_url(session_id, "/messages");
        let params = [("page", page.to_string()), ("size", size.to_string())];
        let request = self
            .authorized(Request::get(&url).query(params))
            .build()
            .map_err(|e| ChatError::Network(e.to_string()))?;
        self.send_json(request).await
    }

    async fn append_message(&self, session_id: &str, message: NewMessage) -> Result<Message> {
        let url = self.session_url(session_id, "/messages");
        let request = self.with_body(Request::post(&url), &message)?;
        self.send_json(request).await
    }

    fn backend_name(&self) -> &str {
        "http"
    }
}

// ─── Request bodies ──────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionBody<'a> {
    user_id: &'a str,
    title: &'a str,
}

#[derive(Serialize)]
struct RenameBody<'a> {
    title: &'a str,
}

#[derive(Serialize)]
struct FavoriteBody {
    favorite: bool,
}

/// Error body returned by the service on non-2xx responses
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

// ─── Status handling ─────────────────────────────────────────

async fn check_status(response: Response) -> Result<Response> {
    if response.ok() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let err = status_error(status, &body);
    log::warn!("chat-storage request to {} failed: {}", response.url(), err);
    Err(err)
}

/// Map a failed response to an error, preferring the service's own message.
pub(crate) fn status_error(status: u16, body: &str) -> ChatError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message.or(b.error))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                "request failed".to_string()
            } else {
                body.trim().to_string()
            }
        });

    match status {
        404 => ChatError::NotFound(message),
        _ => ChatError::Http { status, message },
    }
}
