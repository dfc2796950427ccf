use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::AiConfig;
use crate::error::{AppError, AppResult};

/// One message on the wire. `content` is either a plain string or an array
/// of content parts (text / image_url), matching the chat-completions shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: String,
    pub content: serde_json::Value,
}

impl WireMessage {
    pub fn text(role: &str, text: impl Into<String>) -> Self {
        WireMessage {
            role: role.to_string(),
            content: serde_json::Value::String(text.into()),
        }
    }

    pub fn parts(role: &str, parts: serde_json::Value) -> Self {
        WireMessage {
            role: role.to_string(),
            content: parts,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Constrain the reply to a single JSON object (classifier calls).
    pub json_object: bool,
}

pub type CompleteFuture<'a> = Pin<Box<dyn Future<Output = AppResult<String>> + Send + 'a>>;

/// Chat-completion endpoint seam. The HTTP client below is the production
/// implementation; tests drive the orchestrator with scripted fakes.
pub trait ChatCompleter: Send + Sync {
    fn complete(&self, request: CompletionRequest) -> CompleteFuture<'_>;
}

#[derive(Clone)]
pub struct HttpChatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpChatClient {
    pub fn new(http: reqwest::Client, config: &AiConfig) -> Self {
        HttpChatClient {
            http,
            base_url: config.chat_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    async fn complete_inner(&self, request: CompletionRequest) -> AppResult<String> {
        let mut body = json!({
            "model": request.model,
            "messages": request.messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });
        if request.json_object {
            body["response_format"] = json!({ "type": "json_object" });
        }

        let url = format!("{}/chat/completions", self.base_url);
        let mut req = self.http.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Chat request failed: {e}")))?;

        let status = response.status();
        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Chat response was not JSON: {e}")))?;

        if !status.is_success() {
            let message = payload
                .pointer("/error/message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error");
            return Err(AppError::Upstream(format!(
                "Chat endpoint returned {status}: {message}"
            )));
        }

        payload
            .pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| AppError::Upstream("Chat response had no completion text".into()))
    }
}

impl ChatCompleter for HttpChatClient {
    fn complete(&self, request: CompletionRequest) -> CompleteFuture<'_> {
        Box::pin(self.complete_inner(request))
    }
}
