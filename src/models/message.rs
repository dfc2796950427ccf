use serde::{Deserialize, Serialize};

use crate::error::AppResult;

/// One part of a message body. Messages are stored as an ordered list of
/// parts so a single turn can carry text alongside image references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatContent {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

impl ChatContent {
    pub fn text(text: impl Into<String>) -> Self {
        ChatContent::Text { text: text.into() }
    }

    pub fn image(url: impl Into<String>) -> Self {
        ChatContent::ImageUrl {
            image_url: ImageUrl { url: url.into() },
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ChatContent::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn image_url(&self) -> Option<&str> {
        match self {
            ChatContent::ImageUrl { image_url } => Some(image_url.url.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub chat_id: String,
    pub role: String,
    pub content_json: String,
    pub created_at: String,
}

impl ChatMessage {
    pub fn new(chat_id: &str, role: &str, parts: &[ChatContent]) -> Self {
        ChatMessage {
            id: uuid::Uuid::new_v4().to_string(),
            chat_id: chat_id.to_string(),
            role: role.to_string(),
            content_json: serde_json::to_string(parts).unwrap_or_else(|_| "[]".into()),
            created_at: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    pub fn parts(&self) -> AppResult<Vec<ChatContent>> {
        Ok(serde_json::from_str(&self.content_json)?)
    }

    /// Joined text of all text parts. Empty string if the message is
    /// image-only or the body fails to parse.
    pub fn text(&self) -> String {
        self.parts()
            .unwrap_or_default()
            .iter()
            .filter_map(|p| p.as_text())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Last image URL in the message body, if any.
    pub fn last_image_url(&self) -> Option<String> {
        self.parts()
            .ok()?
            .iter()
            .rev()
            .find_map(|p| p.image_url().map(str::to_string))
    }
}

pub const ROLE_SYSTEM: &str = "system";
pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";
