use serde::{Deserialize, Serialize};

/// A design-chat session, optionally linked to a project. All of its
/// images live under the chat's own storage namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub user_id: String,
    pub project_id: Option<String>,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChatRequest {
    pub project_id: Option<String>,
    #[serde(default = "default_title")]
    pub title: String,
}

fn default_title() -> String {
    "New design chat".into()
}
