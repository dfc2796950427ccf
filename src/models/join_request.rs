use serde::{Deserialize, Serialize};

/// A pending request from a professional to join a project's team.
/// Status transitions: pending -> accepted | rejected, nothing else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    pub id: String,
    pub project_id: String,
    pub professional_id: String,
    pub message: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitJoinRequest {
    pub project_id: String,
    pub message: Option<String>,
}

pub const JOIN_PENDING: &str = "pending";
pub const JOIN_ACCEPTED: &str = "accepted";
pub const JOIN_REJECTED: &str = "rejected";
