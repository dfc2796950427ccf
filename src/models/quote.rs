use serde::{Deserialize, Serialize};

/// An offer record tagging a project with a needed professional role and a
/// price range. A project holds at most one quote per tag; submitting for a
/// (project_id, tag) pair that already exists updates the record in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub id: String,
    pub project_id: String,
    pub tag: String,
    pub price_min: i64,
    pub price_max: i64,
    pub note: Option<String>,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitQuoteRequest {
    pub project_id: String,
    pub tag: String,
    pub price_min: i64,
    pub price_max: i64,
    pub note: Option<String>,
}
