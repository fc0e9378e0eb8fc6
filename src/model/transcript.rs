//! Transcript model.

use serde::{Deserialize, Serialize};

/// A plain-text transcript attached to a project (interviews, table reads,
/// recorded pitch sessions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    /// Unique identifier (`tr_` + 12 uuid chars)
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub body: String,
    pub created_at: i64,
}

impl Transcript {
    pub fn new(project_id: &str, title: &str, body: &str) -> Self {
        Self {
            id: format!("tr_{}", &uuid::Uuid::new_v4().to_string()[..12]),
            project_id: project_id.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}
