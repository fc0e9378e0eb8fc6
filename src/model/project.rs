//! Story project model.
//!
//! A project is one story moving through the four-phase workflow. Phase
//! content lives alongside it as versioned JSON documents.

use serde::{Deserialize, Serialize};

use super::phase::Phase;

/// A story project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryProject {
    /// Unique identifier (`proj_` + 12 uuid chars)
    pub id: String,

    /// User who owns the project (the resolved actor)
    pub owner: String,

    /// Working title
    pub title: String,

    /// Optional genre, passed to generation
    pub genre: Option<String>,

    /// Furthest phase the project has been advanced to
    pub current_phase: Phase,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl StoryProject {
    /// Create a new project at the summary phase.
    pub fn new(owner: &str, title: String) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        let id = format!("proj_{}", &uuid::Uuid::new_v4().to_string()[..12]);

        Self {
            id,
            owner: owner.to_string(),
            title,
            genre: None,
            current_phase: Phase::Summary,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the genre.
    #[must_use]
    pub fn with_genre(mut self, genre: &str) -> Self {
        self.genre = Some(genre.to_string());
        self
    }

    /// Whether the workflow has reached `phase`.
    #[must_use]
    pub fn has_reached(&self, phase: Phase) -> bool {
        phase <= self.current_phase
    }
}

/// Versioned content of one phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseContent {
    pub project_id: String,
    pub phase: Phase,
    /// The phase document (free-form JSON)
    pub content: serde_json::Value,
    /// Starts at 1; incremented on every committed write
    pub revision: i64,
    /// SHA-256 of the serialized content
    pub content_hash: String,
    pub updated_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_project() {
        let project = StoryProject::new("alice", "The Lighthouse".to_string()).with_genre("thriller");

        assert!(project.id.starts_with("proj_"));
        assert_eq!(project.id.len(), 17);
        assert_eq!(project.owner, "alice");
        assert_eq!(project.genre.as_deref(), Some("thriller"));
        assert_eq!(project.current_phase, Phase::Summary);
    }

    #[test]
    fn test_has_reached() {
        let mut project = StoryProject::new("alice", "Test".to_string());
        assert!(project.has_reached(Phase::Summary));
        assert!(!project.has_reached(Phase::Scenes));

        project.current_phase = Phase::Beats;
        assert!(project.has_reached(Phase::Scenes));
        assert!(!project.has_reached(Phase::Export));
    }
}
