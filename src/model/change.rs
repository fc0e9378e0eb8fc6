//! Living Story change records.
//!
//! Every edit that ripples into a downstream phase produces one record per
//! affected phase. Records are appended to the `story_changes` log and only
//! their status moves, from `pending` to exactly one terminal state.

use serde::{Deserialize, Serialize};

use super::phase::Phase;

/// Lifecycle of a proposed downstream update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    /// Waiting for approval.
    Pending,
    /// Proposed content was written to the target phase.
    Applied,
    /// Discarded by the user.
    Rejected,
    /// A newer upstream edit or a target edit made this proposal obsolete.
    Superseded,
    /// Regeneration failed; no proposal exists.
    Failed,
}

impl ChangeStatus {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Applied => "applied",
            Self::Rejected => "rejected",
            Self::Superseded => "superseded",
            Self::Failed => "failed",
        }
    }

    /// Parse from the stored string.
    #[must_use]
    pub fn from_db(s: &str) -> Self {
        match s {
            "applied" => Self::Applied,
            "rejected" => Self::Rejected,
            "superseded" => Self::Superseded,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }

    /// Terminal states never change again.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// How a single JSON location differs between two versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

impl ChangeKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Modified => "modified",
        }
    }
}

/// One difference found by the deep compare.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    /// Location, e.g. `scenes[2].title`; `$` is the document root.
    pub path: String,
    pub kind: ChangeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new: Option<serde_json::Value>,
}

/// How much an edit is likely to disturb downstream phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Minor,
    Major,
}

impl Impact {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Minor => "minor",
            Self::Major => "major",
        }
    }

    #[must_use]
    pub fn from_db(s: &str) -> Self {
        if s == "major" { Self::Major } else { Self::Minor }
    }
}

/// A proposed (or failed) regeneration of one downstream phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Unique identifier (`chg_` + 12 uuid chars)
    pub id: String,
    pub project_id: String,
    /// Phase whose edit triggered this record
    pub source_phase: Phase,
    /// Phase the proposal would overwrite
    pub target_phase: Phase,
    /// Revision of the source phase after the edit
    pub source_revision: i64,
    /// Target revision the proposal was computed against (0 = no content)
    pub base_revision: i64,
    pub field_changes: Vec<FieldChange>,
    pub impact: Impact,
    pub proposed_content: Option<serde_json::Value>,
    pub status: ChangeStatus,
    pub error: Option<String>,
    /// `phase@rN` of the edit that made this proposal obsolete
    pub superseded_by: Option<String>,
    pub actor: String,
    pub created_at: i64,
    pub decided_at: Option<i64>,
}

impl ChangeRecord {
    /// Create a new pending record.
    #[must_use]
    pub fn new(
        project_id: &str,
        source_phase: Phase,
        target_phase: Phase,
        source_revision: i64,
        base_revision: i64,
        actor: &str,
    ) -> Self {
        Self {
            id: format!("chg_{}", &uuid::Uuid::new_v4().to_string()[..12]),
            project_id: project_id.to_string(),
            source_phase,
            target_phase,
            source_revision,
            base_revision,
            field_changes: Vec::new(),
            impact: Impact::Minor,
            proposed_content: None,
            status: ChangeStatus::Pending,
            error: None,
            superseded_by: None,
            actor: actor.to_string(),
            created_at: chrono::Utc::now().timestamp_millis(),
            decided_at: None,
        }
    }

    /// Attach the diff that triggered this record.
    #[must_use]
    pub fn with_changes(mut self, changes: Vec<FieldChange>, impact: Impact) -> Self {
        self.field_changes = changes;
        self.impact = impact;
        self
    }

    /// Attach regenerated content.
    #[must_use]
    pub fn with_proposal(mut self, content: serde_json::Value) -> Self {
        self.proposed_content = Some(content);
        self
    }

    /// Mark as failed with the provider's error text.
    #[must_use]
    pub fn failed(mut self, error: &str) -> Self {
        self.status = ChangeStatus::Failed;
        self.error = Some(error.to_string());
        self.decided_at = Some(self.created_at);
        self
    }
}
