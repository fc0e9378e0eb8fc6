//! Audit event storage and retrieval.
//!
//! Every mutation records one or more events in the same transaction.

use rusqlite::{Connection, Result};
use serde::Serialize;

/// Event types for audit logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    // Project events
    ProjectCreated,
    ProjectAdvanced,
    ProjectDeleted,

    // Phase events
    PhaseUpdated,

    // Living Story events
    ChangeProposed,
    ChangeFailed,
    ChangeApplied,
    ChangeRejected,
    ChangeSuperseded,

    // Bible and transcript events
    DocumentAdded,
    DocumentRemoved,
    TranscriptAdded,

    // Account events
    SubscriptionChanged,
    UsageRecorded,

    ExportWritten,
}

impl EventType {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ProjectCreated => "project_created",
            Self::ProjectAdvanced => "project_advanced",
            Self::ProjectDeleted => "project_deleted",
            Self::PhaseUpdated => "phase_updated",
            Self::ChangeProposed => "change_proposed",
            Self::ChangeFailed => "change_failed",
            Self::ChangeApplied => "change_applied",
            Self::ChangeRejected => "change_rejected",
            Self::ChangeSuperseded => "change_superseded",
            Self::DocumentAdded => "document_added",
            Self::DocumentRemoved => "document_removed",
            Self::TranscriptAdded => "transcript_added",
            Self::SubscriptionChanged => "subscription_changed",
            Self::UsageRecorded => "usage_recorded",
            Self::ExportWritten => "export_written",
        }
    }

    /// Parse a stored event type. Unknown values return `None`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "project_created" => Self::ProjectCreated,
            "project_advanced" => Self::ProjectAdvanced,
            "project_deleted" => Self::ProjectDeleted,
            "phase_updated" => Self::PhaseUpdated,
            "change_proposed" => Self::ChangeProposed,
            "change_failed" => Self::ChangeFailed,
            "change_applied" => Self::ChangeApplied,
            "change_rejected" => Self::ChangeRejected,
            "change_superseded" => Self::ChangeSuperseded,
            "document_added" => Self::DocumentAdded,
            "document_removed" => Self::DocumentRemoved,
            "transcript_added" => Self::TranscriptAdded,
            "subscription_changed" => Self::SubscriptionChanged,
            "usage_recorded" => Self::UsageRecorded,
            "export_written" => Self::ExportWritten,
            _ => return None,
        })
    }
}

/// An audit event record.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: i64,
    pub entity_type: String,
    pub entity_id: String,
    pub event_type: EventType,
    pub actor: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub comment: Option<String>,
    pub created_at: i64,
}

impl Event {
    /// Create a new event (id will be assigned by database).
    #[must_use]
    pub fn new(entity_type: &str, entity_id: &str, event_type: EventType, actor: &str) -> Self {
        Self {
            id: 0,
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            event_type,
            actor: actor.to_string(),
            old_value: None,
            new_value: None,
            comment: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Add old/new values for field change tracking.
    #[must_use]
    pub fn with_values(mut self, old: Option<String>, new: Option<String>) -> Self {
        self.old_value = old;
        self.new_value = new;
        self
    }

    /// Add a comment to the event.
    #[must_use]
    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }
}

/// Insert an event into the database.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_event(conn: &Connection, event: &Event) -> Result<i64> {
    conn.execute(
        "INSERT INTO events (entity_type, entity_id, event_type, actor, old_value, new_value, comment, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            event.entity_type,
            event.entity_id,
            event.event_type.as_str(),
            event.actor,
            event.old_value,
            event.new_value,
            event.comment,
            event.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Get events for an entity, newest first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_events(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
    limit: Option<u32>,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT id, entity_type, entity_id, event_type, actor, old_value, new_value, comment, created_at
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY created_at DESC, id DESC
         LIMIT ?3",
    )?;
    let rows = stmt.query_map(
        rusqlite::params![entity_type, entity_id, limit.unwrap_or(100)],
        map_event_row,
    )?;
    rows.filter_map(Result::transpose).collect()
}

/// Get the most recent events across all entities.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_recent_events(conn: &Connection, limit: Option<u32>) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT id, entity_type, entity_id, event_type, actor, old_value, new_value, comment, created_at
         FROM events
         ORDER BY created_at DESC, id DESC
         LIMIT ?1",
    )?;
    let rows = stmt.query_map([limit.unwrap_or(50)], map_event_row)?;
    rows.filter_map(Result::transpose).collect()
}

/// Map a row to an event; rows with an unrecognised type are skipped.
fn map_event_row(row: &rusqlite::Row) -> Result<Option<Event>> {
    let Some(event_type) = EventType::parse(row.get::<_, String>(3)?.as_str()) else {
        return Ok(None);
    };
    Ok(Some(Event {
        id: row.get(0)?,
        entity_type: row.get(1)?,
        entity_id: row.get(2)?,
        event_type,
        actor: row.get(4)?,
        old_value: row.get(5)?,
        new_value: row.get(6)?,
        comment: row.get(7)?,
        created_at: row.get(8)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::apply_schema;

    #[test]
    fn test_event_insert_and_get() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        let event = Event::new("change", "chg_123", EventType::ChangeProposed, "test-actor")
            .with_comment("summary -> scenes");

        let id = insert_event(&conn, &event).unwrap();
        assert!(id > 0);

        let events = get_events(&conn, "change", "chg_123", Some(10)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].actor, "test-actor");
        assert_eq!(events[0].event_type, EventType::ChangeProposed);
        assert_eq!(events[0].comment, Some("summary -> scenes".to_string()));
    }

    #[test]
    fn test_unknown_event_types_are_skipped() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO events (entity_type, entity_id, event_type, actor, created_at)
             VALUES ('project', 'p1', 'legacy_thing', 'x', 1)",
            [],
        )
        .unwrap();
        insert_event(&conn, &Event::new("project", "p1", EventType::ProjectCreated, "x")).unwrap();

        let events = get_recent_events(&conn, None).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::ProjectCreated);
    }
}
