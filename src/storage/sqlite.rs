//! SQLite storage implementation.
//!
//! All writes go through [`SqliteStorage::mutate`], which wraps the work in
//! an IMMEDIATE transaction and writes the audit events collected in the
//! [`MutationContext`] before committing.

use crate::error::{Error, Result};
use crate::model::{
    BibleDocument, BibleRule, ChangeRecord, ChangeStatus, Feature, Impact, Phase, PhaseContent,
    RuleCategory, RuleKind, StoryProject, Subscription, Tier, Transcript,
};
use crate::storage::events::{get_events, get_recent_events, insert_event, Event, EventType};
use crate::storage::schema::apply_schema;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Transaction};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

/// Context for a mutation operation.
///
/// Passed to mutation closures so they can record audit events that are
/// written in the same transaction.
pub struct MutationContext {
    /// Name of the operation being performed.
    pub op_name: String,
    /// Actor performing the operation.
    pub actor: String,
    /// Events to write at the end of the transaction.
    pub events: Vec<Event>,
}

impl MutationContext {
    /// Create a new mutation context.
    #[must_use]
    pub fn new(op_name: &str, actor: &str) -> Self {
        Self {
            op_name: op_name.to_string(),
            actor: actor.to_string(),
            events: Vec::new(),
        }
    }

    /// Record an event for this operation.
    pub fn record_event(&mut self, entity_type: &str, entity_id: &str, event_type: EventType) {
        self.events
            .push(Event::new(entity_type, entity_id, event_type, &self.actor));
    }

    /// Record an event with old/new values for field tracking.
    pub fn record_change(
        &mut self,
        entity_type: &str,
        entity_id: &str,
        event_type: EventType,
        old_value: Option<String>,
        new_value: Option<String>,
    ) {
        self.events.push(
            Event::new(entity_type, entity_id, event_type, &self.actor)
                .with_values(old_value, new_value),
        );
    }

    /// Record an event with a free-form comment.
    pub fn record_comment(
        &mut self,
        entity_type: &str,
        entity_id: &str,
        event_type: EventType,
        comment: &str,
    ) {
        self.events.push(
            Event::new(entity_type, entity_id, event_type, &self.actor).with_comment(comment),
        );
    }
}

/// A project row joined with its phase and change counts.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProjectSummary {
    pub project: StoryProject,
    pub phases_written: i64,
    pub pending_changes: i64,
}

/// Result of committing an edit to a phase.
#[derive(Debug, Clone)]
pub struct PhaseWrite {
    /// Content before the edit, if the phase had any.
    pub previous: Option<PhaseContent>,
    /// Revision after the edit.
    pub revision: i64,
    /// Pending changes made obsolete by this edit.
    pub superseded: Vec<String>,
}

/// Outcome of deciding a pending change.
#[derive(Debug, Clone)]
pub enum Decision {
    /// The change moved to its new status.
    Decided(ChangeRecord),
    /// The target moved since the proposal; the change was superseded instead.
    Stale {
        change: ChangeRecord,
        actual_revision: i64,
    },
}

/// Usage count for one feature in one period.
#[derive(Debug, Clone, serde::Serialize)]
pub struct UsageCount {
    pub feature: String,
    pub count: i64,
}

const PROJECT_COLUMNS: &str = "id, owner, title, genre, current_phase, created_at, updated_at";

const PHASE_COLUMNS: &str = "project_id, phase, content, revision, content_hash, updated_at";

const CHANGE_COLUMNS: &str = "id, project_id, source_phase, target_phase, source_revision, base_revision,
     field_changes, impact, proposed_content, status, error, superseded_by, actor, created_at, decided_at";

const RULE_COLUMNS: &str =
    "id, project_id, document_id, category, kind, text, term, limit_value, created_at";

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_millis(timeout_ms.unwrap_or(5000)))?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Execute a mutation with the transaction protocol.
    ///
    /// 1. Begins an IMMEDIATE transaction
    /// 2. Executes the mutation closure
    /// 3. Writes audit events
    /// 4. Commits (dropping the transaction on error rolls back)
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails.
    pub fn mutate<F, R>(&mut self, op: &str, actor: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction, &mut MutationContext) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let mut ctx = MutationContext::new(op, actor);
        let result = f(&tx, &mut ctx)?;

        for event in &ctx.events {
            insert_event(&tx, event)?;
        }

        tx.commit()?;
        Ok(result)
    }

    // ==================
    // Project Operations
    // ==================

    /// Create a new project.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn create_project(&mut self, project: &StoryProject, actor: &str) -> Result<()> {
        self.mutate("create_project", actor, |tx, ctx| {
            tx.execute(
                "INSERT INTO projects (id, owner, title, genre, current_phase, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    project.id,
                    project.owner,
                    project.title,
                    project.genre,
                    project.current_phase.as_str(),
                    project.created_at,
                    project.updated_at,
                ],
            )?;

            ctx.record_change(
                "project",
                &project.id,
                EventType::ProjectCreated,
                None,
                Some(project.title.clone()),
            );
            Ok(())
        })
    }

    /// Get a project by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_project(&self, id: &str) -> Result<Option<StoryProject>> {
        let project = self
            .conn
            .query_row(
                &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1"),
                [id],
                map_project_row,
            )
            .optional()?;
        Ok(project)
    }

    /// Get a project by ID, failing with `ProjectNotFound`.
    ///
    /// # Errors
    ///
    /// Returns `ProjectNotFound` if no such project exists.
    pub fn require_project(&self, id: &str) -> Result<StoryProject> {
        self.get_project(id)?
            .ok_or_else(|| Error::ProjectNotFound { id: id.to_string() })
    }

    /// List projects, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_projects(&self, owner: Option<&str>, limit: usize) -> Result<Vec<ProjectSummary>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PROJECT_COLUMNS}, phases_written, pending_changes
             FROM project_overview
             WHERE (?1 IS NULL OR owner = ?1)
             ORDER BY updated_at DESC
             LIMIT ?2"
        ))?;

        let projects = stmt
            .query_map(rusqlite::params![owner, limit], |row| {
                Ok(ProjectSummary {
                    project: map_project_row(row)?,
                    phases_written: row.get(7)?,
                    pending_changes: row.get(8)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(projects)
    }

    /// Count the projects owned by a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_projects(&self, owner: &str) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM projects WHERE owner = ?1",
            [owner],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Move a project to a new workflow phase.
    ///
    /// # Errors
    ///
    /// Returns `ProjectNotFound` if the project doesn't exist.
    pub fn set_current_phase(&mut self, id: &str, phase: Phase, actor: &str) -> Result<()> {
        self.mutate("set_current_phase", actor, |tx, ctx| {
            let old: Option<String> = tx
                .query_row(
                    "SELECT current_phase FROM projects WHERE id = ?1",
                    [id],
                    |row| row.get(0),
                )
                .optional()?;
            let old = old.ok_or_else(|| Error::ProjectNotFound { id: id.to_string() })?;

            tx.execute(
                "UPDATE projects SET current_phase = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![phase.as_str(), chrono::Utc::now().timestamp_millis(), id],
            )?;

            ctx.record_change(
                "project",
                id,
                EventType::ProjectAdvanced,
                Some(old),
                Some(phase.as_str().to_string()),
            );
            Ok(())
        })
    }

    /// Delete a project. Phases, changes, bible, and transcripts cascade.
    ///
    /// # Errors
    ///
    /// Returns `ProjectNotFound` if the project doesn't exist.
    pub fn delete_project(&mut self, id: &str, actor: &str) -> Result<()> {
        self.mutate("delete_project", actor, |tx, ctx| {
            let affected = tx.execute("DELETE FROM projects WHERE id = ?1", [id])?;
            if affected == 0 {
                return Err(Error::ProjectNotFound { id: id.to_string() });
            }

            ctx.record_event("project", id, EventType::ProjectDeleted);
            Ok(())
        })
    }

    // ================
    // Phase Operations
    // ================

    /// Get the stored content of one phase.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_phase_content(&self, project_id: &str, phase: Phase) -> Result<Option<PhaseContent>> {
        read_phase(&self.conn, project_id, phase)
    }

    /// All written phases of a project, in workflow order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_phase_content(&self, project_id: &str) -> Result<Vec<PhaseContent>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PHASE_COLUMNS} FROM phase_content WHERE project_id = ?1"
        ))?;
        let mut phases = stmt
            .query_map([project_id], map_phase_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        phases.sort_by_key(|p| p.phase);
        Ok(phases)
    }

    /// Commit an edit to a phase.
    ///
    /// In one transaction: compares `hash` with the stored hash (returning
    /// `None` when identical), writes the content with revision + 1, and
    /// supersedes every pending change that targets this phase or whose
    /// source is in `supersede_sources`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn commit_phase_edit(
        &mut self,
        project_id: &str,
        phase: Phase,
        content: &serde_json::Value,
        hash: &str,
        supersede_sources: &[Phase],
        actor: &str,
    ) -> Result<Option<PhaseWrite>> {
        self.mutate("commit_phase_edit", actor, |tx, ctx| {
            let previous = read_phase(tx, project_id, phase)?;
            if previous.as_ref().is_some_and(|p| p.content_hash == hash) {
                return Ok(None);
            }

            let revision = write_phase(tx, project_id, phase, content, hash)?;
            ctx.record_change(
                "phase",
                &phase_entity_id(project_id, phase),
                EventType::PhaseUpdated,
                previous.as_ref().map(|p| p.revision.to_string()),
                Some(revision.to_string()),
            );

            let marker = format!("{}@r{revision}", phase.as_str());
            let mut superseded = Vec::new();
            for change in pending_changes(tx, project_id)? {
                if change.target_phase == phase || supersede_sources.contains(&change.source_phase) {
                    supersede(tx, ctx, &change.id, &marker)?;
                    superseded.push(change.id);
                }
            }

            Ok(Some(PhaseWrite {
                previous,
                revision,
                superseded,
            }))
        })
    }

    // ====================
    // Change Log Operations
    // ====================

    /// Append change records to the log.
    ///
    /// A pending record whose source phase was edited again after the
    /// record's `source_revision` is stored as `superseded` instead, and
    /// the record is updated in place to match what was written.
    ///
    /// # Errors
    ///
    /// Returns an error if any insert fails; nothing is written in that case.
    pub fn insert_changes(&mut self, changes: &mut [ChangeRecord], actor: &str) -> Result<()> {
        self.mutate("insert_changes", actor, |tx, ctx| {
            for change in changes.iter_mut() {
                if !change.status.is_terminal() {
                    let current = read_phase(tx, &change.project_id, change.source_phase)?
                        .map_or(0, |p| p.revision);
                    if current > change.source_revision {
                        change.status = ChangeStatus::Superseded;
                        change.superseded_by = Some(format!("{}@r{current}", change.source_phase.as_str()));
                        change.decided_at = Some(chrono::Utc::now().timestamp_millis());
                    }
                }

                let field_changes = serde_json::to_string(&change.field_changes)?;
                let proposed = change
                    .proposed_content
                    .as_ref()
                    .map(serde_json::Value::to_string);

                tx.execute(
                    "INSERT INTO story_changes (id, project_id, source_phase, target_phase, source_revision,
                        base_revision, field_changes, impact, proposed_content, status, error, superseded_by,
                        actor, created_at, decided_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                    rusqlite::params![
                        change.id,
                        change.project_id,
                        change.source_phase.as_str(),
                        change.target_phase.as_str(),
                        change.source_revision,
                        change.base_revision,
                        field_changes,
                        change.impact.as_str(),
                        proposed,
                        change.status.as_str(),
                        change.error,
                        change.superseded_by,
                        change.actor,
                        change.created_at,
                        change.decided_at,
                    ],
                )?;

                let route = format!("{} -> {}", change.source_phase, change.target_phase);
                let event_type = match change.status {
                    ChangeStatus::Failed => EventType::ChangeFailed,
                    ChangeStatus::Superseded => EventType::ChangeSuperseded,
                    _ => EventType::ChangeProposed,
                };
                ctx.record_comment("change", &change.id, event_type, &route);
            }
            Ok(())
        })
    }

    /// Get a change record by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_change(&self, id: &str) -> Result<Option<ChangeRecord>> {
        read_change(&self.conn, id)
    }

    /// List change records for a project, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_changes(
        &self,
        project_id: &str,
        status: Option<ChangeStatus>,
        target: Option<Phase>,
        limit: usize,
    ) -> Result<Vec<ChangeRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CHANGE_COLUMNS} FROM story_changes
             WHERE project_id = ?1
               AND (?2 IS NULL OR status = ?2)
               AND (?3 IS NULL OR target_phase = ?3)
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?4"
        ))?;
        let changes = stmt
            .query_map(
                rusqlite::params![
                    project_id,
                    status.map(|s| s.as_str()),
                    target.map(|p| p.as_str()),
                    limit
                ],
                map_change_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(changes)
    }

    /// Apply a pending change to its target phase.
    ///
    /// If the target revision no longer matches the change's base revision,
    /// the change is superseded and `Decision::Stale` is returned.
    ///
    /// # Errors
    ///
    /// Returns `ChangeNotFound`, or `InvalidChangeStatus` if the change is
    /// not pending.
    pub fn apply_change(&mut self, id: &str, actor: &str) -> Result<Decision> {
        self.mutate("apply_change", actor, |tx, ctx| {
            let change = require_pending(tx, id)?;
            let current = read_phase(tx, &change.project_id, change.target_phase)?;
            let actual_revision = current.as_ref().map_or(0, |p| p.revision);

            if actual_revision != change.base_revision {
                let marker = format!("{}@r{actual_revision}", change.target_phase.as_str());
                supersede(tx, ctx, id, &marker)?;
                let change = read_change(tx, id)?.ok_or_else(|| Error::ChangeNotFound {
                    id: id.to_string(),
                })?;
                return Ok(Decision::Stale {
                    change,
                    actual_revision,
                });
            }

            let proposed = change.proposed_content.as_ref().ok_or_else(|| {
                Error::Other(format!("change {id} has no proposed content"))
            })?;
            let hash = crate::living::content_hash(proposed);
            if current.as_ref().is_none_or(|p| p.content_hash != hash) {
                let revision = write_phase(tx, &change.project_id, change.target_phase, proposed, &hash)?;
                ctx.record_change(
                    "phase",
                    &phase_entity_id(&change.project_id, change.target_phase),
                    EventType::PhaseUpdated,
                    Some(actual_revision.to_string()),
                    Some(revision.to_string()),
                );
            }

            decide(tx, ctx, id, ChangeStatus::Applied)?;
            let change = read_change(tx, id)?.ok_or_else(|| Error::ChangeNotFound {
                id: id.to_string(),
            })?;
            Ok(Decision::Decided(change))
        })
    }

    /// Reject a pending change.
    ///
    /// # Errors
    ///
    /// Returns `ChangeNotFound`, or `InvalidChangeStatus` if the change is
    /// not pending.
    pub fn reject_change(&mut self, id: &str, actor: &str) -> Result<ChangeRecord> {
        self.mutate("reject_change", actor, |tx, ctx| {
            require_pending(tx, id)?;
            decide(tx, ctx, id, ChangeStatus::Rejected)?;
            read_change(tx, id)?.ok_or_else(|| Error::ChangeNotFound { id: id.to_string() })
        })
    }

    // ================
    // Bible Operations
    // ================

    /// Store a bible document together with its extracted rules.
    ///
    /// # Errors
    ///
    /// Returns an error if any insert fails.
    pub fn add_bible_document(
        &mut self,
        document: &BibleDocument,
        rules: &[BibleRule],
        actor: &str,
    ) -> Result<()> {
        self.mutate("add_bible_document", actor, |tx, ctx| {
            tx.execute(
                "INSERT INTO bible_documents (id, project_id, title, body, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    document.id,
                    document.project_id,
                    document.title,
                    document.body,
                    document.created_at,
                ],
            )?;

            for rule in rules {
                tx.execute(
                    "INSERT INTO bible_rules (id, project_id, document_id, category, kind, text, term, limit_value, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    rusqlite::params![
                        rule.id,
                        rule.project_id,
                        rule.document_id,
                        rule.category.as_str(),
                        rule.kind.as_str(),
                        rule.text,
                        rule.term,
                        rule.limit,
                        rule.created_at,
                    ],
                )?;
            }

            ctx.record_comment(
                "bible_document",
                &document.id,
                EventType::DocumentAdded,
                &format!("{} rules extracted", rules.len()),
            );
            Ok(())
        })
    }

    /// List bible documents for a project.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_bible_documents(&self, project_id: &str) -> Result<Vec<BibleDocument>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, project_id, title, body, created_at
             FROM bible_documents WHERE project_id = ?1
             ORDER BY created_at ASC",
        )?;
        let docs = stmt
            .query_map([project_id], map_document_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(docs)
    }

    /// Get a bible document by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_bible_document(&self, id: &str) -> Result<Option<BibleDocument>> {
        let doc = self
            .conn
            .query_row(
                "SELECT id, project_id, title, body, created_at FROM bible_documents WHERE id = ?1",
                [id],
                map_document_row,
            )
            .optional()?;
        Ok(doc)
    }

    /// All rules for a project, in extraction order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_bible_rules(&self, project_id: &str) -> Result<Vec<BibleRule>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RULE_COLUMNS} FROM bible_rules WHERE project_id = ?1
             ORDER BY created_at ASC, rowid ASC"
        ))?;
        let rules = stmt
            .query_map([project_id], map_rule_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rules)
    }

    /// Remove a bible document and its rules.
    ///
    /// # Errors
    ///
    /// Returns `DocumentNotFound` if the document doesn't exist.
    pub fn remove_bible_document(&mut self, id: &str, actor: &str) -> Result<()> {
        self.mutate("remove_bible_document", actor, |tx, ctx| {
            let affected = tx.execute("DELETE FROM bible_documents WHERE id = ?1", [id])?;
            if affected == 0 {
                return Err(Error::DocumentNotFound { id: id.to_string() });
            }
            ctx.record_event("bible_document", id, EventType::DocumentRemoved);
            Ok(())
        })
    }

    // =====================
    // Transcript Operations
    // =====================

    /// Store a transcript.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn add_transcript(&mut self, transcript: &Transcript, actor: &str) -> Result<()> {
        self.mutate("add_transcript", actor, |tx, ctx| {
            tx.execute(
                "INSERT INTO transcripts (id, project_id, title, body, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    transcript.id,
                    transcript.project_id,
                    transcript.title,
                    transcript.body,
                    transcript.created_at,
                ],
            )?;
            ctx.record_event("transcript", &transcript.id, EventType::TranscriptAdded);
            Ok(())
        })
    }

    /// Get a transcript by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_transcript(&self, id: &str) -> Result<Option<Transcript>> {
        let transcript = self
            .conn
            .query_row(
                "SELECT id, project_id, title, body, created_at FROM transcripts WHERE id = ?1",
                [id],
                map_transcript_row,
            )
            .optional()?;
        Ok(transcript)
    }

    /// List transcripts for a project.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_transcripts(&self, project_id: &str) -> Result<Vec<Transcript>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, project_id, title, body, created_at
             FROM transcripts WHERE project_id = ?1
             ORDER BY created_at DESC",
        )?;
        let transcripts = stmt
            .query_map([project_id], map_transcript_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(transcripts)
    }

    // ===============================
    // Subscription and Usage Operations
    // ===============================

    /// Get a user's subscription; users without one are on the free tier.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_subscription(&self, user_id: &str) -> Result<Subscription> {
        let stored = self
            .conn
            .query_row(
                "SELECT user_id, tier, updated_at FROM subscriptions WHERE user_id = ?1",
                [user_id],
                |row| {
                    Ok(Subscription {
                        user_id: row.get(0)?,
                        tier: Tier::from_db(&row.get::<_, String>(1)?),
                        updated_at: row.get(2)?,
                    })
                },
            )
            .optional()?;

        Ok(stored.unwrap_or_else(|| Subscription {
            user_id: user_id.to_string(),
            tier: Tier::Free,
            updated_at: 0,
        }))
    }

    /// Set a user's tier.
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert fails.
    pub fn set_tier(&mut self, user_id: &str, tier: Tier, actor: &str) -> Result<()> {
        self.mutate("set_tier", actor, |tx, ctx| {
            let old: Option<String> = tx
                .query_row(
                    "SELECT tier FROM subscriptions WHERE user_id = ?1",
                    [user_id],
                    |row| row.get(0),
                )
                .optional()?;

            tx.execute(
                "INSERT INTO subscriptions (user_id, tier, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO UPDATE SET tier = excluded.tier, updated_at = excluded.updated_at",
                rusqlite::params![user_id, tier.as_str(), chrono::Utc::now().timestamp_millis()],
            )?;

            ctx.record_change(
                "subscription",
                user_id,
                EventType::SubscriptionChanged,
                Some(old.unwrap_or_else(|| Tier::Free.as_str().to_string())),
                Some(tier.as_str().to_string()),
            );
            Ok(())
        })
    }

    /// Record one use of a metered feature.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn record_usage(
        &mut self,
        user_id: &str,
        feature: Feature,
        project_id: Option<&str>,
        period: &str,
        actor: &str,
    ) -> Result<()> {
        self.mutate("record_usage", actor, |tx, ctx| {
            tx.execute(
                "INSERT INTO usage_records (user_id, feature, project_id, period, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    user_id,
                    feature.as_str(),
                    project_id,
                    period,
                    chrono::Utc::now().timestamp_millis()
                ],
            )?;
            ctx.record_comment("usage", user_id, EventType::UsageRecorded, feature.as_str());
            Ok(())
        })
    }

    /// Count uses of the given features by a user in a period.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_usage(&self, user_id: &str, period: &str, features: &[Feature]) -> Result<i64> {
        Ok(self
            .usage_by_feature(user_id, period)?
            .into_iter()
            .filter(|u| features.iter().any(|f| f.as_str() == u.feature))
            .map(|u| u.count)
            .sum())
    }

    /// Per-feature usage for a user in a period.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn usage_by_feature(&self, user_id: &str, period: &str) -> Result<Vec<UsageCount>> {
        let mut stmt = self.conn.prepare(
            "SELECT feature, COUNT(*) FROM usage_records
             WHERE user_id = ?1 AND period = ?2
             GROUP BY feature ORDER BY feature",
        )?;
        let counts = stmt
            .query_map([user_id, period], |row| {
                Ok(UsageCount {
                    feature: row.get(0)?,
                    count: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(counts)
    }

    // ==============
    // Event Operations
    // ==============

    /// Record that an export file was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn record_export(&mut self, project_id: &str, path: &str, actor: &str) -> Result<()> {
        self.mutate("record_export", actor, |_tx, ctx| {
            ctx.record_comment("project", project_id, EventType::ExportWritten, path);
            Ok(())
        })
    }

    /// Audit history for one entity, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_events(&self, entity_type: &str, entity_id: &str, limit: u32) -> Result<Vec<Event>> {
        Ok(get_events(&self.conn, entity_type, entity_id, Some(limit))?)
    }

    /// Most recent events across all entities.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn recent_events(&self, limit: u32) -> Result<Vec<Event>> {
        Ok(get_recent_events(&self.conn, Some(limit))?)
    }
}

/// Entity id used for phase events.
#[must_use]
pub fn phase_entity_id(project_id: &str, phase: Phase) -> String {
    format!("{project_id}:{}", phase.as_str())
}

fn read_phase(conn: &Connection, project_id: &str, phase: Phase) -> Result<Option<PhaseContent>> {
    let content = conn
        .query_row(
            &format!("SELECT {PHASE_COLUMNS} FROM phase_content WHERE project_id = ?1 AND phase = ?2"),
            [project_id, phase.as_str()],
            map_phase_row,
        )
        .optional()?;
    Ok(content)
}

/// Insert or overwrite a phase, bumping its revision. Returns the new revision.
fn write_phase(
    conn: &Connection,
    project_id: &str,
    phase: Phase,
    content: &serde_json::Value,
    hash: &str,
) -> Result<i64> {
    let revision = conn.query_row(
        "INSERT INTO phase_content (project_id, phase, content, revision, content_hash, updated_at)
         VALUES (?1, ?2, ?3, 1, ?4, ?5)
         ON CONFLICT(project_id, phase) DO UPDATE SET
             content = excluded.content,
             revision = phase_content.revision + 1,
             content_hash = excluded.content_hash,
             updated_at = excluded.updated_at
         RETURNING revision",
        rusqlite::params![
            project_id,
            phase.as_str(),
            content.to_string(),
            hash,
            chrono::Utc::now().timestamp_millis()
        ],
        |row| row.get(0),
    )?;
    Ok(revision)
}

fn read_change(conn: &Connection, id: &str) -> Result<Option<ChangeRecord>> {
    let change = conn
        .query_row(
            &format!("SELECT {CHANGE_COLUMNS} FROM story_changes WHERE id = ?1"),
            [id],
            map_change_row,
        )
        .optional()?;
    Ok(change)
}

fn require_pending(conn: &Connection, id: &str) -> Result<ChangeRecord> {
    let change = read_change(conn, id)?.ok_or_else(|| Error::ChangeNotFound { id: id.to_string() })?;
    if change.status != ChangeStatus::Pending {
        return Err(Error::InvalidChangeStatus {
            expected: ChangeStatus::Pending.as_str().to_string(),
            actual: change.status.as_str().to_string(),
        });
    }
    Ok(change)
}

fn pending_changes(conn: &Connection, project_id: &str) -> Result<Vec<ChangeRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CHANGE_COLUMNS} FROM story_changes
         WHERE project_id = ?1 AND status = 'pending'
         ORDER BY created_at ASC"
    ))?;
    let changes = stmt
        .query_map([project_id], map_change_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(changes)
}

/// Move a pending change to a terminal status.
fn decide(tx: &Transaction, ctx: &mut MutationContext, id: &str, status: ChangeStatus) -> Result<()> {
    tx.execute(
        "UPDATE story_changes SET status = ?1, decided_at = ?2 WHERE id = ?3 AND status = 'pending'",
        rusqlite::params![status.as_str(), chrono::Utc::now().timestamp_millis(), id],
    )?;
    let event_type = match status {
        ChangeStatus::Applied => EventType::ChangeApplied,
        ChangeStatus::Rejected => EventType::ChangeRejected,
        _ => EventType::ChangeSuperseded,
    };
    ctx.record_change(
        "change",
        id,
        event_type,
        Some(ChangeStatus::Pending.as_str().to_string()),
        Some(status.as_str().to_string()),
    );
    Ok(())
}

fn supersede(tx: &Transaction, ctx: &mut MutationContext, id: &str, marker: &str) -> Result<()> {
    tx.execute(
        "UPDATE story_changes SET superseded_by = ?1 WHERE id = ?2 AND status = 'pending'",
        rusqlite::params![marker, id],
    )?;
    decide(tx, ctx, id, ChangeStatus::Superseded)
}

/// Decode a JSON TEXT column.
fn json_column<T: DeserializeOwned>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn map_project_row(row: &rusqlite::Row) -> rusqlite::Result<StoryProject> {
    Ok(StoryProject {
        id: row.get(0)?,
        owner: row.get(1)?,
        title: row.get(2)?,
        genre: row.get(3)?,
        current_phase: Phase::from_db(&row.get::<_, String>(4)?),
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn map_phase_row(row: &rusqlite::Row) -> rusqlite::Result<PhaseContent> {
    Ok(PhaseContent {
        project_id: row.get(0)?,
        phase: Phase::from_db(&row.get::<_, String>(1)?),
        content: json_column(row, 2)?,
        revision: row.get(3)?,
        content_hash: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn map_change_row(row: &rusqlite::Row) -> rusqlite::Result<ChangeRecord> {
    let proposed: Option<String> = row.get(8)?;
    let proposed_content = proposed
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))?;

    Ok(ChangeRecord {
        id: row.get(0)?,
        project_id: row.get(1)?,
        source_phase: Phase::from_db(&row.get::<_, String>(2)?),
        target_phase: Phase::from_db(&row.get::<_, String>(3)?),
        source_revision: row.get(4)?,
        base_revision: row.get(5)?,
        field_changes: json_column(row, 6)?,
        impact: Impact::from_db(&row.get::<_, String>(7)?),
        proposed_content,
        status: ChangeStatus::from_db(&row.get::<_, String>(9)?),
        error: row.get(10)?,
        superseded_by: row.get(11)?,
        actor: row.get(12)?,
        created_at: row.get(13)?,
        decided_at: row.get(14)?,
    })
}

fn map_document_row(row: &rusqlite::Row) -> rusqlite::Result<BibleDocument> {
    Ok(BibleDocument {
        id: row.get(0)?,
        project_id: row.get(1)?,
        title: row.get(2)?,
        body: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn map_rule_row(row: &rusqlite::Row) -> rusqlite::Result<BibleRule> {
    Ok(BibleRule {
        id: row.get(0)?,
        project_id: row.get(1)?,
        document_id: row.get(2)?,
        category: RuleCategory::from_db(&row.get::<_, String>(3)?),
        kind: RuleKind::from_db(&row.get::<_, String>(4)?),
        text: row.get(5)?,
        term: row.get(6)?,
        limit: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn map_transcript_row(row: &rusqlite::Row) -> rusqlite::Result<Transcript> {
    Ok(Transcript {
        id: row.get(0)?,
        project_id: row.get(1)?,
        title: row.get(2)?,
        body: row.get(3)?,
        created_at: row.get(4)?,
    })
}
