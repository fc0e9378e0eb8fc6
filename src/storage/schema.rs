//! Database schema definitions.
//!
//! Timestamps are stored as INTEGER (Unix milliseconds). JSON documents
//! (phase content, proposals, field diffs) are stored as TEXT.

use rusqlite::{Connection, Result};

/// Current schema version for migration tracking.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// The complete SQL schema for the MUSE database.
pub const SCHEMA_SQL: &str = r#"
-- ====================
-- Schema Version Tracking
-- ====================

CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

-- ====================
-- Projects and Phases
-- ====================

CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    owner TEXT NOT NULL,
    title TEXT NOT NULL,
    genre TEXT,
    current_phase TEXT NOT NULL DEFAULT 'summary',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    CHECK (current_phase IN ('summary', 'scenes', 'beats', 'export'))
);

CREATE INDEX IF NOT EXISTS idx_projects_owner ON projects(owner);
CREATE INDEX IF NOT EXISTS idx_projects_updated ON projects(updated_at DESC);

-- One row per (project, phase); revision increments on every write
CREATE TABLE IF NOT EXISTS phase_content (
    project_id TEXT NOT NULL,
    phase TEXT NOT NULL,
    content TEXT NOT NULL,
    revision INTEGER NOT NULL DEFAULT 1,
    content_hash TEXT NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (project_id, phase),
    FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE,
    CHECK (phase IN ('summary', 'scenes', 'beats', 'export')),
    CHECK (revision >= 1)
);

-- ====================
-- Living Story Change Log
-- ====================

CREATE TABLE IF NOT EXISTS story_changes (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    source_phase TEXT NOT NULL,
    target_phase TEXT NOT NULL,
    source_revision INTEGER NOT NULL,
    base_revision INTEGER NOT NULL DEFAULT 0,
    field_changes TEXT NOT NULL DEFAULT '[]',
    impact TEXT NOT NULL DEFAULT 'minor',
    proposed_content TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    error TEXT,
    actor TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    decided_at INTEGER,
    FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE,
    CHECK (status IN ('pending', 'applied', 'rejected', 'superseded', 'failed')),
    CHECK (impact IN ('minor', 'major'))
);

CREATE INDEX IF NOT EXISTS idx_changes_project ON story_changes(project_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_changes_status ON story_changes(project_id, status);
CREATE INDEX IF NOT EXISTS idx_changes_target ON story_changes(project_id, target_phase, status);

-- ====================
-- Production Bible
-- ====================

CREATE TABLE IF NOT EXISTS bible_documents (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    title TEXT NOT NULL,
    body TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_bible_documents_project ON bible_documents(project_id);

CREATE TABLE IF NOT EXISTS bible_rules (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    document_id TEXT NOT NULL,
    category TEXT NOT NULL DEFAULT 'general',
    kind TEXT NOT NULL DEFAULT 'guideline',
    text TEXT NOT NULL,
    term TEXT,
    limit_value INTEGER,
    created_at INTEGER NOT NULL,
    FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE,
    FOREIGN KEY (document_id) REFERENCES bible_documents(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_bible_rules_project ON bible_rules(project_id);
CREATE INDEX IF NOT EXISTS idx_bible_rules_document ON bible_rules(document_id);

-- ====================
-- Transcripts
-- ====================

CREATE TABLE IF NOT EXISTS transcripts (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    title TEXT NOT NULL,
    body TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_transcripts_project ON transcripts(project_id);

-- ====================
-- Subscriptions and Usage
-- ====================

CREATE TABLE IF NOT EXISTS subscriptions (
    user_id TEXT PRIMARY KEY,
    tier TEXT NOT NULL DEFAULT 'free',
    updated_at INTEGER NOT NULL,
    CHECK (tier IN ('free', 'pro', 'studio'))
);

-- Period is the calendar month, YYYY-MM (UTC)
CREATE TABLE IF NOT EXISTS usage_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    feature TEXT NOT NULL,
    project_id TEXT,
    period TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

-- ====================
-- Audit Events
-- ====================

CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    actor TEXT NOT NULL,
    old_value TEXT,
    new_value TEXT,
    comment TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id);
CREATE INDEX IF NOT EXISTS idx_events_type ON events(event_type);
CREATE INDEX IF NOT EXISTS idx_events_created ON events(created_at DESC);

-- ====================
-- Triggers
-- ====================

-- Touch the project whenever any phase is written
CREATE TRIGGER IF NOT EXISTS touch_project_on_phase_insert
AFTER INSERT ON phase_content
BEGIN
    UPDATE projects SET updated_at = NEW.updated_at WHERE id = NEW.project_id;
END;

CREATE TRIGGER IF NOT EXISTS touch_project_on_phase_update
AFTER UPDATE ON phase_content
BEGIN
    UPDATE projects SET updated_at = NEW.updated_at WHERE id = NEW.project_id;
END;

-- A decided change never moves again
CREATE TRIGGER IF NOT EXISTS freeze_decided_changes
BEFORE UPDATE OF status ON story_changes
WHEN OLD.status != 'pending'
BEGIN
    SELECT RAISE(ABORT, 'change already decided');
END;

-- ====================
-- Views
-- ====================

CREATE VIEW IF NOT EXISTS project_overview AS
SELECT
    p.id,
    p.owner,
    p.title,
    p.genre,
    p.current_phase,
    p.created_at,
    p.updated_at,
    (SELECT COUNT(*) FROM phase_content pc WHERE pc.project_id = p.id) AS phases_written,
    (SELECT COUNT(*) FROM story_changes sc
        WHERE sc.project_id = p.id AND sc.status = 'pending') AS pending_changes
FROM projects p;
"#;

/// Apply the schema to the database.
///
/// Idempotent: every statement uses `IF NOT EXISTS`.
///
/// # Errors
///
/// Returns an error if the SQL execution fails or pragmas cannot be set.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "cache_size", "-16000")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    conn.execute_batch(SCHEMA_SQL)?;

    super::migrations::run_migrations(conn)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![
            format!("v{CURRENT_SCHEMA_VERSION}"),
            chrono::Utc::now().timestamp_millis()
        ],
    )?;

    Ok(())
}
