//! The Living Story engine.
//!
//! An edit to one phase is committed, diffed against the previous content,
//! and fanned out to every dependent phase as a regeneration proposal. The
//! proposals land in the change log as `pending` (or `failed`) records and
//! wait for approval unless auto-apply is on.

use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::diff::{affected_phases, classify_impact, diff_values};
use super::hash::content_hash;
use super::request::RegenerationRequest;
use crate::error::{Error, Result};
use crate::llm::{CompletionRequest, LlmProvider, parse_json_output};
use crate::model::{ChangeRecord, ChangeStatus, FieldChange, Impact, Phase, StoryProject};
use crate::storage::{Decision, SqliteStorage};

/// Upper bound for change log listings.
const LOG_LIMIT: usize = 500;

/// Engine behaviour switches.
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    /// Apply new proposals immediately.
    pub auto_apply: bool,
    /// Regenerate dependent phases. When off, edits are committed only.
    pub propagate: bool,
    pub max_tokens: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            auto_apply: false,
            propagate: true,
            max_tokens: CompletionRequest::DEFAULT_MAX_TOKENS,
        }
    }
}

/// What an edit did.
#[derive(Debug, Clone, Serialize)]
pub struct EditOutcome {
    pub project_id: String,
    pub phase: Phase,
    /// False when the content hash was unchanged and nothing was written.
    pub changed: bool,
    pub revision: i64,
    pub impact: Option<Impact>,
    pub field_changes: Vec<FieldChange>,
    /// Pending changes made obsolete by this edit.
    pub superseded: Vec<String>,
    /// Change records created for dependent phases.
    pub changes: Vec<ChangeRecord>,
    /// Dependent phases left alone because the workflow has not reached them.
    pub skipped: Vec<Phase>,
}

/// Change detection, regeneration and approval over one storage handle.
pub struct LivingStoryEngine<'a, P: LlmProvider> {
    storage: &'a mut SqliteStorage,
    provider: Option<&'a P>,
    options: EngineOptions,
}

impl<'a, P: LlmProvider> LivingStoryEngine<'a, P> {
    pub fn new(storage: &'a mut SqliteStorage, provider: Option<&'a P>) -> Self {
        Self {
            storage,
            provider,
            options: EngineOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Record an edit to `phase` and propose updates for its dependents.
    ///
    /// # Errors
    ///
    /// Returns `ProjectNotFound`, or a storage error. Provider failures do
    /// not fail the edit; they produce `failed` change records.
    pub async fn record_edit(
        &mut self,
        project_id: &str,
        phase: Phase,
        content: Value,
        actor: &str,
    ) -> Result<EditOutcome> {
        let project = self.storage.require_project(project_id)?;
        let hash = content_hash(&content);

        let mut supersede_sources = phase.upstream();
        supersede_sources.push(phase);

        let Some(write) =
            self.storage
                .commit_phase_edit(project_id, phase, &content, &hash, &supersede_sources, actor)?
        else {
            debug!(project_id, %phase, "Content unchanged; nothing recorded");
            let revision = self
                .storage
                .get_phase_content(project_id, phase)?
                .map_or(0, |p| p.revision);
            return Ok(EditOutcome {
                project_id: project_id.to_string(),
                phase,
                changed: false,
                revision,
                impact: None,
                field_changes: Vec::new(),
                superseded: Vec::new(),
                changes: Vec::new(),
                skipped: Vec::new(),
            });
        };

        let old = write.previous.map_or(Value::Null, |p| p.content);
        let field_changes = diff_values(&old, &content);
        let impact = classify_impact(&field_changes);
        info!(
            project_id,
            %phase,
            revision = write.revision,
            changes = field_changes.len(),
            impact = impact.as_str(),
            "Phase updated"
        );
        if !write.superseded.is_empty() {
            info!(count = write.superseded.len(), "Superseded pending changes");
        }

        let mut outcome = EditOutcome {
            project_id: project_id.to_string(),
            phase,
            changed: true,
            revision: write.revision,
            impact: Some(impact),
            field_changes,
            superseded: write.superseded,
            changes: Vec::new(),
            skipped: Vec::new(),
        };
        if !self.options.propagate {
            return Ok(outcome);
        }

        let guidance = crate::bible::render_guidance(&self.storage.list_bible_rules(project_id)?);
        let mut records = Vec::new();
        for &target in affected_phases(phase) {
            let current = self.storage.get_phase_content(project_id, target)?;
            if current.is_none() && (target == Phase::Export || !project.has_reached(target)) {
                outcome.skipped.push(target);
                continue;
            }

            let base_revision = current.as_ref().map_or(0, |p| p.revision);
            let record = ChangeRecord::new(project_id, phase, target, write.revision, base_revision, actor)
                .with_changes(outcome.field_changes.clone(), impact);

            let request = RegenerationRequest {
                project_title: &project.title,
                source_phase: phase,
                source_content: &content,
                target_phase: target,
                current_target: current.as_ref().map(|p| &p.content),
                changes: &outcome.field_changes,
                guidance: &guidance,
            };
            let marker = format!("{phase}@r{}", write.revision);
            records.push(match self.propose(&request, &marker).await {
                Ok(proposal) => record.with_proposal(proposal),
                Err(e) => {
                    warn!(project_id, %target, error = %e, "Regeneration failed");
                    record.failed(&e.to_string())
                }
            });
        }

        self.storage.insert_changes(&mut records, actor)?;
        let obsolete = records
            .iter()
            .filter(|c| c.status == ChangeStatus::Superseded)
            .count();
        if obsolete > 0 {
            warn!(project_id, %phase, count = obsolete, "Source phase moved during regeneration; proposals superseded");
        }

        if self.options.auto_apply {
            for record in &mut records {
                if record.status == ChangeStatus::Pending {
                    *record = match self.storage.apply_change(&record.id, actor)? {
                        Decision::Decided(change) | Decision::Stale { change, .. } => change,
                    };
                }
            }
        }

        outcome.changes = records;
        Ok(outcome)
    }

    /// Produce new content for one dependent phase.
    ///
    /// The export phase holds metadata about the last written file, so it
    /// is marked stale instead of being regenerated.
    async fn propose(&self, request: &RegenerationRequest<'_>, marker: &str) -> Result<Value> {
        if request.target_phase == Phase::Export {
            return Ok(mark_export_stale(request.current_target, marker));
        }

        let provider = self
            .provider
            .ok_or_else(|| Error::Llm("no LLM provider configured".to_string()))?;
        let completion = request.to_completion(self.options.max_tokens);
        let text = provider.complete(&completion).await?;
        parse_json_output(&text)
    }

    /// Apply a pending change to its target phase.
    ///
    /// # Errors
    ///
    /// Returns `ChangeNotFound`, `InvalidChangeStatus` if the change is not
    /// pending, or `StaleChange` if the target moved since the proposal (the
    /// change is superseded in that case).
    pub fn approve(&mut self, change_id: &str, actor: &str) -> Result<ChangeRecord> {
        match self.storage.apply_change(change_id, actor)? {
            Decision::Decided(change) => {
                info!(change_id, target = %change.target_phase, "Change applied");
                Ok(change)
            }
            Decision::Stale {
                change,
                actual_revision,
            } => {
                warn!(change_id, "Change is stale; superseded");
                Err(Error::StaleChange {
                    id: change.id,
                    phase: change.target_phase.to_string(),
                    expected: change.base_revision,
                    actual: actual_revision,
                })
            }
        }
    }

    /// Reject a pending change.
    ///
    /// # Errors
    ///
    /// Returns `ChangeNotFound` or `InvalidChangeStatus`.
    pub fn reject(&mut self, change_id: &str, actor: &str) -> Result<ChangeRecord> {
        let change = self.storage.reject_change(change_id, actor)?;
        info!(change_id, "Change rejected");
        Ok(change)
    }

    /// Pending changes for a project, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn pending(&self, project_id: &str) -> Result<Vec<ChangeRecord>> {
        self.storage
            .list_changes(project_id, Some(ChangeStatus::Pending), None, LOG_LIMIT)
    }

    /// The change log for a project, optionally for one target phase.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn history(
        &self,
        project_id: &str,
        phase: Option<Phase>,
        limit: usize,
    ) -> Result<Vec<ChangeRecord>> {
        self.storage
            .list_changes(project_id, None, phase, limit.min(LOG_LIMIT))
    }
}

fn mark_export_stale(current: Option<&Value>, marker: &str) -> Value {
    let mut proposal = match current {
        Some(Value::Object(map)) => Value::Object(map.clone()),
        Some(other) => json!({ "previous": other }),
        None => json!({}),
    };
    proposal["stale"] = Value::Bool(true);
    proposal["stale_since"] = Value::String(marker.to_string());
    proposal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ProviderInfo;
    use crate::llm::stub::StubLlm;
    use crate::model::{BibleDocument, BibleRule, RuleCategory, RuleKind};
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// A project at `current` with summary, scenes and beats written.
    fn seeded(current: Phase) -> (SqliteStorage, String) {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let project_id = seed(&mut storage, current);
        (storage, project_id)
    }

    fn seed(storage: &mut SqliteStorage, current: Phase) -> String {
        let project = StoryProject::new("alice", "The Lighthouse".to_string());
        storage.create_project(&project, "alice").unwrap();
        for (phase, content) in [
            (Phase::Summary, json!({"logline": "A keeper guards a light"})),
            (Phase::Scenes, json!({"scenes": [{"title": "Dock"}]})),
            (Phase::Beats, json!({"beats": [["arrive"]]})),
        ] {
            let hash = content_hash(&content);
            storage
                .commit_phase_edit(&project.id, phase, &content, &hash, &[], "alice")
                .unwrap();
        }
        storage.set_current_phase(&project.id, current, "alice").unwrap();
        project.id
    }

    /// Writes `phase` through a second connection while a regeneration is
    /// in flight, the way another `muse` process would.
    struct ConcurrentEditor {
        db: PathBuf,
        project_id: String,
        phase: Phase,
        content: Value,
    }

    impl LlmProvider for ConcurrentEditor {
        fn info(&self) -> ProviderInfo {
            ProviderInfo {
                name: "concurrent".to_string(),
                model: "stub-1".to_string(),
            }
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
            let mut other = SqliteStorage::open(&self.db)?;
            let hash = content_hash(&self.content);
            other.commit_phase_edit(&self.project_id, self.phase, &self.content, &hash, &[self.phase], "bob")?;
            Ok("{\"regenerated\": true}".to_string())
        }
    }

    fn file_backed(dir: &TempDir) -> (SqliteStorage, String, PathBuf) {
        let db = dir.path().join("muse.db");
        let mut storage = SqliteStorage::open(&db).unwrap();
        let project_id = seed(&mut storage, Phase::Beats);
        (storage, project_id, db)
    }

    #[tokio::test]
    async fn test_first_edit_skips_unreached_phases() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let project = StoryProject::new("alice", "Fresh".to_string());
        storage.create_project(&project, "alice").unwrap();
        let llm = StubLlm::replying("{}");

        let mut engine = LivingStoryEngine::new(&mut storage, Some(&llm));
        let outcome = engine
            .record_edit(&project.id, Phase::Summary, json!({"logline": "x"}), "alice")
            .await
            .unwrap();

        assert!(outcome.changed);
        assert_eq!(outcome.revision, 1);
        assert_eq!(outcome.impact, Some(Impact::Major));
        assert!(outcome.changes.is_empty());
        assert_eq!(outcome.skipped, vec![Phase::Scenes, Phase::Beats, Phase::Export]);
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_identical_edit_records_nothing() {
        let (mut storage, project_id) = seeded(Phase::Beats);
        let llm = StubLlm::replying("{}");

        let mut engine = LivingStoryEngine::new(&mut storage, Some(&llm));
        let outcome = engine
            .record_edit(&project_id, Phase::Summary, json!({"logline": "A keeper guards a light"}), "alice")
            .await
            .unwrap();

        assert!(!outcome.changed);
        assert_eq!(outcome.revision, 1);
        assert!(outcome.changes.is_empty());
        assert!(engine.history(&project_id, None, 50).unwrap().is_empty());
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_edit_proposes_pending_changes_for_dependents() {
        let (mut storage, project_id) = seeded(Phase::Beats);
        let llm = StubLlm::replying("```json\n{\"regenerated\": true}\n```");

        let mut engine = LivingStoryEngine::new(&mut storage, Some(&llm));
        let outcome = engine
            .record_edit(&project_id, Phase::Summary, json!({"logline": "A keeper hides a smuggler"}), "alice")
            .await
            .unwrap();

        assert_eq!(outcome.revision, 2);
        assert_eq!(outcome.impact, Some(Impact::Major));
        assert_eq!(outcome.skipped, vec![Phase::Export]);

        let targets: Vec<Phase> = outcome.changes.iter().map(|c| c.target_phase).collect();
        assert_eq!(targets, vec![Phase::Scenes, Phase::Beats]);
        for change in &outcome.changes {
            assert_eq!(change.status, ChangeStatus::Pending);
            assert_eq!(change.source_revision, 2);
            assert_eq!(change.base_revision, 1);
            assert_eq!(change.proposed_content, Some(json!({"regenerated": true})));
        }
        assert_eq!(engine.pending(&project_id).unwrap().len(), 2);
        assert_eq!(llm.calls(), 2);
    }

    #[tokio::test]
    async fn test_new_upstream_edit_supersedes_pending() {
        let (mut storage, project_id) = seeded(Phase::Beats);
        let llm = StubLlm::replying("{\"v\": 1}");

        let mut engine = LivingStoryEngine::new(&mut storage, Some(&llm));
        let first = engine
            .record_edit(&project_id, Phase::Summary, json!({"logline": "one"}), "alice")
            .await
            .unwrap();
        let second = engine
            .record_edit(&project_id, Phase::Scenes, json!({"scenes": []}), "alice")
            .await
            .unwrap();

        let first_ids: Vec<&str> = first.changes.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(second.superseded.len(), 2);
        for id in &second.superseded {
            assert!(first_ids.contains(&id.as_str()));
        }

        let pending = engine.pending(&project_id).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].source_phase, Phase::Scenes);
        assert_eq!(pending[0].target_phase, Phase::Beats);
    }

    #[tokio::test]
    async fn test_provider_failure_records_failed_change() {
        let (mut storage, project_id) = seeded(Phase::Beats);
        let llm = StubLlm::failing();

        let mut engine = LivingStoryEngine::new(&mut storage, Some(&llm));
        let outcome = engine
            .record_edit(&project_id, Phase::Scenes, json!({"scenes": [{"title": "Cliff"}]}), "alice")
            .await
            .unwrap();

        assert!(outcome.changed);
        assert_eq!(outcome.changes.len(), 1);
        let change = &outcome.changes[0];
        assert_eq!(change.status, ChangeStatus::Failed);
        assert!(change.proposed_content.is_none());
        assert!(change.error.as_deref().unwrap().contains("provider offline"));
        assert!(engine.pending(&project_id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_json_reply_is_failure() {
        let (mut storage, project_id) = seeded(Phase::Beats);
        let llm = StubLlm::replying("Here are your beats!");

        let mut engine = LivingStoryEngine::new(&mut storage, Some(&llm));
        let outcome = engine
            .record_edit(&project_id, Phase::Scenes, json!({"scenes": []}), "alice")
            .await
            .unwrap();

        assert_eq!(outcome.changes[0].status, ChangeStatus::Failed);
        assert!(outcome.changes[0].error.as_deref().unwrap().contains("invalid JSON"));
    }

    #[tokio::test]
    async fn test_without_provider_changes_fail() {
        let (mut storage, project_id) = seeded(Phase::Beats);

        let mut engine = LivingStoryEngine::<StubLlm>::new(&mut storage, None);
        let outcome = engine
            .record_edit(&project_id, Phase::Scenes, json!({"scenes": []}), "alice")
            .await
            .unwrap();

        assert_eq!(outcome.changes[0].status, ChangeStatus::Failed);
        assert!(outcome.changes[0].error.as_deref().unwrap().contains("no LLM provider"));
    }

    #[tokio::test]
    async fn test_propagation_off_commits_only() {
        let (mut storage, project_id) = seeded(Phase::Beats);
        let llm = StubLlm::replying("{}");

        let options = EngineOptions {
            propagate: false,
            ..EngineOptions::default()
        };
        let mut engine = LivingStoryEngine::new(&mut storage, Some(&llm)).with_options(options);
        let outcome = engine
            .record_edit(&project_id, Phase::Summary, json!({"logline": "new"}), "alice")
            .await
            .unwrap();

        assert!(outcome.changed);
        assert!(outcome.changes.is_empty());
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_auto_apply_writes_targets() {
        let (mut storage, project_id) = seeded(Phase::Beats);
        let llm = StubLlm::replying("{\"auto\": true}");

        let options = EngineOptions {
            auto_apply: true,
            ..EngineOptions::default()
        };
        let mut engine = LivingStoryEngine::new(&mut storage, Some(&llm)).with_options(options);
        let outcome = engine
            .record_edit(&project_id, Phase::Summary, json!({"logline": "auto"}), "alice")
            .await
            .unwrap();

        assert!(outcome.changes.iter().all(|c| c.status == ChangeStatus::Applied));
        drop(engine);

        let scenes = storage.get_phase_content(&project_id, Phase::Scenes).unwrap().unwrap();
        assert_eq!(scenes.revision, 2);
        assert_eq!(scenes.content, json!({"auto": true}));
    }

    #[tokio::test]
    async fn test_approve_and_reject() {
        let (mut storage, project_id) = seeded(Phase::Beats);
        let llm = StubLlm::replying("{\"approved\": true}");

        let mut engine = LivingStoryEngine::new(&mut storage, Some(&llm));
        let outcome = engine
            .record_edit(&project_id, Phase::Summary, json!({"logline": "two"}), "alice")
            .await
            .unwrap();
        let scenes_change = outcome.changes[0].id.clone();
        let beats_change = outcome.changes[1].id.clone();

        let applied = engine.approve(&scenes_change, "alice").unwrap();
        assert_eq!(applied.status, ChangeStatus::Applied);
        assert!(applied.decided_at.is_some());

        let rejected = engine.reject(&beats_change, "alice").unwrap();
        assert_eq!(rejected.status, ChangeStatus::Rejected);

        let err = engine.approve(&beats_change, "alice").unwrap_err();
        assert!(matches!(err, Error::InvalidChangeStatus { .. }));

        let history = engine.history(&project_id, Some(Phase::Scenes), 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, ChangeStatus::Applied);
        drop(engine);

        let scenes = storage.get_phase_content(&project_id, Phase::Scenes).unwrap().unwrap();
        assert_eq!(scenes.content, json!({"approved": true}));
    }

    #[tokio::test]
    async fn test_export_is_marked_stale_without_provider_call() {
        let (mut storage, project_id) = seeded(Phase::Export);
        let export = json!({"format": "markdown", "content_hash": "abc", "exported_at": 1});
        let hash = content_hash(&export);
        storage
            .commit_phase_edit(&project_id, Phase::Export, &export, &hash, &[], "alice")
            .unwrap();
        let llm = StubLlm::failing();

        let mut engine = LivingStoryEngine::new(&mut storage, Some(&llm));
        let outcome = engine
            .record_edit(&project_id, Phase::Beats, json!({"beats": []}), "alice")
            .await
            .unwrap();

        assert_eq!(outcome.changes.len(), 1);
        let change = &outcome.changes[0];
        assert_eq!(change.target_phase, Phase::Export);
        assert_eq!(change.status, ChangeStatus::Pending);
        let proposal = change.proposed_content.as_ref().unwrap();
        assert_eq!(proposal["stale"], true);
        assert_eq!(proposal["stale_since"], "beats@r2");
        assert_eq!(proposal["format"], "markdown");
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_bible_guidance_reaches_prompt() {
        let (mut storage, project_id) = seeded(Phase::Scenes);
        let doc = BibleDocument::new(&project_id, "Style", "Never use \"suddenly\".");
        let rule = BibleRule {
            id: "rule_1".to_string(),
            project_id: project_id.clone(),
            document_id: doc.id.clone(),
            category: RuleCategory::Style,
            kind: RuleKind::Forbidden,
            text: "Never use \"suddenly\".".to_string(),
            term: Some("suddenly".to_string()),
            limit: None,
            created_at: 0,
        };
        storage.add_bible_document(&doc, &[rule], "alice").unwrap();
        let llm = StubLlm::replying("{}");

        let mut engine = LivingStoryEngine::new(&mut storage, Some(&llm));
        engine
            .record_edit(&project_id, Phase::Summary, json!({"logline": "moved"}), "alice")
            .await
            .unwrap();

        let prompts = llm.prompts();
        assert!(!prompts.is_empty());
        assert!(prompts[0].contains("suddenly"));
    }

    #[tokio::test]
    async fn test_source_edit_during_regeneration_supersedes_proposals() {
        let dir = TempDir::new().unwrap();
        let (mut storage, project_id, db) = file_backed(&dir);
        let llm = ConcurrentEditor {
            db,
            project_id: project_id.clone(),
            phase: Phase::Summary,
            content: json!({"logline": "newest edit from another process"}),
        };

        let mut engine = LivingStoryEngine::new(&mut storage, Some(&llm));
        let outcome = engine
            .record_edit(&project_id, Phase::Summary, json!({"logline": "first edit"}), "alice")
            .await
            .unwrap();

        assert_eq!(outcome.revision, 2);
        assert_eq!(outcome.changes.len(), 2);
        for change in &outcome.changes {
            assert_eq!(change.status, ChangeStatus::Superseded);
            assert_eq!(change.superseded_by.as_deref(), Some("summary@r3"));
        }
        assert!(engine.pending(&project_id).unwrap().is_empty());

        let err = engine.approve(&outcome.changes[0].id, "alice").unwrap_err();
        assert!(matches!(err, Error::InvalidChangeStatus { .. }));
    }

    #[tokio::test]
    async fn test_approve_after_target_moved_is_stale() {
        let dir = TempDir::new().unwrap();
        let (mut storage, project_id, db) = file_backed(&dir);
        let llm = ConcurrentEditor {
            db,
            project_id: project_id.clone(),
            phase: Phase::Scenes,
            content: json!({"scenes": [{"title": "Rewritten by hand"}]}),
        };

        let mut engine = LivingStoryEngine::new(&mut storage, Some(&llm));
        let outcome = engine
            .record_edit(&project_id, Phase::Summary, json!({"logline": "first edit"}), "alice")
            .await
            .unwrap();
        let scenes_change = &outcome.changes[0];
        assert_eq!(scenes_change.target_phase, Phase::Scenes);
        assert_eq!(scenes_change.status, ChangeStatus::Pending);

        let err = engine.approve(&scenes_change.id, "alice").unwrap_err();
        match err {
            Error::StaleChange { id, phase, expected, actual } => {
                assert_eq!(id, scenes_change.id);
                assert_eq!(phase, "scenes");
                assert_eq!(expected, 1);
                assert_eq!(actual, 2);
            }
            other => panic!("expected stale change, got {other:?}"),
        }

        let history = engine.history(&project_id, Some(Phase::Scenes), 10).unwrap();
        assert_eq!(history[0].status, ChangeStatus::Superseded);
        drop(engine);

        let scenes = storage.get_phase_content(&project_id, Phase::Scenes).unwrap().unwrap();
        assert_eq!(scenes.content["scenes"][0]["title"], "Rewritten by hand");
    }
}
