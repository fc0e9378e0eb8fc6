//! Phase progression and generation.
//!
//! Every write to a phase goes through the Living Story engine, so edits
//! and generated content alike ripple into dependent phases. The paywall is
//! consulted before any provider call or write.

use std::fmt::Write as _;

use serde_json::Value;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::living::{EditOutcome, EngineOptions, LivingStoryEngine};
use crate::llm::{CompletionRequest, LlmProvider, parse_json_output};
use crate::model::{ChangeStatus, Feature, Phase, StoryProject};
use crate::paywall::{self, Entitlements};
use crate::storage::SqliteStorage;

/// User-level switches for the workflow.
#[derive(Debug, Clone, Copy)]
pub struct WorkflowSettings {
    /// Auto-apply requested in config; honoured only when the tier allows it.
    pub auto_apply: bool,
    pub max_tokens: u32,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            auto_apply: false,
            max_tokens: CompletionRequest::DEFAULT_MAX_TOKENS,
        }
    }
}

/// The generation feature gating a phase.
///
/// # Errors
///
/// Returns `InvalidArgument` for the export phase, which is written by
/// `muse export` rather than generated.
pub fn generation_feature(phase: Phase) -> Result<Feature> {
    match phase {
        Phase::Summary => Ok(Feature::SummaryGeneration),
        Phase::Scenes => Ok(Feature::SceneGeneration),
        Phase::Beats => Ok(Feature::BeatGeneration),
        Phase::Export => Err(Error::InvalidArgument(
            "the export phase is produced by `muse export`, not generated".to_string(),
        )),
    }
}

/// Create a project, enforcing the tier's project limit.
///
/// # Errors
///
/// Returns `RequiredField` for an empty title, `UsageLimitExceeded` when the
/// owner is at the limit, or a storage error.
pub fn create_project(
    storage: &mut SqliteStorage,
    title: &str,
    genre: Option<&str>,
    actor: &str,
) -> Result<StoryProject> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::RequiredField("title".to_string()));
    }

    let tier = storage.get_subscription(actor)?.tier;
    paywall::check_project_quota(tier, storage.count_projects(actor)?)?;

    let mut project = StoryProject::new(actor, title.to_string());
    if let Some(genre) = genre.map(str::trim).filter(|g| !g.is_empty()) {
        project = project.with_genre(genre);
    }
    storage.create_project(&project, actor)?;
    info!(project_id = %project.id, "Project created");
    Ok(project)
}

/// Phase operations for one actor.
pub struct Workflow<'a, P: LlmProvider> {
    storage: &'a mut SqliteStorage,
    provider: Option<&'a P>,
    actor: &'a str,
    settings: WorkflowSettings,
}

impl<'a, P: LlmProvider> Workflow<'a, P> {
    pub fn new(storage: &'a mut SqliteStorage, provider: Option<&'a P>, actor: &'a str) -> Self {
        Self {
            storage,
            provider,
            actor,
            settings: WorkflowSettings::default(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: WorkflowSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Write user-supplied content to a phase.
    ///
    /// # Errors
    ///
    /// Returns `ProjectNotFound`, `PhaseLocked` if the workflow has not
    /// reached `phase`, or a storage error.
    pub async fn set_phase_content(
        &mut self,
        project_id: &str,
        phase: Phase,
        content: Value,
    ) -> Result<EditOutcome> {
        let project = self.storage.require_project(project_id)?;
        ensure_reached(&project, phase)?;
        let entitlements = Entitlements::load(self.storage, self.actor)?;
        self.commit(&project, phase, content, &entitlements).await
    }

    /// Generate a phase from the one before it.
    ///
    /// # Errors
    ///
    /// Returns `FeatureLocked`/`UsageLimitExceeded` from the paywall,
    /// `PhaseLocked`, `PhaseEmpty` when the upstream phase has no content,
    /// or `Llm` when no provider is configured or the reply is unusable.
    pub async fn generate_phase(
        &mut self,
        project_id: &str,
        phase: Phase,
        idea: Option<&str>,
    ) -> Result<EditOutcome> {
        let feature = generation_feature(phase)?;
        let entitlements = Entitlements::load(self.storage, self.actor)?;
        entitlements.require_generation(feature)?;

        let project = self.storage.require_project(project_id)?;
        ensure_reached(&project, phase)?;

        let upstream = match phase.previous() {
            Some(previous) => Some(
                self.storage
                    .get_phase_content(project_id, previous)?
                    .ok_or_else(|| Error::PhaseEmpty {
                        phase: previous.to_string(),
                    })?
                    .content,
            ),
            None => None,
        };

        let provider = self
            .provider
            .ok_or_else(|| Error::Llm("no LLM provider configured".to_string()))?;
        let guidance = crate::bible::render_guidance(&self.storage.list_bible_rules(project_id)?);
        let request = generation_request(&project, phase, upstream.as_ref(), idea, &guidance)
            .with_max_tokens(self.settings.max_tokens);

        info!(project_id, %phase, provider = %provider.info().name, "Generating phase");
        let content = parse_json_output(&provider.complete(&request).await?)?;

        self.storage.record_usage(
            self.actor,
            feature,
            Some(project_id),
            &entitlements.period,
            self.actor,
        )?;
        let entitlements = Entitlements::load(self.storage, self.actor)?;
        self.commit(&project, phase, content, &entitlements).await
    }

    /// Move the project to the next phase.
    ///
    /// # Errors
    ///
    /// Returns `PhaseEmpty` if the current phase has no content, or
    /// `InvalidArgument` when already at the final phase.
    pub fn advance(&mut self, project_id: &str) -> Result<StoryProject> {
        let project = self.storage.require_project(project_id)?;
        let Some(next) = project.current_phase.next() else {
            return Err(Error::InvalidArgument(format!(
                "project {project_id} is already at the final phase"
            )));
        };

        if self
            .storage
            .get_phase_content(project_id, project.current_phase)?
            .is_none()
        {
            return Err(Error::PhaseEmpty {
                phase: project.current_phase.to_string(),
            });
        }

        self.storage.set_current_phase(project_id, next, self.actor)?;
        info!(project_id, from = %project.current_phase, to = %next, "Project advanced");
        self.storage.require_project(project_id)
    }

    async fn commit(
        &mut self,
        project: &StoryProject,
        phase: Phase,
        content: Value,
        entitlements: &Entitlements,
    ) -> Result<EditOutcome> {
        let mut propagate = entitlements.allows(Feature::LivingStory);
        if propagate {
            if let Err(e) = entitlements.require_generation(Feature::LivingStory) {
                warn!(error = %e, "Living Story paused for this edit");
                propagate = false;
            }
        }
        let options = EngineOptions {
            auto_apply: self.settings.auto_apply && entitlements.allows(Feature::AutoApply),
            propagate,
            max_tokens: self.settings.max_tokens,
        };

        let outcome = LivingStoryEngine::new(&mut *self.storage, self.provider)
            .with_options(options)
            .record_edit(&project.id, phase, content, self.actor)
            .await?;

        let regenerated = outcome
            .changes
            .iter()
            .any(|c| c.target_phase != Phase::Export && c.status != ChangeStatus::Failed);
        if regenerated {
            self.storage.record_usage(
                self.actor,
                Feature::LivingStory,
                Some(&project.id),
                &entitlements.period,
                self.actor,
            )?;
        }
        Ok(outcome)
    }
}

fn ensure_reached(project: &StoryProject, phase: Phase) -> Result<()> {
    if project.has_reached(phase) {
        Ok(())
    } else {
        Err(Error::PhaseLocked {
            phase: phase.to_string(),
            current: project.current_phase.to_string(),
        })
    }
}

const GENERATION_SYSTEM: &str = "You are a story development assistant. \
Reply with a single JSON document in the requested shape and nothing else.";

/// Build the completion request that generates `phase`.
#[must_use]
pub fn generation_request(
    project: &StoryProject,
    phase: Phase,
    upstream: Option<&Value>,
    idea: Option<&str>,
    guidance: &str,
) -> CompletionRequest {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "Title: {}", project.title);
    if let Some(genre) = &project.genre {
        let _ = writeln!(prompt, "Genre: {genre}");
    }
    if let Some(idea) = idea.filter(|i| !i.trim().is_empty()) {
        let _ = writeln!(prompt, "Idea: {}", idea.trim());
    }
    if let (Some(previous), Some(upstream)) = (phase.previous(), upstream) {
        let content = serde_json::to_string_pretty(upstream).unwrap_or_else(|_| upstream.to_string());
        let _ = writeln!(prompt, "\nApproved {previous}:\n{content}");
    }

    prompt.push('\n');
    prompt.push_str(match phase {
        Phase::Summary => {
            "Write the story summary as {\"logline\", \"premise\", \"protagonist\", \
             \"antagonist\", \"theme\", \"ending\"}."
        }
        Phase::Scenes => {
            "Break the summary into scenes as {\"scenes\": [{\"title\", \"location\", \
             \"summary\"}]}."
        }
        Phase::Beats | Phase::Export => {
            "Break every scene into beats as {\"beats\": [{\"scene\", \"beats\": [string]}]}."
        }
    });

    if !guidance.is_empty() {
        let _ = writeln!(prompt, "\n\nProduction bible rules:\n{guidance}");
    }

    CompletionRequest::new(GENERATION_SYSTEM, prompt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::stub::StubLlm;
    use crate::model::Tier;
    use serde_json::json;

    fn project(storage: &mut SqliteStorage, tier: Tier) -> String {
        storage.set_tier("alice", tier, "alice").unwrap();
        create_project(storage, "The Lighthouse", Some("thriller"), "alice")
            .unwrap()
            .id
    }

    #[test]
    fn test_create_project_enforces_free_limit() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        for i in 0..3 {
            create_project(&mut storage, &format!("Story {i}"), None, "alice").unwrap();
        }
        let err = create_project(&mut storage, "Fourth", None, "alice").unwrap_err();
        assert!(matches!(err, Error::UsageLimitExceeded { limit: 3, .. }));

        let err = create_project(&mut storage, "  ", None, "bob").unwrap_err();
        assert!(matches!(err, Error::RequiredField(_)));
    }

    #[tokio::test]
    async fn test_generate_summary_records_usage() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let id = project(&mut storage, Tier::Free);
        let llm = StubLlm::replying("{\"logline\": \"A keeper hides a smuggler\"}");

        let mut workflow = Workflow::new(&mut storage, Some(&llm), "alice");
        let outcome = workflow
            .generate_phase(&id, Phase::Summary, Some("storm at sea"))
            .await
            .unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.revision, 1);
        assert!(llm.prompts()[0].contains("storm at sea"));
        assert!(llm.prompts()[0].contains("thriller"));
        drop(workflow);

        let used = storage
            .count_usage("alice", &paywall::current_period(), &[Feature::SummaryGeneration])
            .unwrap();
        assert_eq!(used, 1);
    }

    #[tokio::test]
    async fn test_generate_requires_upstream_and_reached_phase() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let id = project(&mut storage, Tier::Pro);
        let llm = StubLlm::replying("{}");

        let mut workflow = Workflow::new(&mut storage, Some(&llm), "alice");
        let err = workflow.generate_phase(&id, Phase::Scenes, None).await.unwrap_err();
        assert!(matches!(err, Error::PhaseLocked { .. }));

        workflow
            .set_phase_content(&id, Phase::Summary, json!({"logline": "x"}))
            .await
            .unwrap();
        workflow.advance(&id).unwrap();
        workflow.storage.conn().execute("DELETE FROM phase_content", []).unwrap();

        let err = workflow.generate_phase(&id, Phase::Scenes, None).await.unwrap_err();
        assert!(matches!(err, Error::PhaseEmpty { ref phase } if phase == "summary"));
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_beats_generation_is_paywalled() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let id = project(&mut storage, Tier::Free);
        let llm = StubLlm::replying("{}");

        let mut workflow = Workflow::new(&mut storage, Some(&llm), "alice");
        let err = workflow.generate_phase(&id, Phase::Beats, None).await.unwrap_err();
        assert!(matches!(err, Error::FeatureLocked { .. }));
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_free_tier_edits_do_not_propagate() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let id = project(&mut storage, Tier::Free);
        let llm = StubLlm::replying("{\"scenes\": []}");

        let mut workflow = Workflow::new(&mut storage, Some(&llm), "alice");
        workflow
            .set_phase_content(&id, Phase::Summary, json!({"logline": "one"}))
            .await
            .unwrap();
        workflow.advance(&id).unwrap();
        workflow
            .set_phase_content(&id, Phase::Scenes, json!({"scenes": [{"title": "Dock"}]}))
            .await
            .unwrap();

        let outcome = workflow
            .set_phase_content(&id, Phase::Summary, json!({"logline": "two"}))
            .await
            .unwrap();
        assert!(outcome.changed);
        assert!(outcome.changes.is_empty());
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_pro_tier_edit_proposes_and_meters() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let id = project(&mut storage, Tier::Pro);
        let llm = StubLlm::replying("{\"scenes\": [{\"title\": \"Cliff\"}]}");

        let settings = WorkflowSettings {
            auto_apply: true,
            ..WorkflowSettings::default()
        };
        let mut workflow = Workflow::new(&mut storage, Some(&llm), "alice").with_settings(settings);
        workflow
            .set_phase_content(&id, Phase::Summary, json!({"logline": "one"}))
            .await
            .unwrap();
        workflow.advance(&id).unwrap();
        workflow
            .set_phase_content(&id, Phase::Scenes, json!({"scenes": [{"title": "Dock"}]}))
            .await
            .unwrap();

        let outcome = workflow
            .set_phase_content(&id, Phase::Summary, json!({"logline": "two"}))
            .await
            .unwrap();
        assert_eq!(outcome.changes.len(), 1);
        // Auto-apply needs the studio tier.
        assert_eq!(outcome.changes[0].status, ChangeStatus::Pending);
        drop(workflow);

        let used = storage
            .count_usage("alice", &paywall::current_period(), &[Feature::LivingStory])
            .unwrap();
        assert_eq!(used, 1);
    }

    #[tokio::test]
    async fn test_studio_tier_auto_applies() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let id = project(&mut storage, Tier::Studio);
        let llm = StubLlm::replying("{\"scenes\": [{\"title\": \"Cliff\"}]}");

        let settings = WorkflowSettings {
            auto_apply: true,
            ..WorkflowSettings::default()
        };
        let mut workflow = Workflow::new(&mut storage, Some(&llm), "alice").with_settings(settings);
        workflow
            .set_phase_content(&id, Phase::Summary, json!({"logline": "one"}))
            .await
            .unwrap();
        workflow.advance(&id).unwrap();
        workflow
            .set_phase_content(&id, Phase::Scenes, json!({"scenes": [{"title": "Dock"}]}))
            .await
            .unwrap();

        let outcome = workflow
            .set_phase_content(&id, Phase::Summary, json!({"logline": "two"}))
            .await
            .unwrap();
        assert_eq!(outcome.changes.len(), 1);
        assert_eq!(outcome.changes[0].status, ChangeStatus::Applied);
        drop(workflow);

        let scenes = storage.get_phase_content(&id, Phase::Scenes).unwrap().unwrap();
        assert_eq!(scenes.revision, 2);
        assert_eq!(scenes.content["scenes"][0]["title"], "Cliff");
        assert!(storage
            .list_changes(&id, Some(ChangeStatus::Pending), None, 10)
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_set_locked_phase_fails() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let id = project(&mut storage, Tier::Pro);

        let mut workflow = Workflow::<StubLlm>::new(&mut storage, None, "alice");
        let err = workflow
            .set_phase_content(&id, Phase::Beats, json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PhaseLocked { .. }));
    }

    #[tokio::test]
    async fn test_advance_rules() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let id = project(&mut storage, Tier::Pro);

        let mut workflow = Workflow::<StubLlm>::new(&mut storage, None, "alice");
        let err = workflow.advance(&id).unwrap_err();
        assert!(matches!(err, Error::PhaseEmpty { .. }));

        for (phase, content) in [
            (Phase::Summary, json!({"logline": "x"})),
            (Phase::Scenes, json!({"scenes": []})),
            (Phase::Beats, json!({"beats": []})),
        ] {
            workflow.set_phase_content(&id, phase, content).await.unwrap();
            workflow.advance(&id).unwrap();
        }

        let project = workflow.storage.require_project(&id).unwrap();
        assert_eq!(project.current_phase, Phase::Export);
        let err = workflow.advance(&id).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_generation_feature_mapping() {
        assert_eq!(generation_feature(Phase::Beats).unwrap(), Feature::BeatGeneration);
        assert!(generation_feature(Phase::Export).is_err());
    }
}
