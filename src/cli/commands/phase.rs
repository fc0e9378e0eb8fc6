//! Phase commands.
//!
//! - `muse phase show <project> <phase>` - Print phase content
//! - `muse phase set <project> <phase> --file|--value` - Write content
//! - `muse phase generate <project> <phase>` - Generate with the LLM
//!
//! Writes go through the Living Story engine; dependent phases get change
//! proposals when the tier includes it.

use super::{block_on, format_timestamp, load_provider, open_storage, print_json, read_input, resolve_actor, workflow_settings};
use crate::cli::{PhaseCommands, PhaseSetArgs};
use crate::error::{Error, Result};
use crate::living::EditOutcome;
use crate::model::{ChangeStatus, Feature, Phase};
use crate::paywall::Entitlements;
use crate::storage::SqliteStorage;
use crate::workflow::{Workflow, generation_feature};
use colored::Colorize;
use std::path::PathBuf;

/// Execute a phase command.
pub fn execute(
    command: &PhaseCommands,
    db_path: Option<&PathBuf>,
    actor: Option<&str>,
    json: bool,
) -> Result<()> {
    let mut storage = open_storage(db_path)?;
    let actor = resolve_actor(actor);

    match command {
        PhaseCommands::Show { project, phase } => {
            execute_show(&storage, project, Phase::parse(phase)?, json)
        }
        PhaseCommands::Set(args) => execute_set(&mut storage, args, &actor, json),
        PhaseCommands::Generate {
            project,
            phase,
            idea,
        } => execute_generate(&mut storage, project, Phase::parse(phase)?, idea.as_deref(), &actor, json),
    }
}

fn execute_show(storage: &SqliteStorage, project_id: &str, phase: Phase, json: bool) -> Result<()> {
    storage.require_project(project_id)?;
    let content = storage
        .get_phase_content(project_id, phase)?
        .ok_or_else(|| Error::PhaseEmpty {
            phase: phase.to_string(),
        })?;

    if json {
        return print_json(&content);
    }

    println!(
        "{} r{} ({})",
        phase.as_str().bold(),
        content.revision,
        format_timestamp(content.updated_at)
    );
    println!("{}", serde_json::to_string_pretty(&content.content)?);
    Ok(())
}

fn execute_set(storage: &mut SqliteStorage, args: &PhaseSetArgs, actor: &str, json: bool) -> Result<()> {
    let phase = Phase::parse(&args.phase)?;
    let raw = match (&args.value, &args.file) {
        (Some(value), _) => value.clone(),
        (None, Some(file)) => read_input(file)?,
        (None, None) => return Err(Error::RequiredField("--file or --value".to_string())),
    };
    let content: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|e| Error::InvalidArgument(format!("phase content is not valid JSON: {e}")))?;

    let outcome = block_on(set_async(storage, &args.project, phase, content, actor))??;
    print_outcome(&outcome, json)
}

async fn set_async(
    storage: &mut SqliteStorage,
    project_id: &str,
    phase: Phase,
    content: serde_json::Value,
    actor: &str,
) -> Result<EditOutcome> {
    let settings = workflow_settings()?;
    // Only probe for a provider when the edit can propagate.
    let provider = if Entitlements::load(storage, actor)?.allows(Feature::LivingStory) {
        load_provider().await?
    } else {
        None
    };
    Workflow::new(storage, provider.as_ref(), actor)
        .with_settings(settings)
        .set_phase_content(project_id, phase, content)
        .await
}

fn execute_generate(
    storage: &mut SqliteStorage,
    project_id: &str,
    phase: Phase,
    idea: Option<&str>,
    actor: &str,
    json: bool,
) -> Result<()> {
    let outcome = block_on(generate_async(storage, project_id, phase, idea, actor))??;
    print_outcome(&outcome, json)
}

async fn generate_async(
    storage: &mut SqliteStorage,
    project_id: &str,
    phase: Phase,
    idea: Option<&str>,
    actor: &str,
) -> Result<EditOutcome> {
    let settings = workflow_settings()?;
    Entitlements::load(storage, actor)?.require_generation(generation_feature(phase)?)?;
    let provider = load_provider().await?;
    Workflow::new(storage, provider.as_ref(), actor)
        .with_settings(settings)
        .generate_phase(project_id, phase, idea)
        .await
}

pub(crate) fn print_outcome(outcome: &EditOutcome, json: bool) -> Result<()> {
    if crate::is_silent() {
        println!("{}", outcome.revision);
        return Ok(());
    }
    if json {
        return print_json(outcome);
    }

    if !outcome.changed {
        println!("{} unchanged (revision {})", outcome.phase, outcome.revision);
        return Ok(());
    }

    let impact = outcome.impact.map_or("", |i| i.as_str());
    println!(
        "Updated {} to revision {} ({} field change(s), {} impact)",
        outcome.phase.as_str().bold(),
        outcome.revision,
        outcome.field_changes.len(),
        impact
    );
    if !outcome.superseded.is_empty() {
        println!("  Superseded {} older proposal(s)", outcome.superseded.len());
    }
    for change in &outcome.changes {
        let status = match change.status {
            ChangeStatus::Pending => "pending".yellow(),
            ChangeStatus::Applied => "applied".green(),
            ChangeStatus::Failed => "failed".red(),
            other => other.as_str().normal(),
        };
        print!("  {} -> {}: {status}", change.id, change.target_phase);
        match &change.error {
            Some(error) => println!(" ({error})"),
            None => println!(),
        }
    }
    if !outcome.skipped.is_empty() {
        let skipped: Vec<&str> = outcome.skipped.iter().map(Phase::as_str).collect();
        println!("  Not yet reached: {}", skipped.join(", ").dimmed());
    }
    if outcome.changes.iter().any(|c| c.status == ChangeStatus::Pending) {
        println!();
        println!("Review with: muse change list {}", outcome.project_id);
    }
    Ok(())
}
