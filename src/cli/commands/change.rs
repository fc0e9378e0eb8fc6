//! Living Story change commands.
//!
//! - `muse change list <project>` - Pending proposals
//! - `muse change history <project>` - Full change log
//! - `muse change show <id>` - Diff and proposed content
//! - `muse change approve <id>` / `reject <id>` - Decide a proposal

use super::{format_timestamp, open_storage, print_json, resolve_actor, truncate};
use crate::cli::ChangeCommands;
use crate::error::{Error, Result};
use crate::living::LivingStoryEngine;
use crate::llm::BoxedLlm;
use crate::model::{ChangeKind, ChangeRecord, ChangeStatus, Impact, Phase};
use crate::storage::SqliteStorage;
use colored::Colorize;
use std::path::PathBuf;

/// Execute a change command.
pub fn execute(
    command: &ChangeCommands,
    db_path: Option<&PathBuf>,
    actor: Option<&str>,
    json: bool,
) -> Result<()> {
    let mut storage = open_storage(db_path)?;
    let actor = resolve_actor(actor);

    match command {
        ChangeCommands::List { project } => {
            storage.require_project(project)?;
            let changes = engine(&mut storage).pending(project)?;
            print_changes(&changes, json, "No pending changes.")
        }
        ChangeCommands::History {
            project,
            phase,
            limit,
        } => {
            storage.require_project(project)?;
            let phase = phase.as_deref().map(Phase::parse).transpose()?;
            let changes = engine(&mut storage).history(project, phase, *limit)?;
            print_changes(&changes, json, "No changes recorded.")
        }
        ChangeCommands::Show { id } => execute_show(&storage, id, json),
        ChangeCommands::Approve { id } => {
            let change = engine(&mut storage).approve(id, &actor)?;
            print_decision(&change, json)
        }
        ChangeCommands::Reject { id } => {
            let change = engine(&mut storage).reject(id, &actor)?;
            print_decision(&change, json)
        }
    }
}

/// Deciding and listing changes never calls the provider.
fn engine(storage: &mut SqliteStorage) -> LivingStoryEngine<'_, BoxedLlm> {
    LivingStoryEngine::new(storage, None)
}

fn status_label(status: ChangeStatus) -> colored::ColoredString {
    match status {
        ChangeStatus::Pending => "pending".yellow(),
        ChangeStatus::Applied => "applied".green(),
        ChangeStatus::Rejected => "rejected".normal(),
        ChangeStatus::Superseded => "superseded".dimmed(),
        ChangeStatus::Failed => "failed".red(),
    }
}

fn print_changes(changes: &[ChangeRecord], json: bool, empty: &str) -> Result<()> {
    if json {
        return print_json(&serde_json::json!({ "count": changes.len(), "changes": changes }));
    }
    if changes.is_empty() {
        println!("{empty}");
        return Ok(());
    }

    println!(
        "{:<16} {:<17} {:<6} {:<11} CREATED",
        "ID", "ROUTE", "IMPACT", "STATUS"
    );
    for change in changes {
        let route = format!("{} -> {}", change.source_phase, change.target_phase);
        let impact = match change.impact {
            Impact::Major => "major".red().to_string(),
            Impact::Minor => "minor".to_string(),
        };
        println!(
            "{:<16} {:<17} {:<6} {:<11} {}",
            change.id,
            route,
            impact,
            status_label(change.status),
            format_timestamp(change.created_at)
        );
    }
    Ok(())
}

fn execute_show(storage: &SqliteStorage, id: &str, json: bool) -> Result<()> {
    let change = storage
        .get_change(id)?
        .ok_or_else(|| Error::ChangeNotFound { id: id.to_string() })?;

    if json {
        return print_json(&change);
    }

    println!("{} {}", change.id.bold(), status_label(change.status));
    println!(
        "  {} r{} -> {} (base r{})",
        change.source_phase, change.source_revision, change.target_phase, change.base_revision
    );
    println!("  Impact: {}", change.impact.as_str());
    println!("  Actor:  {}", change.actor);
    println!("  Created: {}", format_timestamp(change.created_at));
    if let Some(decided) = change.decided_at {
        println!("  Decided: {}", format_timestamp(decided));
    }
    if let Some(marker) = &change.superseded_by {
        println!("  Superseded by: {marker}");
    }
    if let Some(error) = &change.error {
        println!("  Error: {}", error.red());
    }

    if !change.field_changes.is_empty() {
        println!();
        println!("Source changes:");
        for field in &change.field_changes {
            let sign = match field.kind {
                ChangeKind::Added => "+".green(),
                ChangeKind::Removed => "-".red(),
                ChangeKind::Modified => "~".yellow(),
            };
            let detail = field
                .new
                .as_ref()
                .or(field.old.as_ref())
                .map(|v| truncate(&v.to_string(), 60))
                .unwrap_or_default();
            println!("  {sign} {} {}", field.path, detail.dimmed());
        }
    }

    if let Some(proposal) = &change.proposed_content {
        println!();
        println!("Proposed {}:", change.target_phase);
        println!("{}", serde_json::to_string_pretty(proposal)?);
    }
    Ok(())
}

fn print_decision(change: &ChangeRecord, json: bool) -> Result<()> {
    if crate::is_silent() {
        println!("{}", change.id);
    } else if json {
        print_json(change)?;
    } else {
        println!(
            "{} {} ({} -> {})",
            change.id,
            status_label(change.status),
            change.source_phase,
            change.target_phase
        );
    }
    Ok(())
}
