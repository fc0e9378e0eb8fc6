//! Project management commands.
//!
//! - `muse project create <title>` - Create a new project
//! - `muse project list` - List your projects
//! - `muse project show <id>` - Show project details
//! - `muse project advance <id>` - Move to the next phase
//! - `muse project delete <id> --force` - Delete a project

use super::{format_timestamp, open_storage, print_json, resolve_actor};
use crate::cli::ProjectCommands;
use crate::error::{Error, Result};
use crate::llm::BoxedLlm;
use crate::model::{Phase, StoryProject};
use crate::storage::SqliteStorage;
use crate::workflow::{self, Workflow};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct ProjectOutput {
    id: String,
    title: String,
    genre: Option<String>,
    owner: String,
    current_phase: Phase,
    created_at: String,
    updated_at: String,
}

impl From<StoryProject> for ProjectOutput {
    fn from(p: StoryProject) -> Self {
        Self {
            id: p.id,
            title: p.title,
            genre: p.genre,
            owner: p.owner,
            current_phase: p.current_phase,
            created_at: format_timestamp(p.created_at),
            updated_at: format_timestamp(p.updated_at),
        }
    }
}

#[derive(Serialize)]
struct PhaseRow {
    phase: Phase,
    revision: i64,
    updated_at: String,
}

#[derive(Serialize)]
struct ProjectDetail {
    #[serde(flatten)]
    project: ProjectOutput,
    phases: Vec<PhaseRow>,
    pending_changes: usize,
}

/// Execute a project command.
pub fn execute(
    command: &ProjectCommands,
    db_path: Option<&PathBuf>,
    actor: Option<&str>,
    json: bool,
) -> Result<()> {
    let mut storage = open_storage(db_path)?;
    let actor = resolve_actor(actor);

    match command {
        ProjectCommands::Create { title, genre } => {
            execute_create(&mut storage, title, genre.as_deref(), &actor, json)
        }
        ProjectCommands::List { all, limit } => {
            let owner = if *all { None } else { Some(actor.as_str()) };
            execute_list(&storage, owner, *limit, json)
        }
        ProjectCommands::Show { id } => execute_show(&storage, id, json),
        ProjectCommands::Advance { id } => execute_advance(&mut storage, id, &actor, json),
        ProjectCommands::Delete { id, force } => execute_delete(&mut storage, id, *force, &actor, json),
    }
}

fn execute_create(
    storage: &mut SqliteStorage,
    title: &str,
    genre: Option<&str>,
    actor: &str,
    json: bool,
) -> Result<()> {
    let project = workflow::create_project(storage, title, genre, actor)?;

    if crate::is_silent() {
        println!("{}", project.id);
    } else if json {
        print_json(&ProjectOutput::from(project))?;
    } else {
        println!("Created project: {}", project.title.bold());
        println!("  ID: {}", project.id);
        println!("  Phase: {}", project.current_phase);
        println!();
        println!("Next: muse phase generate {} summary --idea \"...\"", project.id);
    }
    Ok(())
}

fn execute_list(storage: &SqliteStorage, owner: Option<&str>, limit: usize, json: bool) -> Result<()> {
    let projects = storage.list_projects(owner, limit)?;

    if json {
        let rows: Vec<serde_json::Value> = projects
            .into_iter()
            .map(|p| -> Result<serde_json::Value> {
                let mut value = serde_json::to_value(ProjectOutput::from(p.project))?;
                value["phases_written"] = p.phases_written.into();
                value["pending_changes"] = p.pending_changes.into();
                Ok(value)
            })
            .collect::<Result<_>>()?;
        return print_json(&serde_json::json!({ "count": rows.len(), "projects": rows }));
    }

    if projects.is_empty() {
        println!("No projects found.");
        println!("\nCreate one with: muse project create \"<title>\"");
        return Ok(());
    }

    println!("{:<18} {:<8} {:>6} {:>8}  TITLE", "ID", "PHASE", "PHASES", "PENDING");
    for p in projects {
        let pending = if p.pending_changes > 0 {
            p.pending_changes.to_string().yellow().to_string()
        } else {
            p.pending_changes.to_string()
        };
        println!(
            "{:<18} {:<8} {:>6} {:>8}  {}",
            p.project.id,
            p.project.current_phase.as_str(),
            p.phases_written,
            pending,
            p.project.title
        );
    }
    Ok(())
}

fn execute_show(storage: &SqliteStorage, id: &str, json: bool) -> Result<()> {
    let project = storage.require_project(id)?;
    let phases: Vec<PhaseRow> = storage
        .list_phase_content(id)?
        .into_iter()
        .map(|p| PhaseRow {
            phase: p.phase,
            revision: p.revision,
            updated_at: format_timestamp(p.updated_at),
        })
        .collect();
    let pending = storage
        .list_changes(id, Some(crate::model::ChangeStatus::Pending), None, 500)?
        .len();

    if json {
        return print_json(&ProjectDetail {
            project: ProjectOutput::from(project),
            phases,
            pending_changes: pending,
        });
    }

    println!("{}", project.title.bold());
    println!("  ID:     {}", project.id);
    println!("  Owner:  {}", project.owner);
    if let Some(genre) = &project.genre {
        println!("  Genre:  {genre}");
    }
    println!("  Phase:  {} ({}/4)", project.current_phase, project.current_phase.number());
    println!();
    for phase in Phase::ALL {
        let marker = if phase == project.current_phase { "▶" } else { " " };
        match phases.iter().find(|p| p.phase == phase) {
            Some(row) => println!("{marker} {:<8} r{} ({})", phase.as_str(), row.revision, row.updated_at),
            None => println!("{marker} {:<8} {}", phase.as_str(), "empty".dimmed()),
        }
    }
    if pending > 0 {
        println!();
        println!(
            "{} pending change(s): muse change list {}",
            pending.to_string().yellow(),
            project.id
        );
    }
    Ok(())
}

fn execute_advance(storage: &mut SqliteStorage, id: &str, actor: &str, json: bool) -> Result<()> {
    let project = Workflow::<BoxedLlm>::new(storage, None, actor).advance(id)?;

    if crate::is_silent() {
        println!("{}", project.current_phase);
    } else if json {
        print_json(&ProjectOutput::from(project))?;
    } else {
        println!(
            "Advanced {} to {} ({}/4)",
            project.title,
            project.current_phase.as_str().green(),
            project.current_phase.number()
        );
    }
    Ok(())
}

fn execute_delete(
    storage: &mut SqliteStorage,
    id: &str,
    force: bool,
    actor: &str,
    json: bool,
) -> Result<()> {
    let project = storage.require_project(id)?;
    if !force {
        return Err(Error::InvalidArgument(format!(
            "refusing to delete '{}' without --force",
            project.title
        )));
    }

    storage.delete_project(id, actor)?;

    if json {
        print_json(&serde_json::json!({ "id": id, "deleted": true }))?;
    } else if !crate::is_silent() {
        println!("Deleted project: {} ({id})", project.title);
    }
    Ok(())
}
