//! Production bible commands.
//!
//! - `muse bible add <project> <title> --file` - Upload and extract rules
//! - `muse bible list <project>` / `rules <project>` - Inspect
//! - `muse bible validate <project> <phase>` - Check content against rules
//! - `muse bible remove <doc>` - Remove a document and its rules

use super::{format_timestamp, open_storage, print_json, read_input, resolve_actor, truncate};
use crate::bible::{extract_rules, validate};
use crate::cli::BibleCommands;
use crate::error::{Error, Result};
use crate::model::{BibleDocument, BibleRule, Feature, Phase};
use crate::paywall::Entitlements;
use crate::storage::SqliteStorage;
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct DocumentOutput {
    id: String,
    project_id: String,
    title: String,
    rules: usize,
    created_at: String,
}

/// Execute a bible command.
pub fn execute(
    command: &BibleCommands,
    db_path: Option<&PathBuf>,
    actor: Option<&str>,
    json: bool,
) -> Result<()> {
    let mut storage = open_storage(db_path)?;
    let actor = resolve_actor(actor);
    Entitlements::load(&storage, &actor)?.require(Feature::ProductionBible)?;

    match command {
        BibleCommands::Add {
            project,
            title,
            file,
        } => execute_add(&mut storage, project, title, file, &actor, json),
        BibleCommands::List { project } => execute_list(&storage, project, json),
        BibleCommands::Rules { project } => {
            storage.require_project(project)?;
            print_rules(&storage.list_bible_rules(project)?, json)
        }
        BibleCommands::Validate { project, phase } => {
            execute_validate(&storage, project, Phase::parse(phase)?, json)
        }
        BibleCommands::Remove { id } => execute_remove(&mut storage, id, &actor, json),
    }
}

fn execute_add(
    storage: &mut SqliteStorage,
    project_id: &str,
    title: &str,
    file: &Path,
    actor: &str,
    json: bool,
) -> Result<()> {
    storage.require_project(project_id)?;
    let body = read_input(file)?;
    if body.trim().is_empty() {
        return Err(Error::InvalidArgument("bible document is empty".to_string()));
    }

    let document = BibleDocument::new(project_id, title, &body);
    let rules: Vec<BibleRule> = extract_rules(&body)
        .into_iter()
        .map(|r| r.into_rule(project_id, &document.id))
        .collect();
    storage.add_bible_document(&document, &rules, actor)?;

    if crate::is_silent() {
        println!("{}", document.id);
    } else if json {
        print_json(&serde_json::json!({ "document": document_output(&document, rules.len()), "rules": rules }))?;
    } else {
        println!("Added bible document: {}", document.title.bold());
        println!("  ID: {}", document.id);
        println!("  Rules extracted: {}", rules.len());
    }
    Ok(())
}

fn document_output(doc: &BibleDocument, rules: usize) -> DocumentOutput {
    DocumentOutput {
        id: doc.id.clone(),
        project_id: doc.project_id.clone(),
        title: doc.title.clone(),
        rules,
        created_at: format_timestamp(doc.created_at),
    }
}

fn execute_list(storage: &SqliteStorage, project_id: &str, json: bool) -> Result<()> {
    storage.require_project(project_id)?;
    let documents = storage.list_bible_documents(project_id)?;
    let rules = storage.list_bible_rules(project_id)?;
    let outputs: Vec<DocumentOutput> = documents
        .iter()
        .map(|d| document_output(d, rules.iter().filter(|r| r.document_id == d.id).count()))
        .collect();

    if json {
        return print_json(&serde_json::json!({ "count": outputs.len(), "documents": outputs }));
    }
    if outputs.is_empty() {
        println!("No bible documents.");
        return Ok(());
    }
    for doc in outputs {
        println!("{}  {} ({} rules, {})", doc.id, doc.title, doc.rules, doc.created_at);
    }
    Ok(())
}

fn print_rules(rules: &[BibleRule], json: bool) -> Result<()> {
    if json {
        return print_json(&serde_json::json!({ "count": rules.len(), "rules": rules }));
    }
    if rules.is_empty() {
        println!("No rules extracted.");
        return Ok(());
    }
    for (i, rule) in rules.iter().enumerate() {
        let detail = match (&rule.term, rule.limit) {
            (Some(term), _) => format!(" [{term}]"),
            (None, Some(limit)) => format!(" [{limit}]"),
            (None, None) => String::new(),
        };
        println!(
            "{:>3}. {:<10} {:<9} {}{}",
            i + 1,
            rule.kind.as_str(),
            rule.category.as_str(),
            truncate(&rule.text, 70),
            detail.dimmed()
        );
    }
    Ok(())
}

fn execute_validate(storage: &SqliteStorage, project_id: &str, phase: Phase, json: bool) -> Result<()> {
    storage.require_project(project_id)?;
    let content = storage
        .get_phase_content(project_id, phase)?
        .ok_or_else(|| Error::PhaseEmpty {
            phase: phase.to_string(),
        })?;
    let report = validate(&storage.list_bible_rules(project_id)?, &content.content);

    if json {
        return print_json(&report);
    }

    let score = format!("{}/100", report.score);
    let score = if report.is_clean() { score.green() } else { score.red() };
    println!(
        "{} r{}: {score} ({} of {} checks passed)",
        phase.as_str().bold(),
        content.revision,
        report.passed,
        report.checked
    );
    for violation in &report.violations {
        println!("  {} {} ({})", "✗".red(), violation.detail, truncate(&violation.rule, 50));
    }
    for advisory in &report.advisories {
        println!("  {} {}", "•".yellow(), truncate(advisory, 70));
    }
    Ok(())
}

fn execute_remove(storage: &mut SqliteStorage, id: &str, actor: &str, json: bool) -> Result<()> {
    storage
        .get_bible_document(id)?
        .ok_or_else(|| Error::DocumentNotFound { id: id.to_string() })?;
    storage.remove_bible_document(id, actor)?;

    if json {
        print_json(&serde_json::json!({ "id": id, "removed": true }))?;
    } else if !crate::is_silent() {
        println!("Removed bible document {id}");
    }
    Ok(())
}
