//! Transcript commands.

use super::{format_timestamp, open_storage, print_json, read_input, resolve_actor};
use crate::cli::TranscriptCommands;
use crate::error::{Error, Result};
use crate::model::{Feature, Transcript};
use crate::paywall::Entitlements;
use crate::transcript::analyze;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct TranscriptRow {
    id: String,
    title: String,
    words: usize,
    created_at: String,
}

impl From<&Transcript> for TranscriptRow {
    fn from(t: &Transcript) -> Self {
        Self {
            id: t.id.clone(),
            title: t.title.clone(),
            words: t.body.split_whitespace().count(),
            created_at: format_timestamp(t.created_at),
        }
    }
}

/// Execute a transcript command.
pub fn execute(
    command: &TranscriptCommands,
    db_path: Option<&PathBuf>,
    actor: Option<&str>,
    json: bool,
) -> Result<()> {
    let mut storage = open_storage(db_path)?;
    let actor = resolve_actor(actor);

    match command {
        TranscriptCommands::Add {
            project,
            title,
            file,
        } => {
            storage.require_project(project)?;
            let body = read_input(file)?;
            if body.trim().is_empty() {
                return Err(Error::InvalidArgument("transcript is empty".to_string()));
            }
            let transcript = Transcript::new(project, title, &body);
            storage.add_transcript(&transcript, &actor)?;

            if crate::is_silent() {
                println!("{}", transcript.id);
            } else if json {
                print_json(&TranscriptRow::from(&transcript))?;
            } else {
                println!("Added transcript: {}", transcript.title.bold());
                println!("  ID: {}", transcript.id);
            }
            Ok(())
        }
        TranscriptCommands::List { project } => {
            storage.require_project(project)?;
            let rows: Vec<TranscriptRow> = storage
                .list_transcripts(project)?
                .iter()
                .map(TranscriptRow::from)
                .collect();
            if json {
                return print_json(&serde_json::json!({ "count": rows.len(), "transcripts": rows }));
            }
            if rows.is_empty() {
                println!("No transcripts.");
            }
            for row in rows {
                println!("{}  {} ({} words, {})", row.id, row.title, row.words, row.created_at);
            }
            Ok(())
        }
        TranscriptCommands::Analyze { id } => {
            Entitlements::load(&storage, &actor)?.require(Feature::TranscriptAnalysis)?;
            let transcript = storage
                .get_transcript(id)?
                .ok_or_else(|| Error::TranscriptNotFound { id: id.clone() })?;
            let analysis = analyze(&transcript.body);

            if json {
                return print_json(&serde_json::json!({ "id": transcript.id, "analysis": analysis }));
            }

            println!("{}", transcript.title.bold());
            println!(
                "  {} lines, {} words, ~{} min",
                analysis.total_lines, analysis.total_words, analysis.estimated_minutes
            );
            println!(
                "  {} dialogue turns, {} narration lines, {} stage directions",
                analysis.dialogue_turns, analysis.narration_lines, analysis.stage_directions
            );
            if !analysis.speakers.is_empty() {
                println!();
                println!("{}", "Speakers".bold());
                for s in &analysis.speakers {
                    println!("  {:<20} {:>4} turns {:>6} words", s.name, s.turns, s.words);
                }
            }
            if !analysis.character_candidates.is_empty() {
                println!();
                println!("{}", "Mentioned characters".bold());
                for c in &analysis.character_candidates {
                    println!("  {:<20} {:>4} mentions", c.name, c.mentions);
                }
            }
            Ok(())
        }
    }
}
