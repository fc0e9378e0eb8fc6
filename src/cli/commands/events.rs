//! Audit trail command.

use super::{format_timestamp, open_storage, print_json};
use crate::error::Result;
use colored::Colorize;
use std::path::PathBuf;

/// Execute the events command.
pub fn execute(
    entity: Option<(&str, &str)>,
    limit: u32,
    db_path: Option<&PathBuf>,
    json: bool,
) -> Result<()> {
    let storage = open_storage(db_path)?;
    let events = match entity {
        Some((entity_type, entity_id)) => storage.get_events(entity_type, entity_id, limit)?,
        None => storage.recent_events(limit)?,
    };

    if json {
        return print_json(&serde_json::json!({ "count": events.len(), "events": events }));
    }
    if events.is_empty() {
        println!("No events.");
        return Ok(());
    }
    for event in &events {
        let detail = event
            .comment
            .as_deref()
            .or(event.new_value.as_deref())
            .unwrap_or("");
        println!(
            "{}  {:<20} {:<24} {:<12} {}",
            format_timestamp(event.created_at).dimmed(),
            event.event_type.as_str(),
            event.entity_id,
            event.actor,
            detail
        );
    }
    Ok(())
}
