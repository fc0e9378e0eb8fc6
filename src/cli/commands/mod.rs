//! Command implementations.

pub mod bible;
pub mod change;
pub mod completions;
pub mod events;
pub mod export;
pub mod init;
pub mod phase;
pub mod plan;
pub mod project;
pub mod transcript;
pub mod version;

use std::future::Future;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::{default_actor, resolve_auto_apply, resolve_db_path, resolve_llm_settings};
use crate::error::{Error, Result};
use crate::llm::{BoxedLlm, CompletionRequest, create_llm_provider};
use crate::storage::SqliteStorage;
use crate::workflow::WorkflowSettings;

/// Open the database, failing with `NotInitialized` if it doesn't exist.
pub(crate) fn open_storage(db_path: Option<&PathBuf>) -> Result<SqliteStorage> {
    let db_path = resolve_db_path(db_path.map(PathBuf::as_path)).ok_or(Error::NotInitialized)?;
    if !db_path.exists() {
        return Err(Error::NotInitialized);
    }
    SqliteStorage::open(&db_path)
}

pub(crate) fn resolve_actor(actor: Option<&str>) -> String {
    actor
        .filter(|a| !a.trim().is_empty())
        .map_or_else(default_actor, String::from)
}

pub(crate) fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ts)
        .map_or_else(|| ts.to_string(), |dt| dt.format("%Y-%m-%d %H:%M").to_string())
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run a future on a fresh runtime.
pub(crate) fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))?;
    Ok(rt.block_on(future))
}

/// Detect the configured LLM provider, if any.
pub(crate) async fn load_provider() -> Result<Option<BoxedLlm>> {
    let settings = resolve_llm_settings()?;
    Ok(create_llm_provider(&settings).await)
}

/// Workflow switches from config.
pub(crate) fn workflow_settings() -> Result<WorkflowSettings> {
    let max_tokens = resolve_llm_settings()?
        .max_tokens
        .unwrap_or(CompletionRequest::DEFAULT_MAX_TOKENS);
    Ok(WorkflowSettings {
        auto_apply: resolve_auto_apply()?,
        max_tokens,
    })
}

/// Read a text file, or stdin for `-`.
pub(crate) fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        return Ok(buf);
    }
    Ok(std::fs::read_to_string(path)?)
}

/// Shorten long text for one-line display.
pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{cut}…")
}
