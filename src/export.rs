//! Final export of a project.
//!
//! The rendered document is written atomically, then its metadata is
//! recorded as the `export` phase so that later upstream edits flag the
//! export as stale.

use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Value, json};
use tracing::info;

use crate::error::{Error, Result};
use crate::living::content_hash;
use crate::llm::BoxedLlm;
use crate::model::{Feature, Phase, PhaseContent, StoryProject};
use crate::paywall::Entitlements;
use crate::storage::SqliteStorage;
use crate::validate::normalize_format;
use crate::workflow::Workflow;

/// Output format for `muse export`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Markdown,
    Json,
}

impl ExportFormat {
    /// Parse a format name or synonym (`md`, `text`).
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for unknown formats, with the closest
    /// match when one is near.
    pub fn parse(s: &str) -> Result<Self> {
        let canonical = normalize_format(s).map_err(|(input, suggestion)| {
            let mut msg = format!("unknown export format '{input}'");
            if let Some(s) = suggestion {
                msg.push_str(&format!(" (did you mean {s}?)"));
            }
            Error::InvalidArgument(msg)
        })?;
        Ok(if canonical == "json" { Self::Json } else { Self::Markdown })
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Json => "json",
        }
    }

    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Json => "json",
        }
    }
}

/// What an export wrote.
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub project_id: String,
    pub path: PathBuf,
    pub format: ExportFormat,
    pub bytes: usize,
    pub content_hash: String,
    /// Revision of the export phase after recording this export.
    pub revision: i64,
}

/// Render a project as Markdown.
#[must_use]
pub fn render_markdown(project: &StoryProject, phases: &[PhaseContent]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}\n", project.title);
    if let Some(genre) = &project.genre {
        let _ = writeln!(out, "_Genre: {genre}_\n");
    }

    for phase in phases.iter().filter(|p| p.phase != Phase::Export) {
        let _ = writeln!(out, "## {}\n", title_case(phase.phase.as_str()));
        write_markdown_value(&mut out, &phase.content, 0);
        out.push('\n');
    }
    out.trim_end().to_string() + "\n"
}

fn write_markdown_value(out: &mut String, value: &Value, depth: usize) {
    let indent = "  ".repeat(depth);
    match value {
        Value::Object(map) => {
            for (key, item) in map {
                if is_scalar(item) {
                    let _ = writeln!(out, "{indent}- **{}:** {}", title_case(key), scalar_text(item));
                } else {
                    let _ = writeln!(out, "{indent}- **{}:**", title_case(key));
                    write_markdown_value(out, item, depth + 1);
                }
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                if is_scalar(item) {
                    let _ = writeln!(out, "{indent}{}. {}", i + 1, scalar_text(item));
                } else {
                    let _ = writeln!(out, "{indent}{}.", i + 1);
                    write_markdown_value(out, item, depth + 1);
                }
            }
        }
        scalar => {
            let _ = writeln!(out, "{indent}{}", scalar_text(scalar));
        }
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Object(_) | Value::Array(_))
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn title_case(key: &str) -> String {
    let spaced = key.replace('_', " ");
    let mut chars = spaced.chars();
    chars
        .next()
        .map_or_else(String::new, |c| c.to_uppercase().collect::<String>() + chars.as_str())
}

/// Render a project as a JSON document.
///
/// # Errors
///
/// Returns `Json` if serialization fails.
pub fn render_json(project: &StoryProject, phases: &[PhaseContent]) -> Result<String> {
    let mut body = serde_json::Map::new();
    for phase in phases.iter().filter(|p| p.phase != Phase::Export) {
        body.insert(
            phase.phase.as_str().to_string(),
            json!({ "revision": phase.revision, "content": phase.content }),
        );
    }
    let document = json!({
        "project": {
            "id": project.id,
            "title": project.title,
            "genre": project.genre,
        },
        "phases": body,
    });
    Ok(serde_json::to_string_pretty(&document)? + "\n")
}

/// Write content to a file atomically: temp file, fsync, rename.
///
/// If any step fails, the original file (if any) remains untouched.
///
/// # Errors
///
/// Returns an error if any file operation fails.
pub fn atomic_write(path: &Path, content: &str) -> Result<()> {
    let mut temp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    {
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(content.as_bytes())?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    fs::rename(&temp_path, path)?;
    Ok(())
}

/// File name derived from the project title, e.g. `the-lighthouse.md`.
#[must_use]
pub fn default_file_name(project: &StoryProject, format: ExportFormat) -> String {
    let mut slug = String::new();
    for c in project.title.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    let stem = if slug.is_empty() { project.id.as_str() } else { slug };
    format!("{stem}.{}", format.extension())
}

/// Export a project and record the export phase.
///
/// # Errors
///
/// Returns `FeatureLocked` without `final_export`, `PhaseLocked` before the
/// project reaches the export phase, or an I/O or storage error.
pub async fn export_project(
    storage: &mut SqliteStorage,
    project_id: &str,
    format: ExportFormat,
    output: Option<&Path>,
    actor: &str,
) -> Result<ExportReport> {
    Entitlements::load(storage, actor)?.require(Feature::FinalExport)?;

    let project = storage.require_project(project_id)?;
    if !project.has_reached(Phase::Export) {
        return Err(Error::PhaseLocked {
            phase: Phase::Export.to_string(),
            current: project.current_phase.to_string(),
        });
    }

    let phases = storage.list_phase_content(project_id)?;
    let document = match format {
        ExportFormat::Markdown => render_markdown(&project, &phases),
        ExportFormat::Json => render_json(&project, &phases)?,
    };

    let path = output.map_or_else(|| PathBuf::from(default_file_name(&project, format)), Path::to_path_buf);
    atomic_write(&path, &document)?;

    let hash = content_hash(&Value::String(document.clone()));
    let metadata = json!({
        "format": format.as_str(),
        "content_hash": hash,
        "exported_at": chrono::Utc::now().timestamp_millis(),
        "path": path.display().to_string(),
    });
    let outcome = Workflow::<BoxedLlm>::new(storage, None, actor)
        .set_phase_content(project_id, Phase::Export, metadata)
        .await?;
    storage.record_export(project_id, &path.display().to_string(), actor)?;

    info!(project_id, path = %path.display(), "Export written");
    Ok(ExportReport {
        project_id: project_id.to_string(),
        path,
        format,
        bytes: document.len(),
        content_hash: hash,
        revision: outcome.revision,
    })
}
