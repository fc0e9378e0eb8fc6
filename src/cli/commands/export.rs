//! Export command.

use super::{block_on, open_storage, print_json, resolve_actor};
use crate::cli::ExportArgs;
use crate::error::Result;
use crate::export::{ExportFormat, export_project};
use colored::Colorize;
use std::path::PathBuf;

/// Execute the export command.
pub fn execute(
    args: &ExportArgs,
    db_path: Option<&PathBuf>,
    actor: Option<&str>,
    json: bool,
) -> Result<()> {
    let mut storage = open_storage(db_path)?;
    let actor = resolve_actor(actor);
    let format = ExportFormat::parse(&args.format)?;

    let report = block_on(export_project(
        &mut storage,
        &args.project,
        format,
        args.output.as_deref(),
        &actor,
    ))??;

    if crate::is_silent() {
        println!("{}", report.path.display());
    } else if json {
        print_json(&report)?;
    } else {
        println!(
            "{} Exported {} ({} bytes) to {}",
            "✓".green(),
            report.format.as_str(),
            report.bytes,
            report.path.display().to_string().bold()
        );
    }
    Ok(())
}
