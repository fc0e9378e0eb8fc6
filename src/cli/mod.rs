//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// MUSE - AI-assisted story development with living-story consistency
#[derive(Parser, Debug)]
#[command(name = "muse", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: ~/.muse/data/muse.db)
    #[arg(long, global = true, env = "MUSE_DB")]
    pub db: Option<PathBuf>,

    /// Actor name for ownership, subscriptions and the audit trail
    #[arg(long, global = true, env = "MUSE_ACTOR")]
    pub actor: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Output only the ID (for scripting)
    #[arg(long, global = true)]
    pub silent: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the MUSE database
    Init {
        /// Overwrite an existing database
        #[arg(long)]
        force: bool,
    },

    /// Print version information
    Version,

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Story projects
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },

    /// Phase content (summary, scenes, beats, export)
    Phase {
        #[command(subcommand)]
        command: PhaseCommands,
    },

    /// Living Story change proposals
    Change {
        #[command(subcommand)]
        command: ChangeCommands,
    },

    /// Production bible documents and rules
    Bible {
        #[command(subcommand)]
        command: BibleCommands,
    },

    /// Transcripts
    Transcript {
        #[command(subcommand)]
        command: TranscriptCommands,
    },

    /// Subscription tier and usage
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },

    /// Export a project
    Export(ExportArgs),

    /// Audit history for an entity, or recent activity when none is given
    Events {
        /// Entity type (project, phase, change, bible_document, transcript, subscription, usage)
        #[arg(requires = "entity_id")]
        entity_type: Option<String>,

        /// Entity ID (phases use `<project>:<phase>`)
        entity_id: Option<String>,

        /// Maximum events to return
        #[arg(short, long, default_value = "50")]
        limit: u32,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

// ============================================================================
// Project Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// Create a new project
    Create {
        /// Working title
        title: String,

        /// Genre, passed to generation
        #[arg(short, long)]
        genre: Option<String>,
    },

    /// List your projects
    List {
        /// Include every owner's projects
        #[arg(long)]
        all: bool,

        /// Maximum projects to return
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Show project details and phase revisions
    Show {
        /// Project ID
        id: String,
    },

    /// Move the project to its next phase
    Advance {
        /// Project ID
        id: String,
    },

    /// Delete a project and everything attached to it
    Delete {
        /// Project ID
        id: String,

        /// Confirm deletion
        #[arg(short, long)]
        force: bool,
    },
}

// ============================================================================
// Phase Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum PhaseCommands {
    /// Show the content of a phase
    Show {
        /// Project ID
        project: String,

        /// Phase name or number (1-4)
        phase: String,
    },

    /// Write phase content from a file or inline JSON
    Set(PhaseSetArgs),

    /// Generate a phase with the configured LLM
    Generate {
        /// Project ID
        project: String,

        /// Phase name or number (1-3)
        phase: String,

        /// Seed idea for the summary
        #[arg(short, long)]
        idea: Option<String>,
    },
}

#[derive(Args, Debug)]
pub struct PhaseSetArgs {
    /// Project ID
    pub project: String,

    /// Phase name or number (1-4)
    pub phase: String,

    /// Read JSON content from a file (`-` for stdin)
    #[arg(short, long, conflicts_with = "value", required_unless_present = "value")]
    pub file: Option<PathBuf>,

    /// Inline JSON content
    #[arg(long)]
    pub value: Option<String>,
}

// ============================================================================
// Change Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum ChangeCommands {
    /// List pending changes for a project
    List {
        /// Project ID
        project: String,
    },

    /// Show the change log for a project
    History {
        /// Project ID
        project: String,

        /// Only changes targeting this phase
        #[arg(short, long)]
        phase: Option<String>,

        /// Maximum changes to return
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Show a change with its diff and proposal
    Show {
        /// Change ID
        id: String,
    },

    /// Apply a pending change
    Approve {
        /// Change ID
        id: String,
    },

    /// Discard a pending change
    Reject {
        /// Change ID
        id: String,
    },
}

// ============================================================================
// Bible Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum BibleCommands {
    /// Upload a plain-text bible document and extract its rules
    Add {
        /// Project ID
        project: String,

        /// Document title
        title: String,

        /// Path to the document (`-` for stdin)
        #[arg(short, long)]
        file: PathBuf,
    },

    /// List bible documents
    List {
        /// Project ID
        project: String,
    },

    /// List extracted rules
    Rules {
        /// Project ID
        project: String,
    },

    /// Check a phase against the rules
    Validate {
        /// Project ID
        project: String,

        /// Phase name or number
        phase: String,
    },

    /// Remove a document and its rules
    Remove {
        /// Document ID
        id: String,
    },
}

// ============================================================================
// Transcript Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum TranscriptCommands {
    /// Add a plain-text transcript
    Add {
        /// Project ID
        project: String,

        /// Transcript title
        title: String,

        /// Path to the transcript (`-` for stdin)
        #[arg(short, long)]
        file: PathBuf,
    },

    /// List transcripts
    List {
        /// Project ID
        project: String,
    },

    /// Analyze a transcript
    Analyze {
        /// Transcript ID
        id: String,
    },
}

// ============================================================================
// Plan Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum PlanCommands {
    /// Show your tier and its features
    Show,

    /// Change your tier
    Set {
        /// free, pro or studio
        tier: String,
    },

    /// Show usage for the current period
    Usage,
}

// ============================================================================
// Export
// ============================================================================

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Project ID
    pub project: String,

    /// Output format (markdown, json)
    #[arg(short, long, default_value = "markdown")]
    pub format: String,

    /// Output path (default: <title>.<ext> in the current directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
