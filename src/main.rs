//! MUSE CLI entry point.

use clap::Parser;
use muse::cli::commands;
use muse::cli::{Cli, Commands};
use muse::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.silent {
        muse::SILENT.store(true, std::sync::atomic::Ordering::Relaxed);
    }
    if cli.no_color {
        colored::control::set_override(false);
    }

    init_tracing(cli.verbose, cli.quiet);

    // --json or non-TTY stdout
    let json = cli.json || !std::io::IsTerminal::is_terminal(&std::io::stdout());

    match run(&cli, json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,rusqlite=info,reqwest=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli, json: bool) -> Result<(), Error> {
    let db = cli.db.as_ref();
    let actor = cli.actor.as_deref();

    match &cli.command {
        Commands::Init { force } => commands::init::execute(db, *force, json),
        Commands::Version => commands::version::execute(json),
        Commands::Completions { shell } => commands::completions::execute(shell),

        Commands::Project { command } => commands::project::execute(command, db, actor, json),
        Commands::Phase { command } => commands::phase::execute(command, db, actor, json),
        Commands::Change { command } => commands::change::execute(command, db, actor, json),

        Commands::Bible { command } => commands::bible::execute(command, db, actor, json),
        Commands::Transcript { command } => {
            commands::transcript::execute(command, db, actor, json)
        }

        Commands::Plan { command } => commands::plan::execute(command, db, actor, json),
        Commands::Export(args) => commands::export::execute(args, db, actor, json),
        Commands::Events {
            entity_type,
            entity_id,
            limit,
        } => commands::events::execute(
            entity_type.as_deref().zip(entity_id.as_deref()),
            *limit,
            db,
            json,
        ),
    }
}
