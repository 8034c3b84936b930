//! notesync CLI entry point.

use clap::Parser;
use notesync::cli::commands;
use notesync::cli::{Cli, Commands};
use notesync::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    // Set up tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    // Resolve effective JSON mode: --json OR non-TTY stdout
    let json = cli.json || !std::io::IsTerminal::is_terminal(&std::io::stdout());

    // Run the command and handle errors
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
            2 => EnvFilter::new("debug,rusqlite=info"),
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
    let vault = cli.vault.as_ref();

    match &cli.command {
        Commands::Init { server_url, enable } => {
            commands::init::execute(vault, server_url.as_deref(), *enable, json)
        }
        Commands::Version => commands::version::execute(json),

        // Inspection
        Commands::Status => commands::status::execute(vault, json),
        Commands::Pending => commands::status::execute_pending(vault, json),
        Commands::Events { note, limit } => {
            commands::status::execute_events(vault, note.as_deref(), *limit, json)
        }

        // Conflicts
        Commands::Conflicts => commands::conflicts::execute_list(vault, json),
        Commands::Resolve { note_id, choice } => {
            commands::conflicts::execute_resolve(vault, note_id, *choice, json)
        }

        // Sync
        Commands::Sync => commands::sync::execute_sync(vault, json),
        Commands::Queue { file, delete } => commands::sync::execute_queue(vault, file, *delete, json),

        Commands::Config { command } => commands::config::execute(command, vault, json),
    }
}
