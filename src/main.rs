//! entity-sync CLI entry point.

use clap::Parser;
use colored::Colorize;
use esync::cli::commands;
use esync::cli::{Cli, Commands};
use esync::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.dry_run {
        esync::DRY_RUN.store(true, std::sync::atomic::Ordering::Relaxed);
    }

    init_tracing(cli.verbose, cli.quiet);

    let json = cli.json;

    match run(&cli, json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("{} {e}\n  {} {hint}", "Error:".red().bold(), "Hint:".yellow());
                } else {
                    eprintln!("{} {e}", "Error:".red().bold());
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

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("esync=info"),
            2 => EnvFilter::new("esync=debug"),
            _ => EnvFilter::new("esync=trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli, json: bool) -> Result<(), Error> {
    match &cli.command {
        Commands::Export(args) => commands::export::execute_with_identity(
            args,
            cli.db_url.as_deref(),
            cli.product_name.as_deref(),
            cli.product_version.as_deref(),
            json,
        ),
        Commands::Import(args) => commands::import::execute(
            args,
            cli.target_db_url.as_deref(),
            cli.product_name.as_deref(),
            cli.product_version.as_deref(),
            json,
        ),
        Commands::Version => commands::version::execute(json),
        Commands::Completions { shell } => commands::completions::execute(shell),
    }
}
