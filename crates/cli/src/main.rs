//! Folio CLI - Main Entry Point
//!
//! Runs the content verification checks against a site and reports the
//! outcome. Exit code 0 when every check passes, 1 when any check fails or
//! is left incomplete, 2 on configuration and other fatal errors.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod output;

use commands::{list, run};
use folio_e2e::config::DEFAULT_CONFIG_FILE;
use folio_e2e::Settings;

/// Folio - content verification for a one-page portfolio site
#[derive(Parser)]
#[command(name = "folio")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Settings file (TOML); missing file means defaults
    #[arg(long, default_value = DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the checks against a site
    Run(run::RunArgs),

    /// List suites and checks without running them
    List(list::ListArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let code = match dispatch(cli).await {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            2
        }
    };

    std::process::exit(code);
}

async fn dispatch(cli: Cli) -> anyhow::Result<bool> {
    let mut settings = Settings::load(&cli.config)?;
    settings.apply_env()?;

    match cli.command {
        Commands::Run(args) => run::execute(args, settings, cli.format).await,
        Commands::List(args) => {
            list::execute(args, settings, cli.format)?;
            Ok(true)
        }
    }
}
