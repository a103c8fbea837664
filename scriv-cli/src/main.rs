//! # scriv CLI
//!
//! Command-line interface for the scriv blog generator.

mod commands;

use clap::{Parser, Subcommand};
use scriv_render::CompileReport;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "scriv")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(long, global = true, default_value = "scriv.yml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build every post page and the index page
    Build,

    /// Build the post pages only
    Detail,

    /// Build the index page only
    Index,

    /// Parse and render every post without writing output
    Check {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Help and version go to stdout and are not failures.
            let failed = err.use_stderr();
            let _ = err.print();
            return if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS };
        }
    };

    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Build => commands::build_site(&cli.config).await,
        Commands::Detail => commands::build_details(&cli.config).await,
        Commands::Index => commands::build_index(&cli.config).await,
        Commands::Check { json } => commands::check_site(&cli.config, json).await,
    };

    match result {
        Ok(report) => exit_code(&report),
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install logger: {}", err);
    }
}

fn exit_code(report: &CompileReport) -> ExitCode {
    if report.has_errors() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
