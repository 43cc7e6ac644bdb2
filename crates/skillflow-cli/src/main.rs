//! # skillflow CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use skillflow_cli::outline::{run_outline, OutlineArgs};
use skillflow_cli::run::{run_run, RunArgs};
use skillflow_cli::validate::{run_validate, ValidateArgs};

/// Assemble, check, and run hierarchical robot behaviors described in YAML.
#[derive(Parser, Debug)]
#[command(name = "skillflow", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Assemble a behavior and report every construction defect.
    Validate(ValidateArgs),

    /// Print the state graph of a behavior.
    Outline(OutlineArgs),

    /// Run a behavior against its scripted capabilities.
    Run(RunArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("skillflow CLI starting");

    let result = match cli.command {
        Commands::Validate(args) => run_validate(&args),
        Commands::Outline(args) => run_outline(&args),
        Commands::Run(args) => run_run(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
