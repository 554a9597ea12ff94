//! Tempest CLI
//!
//! A command-line interface for running workflow simulations against a
//! system under test, and for replaying and reporting on recorded runs.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// Tempest CLI -- run, replay, and report on workflow simulations.
#[derive(Parser, Debug)]
#[command(name = "tempest", version, about)]
struct Cli {
    /// Output format.
    #[arg(long, default_value = "text", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run N instances of one or more scenarios against a SUT.
    Run(commands::run::RunArgs),
    /// Re-execute a recorded instance and compare it against its original observations.
    Replay(commands::replay::ReplayArgs),
    /// Render a static report for a prior run.
    Report(commands::report::ReportArgs),
    /// Serve run artifacts over a minimal read-only HTTP API.
    Serve(commands::serve::ServeArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => commands::run::run(&args, cli.format).await,
        Command::Replay(args) => commands::replay::run(&args, cli.format).await,
        Command::Report(args) => commands::report::run(&args).await,
        Command::Serve(args) => commands::serve::run(&args).await,
    }
}
