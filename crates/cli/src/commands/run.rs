use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tempest_core::RunConfig;
use tempest_engine::{RunController, RunOptions};
use tokio_util::sync::CancellationToken;

use crate::config;
use crate::OutputFormat;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the SUT configuration YAML.
    #[arg(long)]
    pub sut: PathBuf,

    /// One or more scenario YAML files to run.
    #[arg(long, required = true, num_args = 1..)]
    pub scenarios: Vec<PathBuf>,

    /// Number of instances to run.
    #[arg(long = "n", default_value_t = 1)]
    pub instances: usize,

    /// Maximum number of instances running concurrently.
    #[arg(long)]
    pub parallel: Option<usize>,

    /// Deterministic seed for variation and scenario selection.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Directory runs are written under.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Caller-supplied run identifier; defaults to `run_<timestamp>`.
    #[arg(long = "run-id")]
    pub run_id: Option<String>,
}

/// Run `args.instances` instances of `args.scenarios` against `args.sut`,
/// writing artifacts under the resolved output directory, and print the
/// run id and summary. A run that completes with failing instances still
/// exits 0 (spec §6); only a setup error (bad YAML, unwritable output
/// directory) surfaces as a non-zero exit.
pub async fn run(args: &RunArgs, format: OutputFormat) -> Result<()> {
    let sut = config::load_sut(&args.sut)?;
    let scenarios = config::load_scenarios(&args.scenarios)?;

    let output_dir = args.output.clone().unwrap_or_else(config::output_dir_fallback);
    let seed = args.seed.unwrap_or_else(config::seed_fallback);
    let concurrency = args.parallel.unwrap_or_else(config::parallel_fallback);

    let options = RunOptions {
        run_id: args.run_id.clone(),
        sut,
        scenarios,
        instances: args.instances,
        config: RunConfig { seed, concurrency, timeout_seconds: 30.0 },
        output_dir,
        cancel: cancellation_on_ctrl_c(),
    };

    let summary = RunController::new().run(options).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => {
            println!("run {}", summary.run_id);
            println!(
                "  {} instances: {} passed, {} failed, {} errors ({:.1}% pass rate)",
                summary.total_instances, summary.pass_count, summary.fail_count, summary.error_count, summary.pass_rate
            );
            println!("  {} steps, {} assertions ({} failed)", summary.total_steps, summary.total_assertions, summary.assertions_failed);
        }
    }

    Ok(())
}

fn cancellation_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            child.cancel();
        }
    });
    token
}
