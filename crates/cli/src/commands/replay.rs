use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::config;
use crate::OutputFormat;

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Run identifier to replay an instance from.
    #[arg(long = "run-id")]
    pub run_id: String,

    /// Instance identifier within that run.
    #[arg(long = "instance-id")]
    pub instance_id: String,

    /// Directory scenario YAML files live under, for re-resolving the
    /// original scenario by id.
    #[arg(long)]
    pub scenarios: Option<PathBuf>,

    /// Directory runs are read from.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// SUT configuration to replay against.
    #[arg(long)]
    pub sut: PathBuf,
}

/// Re-execute a recorded instance and diff its observations against the
/// ones recorded in the original run (spec §4.13). Never returns an `Err`
/// for a missing instance or scenario -- that's reported as an
/// unsuccessful `ReplayResult`, per the replay engine's own contract.
pub async fn run(args: &ReplayArgs, format: OutputFormat) -> Result<()> {
    let sut = config::load_sut(&args.sut)?;
    let runs_dir = args.output.clone().unwrap_or_else(config::output_dir_fallback);

    let engine = tempest_replay::ReplayEngine::new(runs_dir, args.scenarios.clone(), sut);
    let result = engine.replay(&args.run_id, &args.instance_id, None).await;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => {
            println!("replay of {} / {}: {}", args.run_id, result.instance_id, if result.success { "MATCH" } else { "DIVERGED" });
            if let Some(error) = &result.error {
                println!("  error: {error}");
            }
            for step in &result.steps {
                let marker = if step.has_difference { "!=" } else { "==" };
                println!("  [{}] {} {marker} original", step.step_number, step.action_name);
                if let Some(details) = &step.difference_details {
                    println!("      {details}");
                }
            }
        }
    }

    Ok(())
}
