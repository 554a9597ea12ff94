use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tempest_artifact::ArtifactReader;

use crate::config;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum ReportFormat {
    Html,
    Json,
}

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Run identifier to report on.
    #[arg(long = "run-id")]
    pub run_id: String,

    /// Directory runs are read from.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Report rendering.
    #[arg(long, default_value = "html")]
    pub format: ReportFormat,
}

/// Render a static report of a run's outcome from its artifact directory.
/// A stub per §4.14/§1's SUPPLEMENT -- no charts, no interactivity, just
/// enough to eyeball a run's pass rate without reaching for `jq`.
pub async fn run(args: &ReportArgs) -> Result<()> {
    let runs_dir = args.output.clone().unwrap_or_else(config::output_dir_fallback);
    let reader = ArtifactReader::new(runs_dir.join(&args.run_id));

    let manifest = reader.manifest().await.with_context(|| format!("reading manifest for run {}", args.run_id))?;
    let summary = reader.summary().await?.with_context(|| format!("run {} has no summary.json -- did it finish?", args.run_id))?;

    match args.format {
        ReportFormat::Json => {
            let body = serde_json::json!({ "manifest": manifest, "summary": summary });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        ReportFormat::Html => println!("{}", render_html(&manifest, &summary)),
    }

    Ok(())
}

fn render_html(manifest: &tempest_artifact::RunManifest, summary: &tempest_artifact::RunSummary) -> String {
    format!(
        "<!doctype html>\n<html><head><title>Tempest run {run_id}</title></head><body>\n\
         <h1>Run {run_id}</h1>\n\
         <p>SUT: {sut_name} &middot; seed {seed} &middot; concurrency {concurrency}</p>\n\
         <table border=\"1\" cellpadding=\"4\">\n\
         <tr><th>instances</th><td>{total_instances}</td></tr>\n\
         <tr><th>passed</th><td>{pass_count}</td></tr>\n\
         <tr><th>failed</th><td>{fail_count}</td></tr>\n\
         <tr><th>errored</th><td>{error_count}</td></tr>\n\
         <tr><th>pass rate</th><td>{pass_rate:.1}%</td></tr>\n\
         <tr><th>duration</th><td>{duration_ms:.0}ms</td></tr>\n\
         <tr><th>assertions</th><td>{assertions_passed}/{total_assertions} passed</td></tr>\n\
         </table>\n</body></html>\n",
        run_id = manifest.run_id,
        sut_name = manifest.sut_name,
        seed = manifest.seed,
        concurrency = manifest.config.concurrency,
        total_instances = summary.total_instances,
        pass_count = summary.pass_count,
        fail_count = summary.fail_count,
        error_count = summary.error_count,
        pass_rate = summary.pass_rate,
        duration_ms = summary.duration_ms,
        assertions_passed = summary.assertions_passed,
        total_assertions = summary.total_assertions,
    )
}
