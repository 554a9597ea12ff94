use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use clap::Args;
use tempest_artifact::ArtifactReader;
use tracing::info;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Directory runs are read from.
    #[arg(long)]
    pub output: PathBuf,

    /// Port to listen on.
    #[arg(long, default_value_t = 7777)]
    pub port: u16,
}

#[derive(Clone)]
struct AppState {
    runs_dir: Arc<PathBuf>,
}

/// Serve a minimal read-only view of the runs under `args.output`: a list
/// of run ids, and each run's manifest/summary as JSON. A stub per
/// §4.14/§1's SUPPLEMENT -- WebSocket tailing of an in-flight run is
/// named as an out-of-scope contract item, not implemented here.
pub async fn run(args: &ServeArgs) -> Result<()> {
    let state = AppState { runs_dir: Arc::new(args.output.clone()) };

    let app = Router::new()
        .route("/runs", get(list_runs))
        .route("/runs/{run_id}/manifest", get(run_manifest))
        .route("/runs/{run_id}/summary", get(run_summary))
        .with_state(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "tempest serve listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn list_runs(State(state): State<AppState>) -> impl IntoResponse {
    let mut entries = match tokio::fs::read_dir(state.runs_dir.as_path()).await {
        Ok(entries) => entries,
        Err(_) => return (StatusCode::OK, Json(serde_json::json!({ "runs": [] }))),
    };

    let mut runs = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.path().is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                runs.push(name.to_string());
            }
        }
    }
    runs.sort();

    (StatusCode::OK, Json(serde_json::json!({ "runs": runs })))
}

async fn run_manifest(State(state): State<AppState>, Path(run_id): Path<String>) -> impl IntoResponse {
    let reader = ArtifactReader::new(state.runs_dir.join(&run_id));
    match reader.manifest().await {
        Ok(manifest) => (StatusCode::OK, Json(serde_json::to_value(manifest).unwrap_or_default())),
        Err(error) => (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": error.to_string() }))),
    }
}

async fn run_summary(State(state): State<AppState>, Path(run_id): Path<String>) -> impl IntoResponse {
    let reader = ArtifactReader::new(state.runs_dir.join(&run_id));
    match reader.summary().await {
        Ok(Some(summary)) => (StatusCode::OK, Json(serde_json::to_value(summary).unwrap_or_default())),
        Ok(None) => (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "run has not finished" }))),
        Err(error) => (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": error.to_string() }))),
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("received SIGINT");
    }
}
