//! Append-only streaming artifact store for Tempest runs: `manifest.json`,
//! three JSONL append logs, `summary.json`, and a crash-tolerant reader
//! used by replay and reporting.

pub mod error;
pub mod jsonl;
pub mod reader;
pub mod record;
pub mod store;

pub use error::ArtifactError;
pub use reader::ArtifactReader;
pub use record::{AssertionRecord, InstanceRecord, RunManifest, RunSummary, StepRecord};
pub use store::{ArtifactStore, FileArtifactStore};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempest_core::RunConfig;

    fn config() -> RunConfig {
        RunConfig {
            seed: 42,
            concurrency: 4,
            timeout_seconds: 30.0,
        }
    }

    #[tokio::test]
    async fn writes_manifest_and_jsonl_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path(), "run_test", "demo-sut", vec!["scenario-a".to_string()], 42, config());
        store.initialize().await.unwrap();

        store
            .write_instance(InstanceRecord {
                instance_id: "inst-0".to_string(),
                run_id: "run_test".to_string(),
                correlation_id: "corr-0".to_string(),
                scenario_id: "scenario-a".to_string(),
                started_at: chrono::Utc::now(),
                completed_at: Some(chrono::Utc::now()),
                duration_ms: Some(12.5),
                passed: Some(true),
                entry_data: serde_json::Map::new(),
                error: None,
            })
            .await
            .unwrap();

        store
            .write_step(StepRecord {
                instance_id: "inst-0".to_string(),
                run_id: "run_test".to_string(),
                correlation_id: "corr-0".to_string(),
                step_index: 0,
                step_name: "get_user".to_string(),
                step_type: "http".to_string(),
                timestamp: chrono::Utc::now(),
                observation: json!({"ok": true}),
            })
            .await
            .unwrap();

        store
            .write_assertion(AssertionRecord {
                instance_id: "inst-0".to_string(),
                run_id: "run_test".to_string(),
                correlation_id: "corr-0".to_string(),
                step_index: 1,
                assertion_name: "check_status".to_string(),
                passed: true,
                expected: Some(json!(200)),
                actual: Some(json!(200)),
                message: "status code 200 matches expected 200".to_string(),
                timestamp: chrono::Utc::now(),
            })
            .await
            .unwrap();

        let summary = store.finalize().await.unwrap();
        assert_eq!(summary.total_instances, 1);
        assert_eq!(summary.pass_count, 1);
        assert!((summary.pass_rate - 100.0).abs() < f64::EPSILON);

        let reader = ArtifactReader::new(store.run_path());
        let manifest = reader.manifest().await.unwrap();
        assert_eq!(manifest.run_id, "run_test");
        assert_eq!(manifest.sut_name, "demo-sut");

        let instances = reader.instances().await.unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].instance_id, "inst-0");

        let steps = reader.steps().await.unwrap();
        assert_eq!(steps.len(), 1);

        let assertions = reader.assertions().await.unwrap();
        assert_eq!(assertions.len(), 1);

        let reloaded_summary = reader.summary().await.unwrap().unwrap();
        assert_eq!(reloaded_summary.total_instances, 1);
    }

    #[tokio::test]
    async fn reader_skips_malformed_trailing_line() {
        let dir = tempfile::tempdir().unwrap();
        let run_path = dir.path().join("run_test");
        tokio::fs::create_dir_all(&run_path).await.unwrap();
        tokio::fs::write(run_path.join("instances.jsonl"), b"{\"instance_id\":\"a\",\"run_id\":\"r\",\"correlation_id\":\"c\",\"scenario_id\":\"s\",\"started_at\":\"2024-01-01T00:00:00Z\",\"completed_at\":null,\"duration_ms\":null,\"passed\":null,\"entry_data\":{},\"error\":null}\n{not valid json\n")
            .await
            .unwrap();

        let reader = ArtifactReader::new(&run_path);
        let instances = reader.instances().await.unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].instance_id, "a");
    }

    #[tokio::test]
    async fn find_instance_returns_none_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path(), "run_test", "demo-sut", vec![], 1, config());
        store.initialize().await.unwrap();
        store.finalize().await.unwrap();

        let reader = ArtifactReader::new(store.run_path());
        assert!(reader.find_instance("does-not-exist").await.unwrap().is_none());
    }
}
