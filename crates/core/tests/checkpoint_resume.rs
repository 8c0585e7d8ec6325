//! Checkpoint resume integration tests.
//!
//! These tests run against the durable backends, reopening the store
//! between runs the way a restarted process would.

use std::sync::Arc;

use tempfile::TempDir;

use batchmill_core::{
    open_checkpoint_store, testing::MockUnitProcessor, testing::StaticChunker, CheckpointBackend,
    CheckpointConfig, CheckpointStore, EngineConfig, OrderedJsonMerger, Orchestrator,
    ProcessingFailure, RunError, RunId,
};

const SOURCE: &str = "lecture-2024-03-01.wav";

fn config_for(backend: CheckpointBackend, temp_dir: &TempDir) -> CheckpointConfig {
    CheckpointConfig {
        backend,
        dir: temp_dir.path().join("checkpoints"),
        database_path: temp_dir.path().join("batchmill.db"),
    }
}

fn open(config: &CheckpointConfig) -> Arc<dyn CheckpointStore> {
    open_checkpoint_store(config, &RunId::from_source(SOURCE)).expect("Failed to open store")
}

fn orchestrator(
    processor: &Arc<MockUnitProcessor>,
    store: Arc<dyn CheckpointStore>,
) -> Orchestrator {
    Orchestrator::new(
        EngineConfig {
            max_concurrency: 2,
            ..Default::default()
        },
        Arc::new(StaticChunker::with_count(4)),
        processor.clone(),
        store,
    )
}

async fn resume_after_restart(backend: CheckpointBackend) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = config_for(backend, &temp_dir);

    // Reference output from an uninterrupted run with its own store.
    let reference_dir = TempDir::new().expect("Failed to create temp dir");
    let reference = orchestrator(
        &Arc::new(MockUnitProcessor::new()),
        open(&config_for(backend, &reference_dir)),
    )
    .run_merged(SOURCE, &OrderedJsonMerger::new())
    .await
    .unwrap()
    .output;

    // First run: unit 2 fails permanently.
    let processor = Arc::new(MockUnitProcessor::new());
    processor
        .fail_always(2, ProcessingFailure::with_status(413, "Payload Too Large"))
        .await;
    let err = orchestrator(&processor, open(&config))
        .run(SOURCE)
        .await
        .unwrap_err();
    assert!(matches!(err, RunError::UnitsFailed { .. }));

    // "Restart": new processor, freshly opened store.
    let processor = Arc::new(MockUnitProcessor::new());
    let store = open(&config);
    assert_eq!(store.indices().unwrap(), vec![0, 1, 3]);

    let merged = orchestrator(&processor, store)
        .run_merged(SOURCE, &OrderedJsonMerger::new())
        .await
        .unwrap();

    assert_eq!(processor.recorded_calls().await, vec![2]);
    assert_eq!(merged.report.summary.cached, 3);
    assert_eq!(merged.output, reference);
}

#[tokio::test(start_paused = true)]
async fn test_fs_store_resumes_after_restart() {
    resume_after_restart(CheckpointBackend::Fs).await;
}

#[tokio::test(start_paused = true)]
async fn test_sqlite_store_resumes_after_restart() {
    resume_after_restart(CheckpointBackend::Sqlite).await;
}

#[tokio::test(start_paused = true)]
async fn test_runs_for_different_sources_do_not_share_checkpoints() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = config_for(CheckpointBackend::Sqlite, &temp_dir);

    let processor = Arc::new(MockUnitProcessor::new());
    orchestrator(&processor, open(&config))
        .run(SOURCE)
        .await
        .unwrap();

    let other = open_checkpoint_store(&config, &RunId::from_source("another.wav"))
        .expect("Failed to open store");
    assert!(other.indices().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_fs_store_refuses_another_source() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = config_for(CheckpointBackend::Fs, &temp_dir);
    let store = open(&config);

    let processor = Arc::new(MockUnitProcessor::new());
    let orchestrator = orchestrator(&processor, store.clone());
    orchestrator.run(SOURCE).await.unwrap();

    let err = orchestrator.run("another.wav").await.unwrap_err();

    assert!(matches!(err, RunError::StoreMismatch { .. }));
    assert_eq!(processor.total_calls().await, 4);
    assert_eq!(store.indices().unwrap(), vec![0, 1, 2, 3]);
}
