//! Checkpoint storage for resumable runs.
//!
//! A checkpoint is the durably stored result of one work unit, keyed by
//! `(run id, unit index)`. On restart, every unit whose checkpoint exists is
//! skipped and its stored result is used in the merge exactly as if it had
//! just been computed.
//!
//! Backends:
//! - [`MemoryCheckpointStore`]: process-local, for tests and throwaway runs
//! - [`FsCheckpointStore`]: one JSON file per unit
//! - [`SqliteCheckpointStore`]: one row per unit

mod config;
mod fs_store;
mod memory;
mod sqlite_store;
mod store;

use std::sync::Arc;

pub use config::{CheckpointBackend, CheckpointConfig};
pub use fs_store::FsCheckpointStore;
pub use memory::MemoryCheckpointStore;
pub use sqlite_store::SqliteCheckpointStore;
pub use store::{CheckpointError, CheckpointStore, PutOutcome};

use crate::unit::RunId;

/// Factory function to open the configured checkpoint store for a run.
pub fn open_checkpoint_store(
    config: &CheckpointConfig,
    run_id: &RunId,
) -> Result<Arc<dyn CheckpointStore>, CheckpointError> {
    match config.backend {
        CheckpointBackend::Memory => {
            Ok(Arc::new(MemoryCheckpointStore::for_run(run_id.clone())))
        }
        CheckpointBackend::Fs => Ok(Arc::new(FsCheckpointStore::new(&config.dir, run_id)?)),
        CheckpointBackend::Sqlite => Ok(Arc::new(SqliteCheckpointStore::new(
            &config.database_path,
            run_id.clone(),
        )?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::UnitResult;
    use serde_json::json;

    #[test]
    fn test_open_each_backend() {
        let temp_dir = tempfile::tempdir().unwrap();
        let run_id = RunId::new("factory").unwrap();

        for backend in [
            CheckpointBackend::Memory,
            CheckpointBackend::Fs,
            CheckpointBackend::Sqlite,
        ] {
            let config = CheckpointConfig {
                backend,
                dir: temp_dir.path().join("fs"),
                database_path: temp_dir.path().join("checkpoints.db"),
            };
            let store = open_checkpoint_store(&config, &run_id).unwrap();
            store.put(&UnitResult::new(0, json!("ok"))).unwrap();
            assert!(store.has(0).unwrap(), "{:?}", backend);
            assert_eq!(store.run_id(), Some(&run_id), "{:?}", backend);
        }

        assert!(temp_dir.path().join("fs").join("factory").exists());
        assert!(temp_dir.path().join("checkpoints.db").exists());
    }
}
