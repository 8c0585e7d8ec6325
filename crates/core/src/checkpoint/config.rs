//! Configuration for the checkpoint module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Storage medium for checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointBackend {
    /// Kept in process memory; lost on exit.
    Memory,
    /// One JSON file per unit.
    Fs,
    /// Rows in a SQLite database.
    Sqlite,
}

/// Checkpoint storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Storage backend.
    #[serde(default = "default_backend")]
    pub backend: CheckpointBackend,

    /// Root directory for the `fs` backend. Each run gets a subdirectory.
    #[serde(default = "default_dir")]
    pub dir: PathBuf,

    /// Database file for the `sqlite` backend.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

fn default_backend() -> CheckpointBackend {
    CheckpointBackend::Fs
}

fn default_dir() -> PathBuf {
    std::env::temp_dir().join("batchmill-checkpoints")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("batchmill.db")
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            dir: default_dir(),
            database_path: default_database_path(),
        }
    }
}
