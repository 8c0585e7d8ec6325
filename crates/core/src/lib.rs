pub mod checkpoint;
pub mod chunker;
pub mod classifier;
pub mod config;
pub mod executor;
pub mod merge;
pub mod metrics;
pub mod orchestrator;
pub mod testing;
pub mod throttle;
pub mod unit;

pub use checkpoint::{
    open_checkpoint_store, CheckpointBackend, CheckpointConfig, CheckpointError, CheckpointStore,
    FsCheckpointStore, MemoryCheckpointStore, PutOutcome, SqliteCheckpointStore,
};
pub use chunker::{Chunker, ChunkerError, WindowChunker};
pub use classifier::{
    ErrorClassifier, FailureClassification, FailureKind, ProcessingFailure, RecoveryAction,
};
pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use executor::{
    DiagnosticContext, DiagnosticOracle, Diagnosis, OracleError, RetryExecutor, RetryPolicy,
    UnitError, UnitProcessor,
};
pub use merge::{MergeError, MergePart, Merger, OrderedJsonMerger};
pub use orchestrator::{
    EngineConfig, MergedRun, Orchestrator, RunError, RunPhase, RunProgress, RunReport, RunSummary,
};
pub use throttle::{AdmissionPermit, ConcurrencyController, ThrottleSnapshot};
pub use unit::{RunId, UnitResult, WorkUnit};
