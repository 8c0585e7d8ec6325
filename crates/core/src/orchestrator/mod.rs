//! Run orchestrator for chunked batch processing.
//!
//! The orchestrator drives one source through the run state machine:
//! - **Planning**: chunk the source, look up existing checkpoints
//! - **Dispatching**: process missing units concurrently under the
//!   [`ConcurrencyController`](crate::throttle::ConcurrencyController)
//! - **Merging**: combine results in index order (only for `run_merged`)
//!
//! A failed run leaves every completed unit checkpointed. Running the same
//! source again against the same store processes only what is missing.

mod config;
mod runner;
mod types;

pub use config::EngineConfig;
pub use runner::Orchestrator;
pub use types::{MergedRun, RunError, RunPhase, RunProgress, RunReport, RunSummary};
