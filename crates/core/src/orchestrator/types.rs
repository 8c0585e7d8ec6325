//! Types for the orchestrator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::checkpoint::CheckpointError;
use crate::chunker::ChunkerError;
use crate::classifier::FailureKind;
use crate::executor::UnitError;
use crate::merge::MergeError;
use crate::unit::{PlanError, RunId, UnitResult};

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Planning,
    Dispatching,
    Merging,
    Done,
    Failed,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Planning => "planning",
            RunPhase::Dispatching => "dispatching",
            RunPhase::Merging => "merging",
            RunPhase::Done => "done",
            RunPhase::Failed => "failed",
        }
    }

    /// Whether the run has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Done | RunPhase::Failed)
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress events emitted while a run advances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunProgress {
    PhaseChanged {
        phase: RunPhase,
    },
    /// Units planned, and how many of them were already checkpointed.
    Planned {
        total: usize,
        cached: usize,
    },
    UnitCompleted {
        index: usize,
    },
    UnitFailed {
        index: usize,
        /// Classification of the last failure, when the processor failed.
        kind: Option<FailureKind>,
        message: String,
    },
}

/// Counts describing a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_units: usize,
    /// Units satisfied from checkpoints without processing.
    pub cached: usize,
    /// Units processed and checkpointed during this run.
    pub succeeded: usize,
    pub failed: usize,
    /// Retries scheduled during this run.
    pub retried: u64,
    /// Concurrency limit when dispatching ended.
    pub final_concurrency: usize,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub summary: RunSummary,
    /// One result per unit, in index order.
    pub results: Vec<UnitResult>,
}

/// A completed run together with its merged output.
#[derive(Debug)]
pub struct MergedRun<T> {
    pub report: RunReport,
    pub output: T,
}

/// Errors that can end a run.
#[derive(Debug, Error)]
pub enum RunError {
    /// One or more units failed terminally.
    #[error(
        "{} of {} unit(s) failed: {}. Completed units are checkpointed; rerunning the same source resumes from them",
        .failures.len(),
        .summary.total_units,
        describe_failures(.failures)
    )]
    UnitsFailed {
        failures: Vec<UnitError>,
        summary: RunSummary,
    },

    /// The chunker produced an invalid plan.
    #[error("invalid plan: {0}")]
    Plan(#[from] PlanError),

    /// Chunker error.
    #[error("chunker error: {0}")]
    Chunker(#[from] ChunkerError),

    /// Checkpoint store error.
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// The merger kept failing.
    #[error("merge failed after {attempts} attempt(s): {source}")]
    Merge {
        attempts: u32,
        #[source]
        source: MergeError,
    },

    /// The checkpoint store belongs to a different run than the source.
    #[error("checkpoint store is scoped to run {store_run_id}, but the source maps to run {run_id}")]
    StoreMismatch { run_id: RunId, store_run_id: RunId },

    /// Dispatch reported success but some units have no checkpoint.
    #[error("checkpoints missing for unit(s) {missing:?}")]
    IncompleteCheckpoints { missing: Vec<usize> },
}

fn describe_failures(failures: &[UnitError]) -> String {
    failures
        .iter()
        .map(|failure| {
            let reason = match failure {
                UnitError::Checkpoint { .. } => "checkpoint write failed",
                UnitError::Panicked { .. } => "panicked",
                other => other
                    .classification()
                    .map(|c| c.kind.as_str())
                    .unwrap_or("unknown"),
            };
            format!("unit {} ({})", failure.index(), reason)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{FailureClassification, ProcessingFailure, RecoveryAction};

    #[test]
    fn test_progress_serialization() {
        let event = RunProgress::Planned {
            total: 5,
            cached: 2,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "planned");
        assert_eq!(json["total"], 5);

        let event = RunProgress::PhaseChanged {
            phase: RunPhase::Dispatching,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"event":"phase_changed","phase":"dispatching"}"#);
    }

    #[test]
    fn test_phase_terminal() {
        assert!(RunPhase::Done.is_terminal());
        assert!(RunPhase::Failed.is_terminal());
        assert!(!RunPhase::Merging.is_terminal());
        assert_eq!(RunPhase::Planning.to_string(), "planning");
    }

    #[test]
    fn test_units_failed_display() {
        let err = RunError::UnitsFailed {
            failures: vec![
                UnitError::Fatal {
                    index: 2,
                    attempts: 1,
                    classification: FailureClassification::new(
                        FailureKind::Unauthorized,
                        RecoveryAction::FailFast,
                        0,
                    ),
                    failure: ProcessingFailure::with_status(401, "Unauthorized"),
                },
                UnitError::Panicked { index: 4 },
            ],
            summary: RunSummary {
                total_units: 5,
                ..Default::default()
            },
        };

        let message = err.to_string();
        assert!(message.starts_with("2 of 5 unit(s) failed: unit 2 (unauthorized), unit 4 (panicked)"));
        assert!(message.contains("rerunning the same source resumes"));
    }
}
