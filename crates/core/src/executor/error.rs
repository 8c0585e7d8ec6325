//! Terminal unit failures.

use thiserror::Error;

use crate::checkpoint::CheckpointError;
use crate::classifier::{FailureClassification, ProcessingFailure};

use super::traits::Diagnosis;

/// Why a unit could not be completed.
#[derive(Debug, Error)]
pub enum UnitError {
    /// The failure cannot resolve by waiting; remaining attempts were skipped.
    #[error("unit {index} failed permanently on attempt {attempts} ({kind}): {failure}", kind = .classification.kind)]
    Fatal {
        index: usize,
        attempts: u32,
        classification: FailureClassification,
        failure: ProcessingFailure,
    },

    /// The diagnostic oracle judged the failure unrecoverable.
    #[error("unit {index} judged unrecoverable after {attempts} attempt(s): {explanation}", explanation = .diagnosis.explanation)]
    Unrecoverable {
        index: usize,
        attempts: u32,
        classification: FailureClassification,
        failure: ProcessingFailure,
        diagnosis: Diagnosis,
    },

    /// Every allowed attempt failed.
    #[error("unit {index} failed after {attempts} attempt(s) ({kind}): {failure}", kind = .classification.kind)]
    Exhausted {
        index: usize,
        attempts: u32,
        classification: FailureClassification,
        failure: ProcessingFailure,
        diagnosis: Option<Diagnosis>,
    },

    /// The unit succeeded but its result could not be checkpointed.
    #[error("unit {index} completed but its checkpoint could not be written: {source}")]
    Checkpoint {
        index: usize,
        #[source]
        source: CheckpointError,
    },

    /// The worker running the unit panicked.
    #[error("worker for unit {index} panicked")]
    Panicked { index: usize },
}

impl UnitError {
    /// Index of the failed unit.
    pub fn index(&self) -> usize {
        match self {
            Self::Fatal { index, .. }
            | Self::Unrecoverable { index, .. }
            | Self::Exhausted { index, .. }
            | Self::Checkpoint { index, .. }
            | Self::Panicked { index } => *index,
        }
    }

    /// Attempts made before giving up, when the processor was involved.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::Fatal { attempts, .. }
            | Self::Unrecoverable { attempts, .. }
            | Self::Exhausted { attempts, .. } => Some(*attempts),
            Self::Checkpoint { .. } | Self::Panicked { .. } => None,
        }
    }

    /// Classification of the last processor failure.
    pub fn classification(&self) -> Option<&FailureClassification> {
        match self {
            Self::Fatal { classification, .. }
            | Self::Unrecoverable { classification, .. }
            | Self::Exhausted { classification, .. } => Some(classification),
            Self::Checkpoint { .. } | Self::Panicked { .. } => None,
        }
    }
}
