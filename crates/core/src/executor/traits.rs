//! Trait definitions for unit processing and diagnosis.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::classifier::{FailureClassification, ProcessingFailure};
use crate::unit::WorkUnit;

/// Turns one work unit into a result.
///
/// This is the only component expected to call external services, and may
/// take seconds to minutes per call. Timeouts belong here too: a processor
/// that gives up should fail with a message the classifier recognises as a
/// timeout.
#[async_trait]
pub trait UnitProcessor: Send + Sync {
    /// Returns the name of this processor implementation.
    fn name(&self) -> &str;

    /// Processes a unit.
    async fn process(&self, unit: &WorkUnit) -> Result<Value, ProcessingFailure>;
}

/// Errors from the diagnostic oracle itself.
#[derive(Debug, Error)]
pub enum OracleError {
    /// The oracle could not be reached.
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    /// The oracle answered with something unusable.
    #[error("invalid oracle response: {0}")]
    InvalidResponse(String),
}

/// What the retry loop knows when it asks for a diagnosis.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticContext {
    pub unit: WorkUnit,
    /// Attempt that just failed (1-based).
    pub attempt: u32,
    pub max_attempts: u32,
    pub classification: FailureClassification,
}

/// An oracle verdict on an unclassified failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnosis {
    /// Whether waiting and retrying could plausibly help.
    pub recoverable: bool,
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Diagnosis {
    /// Verdict used when the oracle itself fails.
    pub fn assumed_recoverable(error: &OracleError) -> Self {
        Self {
            recoverable: true,
            explanation: format!("diagnosis unavailable ({}); assuming recoverable", error),
            suggestion: None,
        }
    }
}

/// Advisory service consulted for unclassified failures on the final attempt.
#[async_trait]
pub trait DiagnosticOracle: Send + Sync {
    /// Judges whether `failure` is worth retrying.
    async fn diagnose(
        &self,
        failure: &ProcessingFailure,
        context: &DiagnosticContext,
    ) -> Result<Diagnosis, OracleError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assumed_recoverable() {
        let diagnosis =
            Diagnosis::assumed_recoverable(&OracleError::Unavailable("connect refused".into()));
        assert!(diagnosis.recoverable);
        assert!(diagnosis.explanation.contains("connect refused"));
        assert!(diagnosis.suggestion.is_none());
    }

    #[test]
    fn test_diagnosis_deserialize_without_suggestion() {
        let diagnosis: Diagnosis =
            serde_json::from_str(r#"{"recoverable":false,"explanation":"corrupt audio"}"#)
                .unwrap();
        assert!(!diagnosis.recoverable);
        assert_eq!(diagnosis.explanation, "corrupt audio");
    }
}
