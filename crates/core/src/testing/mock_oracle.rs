//! Mock diagnostic oracle for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::classifier::ProcessingFailure;
use crate::executor::{DiagnosticContext, DiagnosticOracle, Diagnosis, OracleError};

#[derive(Debug, Clone)]
enum Verdict {
    Answer(Diagnosis),
    Fail(String),
}

/// Mock implementation of the DiagnosticOracle trait.
///
/// Always returns the same verdict and records every context it was asked
/// about.
#[derive(Debug)]
pub struct MockDiagnosticOracle {
    verdict: Verdict,
    contexts: Arc<RwLock<Vec<DiagnosticContext>>>,
}

impl MockDiagnosticOracle {
    fn with_verdict(verdict: Verdict) -> Self {
        Self {
            verdict,
            contexts: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// An oracle that judges every failure recoverable.
    pub fn recoverable(explanation: &str) -> Self {
        Self::with_verdict(Verdict::Answer(Diagnosis {
            recoverable: true,
            explanation: explanation.to_string(),
            suggestion: None,
        }))
    }

    /// An oracle that judges every failure unrecoverable.
    pub fn unrecoverable(explanation: &str) -> Self {
        Self::with_verdict(Verdict::Answer(Diagnosis {
            recoverable: false,
            explanation: explanation.to_string(),
            suggestion: Some("fix the input and rerun".to_string()),
        }))
    }

    /// An oracle that is itself unavailable.
    pub fn failing(message: &str) -> Self {
        Self::with_verdict(Verdict::Fail(message.to_string()))
    }

    /// Get the number of diagnoses requested.
    pub async fn call_count(&self) -> usize {
        self.contexts.read().await.len()
    }

    /// Get every context passed to the oracle.
    pub async fn recorded_contexts(&self) -> Vec<DiagnosticContext> {
        self.contexts.read().await.clone()
    }
}

#[async_trait]
impl DiagnosticOracle for MockDiagnosticOracle {
    async fn diagnose(
        &self,
        _failure: &ProcessingFailure,
        context: &DiagnosticContext,
    ) -> Result<Diagnosis, OracleError> {
        self.contexts.write().await.push(context.clone());
        match &self.verdict {
            Verdict::Answer(diagnosis) => Ok(diagnosis.clone()),
            Verdict::Fail(message) => Err(OracleError::Unavailable(message.clone())),
        }
    }
}
