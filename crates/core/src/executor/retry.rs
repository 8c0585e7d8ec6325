//! Per-unit retry loop.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::classifier::{
    ErrorClassifier, FailureClassification, ProcessingFailure, RecoveryAction,
};
use crate::metrics;
use crate::throttle::ConcurrencyController;
use crate::unit::{UnitResult, WorkUnit};

use super::error::UnitError;
use super::traits::{DiagnosticContext, DiagnosticOracle, Diagnosis, UnitProcessor};

fn default_max_attempts() -> u32 {
    3
}

/// Attempt ceiling for each unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts per unit, the first one included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }
}

/// Diagnose waits grow linearly with the attempt number.
fn diagnose_backoff_ms(wait_ms: u64, attempt: u32) -> u64 {
    wait_ms.saturating_mul(u64::from(attempt))
}

/// Runs a unit through the processor, retrying according to how each
/// failure classifies.
///
/// Every outcome is reported to the shared [`ConcurrencyController`], so the
/// executor is the component that turns failures into admission pressure.
pub struct RetryExecutor {
    processor: Arc<dyn UnitProcessor>,
    controller: ConcurrencyController,
    classifier: ErrorClassifier,
    oracle: Option<Arc<dyn DiagnosticOracle>>,
    policy: RetryPolicy,
}

impl RetryExecutor {
    /// Creates an executor with the default classifier and policy.
    pub fn new(processor: Arc<dyn UnitProcessor>, controller: ConcurrencyController) -> Self {
        Self {
            processor,
            controller,
            classifier: ErrorClassifier::default(),
            oracle: None,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn DiagnosticOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn controller(&self) -> &ConcurrencyController {
        &self.controller
    }

    /// Processes `unit` until it succeeds or fails terminally.
    pub async fn execute(&self, unit: &WorkUnit) -> Result<UnitResult, UnitError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let started = Instant::now();
        let mut attempt = 0u32;

        let error = loop {
            attempt += 1;
            debug!(
                index = unit.index,
                attempt,
                processor = self.processor.name(),
                "Processing unit"
            );

            let failure = match self.processor.process(unit).await {
                Ok(payload) => {
                    self.controller.report_success();
                    metrics::UNIT_DURATION.observe(started.elapsed().as_secs_f64());
                    if attempt > 1 {
                        info!(index = unit.index, attempt, "Unit succeeded after retry");
                    }
                    return Ok(UnitResult::new(unit.index, payload));
                }
                Err(failure) => failure,
            };

            let classification = self.classifier.classify(&failure);
            metrics::ATTEMPT_FAILURES
                .with_label_values(&[classification.kind.as_str()])
                .inc();
            let is_last = attempt >= max_attempts;

            let wait_ms = match classification.action {
                RecoveryAction::FailFast => {
                    break UnitError::Fatal {
                        index: unit.index,
                        attempts: attempt,
                        classification,
                        failure,
                    };
                }
                RecoveryAction::WaitAndReduceConcurrency => {
                    self.controller.report_rate_limited();
                    classification.wait_ms
                }
                RecoveryAction::RetryFresh | RecoveryAction::WaitAndRetry => {
                    self.controller.report_other_failure();
                    classification.wait_ms
                }
                RecoveryAction::Diagnose => {
                    self.controller.report_other_failure();
                    if is_last {
                        let diagnosis = self
                            .diagnose(unit, attempt, max_attempts, &failure, &classification)
                            .await;
                        break match diagnosis {
                            Some(diagnosis) if !diagnosis.recoverable => {
                                UnitError::Unrecoverable {
                                    index: unit.index,
                                    attempts: attempt,
                                    classification,
                                    failure,
                                    diagnosis,
                                }
                            }
                            diagnosis => UnitError::Exhausted {
                                index: unit.index,
                                attempts: attempt,
                                classification,
                                failure,
                                diagnosis,
                            },
                        };
                    }
                    diagnose_backoff_ms(classification.wait_ms, attempt)
                }
            };

            if is_last {
                break UnitError::Exhausted {
                    index: unit.index,
                    attempts: attempt,
                    classification,
                    failure,
                    diagnosis: None,
                };
            }

            self.controller.record_retry();
            metrics::RETRIES
                .with_label_values(&[classification.kind.as_str()])
                .inc();
            warn!(
                index = unit.index,
                attempt,
                max_attempts,
                kind = %classification.kind,
                wait_ms,
                "Unit attempt failed, retrying: {}",
                failure
            );

            tokio::time::sleep(Duration::from_millis(wait_ms)).await;
        };

        self.controller.record_unit_failed();
        metrics::UNIT_DURATION.observe(started.elapsed().as_secs_f64());
        warn!(index = unit.index, "Unit failed: {}", error);
        Err(error)
    }

    /// Asks the oracle about a failure. `None` when no oracle is configured.
    async fn diagnose(
        &self,
        unit: &WorkUnit,
        attempt: u32,
        max_attempts: u32,
        failure: &ProcessingFailure,
        classification: &FailureClassification,
    ) -> Option<Diagnosis> {
        let oracle = self.oracle.as_ref()?;
        let context = DiagnosticContext {
            unit: unit.clone(),
            attempt,
            max_attempts,
            classification: *classification,
        };

        match oracle.diagnose(failure, &context).await {
            Ok(diagnosis) => {
                debug!(
                    index = unit.index,
                    recoverable = diagnosis.recoverable,
                    "Oracle diagnosis: {}",
                    diagnosis.explanation
                );
                Some(diagnosis)
            }
            Err(e) => {
                warn!(index = unit.index, error = %e, "Diagnostic oracle failed");
                Some(Diagnosis::assumed_recoverable(&e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::FailureKind;
    use crate::testing::{fixtures, MockDiagnosticOracle, MockUnitProcessor};

    fn executor(processor: &Arc<MockUnitProcessor>, ceiling: usize) -> RetryExecutor {
        RetryExecutor::new(processor.clone(), ConcurrencyController::new(ceiling))
    }

    #[test]
    fn test_diagnose_backoff() {
        assert_eq!(diagnose_backoff_ms(1_000, 1), 1_000);
        assert_eq!(diagnose_backoff_ms(1_000, 3), 3_000);
        assert_eq!(diagnose_backoff_ms(u64::MAX / 2, 3), u64::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_first_attempt() {
        let processor = Arc::new(MockUnitProcessor::new());
        let exec = executor(&processor, 2);

        let result = exec.execute(&fixtures::unit(0)).await.unwrap();
        assert_eq!(result.index, 0);
        assert_eq!(processor.call_count(0).await, 1);
        assert_eq!(exec.controller().snapshot().totals.succeeded, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_exhausts_three_attempts() {
        let processor = Arc::new(MockUnitProcessor::new());
        processor
            .fail_always(0, ProcessingFailure::new("read ECONNRESET"))
            .await;
        let exec = executor(&processor, 2);

        let started = Instant::now();
        let err = exec.execute(&fixtures::unit(0)).await.unwrap_err();

        assert!(matches!(err, UnitError::Exhausted { attempts: 3, .. }));
        assert_eq!(err.classification().unwrap().kind, FailureKind::Transient);
        assert_eq!(processor.call_count(0).await, 3);
        // Two waits of 2s; none after the final attempt.
        assert_eq!(started.elapsed(), Duration::from_millis(4_000));

        let totals = exec.controller().snapshot().totals;
        assert_eq!(totals.retried, 2);
        assert_eq!(totals.failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_fast_skips_remaining_attempts() {
        let processor = Arc::new(MockUnitProcessor::new());
        processor
            .fail_always(0, ProcessingFailure::with_status(401, "Unauthorized"))
            .await;
        let exec = executor(&processor, 2);

        let started = Instant::now();
        let err = exec.execute(&fixtures::unit(0)).await.unwrap_err();

        assert!(matches!(err, UnitError::Fatal { attempts: 1, .. }));
        assert_eq!(err.classification().unwrap().kind, FailureKind::Unauthorized);
        assert_eq!(processor.call_count(0).await, 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failure() {
        let processor = Arc::new(MockUnitProcessor::new());
        processor
            .push_failures(0, 1, ProcessingFailure::new("socket hang up"))
            .await;
        let exec = executor(&processor, 2);

        let result = exec.execute(&fixtures::unit(0)).await.unwrap();
        assert_eq!(result.index, 0);
        assert_eq!(processor.call_count(0).await, 2);
        assert_eq!(exec.controller().snapshot().totals.retried, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_halves_concurrency() {
        let processor = Arc::new(MockUnitProcessor::new());
        processor
            .push_failures(0, 1, ProcessingFailure::with_status(429, "Too Many Requests"))
            .await;
        let exec = executor(&processor, 8);

        let started = Instant::now();
        exec.execute(&fixtures::unit(0)).await.unwrap();

        assert_eq!(exec.controller().concurrency_limit(), 4);
        assert_eq!(started.elapsed(), Duration::from_millis(60_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_diagnose_wait_scales_with_attempt() {
        let processor = Arc::new(MockUnitProcessor::new());
        processor
            .fail_always(0, ProcessingFailure::new("something odd happened"))
            .await;
        let exec = executor(&processor, 2);

        let started = Instant::now();
        let err = exec.execute(&fixtures::unit(0)).await.unwrap_err();

        assert!(matches!(
            err,
            UnitError::Exhausted {
                attempts: 3,
                diagnosis: None,
                ..
            }
        ));
        assert_eq!(err.classification().unwrap().kind, FailureKind::Unknown);
        // 1000 * 1 + 1000 * 2
        assert_eq!(started.elapsed(), Duration::from_millis(3_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_oracle_only_consulted_on_final_attempt() {
        let processor = Arc::new(MockUnitProcessor::new());
        processor
            .fail_always(0, ProcessingFailure::new("weird output"))
            .await;
        let oracle = Arc::new(MockDiagnosticOracle::recoverable("might be load"));
        let exec = executor(&processor, 2).with_oracle(oracle.clone());

        let err = exec.execute(&fixtures::unit(0)).await.unwrap_err();

        assert_eq!(oracle.call_count().await, 1);
        match err {
            UnitError::Exhausted { diagnosis, .. } => {
                assert_eq!(diagnosis.unwrap().explanation, "might be load");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let contexts = oracle.recorded_contexts().await;
        assert_eq!(contexts[0].attempt, 3);
        assert_eq!(contexts[0].max_attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_oracle_unrecoverable_verdict() {
        let processor = Arc::new(MockUnitProcessor::new());
        processor
            .fail_always(0, ProcessingFailure::new("weird output"))
            .await;
        let oracle = Arc::new(MockDiagnosticOracle::unrecoverable("input is corrupt"));
        let exec = executor(&processor, 2).with_oracle(oracle);

        let err = exec.execute(&fixtures::unit(0)).await.unwrap_err();
        assert!(matches!(err, UnitError::Unrecoverable { attempts: 3, .. }));
        assert!(err.to_string().contains("input is corrupt"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_oracle_failure_counts_as_recoverable() {
        let processor = Arc::new(MockUnitProcessor::new());
        processor
            .fail_always(0, ProcessingFailure::new("weird output"))
            .await;
        let oracle = Arc::new(MockDiagnosticOracle::failing("oracle offline"));
        let exec = executor(&processor, 2).with_oracle(oracle);

        let err = exec.execute(&fixtures::unit(0)).await.unwrap_err();
        match err {
            UnitError::Exhausted { diagnosis, .. } => assert!(diagnosis.unwrap().recoverable),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_policy() {
        let processor = Arc::new(MockUnitProcessor::new());
        processor
            .fail_always(0, ProcessingFailure::new("request timed out"))
            .await;
        let exec = executor(&processor, 2).with_policy(RetryPolicy::new(1));

        let started = Instant::now();
        let err = exec.execute(&fixtures::unit(0)).await.unwrap_err();
        assert!(matches!(err, UnitError::Exhausted { attempts: 1, .. }));
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
