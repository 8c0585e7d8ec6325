//! Run orchestrator implementation.
//!
//! Drives a source through the run state machine:
//! - Planning: chunk the source and skip units already checkpointed
//! - Dispatching: process the remaining units under the adaptive limit
//! - Merging: combine checkpointed results in index order

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::checkpoint::CheckpointStore;
use crate::chunker::Chunker;
use crate::classifier::ErrorClassifier;
use crate::executor::{DiagnosticOracle, RetryExecutor, UnitError, UnitProcessor};
use crate::merge::{MergePart, Merger};
use crate::metrics;
use crate::throttle::ConcurrencyController;
use crate::unit::{validate_plan, RunId, UnitResult, WorkUnit};

use super::config::EngineConfig;
use super::types::{MergedRun, RunError, RunPhase, RunProgress, RunReport, RunSummary};

/// Per-dispatch bookkeeping.
#[derive(Default)]
struct DispatchState {
    succeeded: usize,
    failures: Vec<UnitError>,
}

/// The run orchestrator - plans, dispatches, and merges units.
pub struct Orchestrator {
    config: EngineConfig,
    chunker: Arc<dyn Chunker>,
    processor: Arc<dyn UnitProcessor>,
    store: Arc<dyn CheckpointStore>,
    oracle: Option<Arc<dyn DiagnosticOracle>>,
    classifier: ErrorClassifier,
    controller: ConcurrencyController,
    progress: Option<mpsc::Sender<RunProgress>>,
    phase: Mutex<RunPhase>,
}

impl Orchestrator {
    /// Create a new orchestrator.
    ///
    /// `store` must be scoped to the run being executed; rerunning the same
    /// source against the same store resumes it. A store that records its
    /// run id is checked against the source before planning.
    pub fn new(
        config: EngineConfig,
        chunker: Arc<dyn Chunker>,
        processor: Arc<dyn UnitProcessor>,
        store: Arc<dyn CheckpointStore>,
    ) -> Self {
        let controller = config.controller();
        Self {
            config,
            chunker,
            processor,
            store,
            oracle: None,
            classifier: ErrorClassifier::default(),
            controller,
            progress: None,
            phase: Mutex::new(RunPhase::Planning),
        }
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn DiagnosticOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Replaces the controller built from the config, e.g. to share one
    /// limit between several orchestrators calling the same service.
    pub fn with_controller(mut self, controller: ConcurrencyController) -> Self {
        self.controller = controller;
        self
    }

    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Sends [`RunProgress`] events to `sender`. The receiver must keep
    /// draining; a full channel holds the run back.
    pub fn with_progress(mut self, sender: mpsc::Sender<RunProgress>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Current phase of the most recent run.
    pub fn phase(&self) -> RunPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn controller(&self) -> &ConcurrencyController {
        &self.controller
    }

    /// Processes every unit of `source` and returns their results in index
    /// order, without merging.
    pub async fn run(&self, source: &str) -> Result<RunReport, RunError> {
        match self.process_units(source).await {
            Ok((_, report)) => {
                self.enter(RunPhase::Done).await;
                Ok(report)
            }
            Err(e) => Err(self.fail(e).await),
        }
    }

    /// Processes every unit of `source`, then merges the results.
    pub async fn run_merged<M: Merger>(
        &self,
        source: &str,
        merger: &M,
    ) -> Result<MergedRun<M::Output>, RunError> {
        let (units, report) = match self.process_units(source).await {
            Ok(processed) => processed,
            Err(e) => return Err(self.fail(e).await),
        };

        self.enter(RunPhase::Merging).await;
        match self.merge_with_retry(&units, &report.results, merger).await {
            Ok(output) => {
                self.enter(RunPhase::Done).await;
                Ok(MergedRun { report, output })
            }
            Err(e) => Err(self.fail(e).await),
        }
    }

    /// Planning and dispatching. Returns the plan and the collected results.
    async fn process_units(&self, source: &str) -> Result<(Vec<WorkUnit>, RunReport), RunError> {
        self.enter(RunPhase::Planning).await;

        let run_id = RunId::from_source(source);
        if let Some(store_run_id) = self.store.run_id() {
            if *store_run_id != run_id {
                return Err(RunError::StoreMismatch {
                    run_id,
                    store_run_id: store_run_id.clone(),
                });
            }
        }
        let units = self.chunker.plan(source).await?;
        validate_plan(&units)?;

        let mut pending = Vec::new();
        for unit in &units {
            if !self.store.has(unit.index)? {
                pending.push(unit.clone());
            }
        }
        let cached = units.len() - pending.len();
        metrics::UNITS_TOTAL
            .with_label_values(&["cached"])
            .inc_by(cached as u64);

        info!(
            run_id = %run_id,
            chunker = self.chunker.name(),
            total = units.len(),
            cached,
            "Planned run for {}",
            source
        );
        self.emit(RunProgress::Planned {
            total: units.len(),
            cached,
        })
        .await;

        self.enter(RunPhase::Dispatching).await;
        let retried_before = self.controller.snapshot().totals.retried;
        let state = self.dispatch(pending).await;
        let after = self.controller.snapshot();

        let summary = RunSummary {
            total_units: units.len(),
            cached,
            succeeded: state.succeeded,
            failed: state.failures.len(),
            retried: after.totals.retried.saturating_sub(retried_before),
            final_concurrency: after.concurrency_limit,
        };

        if !state.failures.is_empty() {
            let mut failures = state.failures;
            failures.sort_by_key(UnitError::index);
            return Err(RunError::UnitsFailed { failures, summary });
        }

        let results = self.collect_results(&units)?;
        info!(
            run_id = %run_id,
            succeeded = summary.succeeded,
            cached = summary.cached,
            retried = summary.retried,
            final_concurrency = summary.final_concurrency,
            "All units checkpointed"
        );

        Ok((
            units,
            RunReport {
                run_id,
                summary,
                results,
            },
        ))
    }

    /// Runs `pending` units under the controller until all finish or one
    /// fails. After the first failure no further unit is admitted, but units
    /// already in flight run to completion and keep their checkpoints.
    async fn dispatch(&self, pending: Vec<WorkUnit>) -> DispatchState {
        let mut executor = RetryExecutor::new(self.processor.clone(), self.controller.clone())
            .with_classifier(self.classifier.clone())
            .with_policy(self.config.retry_policy());
        if let Some(oracle) = &self.oracle {
            executor = executor.with_oracle(oracle.clone());
        }
        let executor = Arc::new(executor);
        // Set by a worker before it releases its slot, so a failure is seen
        // by the admission loop even if the join result arrives later.
        let halted = Arc::new(AtomicBool::new(false));

        let mut tasks: JoinSet<Result<usize, UnitError>> = JoinSet::new();
        let mut state = DispatchState::default();

        for unit in pending {
            let permit = loop {
                if halted.load(Ordering::SeqCst) || !state.failures.is_empty() {
                    break None;
                }
                tokio::select! {
                    biased;
                    Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                        self.record(joined, &mut state).await;
                    }
                    permit = self.controller.acquire() => break Some(permit),
                }
            };
            let Some(permit) = permit else { break };
            if halted.load(Ordering::SeqCst) {
                drop(permit);
                break;
            }

            let index = unit.index;
            debug!(index, "Dispatching unit");

            let executor = executor.clone();
            let store = self.store.clone();
            let controller = self.controller.clone();
            let halted = halted.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let worker_controller = controller.clone();
                let worker = tokio::spawn(async move {
                    match executor.execute(&unit).await {
                        // Acknowledge only once the checkpoint is durable.
                        Ok(result) => match store.put(&result) {
                            Ok(_) => Ok(unit.index),
                            Err(source) => {
                                worker_controller.record_unsaved_success();
                                Err(UnitError::Checkpoint {
                                    index: unit.index,
                                    source,
                                })
                            }
                        },
                        Err(e) => Err(e),
                    }
                });
                let outcome = match worker.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        error!(index, "Unit worker panicked: {}", e);
                        controller.record_unit_failed();
                        Err(UnitError::Panicked { index })
                    }
                };
                if outcome.is_err() {
                    halted.store(true, Ordering::SeqCst);
                }
                outcome
            });
        }

        if halted.load(Ordering::SeqCst) && !tasks.is_empty() {
            info!(
                in_flight = tasks.len(),
                "Unit failed, waiting for in-flight units"
            );
        }

        while let Some(joined) = tasks.join_next().await {
            self.record(joined, &mut state).await;
        }

        state
    }

    async fn record(
        &self,
        joined: Result<Result<usize, UnitError>, JoinError>,
        state: &mut DispatchState,
    ) {
        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Unit supervisor task failed: {}", e);
                return;
            }
        };

        match outcome {
            Ok(index) => {
                state.succeeded += 1;
                metrics::UNITS_TOTAL.with_label_values(&["completed"]).inc();
                debug!(index, "Unit checkpointed");
                self.emit(RunProgress::UnitCompleted { index }).await;
            }
            Err(e) => {
                metrics::UNITS_TOTAL.with_label_values(&["failed"]).inc();
                if let UnitError::Checkpoint { index, source } = &e {
                    error!(index, "Failed to checkpoint unit: {}", source);
                }
                self.emit(RunProgress::UnitFailed {
                    index: e.index(),
                    kind: e.classification().map(|c| c.kind),
                    message: e.to_string(),
                })
                .await;
                state.failures.push(e);
            }
        }
    }

    /// Reads every unit's result back from the store, in index order.
    fn collect_results(&self, units: &[WorkUnit]) -> Result<Vec<UnitResult>, RunError> {
        let mut results = Vec::with_capacity(units.len());
        let mut missing = Vec::new();
        for unit in units {
            match self.store.get(unit.index)? {
                Some(result) => results.push(result),
                None => missing.push(unit.index),
            }
        }

        if missing.is_empty() {
            Ok(results)
        } else {
            Err(RunError::IncompleteCheckpoints { missing })
        }
    }

    async fn merge_with_retry<M: Merger>(
        &self,
        units: &[WorkUnit],
        results: &[UnitResult],
        merger: &M,
    ) -> Result<M::Output, RunError> {
        let parts: Vec<MergePart<'_>> = units
            .iter()
            .zip(results)
            .map(|(unit, result)| MergePart { unit, result })
            .collect();
        let max_attempts = self.config.merge_max_attempts.max(1);
        let delay = Duration::from_millis(self.config.merge_retry_delay_ms);

        let mut attempt = 0;
        loop {
            attempt += 1;
            match merger.merge(&parts).await {
                Ok(output) => {
                    metrics::MERGE_ATTEMPTS.with_label_values(&["success"]).inc();
                    info!(
                        merger = merger.name(),
                        parts = parts.len(),
                        attempt,
                        "Merged unit results"
                    );
                    return Ok(output);
                }
                Err(e) => {
                    metrics::MERGE_ATTEMPTS.with_label_values(&["error"]).inc();
                    if attempt >= max_attempts {
                        return Err(RunError::Merge {
                            attempts: attempt,
                            source: e,
                        });
                    }
                    warn!(
                        merger = merger.name(),
                        attempt,
                        max_attempts,
                        "Merge failed, retrying in {:?}: {}",
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn enter(&self, phase: RunPhase) {
        {
            let mut current = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
            debug!(from = %*current, to = %phase, "Run phase transition");
            *current = phase;
        }
        self.emit(RunProgress::PhaseChanged { phase }).await;
    }

    async fn fail(&self, error: RunError) -> RunError {
        error!("Run failed: {}", error);
        self.enter(RunPhase::Failed).await;
        error
    }

    async fn emit(&self, event: RunProgress) {
        if let Some(sender) = &self.progress {
            if sender.send(event).await.is_err() {
                debug!("Progress receiver dropped");
            }
        }
    }
}
