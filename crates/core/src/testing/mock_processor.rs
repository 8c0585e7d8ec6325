//! Mock unit processor for testing.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::classifier::ProcessingFailure;
use crate::executor::UnitProcessor;
use crate::unit::WorkUnit;

/// Mock implementation of the UnitProcessor trait.
///
/// Provides controllable behavior for testing:
/// - Queue failures for specific units, or make a unit always fail
/// - Simulate processing time (works with paused tokio time)
/// - Track calls per unit and the peak number of concurrent calls
/// - Panic on a specific unit
///
/// Units without a scripted outcome succeed with
/// `{"index": <index>, "locator": <locator>}`.
///
/// # Example
///
/// ```rust,ignore
/// use batchmill_core::testing::MockUnitProcessor;
///
/// let processor = MockUnitProcessor::new();
///
/// // Unit 2 fails once with a connection reset, then succeeds
/// processor.push_failures(2, 1, ProcessingFailure::new("ECONNRESET")).await;
///
/// // ... run ...
///
/// assert_eq!(processor.call_count(2).await, 2);
/// ```
#[derive(Debug)]
pub struct MockUnitProcessor {
    /// Failures returned before a unit succeeds, in order.
    queued_failures: Arc<RwLock<HashMap<usize, VecDeque<ProcessingFailure>>>>,
    /// Failures returned on every call.
    persistent_failures: Arc<RwLock<HashMap<usize, ProcessingFailure>>>,
    /// Units whose processing panics.
    panics: Arc<RwLock<HashSet<usize>>>,
    /// Unit indices in call order.
    calls: Arc<RwLock<Vec<usize>>>,
    /// Simulated processing duration in milliseconds.
    processing_duration_ms: Arc<RwLock<u64>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl Default for MockUnitProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight count even if processing panics.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockUnitProcessor {
    /// Create a new mock processor where every unit succeeds immediately.
    pub fn new() -> Self {
        Self {
            queued_failures: Arc::new(RwLock::new(HashMap::new())),
            persistent_failures: Arc::new(RwLock::new(HashMap::new())),
            panics: Arc::new(RwLock::new(HashSet::new())),
            calls: Arc::new(RwLock::new(Vec::new())),
            processing_duration_ms: Arc::new(RwLock::new(0)),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Queue `times` failures for a unit; later calls succeed.
    pub async fn push_failures(&self, index: usize, times: usize, failure: ProcessingFailure) {
        let mut queued = self.queued_failures.write().await;
        let queue = queued.entry(index).or_default();
        for _ in 0..times {
            queue.push_back(failure.clone());
        }
    }

    /// Make every call for a unit fail.
    pub async fn fail_always(&self, index: usize, failure: ProcessingFailure) {
        self.persistent_failures.write().await.insert(index, failure);
    }

    /// Remove all configured failures. Recorded calls are kept.
    pub async fn clear_failures(&self) {
        self.queued_failures.write().await.clear();
        self.persistent_failures.write().await.clear();
        self.panics.write().await.clear();
    }

    /// Make processing of a unit panic.
    pub async fn panic_on(&self, index: usize) {
        self.panics.write().await.insert(index);
    }

    /// Set the simulated processing duration.
    pub async fn set_processing_duration(&self, duration: Duration) {
        *self.processing_duration_ms.write().await = duration.as_millis() as u64;
    }

    /// Get unit indices in the order they were processed.
    pub async fn recorded_calls(&self) -> Vec<usize> {
        self.calls.read().await.clone()
    }

    /// Get the number of calls made for a unit.
    pub async fn call_count(&self, index: usize) -> usize {
        self.calls.read().await.iter().filter(|&&i| i == index).count()
    }

    /// Get the total number of calls.
    pub async fn total_calls(&self) -> usize {
        self.calls.read().await.len()
    }

    /// Highest number of calls that were in progress at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Decide the outcome of a call.
    async fn take_outcome(&self, index: usize) -> Option<ProcessingFailure> {
        if let Some(failure) = self.persistent_failures.read().await.get(&index) {
            return Some(failure.clone());
        }
        self.queued_failures
            .write()
            .await
            .get_mut(&index)
            .and_then(|queue| queue.pop_front())
    }
}

#[async_trait]
impl UnitProcessor for MockUnitProcessor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn process(&self, unit: &WorkUnit) -> Result<Value, ProcessingFailure> {
        self.calls.write().await.push(unit.index);

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);

        let duration_ms = *self.processing_duration_ms.read().await;
        if duration_ms > 0 {
            tokio::time::sleep(Duration::from_millis(duration_ms)).await;
        }

        if self.panics.read().await.contains(&unit.index) {
            panic!("mock processor panic on unit {}", unit.index);
        }

        match self.take_outcome(unit.index).await {
            Some(failure) => Err(failure),
            None => Ok(json!({
                "index": unit.index,
                "locator": unit.locator,
            })),
        }
    }
}
