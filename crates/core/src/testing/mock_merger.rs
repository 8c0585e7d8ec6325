//! Mock merger for testing.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::merge::{MergeError, MergePart, Merger, OrderedJsonMerger};

/// Merger that fails a fixed number of times, then merges like
/// [`OrderedJsonMerger`].
#[derive(Debug, Default)]
pub struct MockMerger {
    failures_left: AtomicUsize,
    calls: AtomicUsize,
}

impl MockMerger {
    /// Create a merger that always succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a merger whose first `times` calls fail.
    pub fn failing_times(times: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(times),
            calls: AtomicUsize::new(0),
        }
    }

    /// Get the number of merge calls.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Merger for MockMerger {
    type Output = Value;

    fn name(&self) -> &str {
        "mock"
    }

    async fn merge(&self, parts: &[MergePart<'_>]) -> Result<Value, MergeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let should_fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(MergeError::Failed("simulated merge failure".to_string()));
        }
        OrderedJsonMerger::new().merge(parts).await
    }
}
