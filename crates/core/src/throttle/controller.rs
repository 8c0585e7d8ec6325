//! AIMD concurrency controller with an admission gate.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::metrics;

use super::types::{ThrottleSnapshot, ThrottleState};

struct Shared {
    state: Mutex<ThrottleState>,
    released: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ThrottleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owns the current parallelism level and admits units against it.
///
/// Cloning yields another handle to the same state. All updates happen
/// under a single lock, so feedback from concurrent units never races.
#[derive(Clone)]
pub struct ConcurrencyController {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ConcurrencyController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrencyController")
            .field("state", &self.snapshot())
            .finish()
    }
}

impl ConcurrencyController {
    /// Creates a controller whose limit starts at, and never exceeds, `ceiling`.
    ///
    /// A ceiling of zero is treated as one.
    pub fn new(ceiling: usize) -> Self {
        let state = ThrottleState::new(ceiling);
        metrics::CONCURRENCY_LIMIT.set(state.concurrency_limit as i64);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                released: Notify::new(),
            }),
        }
    }

    /// Starts the limit below the ceiling. Clamped to `1..=ceiling`.
    pub fn starting_at(self, limit: usize) -> Self {
        {
            let mut state = self.shared.lock();
            state.concurrency_limit = limit.clamp(1, state.ceiling);
            metrics::CONCURRENCY_LIMIT.set(state.concurrency_limit as i64);
        }
        self
    }

    /// Sets how many consecutive successes must be exceeded before the
    /// limit grows by one.
    pub fn with_increase_after(self, successes: u32) -> Self {
        self.shared.lock().increase_after = successes;
        self
    }

    /// Waits until fewer than `concurrency_limit` units are in flight, then
    /// admits the caller. The slot is held until the permit is dropped.
    pub async fn acquire(&self) -> AdmissionPermit {
        loop {
            let notified = self.shared.released.notified();
            tokio::pin!(notified);
            // Register before checking so a release between the check and
            // the await is not missed.
            notified.as_mut().enable();

            {
                let mut state = self.shared.lock();
                if state.in_flight < state.concurrency_limit {
                    state.in_flight += 1;
                    return AdmissionPermit {
                        shared: Arc::clone(&self.shared),
                    };
                }
            }

            notified.await;
        }
    }

    /// Records a successful unit. Grows the limit by one after a streak of
    /// more than `increase_after` successes, up to the ceiling.
    pub fn report_success(&self) {
        let raised = {
            let mut state = self.shared.lock();
            state.totals.succeeded += 1;
            state.consecutive_successes = state.consecutive_successes.saturating_add(1);

            if state.consecutive_successes > state.increase_after
                && state.concurrency_limit < state.ceiling
            {
                state.concurrency_limit += 1;
                state.consecutive_successes = 0;
                Some(state.concurrency_limit)
            } else {
                None
            }
        };

        if let Some(limit) = raised {
            metrics::CONCURRENCY_LIMIT.set(limit as i64);
            info!(limit, "Success streak, raising concurrency limit");
            self.shared.released.notify_waiters();
        }
    }

    /// Records a rate-limit signal: halves the limit (minimum 1) and resets
    /// the success streak. Already admitted units are not affected.
    pub fn report_rate_limited(&self) {
        let (before, after) = {
            let mut state = self.shared.lock();
            let before = state.concurrency_limit;
            state.concurrency_limit = (before / 2).max(1);
            state.consecutive_successes = 0;
            (before, state.concurrency_limit)
        };

        metrics::CONCURRENCY_LIMIT.set(after as i64);
        if after != before {
            warn!(
                from = before,
                to = after,
                "Rate limited, reducing concurrency limit"
            );
        } else {
            debug!(limit = after, "Rate limited at minimum concurrency");
        }
    }

    /// Records a non-rate-limit failure: resets the success streak only.
    pub fn report_other_failure(&self) {
        self.shared.lock().consecutive_successes = 0;
    }

    /// Counts a scheduled retry.
    pub fn record_retry(&self) {
        self.shared.lock().totals.retried += 1;
    }

    /// Counts a unit that failed terminally.
    pub fn record_unit_failed(&self) {
        self.shared.lock().totals.failed += 1;
    }

    /// Moves a unit that processed successfully but could not be
    /// checkpointed from the succeeded total to the failed one. The success
    /// streak is left as is.
    pub fn record_unsaved_success(&self) {
        let mut state = self.shared.lock();
        state.totals.succeeded = state.totals.succeeded.saturating_sub(1);
        state.totals.failed += 1;
    }

    /// Current state.
    pub fn snapshot(&self) -> ThrottleSnapshot {
        self.shared.lock().snapshot()
    }

    /// Current admission limit.
    pub fn concurrency_limit(&self) -> usize {
        self.shared.lock().concurrency_limit
    }
}

/// A held admission slot. Dropping it releases the slot.
pub struct AdmissionPermit {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for AdmissionPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionPermit").finish_non_exhaustive()
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        {
            let mut state = self.shared.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
        }
        self.shared.released.notify_waiters();
    }
}
