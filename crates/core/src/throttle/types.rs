//! Types for the throttle module.

use serde::{Deserialize, Serialize};

/// Running totals kept by the controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleTotals {
    /// Units that completed successfully.
    pub succeeded: u64,
    /// Units that failed terminally.
    pub failed: u64,
    /// Retries scheduled across all units.
    pub retried: u64,
}

/// Point-in-time view of the throttle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleSnapshot {
    /// Current admission limit.
    pub concurrency_limit: usize,
    /// Configured ceiling; the limit never exceeds it.
    pub ceiling: usize,
    /// Units admitted and not yet released.
    pub in_flight: usize,
    /// Successes since the last adjustment or failure.
    pub consecutive_successes: u32,
    pub totals: ThrottleTotals,
}

/// Mutable state guarded by the controller's lock.
#[derive(Debug)]
pub(super) struct ThrottleState {
    pub concurrency_limit: usize,
    pub ceiling: usize,
    pub increase_after: u32,
    pub consecutive_successes: u32,
    pub in_flight: usize,
    pub totals: ThrottleTotals,
}

impl ThrottleState {
    pub fn new(ceiling: usize) -> Self {
        let ceiling = ceiling.max(1);
        Self {
            concurrency_limit: ceiling,
            ceiling,
            increase_after: 5,
            consecutive_successes: 0,
            in_flight: 0,
            totals: ThrottleTotals::default(),
        }
    }

    pub fn snapshot(&self) -> ThrottleSnapshot {
        ThrottleSnapshot {
            concurrency_limit: self.concurrency_limit,
            ceiling: self.ceiling,
            in_flight: self.in_flight,
            consecutive_successes: self.consecutive_successes,
            totals: self.totals,
        }
    }
}
