//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::executor::RetryPolicy;
use crate::throttle::ConcurrencyController;

/// Configuration for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Ceiling for concurrent units. The adaptive limit never exceeds it.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Starting limit. Defaults to the ceiling.
    #[serde(default)]
    pub initial_concurrency: Option<usize>,

    /// Consecutive successes required before the limit grows by one.
    #[serde(default = "default_increase_after")]
    pub increase_after_successes: u32,

    /// Attempts per unit, the first one included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Attempts for the merge step.
    #[serde(default = "default_max_attempts")]
    pub merge_max_attempts: u32,

    /// Fixed wait between merge attempts (milliseconds).
    #[serde(default = "default_merge_retry_delay")]
    pub merge_retry_delay_ms: u64,
}

fn default_max_concurrency() -> usize {
    4
}

fn default_increase_after() -> u32 {
    5
}

fn default_max_attempts() -> u32 {
    3
}

fn default_merge_retry_delay() -> u64 {
    1000 // 1 second
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            initial_concurrency: None,
            increase_after_successes: default_increase_after(),
            max_attempts: default_max_attempts(),
            merge_max_attempts: default_max_attempts(),
            merge_retry_delay_ms: default_merge_retry_delay(),
        }
    }
}

impl EngineConfig {
    /// Builds the controller described by this configuration.
    pub fn controller(&self) -> ConcurrencyController {
        let controller = ConcurrencyController::new(self.max_concurrency)
            .with_increase_after(self.increase_after_successes);
        match self.initial_concurrency {
            Some(limit) => controller.starting_at(limit),
            None => controller,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts)
    }
}
