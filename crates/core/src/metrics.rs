//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Units (outcomes, attempt failures, retries, duration)
//! - Throttle (current concurrency limit)
//! - Merge (attempts by result)

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Unit Metrics
// =============================================================================

/// Units resolved, by outcome.
pub static UNITS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("batchmill_units_total", "Total units resolved"),
        &["outcome"], // "completed", "cached", "failed"
    )
    .unwrap()
});

/// Failed attempts, by classified kind.
pub static ATTEMPT_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "batchmill_attempt_failures_total",
            "Failed unit attempts by failure kind",
        ),
        &["kind"],
    )
    .unwrap()
});

/// Retries scheduled, by classified kind.
pub static RETRIES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("batchmill_retries_total", "Unit retries scheduled"),
        &["kind"],
    )
    .unwrap()
});

/// Wall time of a unit from first attempt to resolution.
pub static UNIT_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "batchmill_unit_duration_seconds",
            "Duration of a unit including retries",
        )
        .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
    )
    .unwrap()
});

// =============================================================================
// Throttle Metrics
// =============================================================================

/// Current admission limit.
pub static CONCURRENCY_LIMIT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "batchmill_concurrency_limit",
        "Current number of units admitted concurrently",
    )
    .unwrap()
});

// =============================================================================
// Merge Metrics
// =============================================================================

/// Merge attempts, by result.
pub static MERGE_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("batchmill_merge_attempts_total", "Merge attempts"),
        &["result"], // "success", "error"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Units
        Box::new(UNITS_TOTAL.clone()),
        Box::new(ATTEMPT_FAILURES.clone()),
        Box::new(RETRIES.clone()),
        Box::new(UNIT_DURATION.clone()),
        // Throttle
        Box::new(CONCURRENCY_LIMIT.clone()),
        // Merge
        Box::new(MERGE_ATTEMPTS.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_register() {
        let registry = prometheus::Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }

        UNITS_TOTAL.with_label_values(&["completed"]).inc();
        let families = registry.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "batchmill_units_total"));
    }
}
