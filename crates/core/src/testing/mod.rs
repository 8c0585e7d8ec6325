//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the collaborator traits,
//! so runs can be exercised end to end without real services.
//!
//! # Example
//!
//! ```rust,ignore
//! use batchmill_core::testing::{fixtures, MockUnitProcessor, StaticChunker};
//!
//! let chunker = StaticChunker::with_count(5);
//! let processor = MockUnitProcessor::new();
//!
//! // Configure failures
//! processor.fail_always(2, ProcessingFailure::with_status(401, "Unauthorized")).await;
//!
//! // Use in an Orchestrator...
//! ```

mod mock_chunker;
mod mock_merger;
mod mock_oracle;
mod mock_processor;

pub use mock_chunker::StaticChunker;
pub use mock_merger::MockMerger;
pub use mock_oracle::MockDiagnosticOracle;
pub use mock_processor::MockUnitProcessor;

/// Test fixtures and helper functions.
pub mod fixtures {
    use serde_json::json;

    use crate::unit::{UnitResult, WorkUnit};

    /// Seconds covered by each fixture unit.
    pub const UNIT_SECS: f64 = 60.0;

    /// Create a test work unit addressing a one-minute window.
    pub fn unit(index: usize) -> WorkUnit {
        let start = index as f64 * UNIT_SECS;
        WorkUnit::new(
            index,
            format!("fixture.wav#t={},{}", start, start + UNIT_SECS),
            start,
        )
    }

    /// Create `count` dense test units.
    pub fn units(count: usize) -> Vec<WorkUnit> {
        (0..count).map(unit).collect()
    }

    /// Create a test result shaped like a transcription segment.
    pub fn result(index: usize) -> UnitResult {
        UnitResult::new(
            index,
            json!({
                "text": format!("segment {}", index),
                "start": 0.0,
                "end": UNIT_SECS,
            }),
        )
    }

    /// The result the mock processor produces for `unit`.
    pub fn mock_result(unit: &WorkUnit) -> UnitResult {
        UnitResult::new(
            unit.index,
            json!({
                "index": unit.index,
                "locator": unit.locator,
            }),
        )
    }
}
