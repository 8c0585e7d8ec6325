//! Trait definitions for the merge module.

use async_trait::async_trait;
use thiserror::Error;

use crate::unit::{UnitResult, WorkUnit};

/// Errors that can occur while merging results.
#[derive(Debug, Error)]
pub enum MergeError {
    /// The parts cannot be combined (gaps, overlaps, bad payloads...).
    #[error("invalid merge input: {0}")]
    InvalidInput(String),

    /// Merging failed.
    #[error("merge failed: {0}")]
    Failed(String),

    /// I/O error while writing merged output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One unit together with its result, in index order.
#[derive(Debug, Clone)]
pub struct MergePart<'a> {
    pub unit: &'a WorkUnit,
    pub result: &'a UnitResult,
}

/// Combines per-unit results into the final output.
///
/// Parts are always supplied complete and sorted by unit index. The merger
/// is responsible for re-anchoring anything positional using each unit's
/// `sequence_offset`.
#[async_trait]
pub trait Merger: Send + Sync {
    /// The combined output.
    type Output: Send;

    /// Returns the name of this merger implementation.
    fn name(&self) -> &str;

    /// Merges `parts`.
    async fn merge(&self, parts: &[MergePart<'_>]) -> Result<Self::Output, MergeError>;
}
