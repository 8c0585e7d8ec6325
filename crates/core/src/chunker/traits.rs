//! Trait definitions for the chunker module.

use async_trait::async_trait;
use thiserror::Error;

use crate::unit::WorkUnit;

/// Errors that can occur while planning units.
#[derive(Debug, Error)]
pub enum ChunkerError {
    /// The source cannot be split (missing, unreadable, zero length...).
    #[error("invalid source {source_ref}: {reason}")]
    InvalidSource { source_ref: String, reason: String },

    /// Splitting failed.
    #[error("chunking failed: {0}")]
    Failed(String),

    /// I/O error while reading the source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Splits a source into an ordered sequence of work units.
///
/// Implementations must be deterministic: the same source always yields the
/// same `(index, locator)` pairs, with dense zero-based indices. Resuming a
/// run relies on this.
#[async_trait]
pub trait Chunker: Send + Sync {
    /// Returns the name of this chunker implementation.
    fn name(&self) -> &str;

    /// Plans the units for `source`.
    async fn plan(&self, source: &str) -> Result<Vec<WorkUnit>, ChunkerError>;
}
