//! Static chunker for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::chunker::{Chunker, ChunkerError};
use crate::unit::WorkUnit;

use super::fixtures;

/// Chunker that returns a fixed plan regardless of the source.
#[derive(Debug)]
pub struct StaticChunker {
    units: Vec<WorkUnit>,
    error: Option<String>,
    plans: AtomicUsize,
}

impl StaticChunker {
    /// Create a chunker returning `units`.
    pub fn new(units: Vec<WorkUnit>) -> Self {
        Self {
            units,
            error: None,
            plans: AtomicUsize::new(0),
        }
    }

    /// Create a chunker returning `count` fixture units.
    pub fn with_count(count: usize) -> Self {
        Self::new(fixtures::units(count))
    }

    /// Create a chunker whose planning always fails.
    pub fn failing(message: &str) -> Self {
        Self {
            units: Vec::new(),
            error: Some(message.to_string()),
            plans: AtomicUsize::new(0),
        }
    }

    /// Get the number of times `plan` was called.
    pub fn plan_count(&self) -> usize {
        self.plans.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Chunker for StaticChunker {
    fn name(&self) -> &str {
        "static"
    }

    async fn plan(&self, _source: &str) -> Result<Vec<WorkUnit>, ChunkerError> {
        self.plans.fetch_add(1, Ordering::SeqCst);
        match &self.error {
            Some(message) => Err(ChunkerError::Failed(message.clone())),
            None => Ok(self.units.clone()),
        }
    }
}
