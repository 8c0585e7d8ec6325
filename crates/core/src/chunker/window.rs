//! Fixed-length time window chunker.

use async_trait::async_trait;

use crate::unit::WorkUnit;

use super::traits::{Chunker, ChunkerError};

/// Largest plan a single source may produce.
pub const MAX_UNITS: usize = 1_000_000;

/// Splits a source of known duration into fixed-length time windows.
///
/// Each unit's locator addresses its window with a media fragment
/// (`<source>#t=<start>,<end>`, seconds), and its `sequence_offset` is the
/// window start. The last window is shortened to end at `total_secs`.
#[derive(Debug, Clone)]
pub struct WindowChunker {
    total_secs: f64,
    window_secs: f64,
}

impl WindowChunker {
    /// Creates a chunker for a source lasting `total_secs`, cut every
    /// `window_secs`.
    pub fn new(total_secs: f64, window_secs: f64) -> Self {
        Self {
            total_secs,
            window_secs,
        }
    }
}

#[async_trait]
impl Chunker for WindowChunker {
    fn name(&self) -> &str {
        "window"
    }

    async fn plan(&self, source: &str) -> Result<Vec<WorkUnit>, ChunkerError> {
        let invalid = |reason: &str| ChunkerError::InvalidSource {
            source_ref: source.to_string(),
            reason: reason.to_string(),
        };

        if !self.window_secs.is_finite() || self.window_secs <= 0.0 {
            return Err(invalid("window length must be positive"));
        }
        if !self.total_secs.is_finite() || self.total_secs < 0.0 {
            return Err(invalid("duration must be a non-negative number"));
        }

        let windows = (self.total_secs / self.window_secs).ceil();
        if windows > MAX_UNITS as f64 {
            return Err(invalid(&format!(
                "{} windows exceed the limit of {} units",
                windows, MAX_UNITS
            )));
        }
        let count = windows as usize;
        let units = (0..count)
            .map(|index| {
                let start = index as f64 * self.window_secs;
                let end = (start + self.window_secs).min(self.total_secs);
                WorkUnit::new(index, format!("{}#t={},{}", source, start, end), start)
            })
            .collect();

        Ok(units)
    }
}
