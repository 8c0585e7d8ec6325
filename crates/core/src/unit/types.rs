//! Work unit and result types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// One independently processable slice of a source.
///
/// Created once by a chunker at planning time and never mutated. The
/// `index` is the identity used for checkpointing, so the same source must
/// always plan to the same `(index, locator)` pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkUnit {
    /// Dense, zero-based ordinal.
    pub index: usize,
    /// Opaque reference to the unit's input (path, URL, byte range...).
    pub locator: String,
    /// Offset of this unit within the source, used to re-anchor any
    /// unit-relative timing when results are merged.
    pub sequence_offset: f64,
}

impl WorkUnit {
    /// Creates a new work unit.
    pub fn new(index: usize, locator: impl Into<String>, sequence_offset: f64) -> Self {
        Self {
            index,
            locator: locator.into(),
            sequence_offset,
        }
    }
}

/// The successful outcome of processing one work unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitResult {
    /// Index of the unit that produced this result.
    pub index: usize,
    /// Opaque success value returned by the unit processor.
    pub payload: Value,
}

impl UnitResult {
    /// Creates a new unit result.
    pub fn new(index: usize, payload: Value) -> Self {
        Self { index, payload }
    }

    /// Canonical byte form, as written to checkpoint storage.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Parses a result back from its canonical byte form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// SHA-256 hex digest of the canonical byte form.
    pub fn digest(&self) -> Result<String, serde_json::Error> {
        Ok(digest_bytes(&self.to_bytes()?))
    }
}

pub(crate) fn digest_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
