//! Checkpoint storage trait and types.

use thiserror::Error;

use crate::unit::{RunId, UnitResult};

/// Error type for checkpoint operations.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// A different result is already stored for this index.
    #[error("checkpoint for unit {index} already exists with different content")]
    Conflict { index: usize },

    /// A stored record could not be decoded.
    #[error("checkpoint for unit {index} is corrupt: {reason}")]
    Corrupt { index: usize, reason: String },

    /// Result could not be serialized.
    #[error("failed to serialize result for unit {index}: {source}")]
    Serialize {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    /// I/O error from a file-backed store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error.
    #[error("database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for CheckpointError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}

/// What a `put` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The record was new and is now durable.
    Written,
    /// An identical record already existed; nothing changed.
    Unchanged,
}

/// Durable mapping from unit index to completed result, scoped to one run.
///
/// Records are write-once. Calling [`put`](CheckpointStore::put) for an
/// index that is already stored succeeds only if the bytes are identical;
/// different content is rejected with [`CheckpointError::Conflict`] and the
/// existing record is left untouched.
///
/// Implementations must tolerate concurrent calls for different indices and
/// must not return from `put` before the record is durable.
pub trait CheckpointStore: Send + Sync {
    /// Whether a result is stored for `index`. Side-effect free.
    fn has(&self, index: usize) -> Result<bool, CheckpointError>;

    /// Reads the result stored for `index`.
    fn get(&self, index: usize) -> Result<Option<UnitResult>, CheckpointError>;

    /// Stores `result` under `result.index`.
    fn put(&self, result: &UnitResult) -> Result<PutOutcome, CheckpointError>;

    /// All stored indices, ascending.
    fn indices(&self) -> Result<Vec<usize>, CheckpointError>;

    /// Run this store is scoped to, if it records one.
    fn run_id(&self) -> Option<&RunId> {
        None
    }
}

/// Serializes `result`, mapping the error to the unit.
pub(crate) fn encode(result: &UnitResult) -> Result<Vec<u8>, CheckpointError> {
    result.to_bytes().map_err(|source| CheckpointError::Serialize {
        index: result.index,
        source,
    })
}

/// Parses a stored record and checks it belongs to `index`.
pub(crate) fn decode(index: usize, bytes: &[u8]) -> Result<UnitResult, CheckpointError> {
    let result = UnitResult::from_bytes(bytes).map_err(|e| CheckpointError::Corrupt {
        index,
        reason: e.to_string(),
    })?;
    if result.index != index {
        return Err(CheckpointError::Corrupt {
            index,
            reason: format!("record holds unit {}", result.index),
        });
    }
    Ok(result)
}

/// Puts and reads back `units` results from as many threads at once.
#[cfg(test)]
pub(crate) fn assert_concurrent_access(store: &dyn CheckpointStore, units: usize) {
    use serde_json::json;

    std::thread::scope(|scope| {
        for index in 0..units {
            scope.spawn(move || {
                let payload = json!({"index": index, "text": "x".repeat(index)});
                let result = UnitResult::new(index, payload);
                assert!(!store.has(index).unwrap());
                assert_eq!(store.put(&result).unwrap(), PutOutcome::Written);
                assert_eq!(store.get(index).unwrap(), Some(result));
                store.indices().unwrap();
            });
        }
    });

    assert_eq!(store.indices().unwrap(), (0..units).collect::<Vec<_>>());
    for index in 0..units {
        let stored = store.get(index).unwrap().unwrap();
        assert_eq!(stored.index, index);
        assert_eq!(stored.payload["index"], index);
    }
}
