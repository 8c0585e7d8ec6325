//! In-memory checkpoint store.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::unit::{RunId, UnitResult};

use super::store::{decode, encode, CheckpointError, CheckpointStore, PutOutcome};

/// Checkpoint store that lives only as long as the process.
///
/// Keeps the canonical bytes of each result, so conflict detection and
/// read-back behave exactly like the durable stores. A store created with
/// [`new`](Self::new) is not tied to any run.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    records: Mutex<BTreeMap<usize, Vec<u8>>>,
    run_id: Option<RunId>,
}

impl MemoryCheckpointStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store scoped to `run_id`.
    pub fn for_run(run_id: RunId) -> Self {
        Self {
            records: Mutex::default(),
            run_id: Some(run_id),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records().len()
    }

    /// Whether no records are stored.
    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    fn records(&self) -> MutexGuard<'_, BTreeMap<usize, Vec<u8>>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn has(&self, index: usize) -> Result<bool, CheckpointError> {
        Ok(self.records().contains_key(&index))
    }

    fn get(&self, index: usize) -> Result<Option<UnitResult>, CheckpointError> {
        self.records()
            .get(&index)
            .map(|bytes| decode(index, bytes))
            .transpose()
    }

    fn put(&self, result: &UnitResult) -> Result<PutOutcome, CheckpointError> {
        let bytes = encode(result)?;
        let mut records = self.records();
        match records.get(&result.index) {
            Some(existing) if *existing == bytes => Ok(PutOutcome::Unchanged),
            Some(_) => Err(CheckpointError::Conflict {
                index: result.index,
            }),
            None => {
                records.insert(result.index, bytes);
                Ok(PutOutcome::Written)
            }
        }
    }

    fn indices(&self) -> Result<Vec<usize>, CheckpointError> {
        Ok(self.records().keys().copied().collect())
    }

    fn run_id(&self) -> Option<&RunId> {
        self.run_id.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_put_get_has() {
        let store = MemoryCheckpointStore::new();
        assert!(store.is_empty());
        assert!(!store.has(0).unwrap());
        assert!(store.get(0).unwrap().is_none());

        let result = UnitResult::new(0, json!({"text": "intro"}));
        assert_eq!(store.put(&result).unwrap(), PutOutcome::Written);

        assert!(store.has(0).unwrap());
        assert_eq!(store.get(0).unwrap(), Some(result));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_identical_put_is_noop() {
        let store = MemoryCheckpointStore::new();
        let result = UnitResult::new(2, json!([1, 2, 3]));

        store.put(&result).unwrap();
        assert_eq!(store.put(&result).unwrap(), PutOutcome::Unchanged);
        assert_eq!(store.indices().unwrap(), vec![2]);
    }

    #[test]
    fn test_conflicting_put_is_rejected() {
        let store = MemoryCheckpointStore::new();
        let original = UnitResult::new(1, json!("first"));
        store.put(&original).unwrap();

        let err = store.put(&UnitResult::new(1, json!("second"))).unwrap_err();
        assert!(matches!(err, CheckpointError::Conflict { index: 1 }));
        assert_eq!(store.get(1).unwrap(), Some(original));
    }

    #[test]
    fn test_indices_sorted() {
        let store = MemoryCheckpointStore::new();
        for index in [4, 0, 2] {
            store.put(&UnitResult::new(index, json!(index))).unwrap();
        }
        assert_eq!(store.indices().unwrap(), vec![0, 2, 4]);
    }

    #[test]
    fn test_concurrent_access() {
        let store = MemoryCheckpointStore::new();
        crate::checkpoint::store::assert_concurrent_access(&store, 32);
    }

    #[test]
    fn test_run_scope() {
        assert!(MemoryCheckpointStore::new().run_id().is_none());

        let run_id = RunId::new("run-7").unwrap();
        let store = MemoryCheckpointStore::for_run(run_id.clone());
        assert_eq!(store.run_id(), Some(&run_id));
    }
}
