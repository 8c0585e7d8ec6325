//! Merger that concatenates payloads into a JSON array.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::traits::{MergeError, MergePart, Merger};

/// Emits `[{"index", "offset", "payload"}, ...]` in index order.
///
/// Useful as a default and for tests; domain mergers usually re-anchor
/// timestamps inside the payload instead of reporting the offset beside it.
#[derive(Debug, Clone, Default)]
pub struct OrderedJsonMerger;

impl OrderedJsonMerger {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Merger for OrderedJsonMerger {
    type Output = Value;

    fn name(&self) -> &str {
        "ordered-json"
    }

    async fn merge(&self, parts: &[MergePart<'_>]) -> Result<Value, MergeError> {
        let mut merged = Vec::with_capacity(parts.len());
        for (position, part) in parts.iter().enumerate() {
            if part.unit.index != position || part.result.index != position {
                return Err(MergeError::InvalidInput(format!(
                    "expected unit {} at position {}, got unit {} with result {}",
                    position, position, part.unit.index, part.result.index
                )));
            }
            merged.push(json!({
                "index": part.unit.index,
                "offset": part.unit.sequence_offset,
                "payload": part.result.payload,
            }));
        }
        Ok(Value::Array(merged))
    }
}
