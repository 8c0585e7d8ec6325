//! Merge module for combining unit results.
//!
//! A [`Merger`] receives every unit's result in index order once all units
//! are checkpointed, and produces the run's final output.

mod ordered_json;
mod traits;

pub use ordered_json::OrderedJsonMerger;
pub use traits::{MergeError, MergePart, Merger};
