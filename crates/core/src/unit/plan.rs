//! Plan validation.

use thiserror::Error;

use super::types::WorkUnit;

/// A planned unit sequence that cannot be dispatched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    /// Units must be numbered `0..n` in order, without gaps.
    #[error("unit at position {position} has index {index}; indices must be dense and zero-based")]
    NonDenseIndex { position: usize, index: usize },
}

/// Checks that `units` carries dense, zero-based, in-order indices.
pub fn validate_plan(units: &[WorkUnit]) -> Result<(), PlanError> {
    for (position, unit) in units.iter().enumerate() {
        if unit.index != position {
            return Err(PlanError::NonDenseIndex {
                position,
                index: unit.index,
            });
        }
    }
    Ok(())
}
