//! Adaptive concurrency control.
//!
//! The [`ConcurrencyController`] admits at most `concurrency_limit` units at
//! a time and adjusts that limit from outcome feedback:
//!
//! - success: after more than five consecutive successes the limit grows by
//!   one, up to the configured ceiling
//! - rate limited: the limit halves (minimum 1)
//! - other failure: the success streak resets
//!
//! Limit changes only affect future admissions; units already admitted keep
//! running.

mod controller;
mod types;

pub use controller::{AdmissionPermit, ConcurrencyController};
pub use types::{ThrottleSnapshot, ThrottleTotals};
