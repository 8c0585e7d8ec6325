//! Executor module for running units with retries.
//!
//! The [`RetryExecutor`] drives one unit through the [`UnitProcessor`],
//! classifying each failure and choosing between failing fast, backing off,
//! and asking the [`DiagnosticOracle`].
//!
//! # Branches
//!
//! | Action                       | Controller hook         | Wait before next attempt |
//! |------------------------------|-------------------------|--------------------------|
//! | `FailFast`                   | none                    | stop immediately         |
//! | `WaitAndReduceConcurrency`   | `report_rate_limited`   | `wait_ms`                |
//! | `RetryFresh`, `WaitAndRetry` | `report_other_failure`  | `wait_ms`                |
//! | `Diagnose`                   | `report_other_failure`  | `wait_ms * attempt`      |

mod error;
mod retry;
mod traits;

pub use error::UnitError;
pub use retry::{RetryExecutor, RetryPolicy};
pub use traits::{DiagnosticContext, DiagnosticOracle, Diagnosis, OracleError, UnitProcessor};
