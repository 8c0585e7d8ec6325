//! Work units, their results, and run identity.

mod plan;
mod run_id;
mod types;

pub use plan::{validate_plan, PlanError};
pub use run_id::{InvalidRunId, RunId};
pub use types::{UnitResult, WorkUnit};
