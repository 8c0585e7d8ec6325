//! Failure classification.
//!
//! Maps a failure raised by a unit processor (message text plus optional
//! status code) to a [`FailureClassification`]: what kind of failure it is,
//! what the retry loop should do about it, and how long to wait first.
//!
//! The matching rules are data, evaluated in order with the first match
//! winning:
//!
//! | kind                 | status | action                       | wait     |
//! |----------------------|--------|------------------------------|----------|
//! | `RateLimited`        | 429    | `WaitAndReduceConcurrency`   | 60 s     |
//! | `Transient`          |        | `RetryFresh`                 | 2 s      |
//! | `Timeout`            |        | `RetryFresh`                 | 5 s      |
//! | `Unauthorized`       | 401    | `FailFast`                   | 0        |
//! | `PayloadTooLarge`    | 413    | `FailFast`                   | 0        |
//! | `ServiceUnavailable` | 503    | `WaitAndRetry`               | 30 s     |
//! | `Unknown`            |        | `Diagnose`                   | 1 s base |

mod rules;
mod types;

pub use rules::{ClassificationRule, ErrorClassifier, UNKNOWN};
pub use types::{FailureClassification, FailureKind, ProcessingFailure, RecoveryAction};
