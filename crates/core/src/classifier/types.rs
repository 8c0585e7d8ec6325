//! Types for failure classification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A failure raised by a unit processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct ProcessingFailure {
    /// Human readable failure text.
    pub message: String,
    /// Numeric status code, when the failure came from a service that has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ProcessingFailure {
    /// Creates a failure with no status code.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    /// Creates a failure carrying a status code.
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
        }
    }
}

/// Failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    RateLimited,
    Transient,
    Timeout,
    Unauthorized,
    PayloadTooLarge,
    ServiceUnavailable,
    Unknown,
}

impl FailureKind {
    /// Stable label, used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::Transient => "transient",
            Self::Timeout => "timeout",
            Self::Unauthorized => "unauthorized",
            Self::PayloadTooLarge => "payload_too_large",
            Self::ServiceUnavailable => "service_unavailable",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the retry loop should do about a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Abort the unit without consuming remaining attempts.
    FailFast,
    /// Signal the throttle to back off, wait, then retry.
    WaitAndReduceConcurrency,
    /// Retry with a fresh request after a short wait.
    RetryFresh,
    /// Wait for the service to recover, then retry.
    WaitAndRetry,
    /// Unclassified; retry with a growing wait and consult the oracle on the
    /// last attempt.
    Diagnose,
}

/// Result of classifying a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureClassification {
    pub kind: FailureKind,
    pub action: RecoveryAction,
    /// Wait hint in milliseconds. For `Diagnose` this is a base value the
    /// caller scales by attempt number.
    pub wait_ms: u64,
}

impl FailureClassification {
    pub const fn new(kind: FailureKind, action: RecoveryAction, wait_ms: u64) -> Self {
        Self {
            kind,
            action,
            wait_ms,
        }
    }
}
