//! Rule-table classifier.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::types::{FailureClassification, FailureKind, ProcessingFailure, RecoveryAction};

/// Classification returned when no rule matches.
pub const UNKNOWN: FailureClassification =
    FailureClassification::new(FailureKind::Unknown, RecoveryAction::Diagnose, 1_000);

/// One row of the classification table.
///
/// A rule matches when the failure carries one of `statuses`, or when its
/// message matches `pattern` (case-insensitive).
#[derive(Debug, Clone)]
pub struct ClassificationRule {
    pub classification: FailureClassification,
    pub statuses: Vec<u16>,
    pattern: Regex,
}

impl ClassificationRule {
    /// Builds a rule. `pattern` is compiled case-insensitively.
    pub fn new(
        classification: FailureClassification,
        statuses: &[u16],
        pattern: &str,
    ) -> Result<Self, regex_lite::Error> {
        Ok(Self {
            classification,
            statuses: statuses.to_vec(),
            pattern: Regex::new(&format!("(?i){}", pattern))?,
        })
    }

    /// Whether this rule applies to `failure`.
    pub fn matches(&self, failure: &ProcessingFailure) -> bool {
        if let Some(status) = failure.status {
            if self.statuses.contains(&status) {
                return true;
            }
        }
        self.pattern.is_match(&failure.message)
    }
}

/// The default table, in precedence order.
static DEFAULT_RULES: Lazy<Vec<ClassificationRule>> = Lazy::new(|| {
    use FailureKind::*;
    use RecoveryAction::*;

    let table: [(FailureClassification, &[u16], &str); 6] = [
        (
            FailureClassification::new(RateLimited, WaitAndReduceConcurrency, 60_000),
            &[429],
            r"\b(rate[ _-]?limit(ed|s)?|too many requests|quota exceeded)\b",
        ),
        (
            FailureClassification::new(Transient, RetryFresh, 2_000),
            &[],
            r"\b(econnreset|econnrefused|enotfound|epipe|socket hang up|network (error|failure|unreachable|is unreachable)|connection (reset|refused|closed|aborted))\b",
        ),
        (
            FailureClassification::new(Timeout, RetryFresh, 5_000),
            &[],
            r"\b(timed? ?out|etimedout|deadline exceeded)\b",
        ),
        (
            FailureClassification::new(Unauthorized, FailFast, 0),
            &[401],
            r"\b(unauthori[sz]ed|invalid api key|authentication (failed|error|required))\b",
        ),
        (
            FailureClassification::new(PayloadTooLarge, FailFast, 0),
            &[413],
            r"\b(too large|maximum file size)\b",
        ),
        (
            FailureClassification::new(ServiceUnavailable, WaitAndRetry, 30_000),
            &[503],
            r"\b(service unavailable|overloaded|temporarily unavailable)\b",
        ),
    ];

    table
        .into_iter()
        .map(|(classification, statuses, pattern)| {
            ClassificationRule::new(classification, statuses, pattern)
                .expect("built-in classification pattern is valid")
        })
        .collect()
});

/// Maps processor failures to a recovery action and wait hint.
///
/// Pure: no I/O, no internal state beyond the immutable rule table.
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    rules: Vec<ClassificationRule>,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorClassifier {
    /// Creates a classifier with the built-in table.
    pub fn new() -> Self {
        Self {
            rules: DEFAULT_RULES.clone(),
        }
    }

    /// Creates a classifier from a custom table. First match wins.
    pub fn with_rules(rules: Vec<ClassificationRule>) -> Self {
        Self { rules }
    }

    /// The rules in evaluation order.
    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    /// Classifies a failure.
    pub fn classify(&self, failure: &ProcessingFailure) -> FailureClassification {
        self.rules
            .iter()
            .find(|rule| rule.matches(failure))
            .map(|rule| rule.classification)
            .unwrap_or(UNKNOWN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(failure: ProcessingFailure) -> FailureClassification {
        ErrorClassifier::new().classify(&failure)
    }

    #[test]
    fn test_rate_limit_by_status_and_message() {
        let expected = FailureClassification::new(
            FailureKind::RateLimited,
            RecoveryAction::WaitAndReduceConcurrency,
            60_000,
        );

        assert_eq!(
            classify(ProcessingFailure::with_status(429, "slow down")),
            expected
        );
        assert_eq!(
            classify(ProcessingFailure::new("Rate Limit reached for requests")),
            expected
        );
        assert_eq!(
            classify(ProcessingFailure::new("RATE LIMIT")),
            expected
        );
        assert_eq!(
            classify(ProcessingFailure::new("429 Too Many Requests")),
            expected
        );
    }

    #[test]
    fn test_network_faults_are_transient() {
        for message in [
            "read ECONNRESET",
            "connect ECONNREFUSED 127.0.0.1:443",
            "socket hang up",
            "Network error while uploading",
        ] {
            let c = classify(ProcessingFailure::new(message));
            assert_eq!(c.kind, FailureKind::Transient, "{}", message);
            assert_eq!(c.action, RecoveryAction::RetryFresh);
            assert_eq!(c.wait_ms, 2_000);
        }
    }

    #[test]
    fn test_timeout() {
        for message in ["Request timed out", "timeout after 600s", "ETIMEDOUT"] {
            let c = classify(ProcessingFailure::new(message));
            assert_eq!(c.kind, FailureKind::Timeout, "{}", message);
            assert_eq!(c.action, RecoveryAction::RetryFresh);
            assert_eq!(c.wait_ms, 5_000);
        }
    }

    #[test]
    fn test_patterns_match_whole_words() {
        for message in [
            "runtime output was empty",
            "neural network returned no segments",
            "timeouts_total metric missing",
            "overloadedness score 3",
        ] {
            assert_eq!(classify(ProcessingFailure::new(message)), UNKNOWN, "{}", message);
        }

        let c = classify(ProcessingFailure::new("request was rate limited"));
        assert_eq!(c.kind, FailureKind::RateLimited);
        let c = classify(ProcessingFailure::new("Authentication failed for key"));
        assert_eq!(c.kind, FailureKind::Unauthorized);
    }

    #[test]
    fn test_fail_fast_kinds() {
        let c = classify(ProcessingFailure::with_status(401, "nope"));
        assert_eq!(c.kind, FailureKind::Unauthorized);
        assert_eq!(c.action, RecoveryAction::FailFast);
        assert_eq!(c.wait_ms, 0);

        let c = classify(ProcessingFailure::new("Invalid API key provided"));
        assert_eq!(c.kind, FailureKind::Unauthorized);

        let c = classify(ProcessingFailure::with_status(413, "nope"));
        assert_eq!(c.kind, FailureKind::PayloadTooLarge);
        assert_eq!(c.action, RecoveryAction::FailFast);

        let c = classify(ProcessingFailure::new("Request Entity Too Large"));
        assert_eq!(c.kind, FailureKind::PayloadTooLarge);
    }

    #[test]
    fn test_service_unavailable() {
        let c = classify(ProcessingFailure::with_status(503, "upstream"));
        assert_eq!(c.kind, FailureKind::ServiceUnavailable);
        assert_eq!(c.action, RecoveryAction::WaitAndRetry);
        assert_eq!(c.wait_ms, 30_000);

        let c = classify(ProcessingFailure::new("The engine is currently overloaded"));
        assert_eq!(c.kind, FailureKind::ServiceUnavailable);
    }

    #[test]
    fn test_unknown_fallback() {
        let c = classify(ProcessingFailure::with_status(500, "something odd happened"));
        assert_eq!(c, UNKNOWN);
        assert_eq!(c.action, RecoveryAction::Diagnose);
        assert_eq!(c.wait_ms, 1_000);
    }

    #[test]
    fn test_precedence_first_match_wins() {
        // Rate limiting outranks the 503 status.
        let c = classify(ProcessingFailure::with_status(503, "rate limit exceeded"));
        assert_eq!(c.kind, FailureKind::RateLimited);

        // A timeout message outranks the 401 status.
        let c = classify(ProcessingFailure::with_status(401, "gateway timed out"));
        assert_eq!(c.kind, FailureKind::Timeout);
    }

    #[test]
    fn test_custom_table() {
        let rule = ClassificationRule::new(
            FailureClassification::new(FailureKind::Transient, RecoveryAction::RetryFresh, 10),
            &[],
            "flaky",
        )
        .unwrap();
        let classifier = ErrorClassifier::with_rules(vec![rule]);

        assert_eq!(
            classifier.classify(&ProcessingFailure::new("FLAKY disk")).kind,
            FailureKind::Transient
        );
        assert_eq!(
            classifier.classify(&ProcessingFailure::with_status(429, "x")),
            UNKNOWN
        );
        assert_eq!(classifier.rules().len(), 1);
    }
}
