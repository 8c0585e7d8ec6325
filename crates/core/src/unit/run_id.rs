//! Run identity used to namespace checkpoints.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::types::digest_bytes;

/// Length of a derived run id, in hex characters.
const DERIVED_ID_LEN: usize = 16;

/// Invalid run id.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid run id {0:?}: expected ASCII letters, digits, '-' or '_'")]
pub struct InvalidRunId(pub String);

/// Identity of a run.
///
/// Checkpoints are keyed by `(run id, unit index)`, so a resumed run must
/// present the same id as the interrupted one. The id doubles as a
/// directory name for file-backed stores, hence the restricted alphabet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RunId(String);

impl RunId {
    /// Creates a run id from an explicit value.
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidRunId> {
        let id = id.into();
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(Self(id))
        } else {
            Err(InvalidRunId(id))
        }
    }

    /// Derives a stable id from a source locator.
    pub fn from_source(source: &str) -> Self {
        let digest = digest_bytes(source.as_bytes());
        Self(digest[..DERIVED_ID_LEN].to_string())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RunId {
    type Error = InvalidRunId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RunId> for String {
    fn from(id: RunId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_source_is_stable() {
        let a = RunId::from_source("/media/lecture-2024-03-01.mp4");
        let b = RunId::from_source("/media/lecture-2024-03-01.mp4");
        let c = RunId::from_source("/media/lecture-2024-03-02.mp4");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 16);
    }

    #[test]
    fn test_new_rejects_path_characters() {
        assert!(RunId::new("episode_12-final").is_ok());
        assert_eq!(RunId::new(""), Err(InvalidRunId(String::new())));
        assert!(RunId::new("../escape").is_err());
        assert!(RunId::new("a b").is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Result<RunId, _> = serde_json::from_str("\"run-1\"");
        assert!(ok.is_ok());

        let bad: Result<RunId, _> = serde_json::from_str("\"run/1\"");
        assert!(bad.is_err());
    }
}
