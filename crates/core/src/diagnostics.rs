//! Soft failures reported alongside results.

use serde::{Deserialize, Serialize};

use crate::metadata::ProviderError;
use crate::source::SourceError;

/// Which layer a soft failure came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Source,
    Provider,
}

/// A per-source or per-provider failure. Recorded and excluded, never raised.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SoftFailure {
    pub kind: FailureKind,
    /// Source or provider id.
    pub id: String,
    /// Machine-readable error label (e.g. "timeout", "rate_limited").
    pub error: String,
    /// Human-readable description.
    pub message: String,
    /// Provider's requested back-off, when it sent one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl SoftFailure {
    pub fn source(id: impl Into<String>, error: &SourceError) -> Self {
        Self {
            kind: FailureKind::Source,
            id: id.into(),
            error: error.kind().to_string(),
            message: error.to_string(),
            retry_after_ms: None,
        }
    }

    pub fn provider(id: impl Into<String>, error: &ProviderError) -> Self {
        let retry_after_ms = match error {
            ProviderError::RateLimited { retry_after } => {
                retry_after.map(|d| d.as_millis() as u64)
            }
            _ => None,
        };
        Self {
            kind: FailureKind::Provider,
            id: id.into(),
            error: error.kind().to_string(),
            message: error.to_string(),
            retry_after_ms,
        }
    }
}

/// Sort failures by layer then id so reports do not depend on arrival order.
pub fn sort_failures(failures: &mut [SoftFailure]) {
    failures.sort_by(|a, b| (a.kind, &a.id).cmp(&(b.kind, &b.id)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_soft_failure_from_source_error() {
        let failure = SoftFailure::source("yts", &SourceError::Timeout);
        assert_eq!(failure.kind, FailureKind::Source);
        assert_eq!(failure.id, "yts");
        assert_eq!(failure.error, "timeout");
        assert!(failure.retry_after_ms.is_none());
    }

    #[test]
    fn test_soft_failure_keeps_retry_after() {
        let err = ProviderError::RateLimited {
            retry_after: Some(Duration::from_secs(30)),
        };
        let failure = SoftFailure::provider("tmdb", &err);
        assert_eq!(failure.error, "rate_limited");
        assert_eq!(failure.retry_after_ms, Some(30_000));

        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["kind"], "provider");
        assert_eq!(json["retry_after_ms"], 30_000);
    }

    #[test]
    fn test_sort_failures() {
        let mut failures = vec![
            SoftFailure::provider("imdb", &ProviderError::NotFound),
            SoftFailure::source("yts", &SourceError::Timeout),
            SoftFailure::source("1337x", &SourceError::Timeout),
        ];
        sort_failures(&mut failures);
        let ids: Vec<_> = failures.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["1337x", "yts", "imdb"]);
    }
}
