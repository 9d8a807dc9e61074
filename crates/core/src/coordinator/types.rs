//! Request, response, and error types for the query coordinator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aggregate::CandidateGroup;
use crate::diagnostics::SoftFailure;
use crate::reconcile::MetadataRecord;
use crate::source::Query;

/// Per-query overrides. Unset fields fall back to the `[search]` config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchOptions {
    /// Source ids to query. `None` means every registered source.
    #[serde(default)]
    pub sources: Option<Vec<String>>,
    /// Provider ids to consult. `None` means every registered provider.
    #[serde(default)]
    pub providers: Option<Vec<String>>,
    #[serde(default)]
    pub deadline_ms: Option<u64>,
    #[serde(default)]
    pub source_timeout_ms: Option<u64>,
    #[serde(default)]
    pub provider_timeout_ms: Option<u64>,
    #[serde(default)]
    pub max_groups: Option<usize>,
    /// Skip the metadata phase when false.
    #[serde(default = "default_enrich")]
    pub enrich: bool,
}

fn default_enrich() -> bool {
    true
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            sources: None,
            providers: None,
            deadline_ms: None,
            source_timeout_ms: None,
            provider_timeout_ms: None,
            max_groups: None,
            enrich: true,
        }
    }
}

/// One candidate group with its merged metadata.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EnrichedResult {
    pub metadata: MetadataRecord,
    pub group: CandidateGroup,
}

/// Outcome of a query that produced results.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SearchResponse {
    pub query: Query,
    /// Ranked best group first.
    pub results: Vec<EnrichedResult>,
    /// Sources and providers that failed, ordered by layer then id.
    pub failures: Vec<SoftFailure>,
    /// Listings dropped as unparseable or mislabelled.
    pub skipped: usize,
    /// The deadline cut the metadata phase short.
    pub deadline_exceeded: bool,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueryError {
    #[error("All sources failed")]
    AllSourcesFailed { failures: Vec<SoftFailure> },

    #[error("Deadline exceeded before any results were available")]
    DeadlineExceeded,

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
}

impl QueryError {
    /// Short label used for the query outcome metric and API error codes.
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::AllSourcesFailed { .. } => "all_sources_failed",
            QueryError::DeadlineExceeded => "deadline_exceeded",
            QueryError::InvalidQuery(_) => "invalid_query",
            QueryError::UnknownSource(_) => "unknown_source",
            QueryError::UnknownProvider(_) => "unknown_provider",
        }
    }
}
