//! Types for the torrent source layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aggregate::normalize_title;

/// Kind of media a query targets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Movie,
    Show,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Show => "show",
        }
    }
}

/// A title search issued by the caller. Immutable once issued.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Query {
    /// Free-text title.
    pub title: String,
    /// Optional release year.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    /// Optional media kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<MediaKind>,
}

impl Query {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            year: None,
            kind: None,
        }
    }

    pub fn with_year(mut self, year: u32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_kind(mut self, kind: MediaKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Text sent to sources: the title, followed by the year when present.
    pub fn search_text(&self) -> String {
        match self.year {
            Some(year) => format!("{} {}", self.title.trim(), year),
            None => self.title.trim().to_string(),
        }
    }

    /// Stable cache key: normalized title plus year and kind.
    ///
    /// Queries differing only in case, punctuation, or spacing share a key.
    pub fn cache_key(&self) -> String {
        format!(
            "{}|{}|{}",
            normalize_title(&self.title),
            self.year.map(|y| y.to_string()).unwrap_or_default(),
            self.kind.map(|k| k.as_str()).unwrap_or("any"),
        )
    }
}

/// One listing as returned by a source, before normalization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawListing {
    /// Id of the source that produced this listing.
    pub source_id: String,
    /// Magnet URI or download URL.
    pub link: String,
    /// Release name as displayed by the source.
    pub display_name: String,
    pub size_bytes: u64,
    pub seeders: u32,
    pub leechers: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
    /// Quality tag reported by the source (e.g. "1080p"), if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_tag: Option<String>,
    /// Info hash (lowercase hex), if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info_hash: Option<String>,
}

/// Result of a single source search.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SourceBatch {
    /// Listings that parsed successfully.
    pub listings: Vec<RawListing>,
    /// Listings that were present in the response but could not be parsed.
    pub skipped: usize,
}

impl SourceBatch {
    pub fn new(listings: Vec<RawListing>, skipped: usize) -> Self {
        Self { listings, skipped }
    }
}

/// Errors a source can fail a whole search with.
///
/// Per-listing parse failures are not errors; they are counted in
/// [`SourceBatch::skipped`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    #[error("Source request timed out")]
    Timeout,

    #[error("Failed to parse source response: {0}")]
    Parse(String),
}

impl SourceError {
    /// Short machine-readable label, used for metrics and diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::Unavailable(_) => "unavailable",
            SourceError::Timeout => "timeout",
            SourceError::Parse(_) => "parse_error",
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SourceError::Timeout
        } else if e.is_decode() {
            SourceError::Parse(e.to_string())
        } else {
            SourceError::Unavailable(e.to_string())
        }
    }
}
