//! Normalized listing types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Video resolution tier. Ordered from worst to best.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QualityTier {
    #[serde(rename = "unknown")]
    Unknown,
    #[serde(rename = "HDTV")]
    Hdtv,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "2160p")]
    P2160,
}

impl QualityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::Unknown => "unknown",
            QualityTier::Hdtv => "HDTV",
            QualityTier::P480 => "480p",
            QualityTier::P720 => "720p",
            QualityTier::P1080 => "1080p",
            QualityTier::P2160 => "2160p",
        }
    }
}

/// Video codec family.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Codec {
    #[serde(rename = "x265")]
    X265,
    #[serde(rename = "x264")]
    X264,
    #[serde(rename = "XviD")]
    Xvid,
    #[serde(rename = "unknown")]
    Unknown,
}

/// Season/episode position of a show release.
///
/// `episode` is `None` for season packs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EpisodeInfo {
    pub season: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
}

/// A rankable listing derived from one [`RawListing`](crate::source::RawListing).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub canonical_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    pub quality: QualityTier,
    pub codec: Codec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<EpisodeInfo>,
    pub source_id: String,
    pub link: String,
    pub display_name: String,
    pub size_bytes: u64,
    pub seeders: u32,
    pub leechers: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
    /// False when the title/year could not be parsed from the display name.
    pub title_parsed: bool,
}

/// Candidates sharing one canonical title and year, best first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateGroup {
    pub canonical_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    pub candidates: Vec<Candidate>,
}

impl CandidateGroup {
    pub fn best_seeders(&self) -> u32 {
        self.candidates.iter().map(|c| c.seeders).max().unwrap_or(0)
    }
}
