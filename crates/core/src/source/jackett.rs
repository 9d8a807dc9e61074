//! Jackett search backend. Each configured indexer is its own source.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::JackettConfig;

use super::{MediaKind, Query, RawListing, SourceBatch, SourceClient, SourceError};

/// One Jackett indexer, exposed as source `jackett:<indexer>`.
pub struct JackettSource {
    id: String,
    indexer: String,
    client: Client,
    config: JackettConfig,
}

impl JackettSource {
    pub fn new(config: JackettConfig, indexer: &str, client: Client) -> Self {
        Self {
            id: config.source_id(indexer),
            indexer: indexer.to_string(),
            client,
            config,
        }
    }

    /// Build the Jackett API URL for a search.
    fn build_search_url(&self, query: &Query) -> String {
        let mut url = format!(
            "{}/api/v2.0/indexers/{}/results?apikey={}&Query={}",
            self.config.url.trim_end_matches('/'),
            urlencoding::encode(&self.indexer),
            urlencoding::encode(&self.config.api_key),
            urlencoding::encode(&query.search_text())
        );

        if let Some(kind) = query.kind {
            url.push_str(&format!("&Category[]={}", kind_to_jackett_id(kind)));
        }

        url
    }
}

#[async_trait]
impl SourceClient for JackettSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn search(&self, query: &Query, timeout: Duration) -> Result<SourceBatch, SourceError> {
        let url = self.build_search_url(query);
        debug!(indexer = %self.indexer, "Searching Jackett");

        let response = self.client.get(&url).timeout(timeout).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Unavailable(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let jackett_response: JackettResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse response: {}", e)))?;

        let total = jackett_response.Results.len();
        let listings: Vec<RawListing> = jackett_response
            .Results
            .into_iter()
            .filter_map(|r| self.to_listing(r))
            .collect();

        debug!(
            indexer = %self.indexer,
            results = listings.len(),
            "Jackett search complete"
        );

        let skipped = total - listings.len();
        Ok(SourceBatch::new(listings, skipped))
    }
}

impl JackettSource {
    /// Results without any usable link are dropped.
    fn to_listing(&self, r: JackettResult) -> Option<RawListing> {
        let link = r
            .MagnetUri
            .filter(|l| !l.is_empty())
            .or(r.Link.filter(|l| !l.is_empty()))?;

        if r.Title.trim().is_empty() {
            return None;
        }

        Some(RawListing {
            source_id: self.id.clone(),
            link,
            display_name: r.Title,
            size_bytes: r.Size.unwrap_or(0).max(0) as u64,
            seeders: r.Seeders.unwrap_or(0).max(0) as u32,
            leechers: r
                .Peers
                .unwrap_or(0)
                .saturating_sub(r.Seeders.unwrap_or(0))
                .max(0) as u32,
            uploaded_at: r.PublishDate.and_then(|d| parse_jackett_date(&d)),
            quality_tag: None,
            info_hash: r.InfoHash.map(|h| h.to_lowercase()),
        })
    }
}

/// Map a media kind to its Jackett category id.
fn kind_to_jackett_id(kind: MediaKind) -> i32 {
    match kind {
        MediaKind::Movie => 2000,
        MediaKind::Show => 5000,
    }
}

/// Parse Jackett's date format.
fn parse_jackett_date(date_str: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(date_str)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(date_str, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|ndt| ndt.and_utc())
        })
}

// Jackett API response types
#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct JackettResponse {
    Results: Vec<JackettResult>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct JackettResult {
    Title: String,
    MagnetUri: Option<String>,
    Link: Option<String>,
    InfoHash: Option<String>,
    Size: Option<i64>,
    Seeders: Option<i32>,
    Peers: Option<i32>,
    PublishDate: Option<String>,
}
