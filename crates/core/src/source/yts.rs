//! YTS movie API source.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::YtsConfig;

use super::{MediaKind, Query, RawListing, SourceBatch, SourceClient, SourceError};

/// Trackers appended to magnets built from YTS hashes.
const TRACKERS: [&str; 4] = [
    "udp://open.demonii.com:1337/announce",
    "udp://tracker.openbittorrent.com:80",
    "udp://tracker.opentrackr.org:1337/announce",
    "udp://torrent.gresille.org:80/announce",
];

/// Movie-only source backed by the YTS JSON API.
pub struct YtsSource {
    client: Client,
    config: YtsConfig,
}

impl YtsSource {
    pub fn new(config: YtsConfig, client: Client) -> Self {
        Self { client, config }
    }

    fn build_search_url(&self, query: &Query) -> String {
        format!(
            "{}/api/v2/list_movies.json?query_term={}&limit={}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(&query.search_text()),
            self.config.limit
        )
    }
}

#[async_trait]
impl SourceClient for YtsSource {
    fn id(&self) -> &str {
        &self.config.id
    }

    async fn search(&self, query: &Query, timeout: Duration) -> Result<SourceBatch, SourceError> {
        if query.kind == Some(MediaKind::Show) {
            return Ok(SourceBatch::default());
        }

        let url = self.build_search_url(query);
        debug!(source = %self.config.id, query = %query.title, "Searching YTS");

        let response = self.client.get(&url).timeout(timeout).send().await?;

        if !response.status().is_success() {
            return Err(SourceError::Unavailable(format!("HTTP {}", response.status())));
        }

        let body: YtsResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))?;

        if body.status != "ok" {
            return Err(SourceError::Unavailable(
                body.status_message.unwrap_or(body.status),
            ));
        }

        let batch = parse_movies(&self.config.id, body.data.and_then(|d| d.movies));
        debug!(
            source = %self.config.id,
            listings = batch.listings.len(),
            skipped = batch.skipped,
            "YTS search complete"
        );
        Ok(batch)
    }
}

/// Convert the `movies` array into listings, one per torrent.
fn parse_movies(source_id: &str, movies: Option<Vec<serde_json::Value>>) -> SourceBatch {
    let mut batch = SourceBatch::default();

    for value in movies.unwrap_or_default() {
        let movie: YtsMovie = match serde_json::from_value(value) {
            Ok(movie) => movie,
            Err(e) => {
                warn!(source = source_id, error = %e, "Skipping malformed YTS movie");
                batch.skipped += 1;
                continue;
            }
        };

        for value in movie.torrents.unwrap_or_default() {
            let torrent: YtsTorrent = match serde_json::from_value(value) {
                Ok(torrent) => torrent,
                Err(_) => {
                    batch.skipped += 1;
                    continue;
                }
            };
            match to_listing(source_id, &movie.title, movie.year, torrent) {
                Some(listing) => batch.listings.push(listing),
                None => batch.skipped += 1,
            }
        }
    }

    batch
}

fn to_listing(source_id: &str, title: &str, year: Option<u32>, t: YtsTorrent) -> Option<RawListing> {
    let info_hash = t
        .hash
        .filter(|h| !h.trim().is_empty())
        .map(|h| h.to_lowercase());

    let link = match (&info_hash, t.url) {
        (Some(hash), _) => build_magnet(hash, title),
        (None, Some(url)) if !url.is_empty() => url,
        _ => return None,
    };

    let mut display_name = match year {
        Some(year) => format!("{} ({})", title, year),
        None => title.to_string(),
    };
    if let Some(quality) = &t.quality {
        display_name.push_str(&format!(" [{}]", quality));
    }
    if let Some(kind) = &t.kind {
        display_name.push_str(&format!(" [{}]", kind));
    }
    if let Some(codec) = &t.video_codec {
        display_name.push_str(&format!(" [{}]", codec));
    }

    Some(RawListing {
        source_id: source_id.to_string(),
        link,
        display_name,
        size_bytes: t.size_bytes.unwrap_or(0),
        seeders: t.seeds.unwrap_or(0),
        leechers: t.peers.unwrap_or(0),
        uploaded_at: t
            .date_uploaded_unix
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
        quality_tag: t.quality,
        info_hash,
    })
}

fn build_magnet(hash: &str, title: &str) -> String {
    let mut magnet = format!(
        "magnet:?xt=urn:btih:{}&dn={}",
        hash,
        urlencoding::encode(title)
    );
    for tracker in TRACKERS {
        magnet.push_str("&tr=");
        magnet.push_str(&urlencoding::encode(tracker));
    }
    magnet
}

// YTS API response types
#[derive(Debug, Deserialize)]
struct YtsResponse {
    status: String,
    status_message: Option<String>,
    data: Option<YtsData>,
}

#[derive(Debug, Deserialize)]
struct YtsData {
    movies: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct YtsMovie {
    title: String,
    year: Option<u32>,
    torrents: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct YtsTorrent {
    url: Option<String>,
    hash: Option<String>,
    quality: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    video_codec: Option<String>,
    seeds: Option<u32>,
    peers: Option<u32>,
    size_bytes: Option<u64>,
    date_uploaded_unix: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_search_url() {
        let source = YtsSource::new(
            YtsConfig {
                base_url: "http://localhost:4000/".to_string(),
                limit: 20,
                ..Default::default()
            },
            Client::new(),
        );
        let url = source.build_search_url(&Query::new("The Matrix").with_year(1999));
        assert_eq!(
            url,
            "http://localhost:4000/api/v2/list_movies.json?query_term=The%20Matrix%201999&limit=20"
        );
    }

    #[test]
    fn test_parse_movies() {
        let movies = vec![json!({
            "title": "The Matrix",
            "year": 1999,
            "torrents": [
                {
                    "url": "https://yts.mx/torrent/download/ABC",
                    "hash": "ABCDEF0123",
                    "quality": "1080p",
                    "type": "bluray",
                    "video_codec": "x264",
                    "seeds": 120,
                    "peers": 14,
                    "size_bytes": 2244120412u64,
                    "date_uploaded_unix": 1446350109
                },
                {
                    "quality": "720p",
                    "seeds": 50
                },
                {
                    "hash": "0011",
                    "seeds": "many"
                }
            ]
        })];

        let batch = parse_movies("yts", Some(movies));
        assert_eq!(batch.listings.len(), 1);
        assert_eq!(batch.skipped, 2);

        let listing = &batch.listings[0];
        assert_eq!(listing.source_id, "yts");
        assert!(listing
            .link
            .starts_with("magnet:?xt=urn:btih:abcdef0123&dn=The%20Matrix"));
        assert!(listing.link.contains("&tr="));
        assert_eq!(listing.display_name, "The Matrix (1999) [1080p] [bluray] [x264]");
        assert_eq!(listing.seeders, 120);
        assert_eq!(listing.leechers, 14);
        assert_eq!(listing.size_bytes, 2244120412);
        assert_eq!(listing.quality_tag.as_deref(), Some("1080p"));
        assert_eq!(listing.info_hash.as_deref(), Some("abcdef0123"));
        assert!(listing.uploaded_at.is_some());
    }

    #[test]
    fn test_parse_movies_skips_malformed_movie() {
        let movies = vec![json!({"year": 2001}), json!({"title": "Alien", "torrents": []})];
        let batch = parse_movies("yts", Some(movies));
        assert!(batch.listings.is_empty());
        assert_eq!(batch.skipped, 1);
    }

    #[test]
    fn test_parse_movies_falls_back_to_url() {
        let movies = vec![json!({
            "title": "Alien",
            "torrents": [{"url": "https://yts.mx/torrent/download/X", "seeds": 3}]
        })];
        let batch = parse_movies("yts", Some(movies));
        assert_eq!(batch.listings[0].link, "https://yts.mx/torrent/download/X");
        assert_eq!(batch.listings[0].display_name, "Alien");
        assert!(batch.listings[0].info_hash.is_none());
    }

    #[tokio::test]
    async fn test_show_query_returns_empty_batch() {
        let source = YtsSource::new(
            YtsConfig {
                base_url: "http://127.0.0.1:9".to_string(),
                ..Default::default()
            },
            Client::new(),
        );
        let query = Query::new("Severance").with_kind(MediaKind::Show);
        let batch = source.search(&query, Duration::from_secs(1)).await.unwrap();
        assert!(batch.listings.is_empty());
    }
}
