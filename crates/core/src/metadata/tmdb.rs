//! TMDB (The Movie Database) API client.
//!
//! TMDB requires an API key for access.
//! Rate limits are generous (around 40 requests per second).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::TmdbConfig;

use super::{
    check_status, non_empty, parse_year, with_timeout, MetadataClient, MetadataFragment,
    ProviderError, RateLimiter,
};

const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";
const DEFAULT_IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p";
const MAX_CAST: usize = 10;

/// What a search hit refers to.
#[derive(Debug, Clone, Copy, PartialEq)]
enum TmdbKind {
    Movie,
    Tv,
}

impl TmdbKind {
    fn path(&self) -> &'static str {
        match self {
            TmdbKind::Movie => "movie",
            TmdbKind::Tv => "tv",
        }
    }
}

/// TMDB API client.
pub struct TmdbProvider {
    client: Client,
    base_url: String,
    api_key: String,
    image_base_url: String,
    limiter: RateLimiter,
}

impl TmdbProvider {
    /// Create a new TMDB client.
    pub fn new(api_key: String, config: &TmdbConfig, client: Client) -> Self {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let image_base_url = config
            .image_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_IMAGE_BASE_URL.to_string());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            image_base_url: image_base_url.trim_end_matches('/').to_string(),
            limiter: RateLimiter::new(config.rate_limit_rpm),
        }
    }

    /// First search hit id for movies, then TV.
    async fn search(&self, title: &str, year: Option<u32>) -> Result<(TmdbKind, u32), ProviderError> {
        for kind in [TmdbKind::Movie, TmdbKind::Tv] {
            self.limiter.acquire().await?;
            let url = format!("{}/search/{}", self.base_url, kind.path());

            debug!("TMDB {} search: query='{}', year={:?}", kind.path(), title, year);

            let mut request = self
                .client
                .get(&url)
                .query(&[("api_key", self.api_key.as_str()), ("query", title)]);

            if let Some(y) = year {
                let year_param = match kind {
                    TmdbKind::Movie => "year",
                    TmdbKind::Tv => "first_air_date_year",
                };
                request = request.query(&[(year_param, y.to_string())]);
            }

            let response = check_status(request.send().await?)?;
            let search_result: TmdbSearchResponse = response.json().await.map_err(|e| {
                ProviderError::Unavailable(format!("Failed to parse search response: {}", e))
            })?;

            if let Some(hit) = search_result.results.first() {
                return Ok((kind, hit.id));
            }
        }

        Err(ProviderError::NotFound)
    }

    async fn details(&self, kind: TmdbKind, id: u32) -> Result<TmdbDetails, ProviderError> {
        self.limiter.acquire().await?;
        let url = format!("{}/{}/{}", self.base_url, kind.path(), id);

        debug!("TMDB get {}: id={}", kind.path(), id);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("append_to_response", "credits,external_ids"),
            ])
            .send()
            .await?;

        check_status(response)?.json().await.map_err(|e| {
            ProviderError::Unavailable(format!("Failed to parse details response: {}", e))
        })
    }

    fn to_fragment(&self, d: TmdbDetails) -> MetadataFragment {
        let mut fragment = MetadataFragment {
            title: non_empty(d.title.or(d.name)),
            year: d
                .release_date
                .or(d.first_air_date)
                .as_deref()
                .and_then(parse_year),
            genres: d.genres.into_iter().map(|g| g.name).collect(),
            cast: d
                .credits
                .map(|c| c.cast.into_iter().take(MAX_CAST).map(|p| p.name).collect())
                .unwrap_or_default(),
            summary: non_empty(d.overview),
            poster_url: non_empty(d.poster_path)
                .map(|path| format!("{}/w500{}", self.image_base_url, path)),
            imdb_id: non_empty(d.imdb_id.or(d.external_ids.and_then(|e| e.imdb_id))),
            ..Default::default()
        };

        if let Some(vote) = d.vote_average.filter(|v| *v > 0.0) {
            fragment.ratings.insert("tmdb".to_string(), vote);
        }

        fragment
    }
}

#[async_trait]
impl MetadataClient for TmdbProvider {
    fn id(&self) -> &str {
        "tmdb"
    }

    async fn lookup(
        &self,
        title: &str,
        year: Option<u32>,
        timeout: Duration,
    ) -> Result<MetadataFragment, ProviderError> {
        with_timeout(timeout, async {
            let (kind, id) = self.search(title, year).await?;
            let details = self.details(kind, id).await?;
            Ok(self.to_fragment(details))
        })
        .await
    }
}

// ============================================================================
// TMDB API Response Types (private)
// ============================================================================

#[derive(Debug, Deserialize)]
struct TmdbSearchResponse {
    results: Vec<TmdbSearchHit>,
}

#[derive(Debug, Deserialize)]
struct TmdbSearchHit {
    id: u32,
}

/// Movie and TV details share one shape; movies use `title`/`release_date`,
/// TV uses `name`/`first_air_date`.
#[derive(Debug, Deserialize)]
struct TmdbDetails {
    title: Option<String>,
    name: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
    overview: Option<String>,
    poster_path: Option<String>,
    #[serde(default)]
    genres: Vec<TmdbGenre>,
    vote_average: Option<f64>,
    imdb_id: Option<String>,
    credits: Option<TmdbCredits>,
    external_ids: Option<TmdbExternalIds>,
}

#[derive(Debug, Deserialize)]
struct TmdbGenre {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TmdbCredits {
    #[serde(default)]
    cast: Vec<TmdbCastMember>,
}

#[derive(Debug, Deserialize)]
struct TmdbCastMember {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TmdbExternalIds {
    imdb_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> TmdbProvider {
        TmdbProvider::new(
            "key".to_string(),
            &TmdbConfig {
                image_base_url: Some("https://img.example/t/p/".to_string()),
                ..Default::default()
            },
            Client::new(),
        )
    }

    #[test]
    fn test_defaults() {
        let p = provider();
        assert_eq!(p.base_url, "https://api.themoviedb.org/3");
        assert_eq!(p.image_base_url, "https://img.example/t/p");
    }

    #[test]
    fn test_movie_details_to_fragment() {
        let details: TmdbDetails = serde_json::from_str(
            r#"{
                "title": "The Matrix",
                "release_date": "1999-03-30",
                "overview": "A hacker learns the truth.",
                "poster_path": "/matrix.jpg",
                "genres": [{"id": 28, "name": "Action"}, {"id": 878, "name": "Science Fiction"}],
                "vote_average": 8.2,
                "imdb_id": "tt0133093",
                "credits": {"cast": [{"name": "Keanu Reeves"}, {"name": "Laurence Fishburne"}]}
            }"#,
        )
        .unwrap();

        let fragment = provider().to_fragment(details);
        assert_eq!(fragment.title.as_deref(), Some("The Matrix"));
        assert_eq!(fragment.year, Some(1999));
        assert_eq!(fragment.genres, vec!["Action", "Science Fiction"]);
        assert_eq!(fragment.cast, vec!["Keanu Reeves", "Laurence Fishburne"]);
        assert_eq!(fragment.ratings.get("tmdb"), Some(&8.2));
        assert_eq!(
            fragment.poster_url.as_deref(),
            Some("https://img.example/t/p/w500/matrix.jpg")
        );
        assert_eq!(fragment.imdb_id.as_deref(), Some("tt0133093"));
    }

    #[test]
    fn test_tv_details_to_fragment() {
        let details: TmdbDetails = serde_json::from_str(
            r#"{
                "name": "Severance",
                "first_air_date": "2022-02-17",
                "overview": "",
                "vote_average": 0.0,
                "external_ids": {"imdb_id": "tt11280740"}
            }"#,
        )
        .unwrap();

        let fragment = provider().to_fragment(details);
        assert_eq!(fragment.title.as_deref(), Some("Severance"));
        assert_eq!(fragment.year, Some(2022));
        assert!(fragment.summary.is_none());
        assert!(fragment.ratings.is_empty());
        assert!(fragment.poster_url.is_none());
        assert_eq!(fragment.imdb_id.as_deref(), Some("tt11280740"));
    }

    #[test]
    fn test_cast_is_capped() {
        let cast: Vec<String> = (0..15).map(|i| format!(r#"{{"name": "Actor {}"}}"#, i)).collect();
        let json = format!(r#"{{"title": "Crowd", "credits": {{"cast": [{}]}}}}"#, cast.join(","));
        let details: TmdbDetails = serde_json::from_str(&json).unwrap();
        assert_eq!(provider().to_fragment(details).cast.len(), MAX_CAST);
    }
}
