//! IMDb data via the OMDb API. Registered as the "imdb" provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::OmdbConfig;

use super::{
    check_status, non_empty, parse_year, with_timeout, MetadataClient, MetadataFragment,
    ProviderError, RateLimiter,
};

const DEFAULT_BASE_URL: &str = "https://www.omdbapi.com";

pub struct OmdbProvider {
    client: Client,
    base_url: String,
    api_key: String,
    limiter: RateLimiter,
}

impl OmdbProvider {
    pub fn new(api_key: String, config: &OmdbConfig, client: Client) -> Self {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            limiter: RateLimiter::new(config.rate_limit_rpm),
        }
    }

    async fn fetch(&self, title: &str, year: Option<u32>) -> Result<MetadataFragment, ProviderError> {
        self.limiter.acquire().await?;

        debug!("OMDb lookup: title='{}', year={:?}", title, year);

        let mut request = self
            .client
            .get(format!("{}/", self.base_url))
            .query(&[("apikey", self.api_key.as_str()), ("t", title)]);
        if let Some(y) = year {
            request = request.query(&[("y", y.to_string())]);
        }

        let response = check_status(request.send().await?)?;
        let body: OmdbResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("Failed to parse response: {}", e)))?;

        to_fragment(body)
    }
}

#[async_trait]
impl MetadataClient for OmdbProvider {
    fn id(&self) -> &str {
        "imdb"
    }

    async fn lookup(
        &self,
        title: &str,
        year: Option<u32>,
        timeout: Duration,
    ) -> Result<MetadataFragment, ProviderError> {
        with_timeout(timeout, self.fetch(title, year)).await
    }
}

/// OMDb reports errors in-band with `Response: "False"`.
fn to_fragment(body: OmdbResponse) -> Result<MetadataFragment, ProviderError> {
    if body.response.eq_ignore_ascii_case("false") {
        let error = body.error.unwrap_or_default();
        let lower = error.to_lowercase();
        return Err(if lower.contains("not found") {
            ProviderError::NotFound
        } else if lower.contains("limit") {
            ProviderError::RateLimited { retry_after: None }
        } else {
            ProviderError::Unavailable(error)
        });
    }

    let split_list = |value: Option<String>| -> Vec<String> {
        non_empty(value)
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    };

    let mut fragment = MetadataFragment {
        title: non_empty(body.title),
        year: body.year.as_deref().and_then(parse_year),
        genres: split_list(body.genre),
        cast: split_list(body.actors),
        summary: non_empty(body.plot),
        poster_url: non_empty(body.poster),
        imdb_id: non_empty(body.imdb_id),
        ..Default::default()
    };

    if let Some(score) = non_empty(body.imdb_rating).and_then(|s| s.parse::<f64>().ok()) {
        fragment.ratings.insert("imdb".to_string(), score);
    }
    if let Some(score) = non_empty(body.metascore).and_then(|s| s.parse::<f64>().ok()) {
        fragment.ratings.insert("metacritic".to_string(), score);
    }
    for rating in body.ratings {
        if rating.source == "Rotten Tomatoes" {
            if let Ok(score) = rating.value.trim_end_matches('%').parse::<f64>() {
                fragment.ratings.insert("rotten_tomatoes".to_string(), score);
            }
        }
    }

    Ok(fragment)
}

// OMDb API response types
#[derive(Debug, Deserialize)]
struct OmdbResponse {
    #[serde(rename = "Response")]
    response: String,
    #[serde(rename = "Error")]
    error: Option<String>,
    #[serde(rename = "Title")]
    title: Option<String>,
    #[serde(rename = "Year")]
    year: Option<String>,
    #[serde(rename = "Genre")]
    genre: Option<String>,
    #[serde(rename = "Actors")]
    actors: Option<String>,
    #[serde(rename = "Plot")]
    plot: Option<String>,
    #[serde(rename = "Poster")]
    poster: Option<String>,
    #[serde(rename = "imdbRating")]
    imdb_rating: Option<String>,
    #[serde(rename = "Metascore")]
    metascore: Option<String>,
    #[serde(rename = "imdbID")]
    imdb_id: Option<String>,
    #[serde(rename = "Ratings", default)]
    ratings: Vec<OmdbRating>,
}

#[derive(Debug, Deserialize)]
struct OmdbRating {
    #[serde(rename = "Source")]
    source: String,
    #[serde(rename = "Value")]
    value: String,
}
