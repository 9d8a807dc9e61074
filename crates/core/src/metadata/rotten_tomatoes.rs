//! Rotten Tomatoes page scraper. Needs no credential.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::debug;

use crate::config::RottenTomatoesConfig;

use super::{check_status, with_timeout, MetadataClient, MetadataFragment, ProviderError, RateLimiter};

const DEFAULT_BASE_URL: &str = "https://www.rottentomatoes.com";
const MAX_CAST: usize = 10;

/// Rotten Tomatoes' URL slug for a title: "Spider-Man: No Way Home" ->
/// "spider-man_no_way_home".
pub fn rotten_tomatoes_slug(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-' || *c == '_')
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

pub struct RottenTomatoesProvider {
    client: Client,
    base_url: String,
    limiter: RateLimiter,
}

impl RottenTomatoesProvider {
    pub fn new(config: &RottenTomatoesConfig, client: Client) -> Self {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            limiter: RateLimiter::new(config.rate_limit_rpm),
        }
    }

    /// Pages tried in order. Movies come before shows and the year-qualified
    /// slug before the bare one, since remakes take the suffixed form.
    fn candidate_urls(&self, title: &str, year: Option<u32>) -> Vec<String> {
        let slug = rotten_tomatoes_slug(title);
        let mut urls = Vec::with_capacity(4);
        for kind in ["m", "tv"] {
            if let Some(year) = year {
                urls.push(format!("{}/{}/{}_{}", self.base_url, kind, slug, year));
            }
            urls.push(format!("{}/{}/{}", self.base_url, kind, slug));
        }
        urls
    }

    async fn fetch(&self, title: &str, year: Option<u32>) -> Result<MetadataFragment, ProviderError> {
        if rotten_tomatoes_slug(title).is_empty() {
            return Err(ProviderError::NotFound);
        }

        for url in self.candidate_urls(title, year) {
            self.limiter.acquire().await?;
            debug!(url = %url, "Fetching Rotten Tomatoes page");

            let response = self.client.get(&url).send().await?;
            if response.status() == StatusCode::NOT_FOUND {
                continue;
            }
            let html = check_status(response)?.text().await?;
            let fragment = parse_page(&html)?;
            if !fragment.is_empty() {
                return Ok(fragment);
            }
        }

        Err(ProviderError::NotFound)
    }
}

#[async_trait]
impl MetadataClient for RottenTomatoesProvider {
    fn id(&self) -> &str {
        "rotten_tomatoes"
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

fn selector(css: &str) -> Result<Selector, ProviderError> {
    Selector::parse(css).map_err(|e| ProviderError::Unavailable(format!("Bad selector: {}", e)))
}

fn text_of(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// "93%" -> 93.0. Unscored titles show "--" or nothing.
fn parse_percent(raw: &str) -> Option<f64> {
    raw.trim().trim_end_matches('%').trim().parse::<f64>().ok()
}

/// Scrape a movie or show page.
fn parse_page(html: &str) -> Result<MetadataFragment, ProviderError> {
    let document = Html::parse_document(html);
    let title_selector = selector("h1")?;
    let board_selector = selector("score-board")?;
    let critics_selector = selector(r#"rt-text[slot="criticsScore"]"#)?;
    let audience_selector = selector(r#"rt-text[slot="audienceScore"]"#)?;
    let synopsis_selector = selector(r#"rt-text[data-qa="synopsis-value"]"#)?;
    let category_selector = selector("div.category-wrap")?;
    let key_selector = selector("rt-text.key")?;
    let value_selector = selector("rt-link")?;

    let first_text = |sel: &Selector| -> Option<String> {
        document
            .select(sel)
            .next()
            .map(text_of)
            .filter(|t| !t.is_empty())
    };

    let mut fragment = MetadataFragment {
        title: first_text(&title_selector),
        summary: first_text(&synopsis_selector),
        ..Default::default()
    };

    // Older pages carry the scores as attributes of <score-board>; newer
    // ones as slotted text.
    let board = document.select(&board_selector).next();
    let board_score = |attr: &str| board.and_then(|b| b.value().attr(attr)).and_then(parse_percent);
    let critics = board_score("tomatometerscore")
        .or_else(|| first_text(&critics_selector).as_deref().and_then(parse_percent));
    let audience = board_score("audiencescore")
        .or_else(|| first_text(&audience_selector).as_deref().and_then(parse_percent));
    if let Some(score) = critics {
        fragment.ratings.insert("rotten_tomatoes".to_string(), score);
    }
    if let Some(score) = audience {
        fragment.ratings.insert("rotten_tomatoes_audience".to_string(), score);
    }

    for category in document.select(&category_selector) {
        let Some(label) = category.select(&key_selector).next().map(text_of) else {
            continue;
        };
        let values = category
            .select(&value_selector)
            .map(text_of)
            .filter(|v| !v.is_empty());
        match label.trim_end_matches(':').to_lowercase().as_str() {
            "genre" => fragment.genres = values.collect(),
            "cast" => fragment.cast = values.take(MAX_CAST).collect(),
            _ => {}
        }
    }

    Ok(fragment)
}
