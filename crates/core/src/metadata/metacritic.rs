//! Metacritic page scraper. Needs no credential.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::debug;

use crate::config::MetacriticConfig;

use super::{check_status, with_timeout, MetadataClient, MetadataFragment, ProviderError, RateLimiter};

const DEFAULT_BASE_URL: &str = "https://www.metacritic.com";
const MAX_CAST: usize = 10;

static SEASON_SUFFIX: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"\b(?:(?i:season)|S)\s*\d+.*$").ok());
static PARENTHESIZED: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\([^)]*\)").ok());
static TRAILING_YEAR: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\s+\d{4}$").ok());

/// Metacritic's URL slug for a title: "The Matrix (1999)" -> "the-matrix".
pub fn metacritic_slug(title: &str) -> String {
    let mut clean = title.to_string();
    for re in [&SEASON_SUFFIX, &PARENTHESIZED, &TRAILING_YEAR]
        .into_iter()
        .filter_map(|re| Lazy::force(re).as_ref())
    {
        clean = re.replace_all(&clean, "").trim().to_string();
    }
    clean
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-')
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

pub struct MetacriticProvider {
    client: Client,
    base_url: String,
    limiter: RateLimiter,
}

impl MetacriticProvider {
    pub fn new(config: &MetacriticConfig, client: Client) -> Self {
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

    /// Pages tried in order; the first that answers 200 is scraped.
    fn candidate_urls(&self, title: &str, year: Option<u32>) -> Vec<String> {
        let slug = metacritic_slug(title);
        let mut urls = vec![
            format!("{}/movie/{}/", self.base_url, slug),
            format!("{}/tv/{}/", self.base_url, slug),
        ];
        if let Some(year) = year {
            urls.push(format!("{}/movie/{}-{}/", self.base_url, slug, year));
            urls.push(format!("{}/tv/{}-{}/", self.base_url, slug, year));
        }
        urls
    }

    async fn fetch(&self, title: &str, year: Option<u32>) -> Result<MetadataFragment, ProviderError> {
        if metacritic_slug(title).is_empty() {
            return Err(ProviderError::NotFound);
        }

        for url in self.candidate_urls(title, year) {
            self.limiter.acquire().await?;
            debug!(url = %url, "Fetching Metacritic page");

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
impl MetadataClient for MetacriticProvider {
    fn id(&self) -> &str {
        "metacritic"
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

fn text_of(element: scraper::ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Scrape a product page.
fn parse_page(html: &str) -> Result<MetadataFragment, ProviderError> {
    let document = Html::parse_document(html);
    let title_selector = selector("h1")?;
    let summary_selector = selector("span.c-productDetails_description")?;
    let score_selector = selector(
        r#"div.c-reviewsOverview_overviewDetails div[class*="c-siteReviewScore"] span"#,
    )?;
    let user_score_selector = selector(
        r#"div.c-reviewsSection_carouselContainer-user div.c-siteReviewScore_user span"#,
    )?;
    let genre_selector = selector("ul.c-genreList span.c-globalButton_label")?;
    let cast_selector = selector("div.c-globalPersonCard h3.c-globalPersonCard_name")?;

    let first_text = |sel: &Selector| -> Option<String> {
        document
            .select(sel)
            .next()
            .map(text_of)
            .filter(|t| !t.is_empty())
    };

    let mut fragment = MetadataFragment {
        title: first_text(&title_selector),
        summary: first_text(&summary_selector),
        genres: document
            .select(&genre_selector)
            .map(text_of)
            .filter(|g| !g.is_empty())
            .collect(),
        cast: document
            .select(&cast_selector)
            .map(text_of)
            .filter(|c| !c.is_empty())
            .take(MAX_CAST)
            .collect(),
        ..Default::default()
    };

    if let Some(score) = first_text(&score_selector).and_then(|s| s.parse::<f64>().ok()) {
        fragment.ratings.insert("metacritic".to_string(), score);
    }
    if let Some(score) = first_text(&user_score_selector).and_then(|s| s.parse::<f64>().ok()) {
        fragment.ratings.insert("metacritic_user".to_string(), score);
    }

    Ok(fragment)
}
