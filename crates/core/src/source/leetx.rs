//! 1337x HTML listing source.
//!
//! Search results come from the listing table; magnets only appear on each
//! torrent's detail page, so those are fetched with bounded concurrency.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::LeetxConfig;

use super::{MediaKind, Query, RawListing, SourceBatch, SourceClient, SourceError};

/// 1337x scraper.
pub struct LeetxSource {
    client: Client,
    config: LeetxConfig,
}

/// One row of the search results table.
#[derive(Debug, Clone, PartialEq)]
struct ResultRow {
    name: String,
    detail_url: String,
    seeders: u32,
    leechers: u32,
    size_bytes: u64,
}

impl LeetxSource {
    pub fn new(config: LeetxConfig, client: Client) -> Self {
        Self { client, config }
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn build_search_url(&self, query: &Query) -> String {
        let text = urlencoding::encode(&query.search_text()).into_owned();
        match query.kind {
            Some(MediaKind::Movie) => {
                format!("{}/category-search/{}/Movies/1/", self.base_url(), text)
            }
            Some(MediaKind::Show) => format!("{}/category-search/{}/TV/1/", self.base_url(), text),
            None => format!("{}/search/{}/1/", self.base_url(), text),
        }
    }

    async fn fetch_page(&self, url: &str) -> Result<String, SourceError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(SourceError::Unavailable(format!("HTTP {}", response.status())));
        }
        Ok(response.text().await?)
    }

    async fn search_inner(&self, query: &Query) -> Result<SourceBatch, SourceError> {
        let url = self.build_search_url(query);
        debug!(source = %self.config.id, url = %url, "Searching 1337x");

        let html = self.fetch_page(&url).await?;
        let (mut rows, mut skipped) = parse_search_page(&html, self.base_url())?;
        rows.truncate(self.config.max_results);

        let details: Vec<(ResultRow, Result<Option<String>, SourceError>)> =
            stream::iter(rows)
                .map(|row| async move {
                    let magnet = match self.fetch_page(&row.detail_url).await {
                        Ok(page) => parse_detail_page(&page),
                        Err(e) => Err(e),
                    };
                    (row, magnet)
                })
                .buffered(self.config.detail_concurrency.max(1))
                .collect()
                .await;

        let mut listings = Vec::with_capacity(details.len());
        for (row, magnet) in details {
            match magnet {
                Ok(Some(link)) => listings.push(RawListing {
                    source_id: self.config.id.clone(),
                    link,
                    display_name: row.name,
                    size_bytes: row.size_bytes,
                    seeders: row.seeders,
                    leechers: row.leechers,
                    uploaded_at: None,
                    quality_tag: None,
                    info_hash: None,
                }),
                Ok(None) => skipped += 1,
                Err(e) => {
                    warn!(url = %row.detail_url, error = %e, "Failed to fetch 1337x detail page");
                    skipped += 1;
                }
            }
        }

        debug!(
            source = %self.config.id,
            listings = listings.len(),
            skipped = skipped,
            "1337x search complete"
        );
        Ok(SourceBatch::new(listings, skipped))
    }
}

#[async_trait]
impl SourceClient for LeetxSource {
    fn id(&self) -> &str {
        &self.config.id
    }

    async fn search(&self, query: &Query, timeout: Duration) -> Result<SourceBatch, SourceError> {
        tokio::time::timeout(timeout, self.search_inner(query))
            .await
            .map_err(|_| SourceError::Timeout)?
    }
}

fn selector(css: &str) -> Result<Selector, SourceError> {
    Selector::parse(css).map_err(|e| SourceError::Parse(e.to_string()))
}

/// Parse the results table. Returns the valid rows and the count of rows
/// that could not be read.
fn parse_search_page(html: &str, base_url: &str) -> Result<(Vec<ResultRow>, usize), SourceError> {
    let document = Html::parse_document(html);
    let row_selector = selector("table.table-list tbody tr")?;
    let name_selector = selector("td.name a:nth-of-type(2)")?;
    let seeds_selector = selector("td.seeds")?;
    let leeches_selector = selector("td.leeches")?;
    let size_selector = selector("td.size")?;

    let mut rows = Vec::new();
    let mut skipped = 0;

    for tr in document.select(&row_selector) {
        let Some(link) = tr.select(&name_selector).next() else {
            skipped += 1;
            continue;
        };
        let name = link.text().collect::<String>().trim().to_string();
        let Some(href) = link.value().attr("href").filter(|h| !h.is_empty()) else {
            skipped += 1;
            continue;
        };

        let number = |sel: &Selector| -> Option<u32> {
            tr.select(sel)
                .next()
                .map(|td| td.text().collect::<String>())
                .and_then(|t| t.trim().replace(',', "").parse().ok())
        };
        let (Some(seeders), Some(leechers)) = (number(&seeds_selector), number(&leeches_selector))
        else {
            skipped += 1;
            continue;
        };

        let size_bytes = tr
            .select(&size_selector)
            .next()
            .and_then(|td| td.text().next())
            .and_then(parse_human_size)
            .unwrap_or(0);

        if name.is_empty() {
            skipped += 1;
            continue;
        }

        let detail_url = if href.starts_with("http") {
            href.to_string()
        } else {
            format!("{}{}", base_url, href)
        };

        rows.push(ResultRow {
            name,
            detail_url,
            seeders,
            leechers,
            size_bytes,
        });
    }

    Ok((rows, skipped))
}

/// Extract the magnet link from a torrent detail page.
fn parse_detail_page(html: &str) -> Result<Option<String>, SourceError> {
    let document = Html::parse_document(html);
    let magnet_selector = selector(r#"a[href^="magnet:"]"#)?;
    Ok(document
        .select(&magnet_selector)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(|href| href.to_string()))
}

/// Parse sizes like "1.4 GB" or "700 MiB" into bytes (binary multiples).
pub fn parse_human_size(text: &str) -> Option<u64> {
    let text = text.trim().replace(',', "");
    let split = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);
    let value: f64 = number.trim().parse().ok()?;

    let multiplier: u64 = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" | "BYTES" => 1,
        "KB" | "KIB" => 1 << 10,
        "MB" | "MIB" => 1 << 20,
        "GB" | "GIB" => 1 << 30,
        "TB" | "TIB" => 1 << 40,
        _ => return None,
    };

    Some((value * multiplier as f64).round() as u64)
}
