//! Listing aggregation.
//!
//! The [`AggregationEngine`] fans a query out to the selected sources,
//! serves repeats from the listing cache, and turns the combined listings
//! into ranked [`CandidateGroup`]s.

mod normalize;
mod rank;
mod types;

pub use normalize::{detect_codec, detect_quality, normalize_title, parse_listing, parse_title, slugify, ParsedTitle};
pub use rank::{compare_candidates, dedup_listings, group_candidates};
pub use types::*;

use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::Cache;
use crate::diagnostics::{sort_failures, SoftFailure};
use crate::metrics;
use crate::source::{Query, SourceBatch, SourceClient, SourceError};

/// Listing cache keyed by (source id, normalized query).
pub type ListingCache = Cache<(String, String), Arc<SourceBatch>>;

/// Build a listing cache weighted by listing count.
pub fn listing_cache(capacity: u64) -> ListingCache {
    Cache::with_weigher(
        "listings",
        capacity,
        Arc::new(|batch: &Arc<SourceBatch>| batch.listings.len().max(1) as u64),
    )
}

/// Result of a gather that reached at least one source.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct GatherOutcome {
    pub groups: Vec<CandidateGroup>,
    pub failures: Vec<SoftFailure>,
    /// Listings dropped as unparseable or mislabelled.
    pub skipped: usize,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GatherError {
    #[error("All {} sources failed", failures.len())]
    AllSourcesFailed { failures: Vec<SoftFailure> },
}

/// Fans queries out to sources and ranks what comes back.
pub struct AggregationEngine {
    cache: Arc<ListingCache>,
    listing_ttl: Duration,
}

impl AggregationEngine {
    pub fn new(cache: Arc<ListingCache>, listing_ttl: Duration) -> Self {
        Self { cache, listing_ttl }
    }

    pub fn cache(&self) -> &Arc<ListingCache> {
        &self.cache
    }

    /// Query `sources` concurrently and group the results.
    ///
    /// A failing source becomes a soft failure; only every source failing
    /// is an error. No sources yields an empty outcome.
    pub async fn gather(
        &self,
        query: &Query,
        sources: &[Arc<dyn SourceClient>],
        timeout: Duration,
    ) -> Result<GatherOutcome, GatherError> {
        let start = Instant::now();
        let query_key = query.cache_key();

        let searches = sources.iter().map(|source| {
            let query_key = query_key.clone();
            async move {
                let id = source.id().to_string();
                let result = self.fetch_source(source.as_ref(), query, query_key, timeout).await;
                (id, result)
            }
        });
        let results = join_all(searches).await;

        let mut listings = Vec::new();
        let mut failures = Vec::new();
        let mut skipped = 0;
        let mut succeeded = 0;

        for (id, result) in results {
            match result {
                Ok(batch) => {
                    succeeded += 1;
                    skipped += batch.skipped;
                    listings.extend(batch.listings.iter().cloned());
                }
                Err(e) => {
                    warn!(source = %id, error = %e, "Source search failed");
                    failures.push(SoftFailure::source(id, &e));
                }
            }
        }
        sort_failures(&mut failures);

        metrics::PHASE_DURATION
            .with_label_values(&["gather"])
            .observe(start.elapsed().as_secs_f64());

        if succeeded == 0 && !failures.is_empty() {
            return Err(GatherError::AllSourcesFailed { failures });
        }

        let candidates = listings.into_iter().map(parse_listing).collect();
        let groups = group_candidates(candidates);

        debug!(
            query = %query.title,
            groups = groups.len(),
            failures = failures.len(),
            skipped = skipped,
            "Gather complete"
        );

        Ok(GatherOutcome {
            groups,
            failures,
            skipped,
        })
    }

    /// One source, via the cache. Only successful batches are cached.
    async fn fetch_source(
        &self,
        source: &dyn SourceClient,
        query: &Query,
        query_key: String,
        timeout: Duration,
    ) -> Result<Arc<SourceBatch>, SourceError> {
        let id = source.id().to_string();
        let cache_key = (id.clone(), query_key);

        if let Some(batch) = self.cache.get(&cache_key) {
            debug!(source = %id, "Listing cache hit");
            metrics::SOURCE_REQUESTS
                .with_label_values(&[id.as_str(), "cached"])
                .inc();
            return Ok(batch);
        }

        let result = match tokio::time::timeout(timeout, source.search(query, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout),
        };

        match result {
            Ok(batch) => {
                metrics::SOURCE_REQUESTS
                    .with_label_values(&[id.as_str(), "success"])
                    .inc();
                let batch = Arc::new(sanitize_batch(&id, batch));
                if batch.skipped > 0 {
                    metrics::SOURCE_SKIPPED_LISTINGS
                        .with_label_values(&[id.as_str()])
                        .inc_by(batch.skipped as u64);
                }
                self.cache.put(cache_key, batch.clone(), self.listing_ttl);
                Ok(batch)
            }
            Err(e) => {
                metrics::SOURCE_REQUESTS
                    .with_label_values(&[id.as_str(), e.kind()])
                    .inc();
                Err(e)
            }
        }
    }
}

/// Drop listings claiming another source, then collapse duplicates.
fn sanitize_batch(source_id: &str, batch: SourceBatch) -> SourceBatch {
    let total = batch.listings.len();
    let own: Vec<_> = batch
        .listings
        .into_iter()
        .filter(|l| l.source_id == source_id)
        .collect();
    let mislabelled = total - own.len();
    if mislabelled > 0 {
        warn!(
            source = source_id,
            count = mislabelled,
            "Dropping listings labelled with another source id"
        );
    }
    SourceBatch::new(dedup_listings(own), batch.skipped + mislabelled)
}
