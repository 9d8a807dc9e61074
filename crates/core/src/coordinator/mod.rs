//! End-to-end query execution.
//!
//! The [`QueryCoordinator`] runs a query through both phases under one
//! overall deadline:
//!
//! 1. **Gather**: every selected source is searched concurrently and the
//!    listings are ranked into candidate groups.
//! 2. **Enrich**: each group's title is looked up with the selected metadata
//!    providers, again concurrently. No lookup runs past the deadline;
//!    providers still pending then count as timed out and each group keeps
//!    whatever fragments already arrived.
//!
//! Per-source and per-provider failures never fail the query; they are
//! reported alongside the results.

mod handoff;
mod types;

pub use handoff::{validate_link, ChannelHandoff, DownloadHandoff, HandoffError};
pub use types::*;

use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::aggregate::{listing_cache, slugify, AggregationEngine, GatherError};
use crate::config::{Config, SearchConfig};
use crate::diagnostics::sort_failures;
use crate::metadata::ProviderRegistry;
use crate::metrics;
use crate::reconcile::{metadata_cache, EnrichError, MetadataRecord, MetadataReconciler};
use crate::registry::RegistryError;
use crate::source::{Query, SourceRegistry};

/// How long enrichment may overrun the deadline before it is abandoned.
const DEADLINE_GRACE: Duration = Duration::from_millis(50);

/// Runs queries against the registered sources and providers.
pub struct QueryCoordinator {
    sources: SourceRegistry,
    providers: ProviderRegistry,
    engine: AggregationEngine,
    reconciler: MetadataReconciler,
    defaults: SearchConfig,
    handoff: Option<Arc<dyn DownloadHandoff>>,
}

impl QueryCoordinator {
    pub fn new(
        sources: SourceRegistry,
        providers: ProviderRegistry,
        engine: AggregationEngine,
        reconciler: MetadataReconciler,
        defaults: SearchConfig,
    ) -> Self {
        Self {
            sources,
            providers,
            engine,
            reconciler,
            defaults,
            handoff: None,
        }
    }

    /// Build sources, providers, and both caches from configuration.
    pub fn from_config(config: &Config, client: reqwest::Client) -> Result<Self, RegistryError> {
        let sources = SourceRegistry::from_config(&config.sources, client.clone())?;
        let providers = ProviderRegistry::from_config(&config.metadata, client)?;

        let engine = AggregationEngine::new(
            Arc::new(listing_cache(config.cache.listing_capacity)),
            Duration::from_secs(config.cache.listing_ttl_secs),
        );
        let reconciler = MetadataReconciler::new(
            Arc::new(metadata_cache(config.cache.metadata_capacity)),
            Duration::from_secs(config.cache.metadata_ttl_secs),
            config.metadata.priority.clone(),
        );

        info!(
            sources = ?sources.ids(),
            providers = ?providers.ids(),
            "Query coordinator ready"
        );

        Ok(Self::new(
            sources,
            providers,
            engine,
            reconciler,
            config.search.clone(),
        ))
    }

    pub fn with_handoff(mut self, handoff: Arc<dyn DownloadHandoff>) -> Self {
        self.handoff = Some(handoff);
        self
    }

    pub fn sources(&self) -> &SourceRegistry {
        &self.sources
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    pub fn engine(&self) -> &AggregationEngine {
        &self.engine
    }

    pub fn reconciler(&self) -> &MetadataReconciler {
        &self.reconciler
    }

    pub fn defaults(&self) -> &SearchConfig {
        &self.defaults
    }

    /// Run `query` through gather and enrich.
    pub async fn execute(
        &self,
        query: &Query,
        options: &SearchOptions,
    ) -> Result<SearchResponse, QueryError> {
        let start = Instant::now();
        let result = self.execute_inner(query, options, start).await;

        let outcome = match &result {
            Ok(response) if response.failures.is_empty() && !response.deadline_exceeded => "complete",
            Ok(_) => "partial",
            Err(e) => e.kind(),
        };
        metrics::QUERIES_EXECUTED.with_label_values(&[outcome]).inc();
        metrics::PHASE_DURATION
            .with_label_values(&["execute"])
            .observe(start.elapsed().as_secs_f64());

        result
    }

    async fn execute_inner(
        &self,
        query: &Query,
        options: &SearchOptions,
        start: Instant,
    ) -> Result<SearchResponse, QueryError> {
        if query.title.trim().is_empty() {
            return Err(QueryError::InvalidQuery("title must not be blank".to_string()));
        }

        let sources = self
            .sources
            .select(options.sources.as_deref())
            .map_err(|e| match e {
                RegistryError::Unknown(id) => QueryError::UnknownSource(id),
                other => QueryError::InvalidQuery(other.to_string()),
            })?;
        if sources.is_empty() {
            return Err(QueryError::InvalidQuery("no sources selected".to_string()));
        }

        let providers = if options.enrich {
            self.providers
                .select(options.providers.as_deref())
                .map_err(|e| match e {
                    RegistryError::Unknown(id) => QueryError::UnknownProvider(id),
                    other => QueryError::InvalidQuery(other.to_string()),
                })?
        } else {
            Vec::new()
        };

        let budget = Duration::from_millis(options.deadline_ms.unwrap_or(self.defaults.deadline_ms));
        let deadline = start + budget;

        // Gather. Source timeouts never outlast the deadline, so gather
        // always returns by then.
        let source_timeout = Duration::from_millis(
            options
                .source_timeout_ms
                .unwrap_or(self.defaults.source_timeout_ms),
        )
        .min(budget);

        let gathered = match self.engine.gather(query, &sources, source_timeout).await {
            Ok(gathered) => gathered,
            Err(GatherError::AllSourcesFailed { failures }) => {
                if Instant::now() >= deadline {
                    warn!(query = %query.title, "Deadline elapsed with no source results");
                    return Err(QueryError::DeadlineExceeded);
                }
                warn!(query = %query.title, failures = failures.len(), "All sources failed");
                return Err(QueryError::AllSourcesFailed { failures });
            }
        };

        let mut groups = gathered.groups;
        if let Some(max) = options.max_groups.or(self.defaults.max_groups) {
            groups.truncate(max);
        }
        let mut failures = gathered.failures;

        if groups.is_empty() && Instant::now() >= deadline {
            return Err(QueryError::DeadlineExceeded);
        }

        // Enrich.
        let mut records: Vec<Option<MetadataRecord>> = vec![None; groups.len()];
        let mut deadline_exceeded = Instant::now() >= deadline;
        if deadline_exceeded {
            warn!(query = %query.title, "Deadline reached during gather");
        }

        if !deadline_exceeded && !providers.is_empty() && !groups.is_empty() {
            let enrich_start = Instant::now();
            let remaining = deadline.saturating_duration_since(enrich_start);
            let provider_timeout = Duration::from_millis(
                options
                    .provider_timeout_ms
                    .unwrap_or(self.defaults.provider_timeout_ms),
            )
            .min(remaining);

            let providers = &providers;
            let mut pending: FuturesUnordered<_> = groups
                .iter()
                .enumerate()
                .map(|(index, group)| async move {
                    let result = self
                        .reconciler
                        .enrich_until(
                            &group.canonical_title,
                            group.year,
                            providers,
                            provider_timeout,
                            deadline,
                        )
                        .await;
                    (index, result)
                })
                .collect();

            // Lookups stop at the deadline on their own; the grace period
            // only guards against a reconciler that ignores it.
            let sleep = tokio::time::sleep_until(deadline + DEADLINE_GRACE);
            tokio::pin!(sleep);

            loop {
                tokio::select! {
                    biased;
                    next = pending.next() => match next {
                        Some((index, Ok(enriched))) => {
                            failures.extend(enriched.failures);
                            records[index] = Some(enriched.record);
                        }
                        Some((index, Err(EnrichError::NotFound { failures: missed }))) => {
                            debug!(title = %groups[index].canonical_title, "No metadata found");
                            failures.extend(missed);
                        }
                        None => break,
                    },
                    _ = &mut sleep => break,
                }
            }

            deadline_exceeded = Instant::now() >= deadline;
            if deadline_exceeded {
                warn!(
                    query = %query.title,
                    unfinished = pending.len(),
                    "Deadline reached during enrichment"
                );
            }

            metrics::PHASE_DURATION
                .with_label_values(&["enrich"])
                .observe(enrich_start.elapsed().as_secs_f64());
        }

        sort_failures(&mut failures);
        failures.dedup();

        let results: Vec<EnrichedResult> = groups
            .into_iter()
            .zip(records)
            .map(|(group, record)| EnrichedResult {
                metadata: record
                    .unwrap_or_else(|| MetadataRecord::empty(slugify(&group.canonical_title, group.year))),
                group,
            })
            .collect();

        let elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            query = %query.title,
            results = results.len(),
            failures = failures.len(),
            deadline_exceeded,
            elapsed_ms,
            "Search complete"
        );

        Ok(SearchResponse {
            query: query.clone(),
            results,
            failures,
            skipped: gathered.skipped,
            deadline_exceeded,
            elapsed_ms,
        })
    }

    /// Forward a chosen candidate's link to the download handoff.
    pub fn hand_off(&self, link: &str) -> Result<(), HandoffError> {
        validate_link(link)?;
        let handoff = self.handoff.as_ref().ok_or(HandoffError::NotConfigured)?;
        handoff.hand_off(link.trim())?;
        info!(link = %link.trim(), "Handed off download");
        Ok(())
    }
}
