//! Metadata reconciliation.
//!
//! The [`MetadataReconciler`] asks every selected provider about a title at
//! once and merges the answers by provider priority.

mod merge;

pub use merge::{merge_fragments, MetadataRecord};

use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::aggregate::{normalize_title, slugify};
use crate::cache::Cache;
use crate::diagnostics::{sort_failures, SoftFailure};
use crate::metadata::{MetadataClient, MetadataFragment, ProviderError};
use crate::metrics;

/// Metadata cache keyed by (normalized title, year, provider ids).
pub type MetadataCache = Cache<(String, Option<u32>, String), Arc<MetadataRecord>>;

pub fn metadata_cache(capacity: u64) -> MetadataCache {
    Cache::new("metadata", capacity)
}

/// A merged record plus the providers that failed along the way.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EnrichOutcome {
    pub record: MetadataRecord,
    pub failures: Vec<SoftFailure>,
    pub from_cache: bool,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EnrichError {
    #[error("No provider had data for this title")]
    NotFound { failures: Vec<SoftFailure> },
}

/// Fans lookups out to providers and merges the fragments.
pub struct MetadataReconciler {
    cache: Arc<MetadataCache>,
    ttl: Duration,
    priority: Vec<String>,
}

impl MetadataReconciler {
    /// `priority` lists provider ids, highest first.
    pub fn new(cache: Arc<MetadataCache>, ttl: Duration, priority: Vec<String>) -> Self {
        Self {
            cache,
            ttl,
            priority,
        }
    }

    pub fn cache(&self) -> &Arc<MetadataCache> {
        &self.cache
    }

    pub fn priority(&self) -> &[String] {
        &self.priority
    }

    /// Order providers by the priority list; unlisted ones follow by id.
    pub fn order_providers(
        &self,
        providers: &[Arc<dyn MetadataClient>],
    ) -> Vec<Arc<dyn MetadataClient>> {
        let rank = |id: &str| {
            self.priority
                .iter()
                .position(|p| p == id)
                .unwrap_or(usize::MAX)
        };
        let mut ordered = providers.to_vec();
        ordered.sort_by(|a, b| {
            rank(a.id())
                .cmp(&rank(b.id()))
                .then_with(|| a.id().cmp(b.id()))
        });
        ordered
    }

    /// Look `title` up with every provider and merge the results.
    pub async fn enrich(
        &self,
        title: &str,
        year: Option<u32>,
        providers: &[Arc<dyn MetadataClient>],
        timeout: Duration,
    ) -> Result<EnrichOutcome, EnrichError> {
        self.enrich_until(title, year, providers, timeout, Instant::now() + timeout)
            .await
    }

    /// Like [`enrich`](Self::enrich), but no lookup runs past `deadline`.
    ///
    /// Providers still pending at the deadline count as timed out; the
    /// fragments that did arrive are merged as usual.
    pub async fn enrich_until(
        &self,
        title: &str,
        year: Option<u32>,
        providers: &[Arc<dyn MetadataClient>],
        timeout: Duration,
        deadline: Instant,
    ) -> Result<EnrichOutcome, EnrichError> {
        let ordered = self.order_providers(providers);
        let provider_key = ordered
            .iter()
            .map(|p| p.id())
            .collect::<Vec<_>>()
            .join(",");
        let cache_key = (normalize_title(title), year, provider_key);

        if let Some(record) = self.cache.get(&cache_key) {
            debug!(title = %title, "Metadata cache hit");
            return Ok(EnrichOutcome {
                record: (*record).clone(),
                failures: Vec::new(),
                from_cache: true,
            });
        }

        let now = Instant::now();
        let limit = deadline.min(now + timeout);
        let lookup_timeout = limit.saturating_duration_since(now);

        let lookups = ordered.iter().map(|provider| async move {
            let id = provider.id().to_string();
            let lookup = provider.lookup(title, year, lookup_timeout);
            let result = match tokio::time::timeout_at(limit, lookup).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout),
            };
            let label = match &result {
                Ok(_) => "success",
                Err(e) => e.kind(),
            };
            metrics::PROVIDER_LOOKUPS
                .with_label_values(&[id.as_str(), label])
                .inc();
            (id, result)
        });
        let results = join_all(lookups).await;

        let mut fragments: Vec<(String, MetadataFragment)> = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        let mut transient = false;

        for (id, result) in results {
            match result {
                Ok(fragment) => fragments.push((id, fragment)),
                Err(e) => {
                    if e.is_transient() {
                        warn!(provider = %id, title = %title, error = %e, "Provider lookup failed");
                        transient = true;
                    } else {
                        debug!(provider = %id, title = %title, "Provider has no match");
                    }
                    failures.push(SoftFailure::provider(id.clone(), &e));
                    fragments.push((id, MetadataFragment::default()));
                }
            }
        }
        sort_failures(&mut failures);

        if fragments.iter().all(|(_, f)| f.is_empty()) {
            return Err(EnrichError::NotFound { failures });
        }

        let title_id = slugify(title, year);
        let record = merge_fragments(
            &title_id,
            fragments.iter().map(|(id, f)| (id.as_str(), f)),
        );

        // Records missing a transiently failed provider are not cached.
        if !transient {
            self.cache.put(cache_key, Arc::new(record.clone()), self.ttl);
        }

        Ok(EnrichOutcome {
            record,
            failures,
            from_cache: false,
        })
    }
}
