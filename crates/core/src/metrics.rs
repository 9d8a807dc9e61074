//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Torrent sources (requests, listings, skipped listings)
//! - Metadata providers (lookups by outcome)
//! - Caches (lookups by outcome)
//! - Pipeline phases (gather, enrich, execute durations)
//!
//! The server registers these into its registry via [`all_metrics`].

use once_cell::sync::Lazy;
use prometheus::{core::Collector, HistogramOpts, HistogramVec, IntCounterVec, Opts};

// =============================================================================
// Sources
// =============================================================================

/// Source requests by source id and result.
pub static SOURCE_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelscout_source_requests_total", "Total torrent source requests"),
        &["source", "result"], // "success", "cached", "unavailable", "timeout", "parse_error"
    )
    .unwrap()
});

/// Listings skipped because they could not be parsed or were invalid.
pub static SOURCE_SKIPPED_LISTINGS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reelscout_source_skipped_listings_total",
            "Listings dropped during parsing or validation",
        ),
        &["source"],
    )
    .unwrap()
});

// =============================================================================
// Metadata providers
// =============================================================================

/// Provider lookups by provider id and result.
pub static PROVIDER_LOOKUPS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reelscout_provider_lookups_total",
            "Total metadata provider lookups",
        ),
        &["provider", "result"], // "success", "not_found", "unavailable", "rate_limited", "timeout"
    )
    .unwrap()
});

// =============================================================================
// Cache
// =============================================================================

/// Cache lookups by cache name and outcome.
pub static CACHE_LOOKUPS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelscout_cache_lookups_total", "Cache lookups"),
        &["cache", "outcome"], // "hit", "miss"
    )
    .unwrap()
});

// =============================================================================
// Pipeline
// =============================================================================

/// Phase duration in seconds.
pub static PHASE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "reelscout_phase_duration_seconds",
            "Duration of pipeline phases",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["phase"], // "gather", "enrich", "execute"
    )
    .unwrap()
});

/// Queries executed by outcome.
pub static QUERIES_EXECUTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelscout_queries_total", "Total executed queries"),
        &["outcome"], // "complete", "partial", or a QueryError kind
    )
    .unwrap()
});

/// All core metrics, for registration into a registry.
pub fn all_metrics() -> Vec<Box<dyn Collector>> {
    vec![
        Box::new(SOURCE_REQUESTS.clone()),
        Box::new(SOURCE_SKIPPED_LISTINGS.clone()),
        Box::new(PROVIDER_LOOKUPS.clone()),
        Box::new(CACHE_LOOKUPS.clone()),
        Box::new(PHASE_DURATION.clone()),
        Box::new(QUERIES_EXECUTED.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn test_all_metrics_register() {
        let registry = Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }

        SOURCE_REQUESTS.with_label_values(&["yts", "success"]).inc();
        let families = registry.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "reelscout_source_requests_total"));
    }
}
