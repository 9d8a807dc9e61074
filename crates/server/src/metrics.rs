//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the ReelScout server:
//! - HTTP request metrics (latency, counts, in flight)
//! - Download hand-offs
//! - Cache occupancy (collected dynamically)
//!
//! Pipeline metrics live in `reelscout_core::metrics` and are registered here.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use regex_lite::Regex;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "reelscout_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelscout_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "reelscout_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Hand-off Metrics
// =============================================================================

/// Download hand-offs by result.
pub static HANDOFFS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelscout_handoffs_total", "Download hand-offs"),
        &["result"], // "queued", "invalid_link", "channel_full", "channel_closed", "not_configured"
    )
    .unwrap()
});

// =============================================================================
// Cache Metrics (collected dynamically)
// =============================================================================

/// Entries held per cache.
pub static CACHE_ENTRIES: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("reelscout_cache_entries", "Entries currently held per cache"),
        &["cache"],
    )
    .unwrap()
});

/// Total weight held per cache.
pub static CACHE_WEIGHT: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("reelscout_cache_weight", "Weight currently held per cache"),
        &["cache"],
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Hand-off
    registry.register(Box::new(HANDOFFS_TOTAL.clone())).unwrap();

    // Cache
    registry.register(Box::new(CACHE_ENTRIES.clone())).unwrap();
    registry.register(Box::new(CACHE_WEIGHT.clone())).unwrap();

    // Core metrics (sources, providers, caches, pipeline phases)
    for metric in reelscout_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so the cache gauges reflect current occupancy.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let coordinator = state.coordinator();
    for stats in [
        coordinator.engine().cache().stats(),
        coordinator.reconciler().cache().stats(),
    ] {
        CACHE_ENTRIES
            .with_label_values(&[stats.name.as_str()])
            .set(stats.entries as i64);
        CACHE_WEIGHT
            .with_label_values(&[stats.name.as_str()])
            .set(stats.weight as i64);
    }
}

static HASH_SEGMENT: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"[0-9a-fA-F]{40}").ok());
static NUMERIC_SEGMENT: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"/\d+(/|$)").ok());

/// Normalize a path for metric labels (replace hashes and ids with placeholders).
pub fn normalize_path(path: &str) -> String {
    let mut result = path.to_string();
    if let Some(re) = Lazy::force(&HASH_SEGMENT).as_ref() {
        result = re.replace_all(&result, "{hash}").into_owned();
    }
    if let Some(re) = Lazy::force(&NUMERIC_SEGMENT).as_ref() {
        result = re.replace_all(&result, "/{id}$1").into_owned();
    }
    result
}
