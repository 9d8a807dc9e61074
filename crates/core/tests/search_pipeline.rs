//! Behavioural tests for the full search pipeline.
//!
//! These drive the engine, reconciler, and coordinator through the mock
//! sources and providers in `reelscout_core::testing`. Tests that involve
//! timeouts run on paused time so they finish instantly.

use std::sync::Arc;
use std::time::Duration;

use reelscout_core::aggregate::listing_cache;
use reelscout_core::config::SearchConfig;
use reelscout_core::reconcile::metadata_cache;
use reelscout_core::testing::{fixtures, MockProvider, MockSource};
use reelscout_core::{
    AggregationEngine, FailureKind, MetadataClient, MetadataReconciler, ProviderError,
    ProviderRegistry, Query, QueryCoordinator, QueryError, SearchOptions, SourceClient,
    SourceError, SourceRegistry,
};

const PRIORITY: [&str; 3] = ["tmdb", "imdb", "metacritic"];

fn engine() -> AggregationEngine {
    AggregationEngine::new(Arc::new(listing_cache(1000)), Duration::from_secs(300))
}

fn reconciler() -> MetadataReconciler {
    MetadataReconciler::new(
        Arc::new(metadata_cache(100)),
        Duration::from_secs(3600),
        PRIORITY.iter().map(|p| p.to_string()).collect(),
    )
}

fn coordinator(sources: &[Arc<MockSource>], providers: &[Arc<MockProvider>]) -> QueryCoordinator {
    let mut source_registry = SourceRegistry::new();
    for source in sources {
        source_registry
            .add(source.clone() as Arc<dyn SourceClient>)
            .unwrap();
    }
    let mut provider_registry = ProviderRegistry::new();
    for provider in providers {
        provider_registry
            .add(provider.clone() as Arc<dyn MetadataClient>)
            .unwrap();
    }
    QueryCoordinator::new(
        source_registry,
        provider_registry,
        engine(),
        reconciler(),
        SearchConfig::default(),
    )
}

fn as_sources(sources: &[Arc<MockSource>]) -> Vec<Arc<dyn SourceClient>> {
    sources
        .iter()
        .map(|s| s.clone() as Arc<dyn SourceClient>)
        .collect()
}

#[tokio::test]
async fn test_gather_only_returns_enabled_sources() {
    let yts = Arc::new(MockSource::new("yts").with_listings(vec![
        fixtures::listing("yts", "Alien.1979.1080p.BluRay.x264", 40),
        // Claims to come from a source that was not selected.
        fixtures::listing("1337x", "Alien.1979.720p.WEB", 90),
    ]));
    let leetx = Arc::new(
        MockSource::new("1337x")
            .with_listings(vec![fixtures::listing("1337x", "Alien.1979.2160p.WEB", 70)]),
    );

    let options = SearchOptions {
        sources: Some(vec!["yts".to_string()]),
        enrich: false,
        ..Default::default()
    };
    let response = coordinator(&[yts.clone(), leetx.clone()], &[])
        .execute(&Query::new("Alien"), &options)
        .await
        .unwrap();

    assert_eq!(leetx.call_count(), 0);
    assert_eq!(response.skipped, 1);
    let source_ids: Vec<&str> = response
        .results
        .iter()
        .flat_map(|r| r.group.candidates.iter())
        .map(|c| c.source_id.as_str())
        .collect();
    assert_eq!(source_ids, vec!["yts"]);
}

#[tokio::test]
async fn test_repeated_query_is_served_from_cache() {
    let yts = Arc::new(
        MockSource::new("yts")
            .with_listings(vec![fixtures::listing("yts", "Alien.1979.1080p.BluRay.x264", 40)]),
    );
    let tmdb = Arc::new(MockProvider::new("tmdb").with_fragment(fixtures::fragment("Alien", 1979)));
    let coordinator = coordinator(&[yts.clone()], &[tmdb.clone()]);

    let first = coordinator
        .execute(&Query::new("Alien").with_year(1979), &SearchOptions::default())
        .await
        .unwrap();
    // Differs only in case and punctuation.
    let second = coordinator
        .execute(&Query::new("ALIEN!").with_year(1979), &SearchOptions::default())
        .await
        .unwrap();

    assert_eq!(yts.call_count(), 1);
    assert_eq!(tmdb.call_count(), 1);
    assert_eq!(
        serde_json::to_string(&first.results).unwrap(),
        serde_json::to_string(&second.results).unwrap()
    );
}

#[tokio::test]
async fn test_higher_priority_fields_are_never_overwritten() {
    let yts = Arc::new(
        MockSource::new("yts")
            .with_listings(vec![fixtures::listing("yts", "Alien.1979.1080p.BluRay.x264", 40)]),
    );
    let mut tmdb_fragment = fixtures::rated_fragment("Alien", 1979, &[("tmdb", 8.1)]);
    tmdb_fragment.summary = Some("In space no one can hear you scream.".to_string());
    let mut imdb_fragment =
        fixtures::rated_fragment("Alien (Director's Cut)", 2003, &[("imdb", 8.5), ("tmdb", 1.0)]);
    imdb_fragment.summary = Some("A different synopsis.".to_string());
    imdb_fragment.imdb_id = Some("tt0078748".to_string());
    let metacritic_fragment = fixtures::rated_fragment("ALIEN", 1979, &[("metacritic", 89.0)]);

    // Registered lowest priority first; order must not matter.
    let providers = vec![
        Arc::new(MockProvider::new("metacritic").with_fragment(metacritic_fragment)),
        Arc::new(MockProvider::new("imdb").with_fragment(imdb_fragment)),
        Arc::new(MockProvider::new("tmdb").with_fragment(tmdb_fragment)),
    ];

    let response = coordinator(&[yts], &providers)
        .execute(&Query::new("Alien"), &SearchOptions::default())
        .await
        .unwrap();

    let record = &response.results[0].metadata;
    assert_eq!(record.canonical_title.as_deref(), Some("Alien"));
    assert_eq!(record.year, Some(1979));
    assert_eq!(
        record.summary.as_deref(),
        Some("In space no one can hear you scream.")
    );
    assert_eq!(record.ratings.get("tmdb"), Some(&8.1));
    assert_eq!(record.ratings.get("imdb"), Some(&8.5));
    assert_eq!(record.ratings.get("metacritic"), Some(&89.0));
    assert_eq!(record.imdb_id.as_deref(), Some("tt0078748"));
    assert_eq!(record.providers, vec!["tmdb", "imdb", "metacritic"]);
}

#[tokio::test]
async fn test_cached_enrich_is_byte_identical() {
    let tmdb: Arc<dyn MetadataClient> = Arc::new(
        MockProvider::new("tmdb")
            .with_fragment(fixtures::rated_fragment("Alien", 1979, &[("tmdb", 8.1)])),
    );
    let imdb: Arc<dyn MetadataClient> = Arc::new(
        MockProvider::new("imdb")
            .with_fragment(fixtures::rated_fragment("Alien", 1979, &[("imdb", 8.5)])),
    );
    let providers = vec![imdb, tmdb];
    let reconciler = reconciler();

    let first = reconciler
        .enrich("Alien", Some(1979), &providers, Duration::from_secs(5))
        .await
        .unwrap();
    let second = reconciler
        .enrich("Alien", Some(1979), &providers, Duration::from_secs(5))
        .await
        .unwrap();

    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert_eq!(
        serde_json::to_vec(&first.record).unwrap(),
        serde_json::to_vec(&second.record).unwrap()
    );
}

#[tokio::test]
async fn test_equal_seeders_rank_by_source_id() {
    let sources: Vec<Arc<MockSource>> = [("b", 10), ("a", 10), ("c", 5)]
        .into_iter()
        .map(|(id, seeders)| {
            Arc::new(
                MockSource::new(id)
                    .with_listings(vec![fixtures::listing(id, "Alien.1979.1080p.BluRay.x264", seeders)]),
            )
        })
        .collect();

    let outcome = engine()
        .gather(&Query::new("Alien"), &as_sources(&sources), Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(outcome.groups.len(), 1);
    let order: Vec<&str> = outcome.groups[0]
        .candidates
        .iter()
        .map(|c| c.source_id.as_str())
        .collect();
    assert_eq!(order, vec!["a", "b", "c"]);
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_sources_become_soft_failures() {
    let listings = [
        "Alien.1979.1080p.BluRay.x264",
        "Aliens.1986.1080p.BluRay.x264",
        "Alien.3.1992.1080p.BluRay.x264",
        "Alien.Resurrection.1997.1080p.BluRay.x264",
        "Prometheus.2012.1080p.BluRay.x264",
    ]
    .into_iter()
    .enumerate()
    .map(|(i, name)| fixtures::listing("yts", name, 10 + i as u32))
    .collect();

    let sources = vec![
        Arc::new(MockSource::new("yts").with_listings(listings)),
        Arc::new(MockSource::new("1337x").with_delay(Duration::from_secs(60))),
        Arc::new(MockSource::new("jackett:rarbg").with_delay(Duration::from_secs(60))),
    ];
    let options = SearchOptions {
        source_timeout_ms: Some(1000),
        enrich: false,
        ..Default::default()
    };

    let response = coordinator(&sources, &[])
        .execute(&Query::new("Alien"), &options)
        .await
        .unwrap();

    let candidates: usize = response
        .results
        .iter()
        .map(|r| r.group.candidates.len())
        .sum();
    assert_eq!(candidates, 5);

    assert_eq!(response.failures.len(), 2);
    let failed: Vec<&str> = response.failures.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(failed, vec!["1337x", "jackett:rarbg"]);
    assert!(response
        .failures
        .iter()
        .all(|f| f.kind == FailureKind::Source && f.error == "timeout"));
    assert!(!response.deadline_exceeded);
}

#[tokio::test]
async fn test_all_sources_failing_is_an_error() {
    let sources = vec![
        Arc::new(MockSource::new("yts").with_error(SourceError::Unavailable("HTTP 503".into()))),
        Arc::new(MockSource::new("1337x").with_error(SourceError::Timeout)),
    ];

    let err = coordinator(&sources, &[])
        .execute(&Query::new("Alien"), &SearchOptions::default())
        .await
        .unwrap_err();

    match err {
        QueryError::AllSourcesFailed { failures } => {
            let ids: Vec<&str> = failures.iter().map(|f| f.id.as_str()).collect();
            assert_eq!(ids, vec!["1337x", "yts"]);
        }
        other => panic!("expected AllSourcesFailed, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_deadline_during_enrich_keeps_listings() {
    let sources = vec![Arc::new(MockSource::new("yts").with_listings(vec![
        fixtures::listing("yts", "Alien.1979.1080p.BluRay.x264", 40),
        fixtures::listing("yts", "Aliens.1986.720p.BluRay.x264", 25),
    ]))];
    let providers = vec![
        Arc::new(
            MockProvider::new("tmdb")
                .with_fragment(fixtures::fragment("Alien", 1979))
                .with_delay(Duration::from_secs(30)),
        ),
        Arc::new(
            MockProvider::new("imdb")
                .with_error(ProviderError::Unavailable("HTTP 502".into()))
                .with_delay(Duration::from_secs(30)),
        ),
    ];
    let options = SearchOptions {
        deadline_ms: Some(1000),
        provider_timeout_ms: Some(60_000),
        ..Default::default()
    };

    let response = coordinator(&sources, &providers)
        .execute(&Query::new("Alien"), &options)
        .await
        .unwrap();

    assert!(response.deadline_exceeded);
    assert_eq!(response.results.len(), 2);
    for result in &response.results {
        assert!(result.metadata.providers.is_empty());
        assert!(result.metadata.canonical_title.is_none());
        assert!(result.metadata.ratings.is_empty());
    }
    // Both providers were still running, so both are reported as timed out.
    let failed: Vec<&str> = response.failures.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(failed, vec!["imdb", "tmdb"]);
    assert!(response
        .failures
        .iter()
        .all(|f| f.kind == FailureKind::Provider && f.error == "timeout"));
}

#[tokio::test(start_paused = true)]
async fn test_deadline_during_enrich_keeps_finished_providers() {
    let sources = vec![Arc::new(
        MockSource::new("yts")
            .with_listings(vec![fixtures::listing("yts", "Alien.1979.1080p.BluRay.x264", 40)]),
    )];
    let providers = vec![
        Arc::new(
            MockProvider::new("tmdb")
                .with_fragment(fixtures::rated_fragment("Alien", 1979, &[("tmdb", 8.1)])),
        ),
        Arc::new(
            MockProvider::new("imdb")
                .with_fragment(fixtures::rated_fragment("Alien", 1979, &[("imdb", 8.5)]))
                .with_delay(Duration::from_secs(60)),
        ),
    ];
    let options = SearchOptions {
        deadline_ms: Some(2000),
        provider_timeout_ms: Some(60_000),
        ..Default::default()
    };

    let response = coordinator(&sources, &providers)
        .execute(&Query::new("Alien"), &options)
        .await
        .unwrap();

    assert!(response.deadline_exceeded);
    assert_eq!(response.results.len(), 1);
    let record = &response.results[0].metadata;
    assert_eq!(record.providers, vec!["tmdb"]);
    assert_eq!(record.ratings.get("tmdb"), Some(&8.1));
    assert!(record.ratings.get("imdb").is_none());
    assert_eq!(response.failures.len(), 1);
    assert_eq!(response.failures[0].id, "imdb");
    assert_eq!(response.failures[0].error, "timeout");
}

#[tokio::test(start_paused = true)]
async fn test_deadline_during_gather_without_enrich() {
    let sources = vec![
        Arc::new(
            MockSource::new("a")
                .with_listings(vec![fixtures::listing("a", "Alien.1979.1080p.BluRay.x264", 40)]),
        ),
        Arc::new(MockSource::new("b").with_delay(Duration::from_secs(60))),
    ];
    let options = SearchOptions {
        deadline_ms: Some(1000),
        enrich: false,
        ..Default::default()
    };

    let response = coordinator(&sources, &[])
        .execute(&Query::new("Alien"), &options)
        .await
        .unwrap();

    assert!(response.deadline_exceeded);
    assert_eq!(response.results.len(), 1);
    assert_eq!(response.failures.len(), 1);
    assert_eq!(response.failures[0].id, "b");
    assert_eq!(response.failures[0].error, "timeout");
}
