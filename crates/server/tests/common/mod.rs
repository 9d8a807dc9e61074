//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with mock sources and providers injected, enabling E2E testing without
//! network access.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;

use reelscout_core::{
    aggregate::listing_cache,
    config::SearchConfig,
    reconcile::metadata_cache,
    testing::{MockProvider, MockSource},
    AggregationEngine, ChannelHandoff, Config, MetadataClient, MetadataReconciler,
    ProviderRegistry, QueryCoordinator, SourceClient, SourceRegistry,
};

/// Re-export fixtures for test convenience
pub use reelscout_core::testing::fixtures;

/// Test fixture for E2E testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_search() {
///     let fixture = TestFixture::new();
///
///     let response = fixture.post("/api/v1/search", json!({ "title": "Alien" })).await;
///
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock sources, in registration order
    pub sources: Vec<Arc<MockSource>>,
    /// Mock providers, in registration order
    pub providers: Vec<Arc<MockProvider>>,
    /// Receiving end of the hand-off queue
    pub handoffs: mpsc::Receiver<String>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// One "yts" source with two Alien films, and a "tmdb" provider.
    pub fn new() -> Self {
        let yts = MockSource::new("yts").with_listings(vec![
            fixtures::listing("yts", "Alien.1979.1080p.BluRay.x264-GROUP", 40),
            fixtures::listing("yts", "Aliens.1986.720p.BluRay.x264", 25),
        ]);
        let tmdb = MockProvider::new("tmdb")
            .with_fragment(fixtures::rated_fragment("Alien", 1979, &[("tmdb", 8.1)]));
        Self::with_mocks(vec![yts], vec![tmdb], SearchConfig::default())
    }

    /// Create a fixture from explicit mocks and search defaults.
    pub fn with_mocks(
        sources: Vec<MockSource>,
        providers: Vec<MockProvider>,
        search: SearchConfig,
    ) -> Self {
        let sources: Vec<Arc<MockSource>> = sources.into_iter().map(Arc::new).collect();
        let providers: Vec<Arc<MockProvider>> = providers.into_iter().map(Arc::new).collect();

        let mut source_registry = SourceRegistry::new();
        for source in &sources {
            source_registry
                .add(Arc::clone(source) as Arc<dyn SourceClient>)
                .expect("Duplicate mock source");
        }
        let mut provider_registry = ProviderRegistry::new();
        for provider in &providers {
            provider_registry
                .add(Arc::clone(provider) as Arc<dyn MetadataClient>)
                .expect("Duplicate mock provider");
        }

        let config = Config {
            search: search.clone(),
            ..Default::default()
        };

        let (handoff, handoffs) = ChannelHandoff::channel(8);
        let coordinator = QueryCoordinator::new(
            source_registry,
            provider_registry,
            AggregationEngine::new(Arc::new(listing_cache(1000)), Duration::from_secs(300)),
            MetadataReconciler::new(
                Arc::new(metadata_cache(100)),
                Duration::from_secs(3600),
                config.metadata.priority.clone(),
            ),
            search,
        )
        .with_handoff(Arc::new(handoff));

        let state = Arc::new(reelscout_server::state::AppState::new(
            config,
            Arc::new(coordinator),
        ));
        let router = reelscout_server::api::create_router(state);

        Self {
            router,
            sources,
            providers,
            handoffs,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Send a GET request and return the raw text body.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}
