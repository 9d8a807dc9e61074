//! Mock torrent source for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::source::{Query, RawListing, SourceBatch, SourceClient, SourceError};

/// Mock implementation of the SourceClient trait.
///
/// Returns the configured listings (or error) for every query and records
/// the queries it was asked.
///
/// # Example
///
/// ```rust,ignore
/// let source = MockSource::new("yts")
///     .with_listings(vec![fixtures::listing("yts", "Alien.1979.1080p.BluRay.x264", 40)])
///     .with_delay(Duration::from_millis(200));
/// registry.add(Arc::new(source));
/// ```
pub struct MockSource {
    id: String,
    listings: Arc<RwLock<Vec<RawListing>>>,
    skipped: Arc<RwLock<usize>>,
    error: Arc<RwLock<Option<SourceError>>>,
    delay: Arc<RwLock<Option<Duration>>>,
    queries: Arc<RwLock<Vec<Query>>>,
    calls: AtomicUsize,
}

impl std::fmt::Debug for MockSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSource")
            .field("id", &self.id)
            .field("calls", &self.calls.load(Ordering::SeqCst))
            .finish()
    }
}

impl MockSource {
    /// Create a mock source that returns no listings.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            listings: Arc::new(RwLock::new(Vec::new())),
            skipped: Arc::new(RwLock::new(0)),
            error: Arc::new(RwLock::new(None)),
            delay: Arc::new(RwLock::new(None)),
            queries: Arc::new(RwLock::new(Vec::new())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_listings(mut self, listings: Vec<RawListing>) -> Self {
        self.listings = Arc::new(RwLock::new(listings));
        self
    }

    /// Report `skipped` unparseable listings alongside the real ones.
    pub fn with_skipped(mut self, skipped: usize) -> Self {
        self.skipped = Arc::new(RwLock::new(skipped));
        self
    }

    /// Fail every search with `error`.
    pub fn with_error(mut self, error: SourceError) -> Self {
        self.error = Arc::new(RwLock::new(Some(error)));
        self
    }

    /// Wait `delay` (on the tokio clock) before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Arc::new(RwLock::new(Some(delay)));
        self
    }

    pub async fn set_listings(&self, listings: Vec<RawListing>) {
        *self.listings.write().await = listings;
    }

    pub async fn set_error(&self, error: Option<SourceError>) {
        *self.error.write().await = error;
    }

    pub async fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write().await = delay;
    }

    /// Get the queries this source was asked, in call order.
    pub async fn recorded_queries(&self) -> Vec<Query> {
        self.queries.read().await.clone()
    }

    /// Number of times `search` was entered.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceClient for MockSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn search(&self, query: &Query, _timeout: Duration) -> Result<SourceBatch, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.write().await.push(query.clone());

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.error.read().await.clone() {
            return Err(err);
        }

        Ok(SourceBatch::new(
            self.listings.read().await.clone(),
            *self.skipped.read().await,
        ))
    }
}
