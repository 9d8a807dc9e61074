//! Mock metadata provider for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::metadata::{MetadataClient, MetadataFragment, ProviderError};

/// A recorded lookup call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedLookup {
    pub title: String,
    pub year: Option<u32>,
}

/// Mock implementation of the MetadataClient trait.
///
/// Answers every lookup with the configured fragment, or fails with the
/// configured error.
pub struct MockProvider {
    id: String,
    fragment: Arc<RwLock<MetadataFragment>>,
    error: Arc<RwLock<Option<ProviderError>>>,
    delay: Arc<RwLock<Option<Duration>>>,
    lookups: Arc<RwLock<Vec<RecordedLookup>>>,
    calls: AtomicUsize,
}

impl std::fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockProvider")
            .field("id", &self.id)
            .field("calls", &self.calls.load(Ordering::SeqCst))
            .finish()
    }
}

impl MockProvider {
    /// Create a mock provider that answers with an empty fragment.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fragment: Arc::new(RwLock::new(MetadataFragment::default())),
            error: Arc::new(RwLock::new(None)),
            delay: Arc::new(RwLock::new(None)),
            lookups: Arc::new(RwLock::new(Vec::new())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_fragment(mut self, fragment: MetadataFragment) -> Self {
        self.fragment = Arc::new(RwLock::new(fragment));
        self
    }

    pub fn with_error(mut self, error: ProviderError) -> Self {
        self.error = Arc::new(RwLock::new(Some(error)));
        self
    }

    /// Wait `delay` (on the tokio clock) before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Arc::new(RwLock::new(Some(delay)));
        self
    }

    pub async fn set_fragment(&self, fragment: MetadataFragment) {
        *self.fragment.write().await = fragment;
    }

    pub async fn set_error(&self, error: Option<ProviderError>) {
        *self.error.write().await = error;
    }

    /// Get recorded lookups.
    pub async fn recorded_lookups(&self) -> Vec<RecordedLookup> {
        self.lookups.read().await.clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataClient for MockProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn lookup(
        &self,
        title: &str,
        year: Option<u32>,
        _timeout: Duration,
    ) -> Result<MetadataFragment, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.lookups.write().await.push(RecordedLookup {
            title: title.to_string(),
            year,
        });

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.error.read().await.clone() {
            return Err(err);
        }

        Ok(self.fragment.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_lookup_records_calls() {
        let provider = MockProvider::new("tmdb").with_fragment(fixtures::fragment("Alien", 1979));

        let fragment = provider
            .lookup("Alien", Some(1979), Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(fragment.title.as_deref(), Some("Alien"));
        assert_eq!(
            provider.recorded_lookups().await,
            vec![RecordedLookup {
                title: "Alien".to_string(),
                year: Some(1979)
            }]
        );
    }

    #[tokio::test]
    async fn test_configured_error() {
        let provider = MockProvider::new("imdb").with_error(ProviderError::NotFound);
        let result = provider.lookup("Alien", None, Duration::from_secs(1)).await;
        assert_eq!(result, Err(ProviderError::NotFound));
        assert_eq!(provider.call_count(), 1);
    }
}
