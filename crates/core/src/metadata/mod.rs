//! Metadata providers.
//!
//! A [`MetadataClient`] looks a title up in one external catalog and
//! returns whatever partial [`MetadataFragment`] it can. Clients never retry;
//! the reconciler decides what to do with failures.

mod metacritic;
mod omdb;
mod rate_limiter;
mod rotten_tomatoes;
mod tmdb;
mod types;

pub use metacritic::{metacritic_slug, MetacriticProvider};
pub use omdb::OmdbProvider;
pub use rate_limiter::{RateLimiter, TokenBucket};
pub use rotten_tomatoes::{rotten_tomatoes_slug, RottenTomatoesProvider};
pub use tmdb::TmdbProvider;
pub use types::*;

use async_trait::async_trait;
use reqwest::{header::RETRY_AFTER, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::MetadataConfig;
use crate::registry::{Registry, RegistryError};

/// A metadata catalog.
#[async_trait]
pub trait MetadataClient: Send + Sync {
    /// Unique, stable id of this provider ("tmdb", "imdb", "metacritic",
    /// "rotten_tomatoes").
    fn id(&self) -> &str;

    /// Look up `title` (optionally narrowed by `year`), giving up after
    /// `timeout`.
    async fn lookup(
        &self,
        title: &str,
        year: Option<u32>,
        timeout: Duration,
    ) -> Result<MetadataFragment, ProviderError>;
}

/// Map non-success HTTP statuses to provider errors.
///
/// 429 becomes [`ProviderError::RateLimited`] carrying `Retry-After` (in
/// seconds) when the provider sent one.
pub(crate) fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(ProviderError::RateLimited { retry_after });
    }
    if status == StatusCode::NOT_FOUND {
        return Err(ProviderError::NotFound);
    }
    if !status.is_success() {
        return Err(ProviderError::Unavailable(format!("HTTP {}", status)));
    }
    Ok(response)
}

/// Run a lookup under a hard timeout.
pub(crate) async fn with_timeout<F>(timeout: Duration, lookup: F) -> Result<MetadataFragment, ProviderError>
where
    F: std::future::Future<Output = Result<MetadataFragment, ProviderError>>,
{
    tokio::time::timeout(timeout, lookup)
        .await
        .map_err(|_| ProviderError::Timeout)?
}

/// Registered providers.
pub type ProviderRegistry = Registry<dyn MetadataClient>;

impl Registry<dyn MetadataClient> {
    /// Register a provider under its own id.
    pub fn add(&mut self, provider: Arc<dyn MetadataClient>) -> Result<(), RegistryError> {
        let id = provider.id().to_string();
        self.insert(id, provider)
    }

    /// Build the configured providers. A provider without an API key is
    /// skipped rather than failing startup.
    pub fn from_config(config: &MetadataConfig, client: reqwest::Client) -> Result<Self, RegistryError> {
        let mut registry = Self::new();

        if let Some(tmdb) = &config.tmdb {
            match api_key(&tmdb.api_key) {
                Some(key) => registry.add(Arc::new(TmdbProvider::new(key, tmdb, client.clone())))?,
                None => info!(provider = "tmdb", "No API key configured, provider disabled"),
            }
        }

        if let Some(omdb) = &config.omdb {
            match api_key(&omdb.api_key) {
                Some(key) => registry.add(Arc::new(OmdbProvider::new(key, omdb, client.clone())))?,
                None => info!(provider = "imdb", "No API key configured, provider disabled"),
            }
        }

        if let Some(metacritic) = config.metacritic.as_ref().filter(|m| m.enabled) {
            registry.add(Arc::new(MetacriticProvider::new(metacritic, client.clone())))?;
        }

        if let Some(rotten_tomatoes) = config.rotten_tomatoes.as_ref().filter(|r| r.enabled) {
            registry.add(Arc::new(RottenTomatoesProvider::new(rotten_tomatoes, client)))?;
        }

        debug!(providers = ?registry.ids(), "Provider registry built");
        Ok(registry)
    }
}

fn api_key(key: &Option<String>) -> Option<String> {
    key.as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
}
