//! Torrent sources.
//!
//! A [`SourceClient`] turns a [`Query`] into raw listings from one external
//! index. Sources are registered in a [`SourceRegistry`] under unique ids;
//! the aggregation engine fans out over the selected ones.

mod jackett;
mod leetx;
mod types;
mod yts;

pub use jackett::JackettSource;
pub use leetx::{parse_human_size, LeetxSource};
pub use types::*;
pub use yts::YtsSource;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::SourceConfig;
use crate::registry::{Registry, RegistryError};

/// A searchable torrent index.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Unique, stable id of this source (e.g. "yts", "jackett:rarbg").
    fn id(&self) -> &str;

    /// Search the source for `query`, giving up after `timeout`.
    ///
    /// Individual unparseable listings are dropped and counted in
    /// [`SourceBatch::skipped`]; only whole-request failures are errors.
    async fn search(&self, query: &Query, timeout: Duration) -> Result<SourceBatch, SourceError>;
}

/// Registered sources, in configuration order.
pub type SourceRegistry = Registry<dyn SourceClient>;

impl Registry<dyn SourceClient> {
    /// Register a source under its own id.
    pub fn add(&mut self, source: Arc<dyn SourceClient>) -> Result<(), RegistryError> {
        let id = source.id().to_string();
        self.insert(id, source)
    }

    /// Build every enabled source from configuration, sharing one HTTP client.
    pub fn from_config(
        configs: &[SourceConfig],
        client: reqwest::Client,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for config in configs.iter().filter(|c| c.enabled()) {
            match config {
                SourceConfig::Yts(yts) => {
                    registry.add(Arc::new(YtsSource::new(yts.clone(), client.clone())))?;
                }
                SourceConfig::Jackett(jackett) => {
                    for indexer in &jackett.indexers {
                        registry.add(Arc::new(JackettSource::new(
                            jackett.clone(),
                            indexer,
                            client.clone(),
                        )))?;
                    }
                }
                SourceConfig::Leetx(leetx) => {
                    registry.add(Arc::new(LeetxSource::new(leetx.clone(), client.clone())))?;
                }
            }
        }
        debug!(sources = ?registry.ids(), "Source registry built");
        Ok(registry)
    }
}
