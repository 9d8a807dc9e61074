use std::collections::HashSet;

use super::{
    types::{Config, SourceConfig, KNOWN_PROVIDERS},
    ConfigError,
};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Time budgets, capacities and TTLs are non-zero
/// - Source ids are unique and Jackett entries list at least one indexer
/// - The metadata priority only names known providers, without repeats
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    let search = &config.search;
    for (name, value) in [
        ("search.deadline_ms", search.deadline_ms),
        ("search.source_timeout_ms", search.source_timeout_ms),
        ("search.provider_timeout_ms", search.provider_timeout_ms),
        ("cache.listing_capacity", config.cache.listing_capacity),
        ("cache.listing_ttl_secs", config.cache.listing_ttl_secs),
        ("cache.metadata_capacity", config.cache.metadata_capacity),
        ("cache.metadata_ttl_secs", config.cache.metadata_ttl_secs),
    ] {
        if value == 0 {
            return Err(ConfigError::ValidationError(format!("{} cannot be 0", name)));
        }
    }

    let mut seen = HashSet::new();
    for source in &config.sources {
        if let SourceConfig::Jackett(jackett) = source {
            if jackett.indexers.is_empty() {
                return Err(ConfigError::ValidationError(
                    "jackett source needs at least one indexer".to_string(),
                ));
            }
        }
        for id in source.source_ids() {
            if id.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "source id cannot be empty".to_string(),
                ));
            }
            if !seen.insert(id.clone()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate source id: {}",
                    id
                )));
            }
        }
    }

    let mut priority_seen = HashSet::new();
    for provider in &config.metadata.priority {
        if !KNOWN_PROVIDERS.contains(&provider.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "unknown metadata provider in priority: {}",
                provider
            )));
        }
        if !priority_seen.insert(provider.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "metadata provider listed twice in priority: {}",
                provider
            )));
        }
    }

    Ok(())
}
