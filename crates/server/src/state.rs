use std::sync::Arc;

use reelscout_core::{Config, QueryCoordinator, SanitizedConfig};
use sha2::{Digest, Sha256};

/// Shared application state
pub struct AppState {
    config: Config,
    coordinator: Arc<QueryCoordinator>,
    config_hash: String,
}

impl AppState {
    pub fn new(config: Config, coordinator: Arc<QueryCoordinator>) -> Self {
        let config_json = serde_json::to_string(&SanitizedConfig::from(&config)).unwrap_or_default();
        let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
        Self {
            config,
            coordinator,
            config_hash: config_hash[..16].to_string(),
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn coordinator(&self) -> &QueryCoordinator {
        self.coordinator.as_ref()
    }

    /// Short fingerprint of the sanitized configuration.
    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(config: Config) -> AppState {
        let coordinator = QueryCoordinator::from_config(&config, reqwest::Client::new()).unwrap();
        AppState::new(config, Arc::new(coordinator))
    }

    #[test]
    fn test_config_hash_is_stable() {
        let a = state(Config::default());
        let b = state(Config::default());
        assert_eq!(a.config_hash().len(), 16);
        assert_eq!(a.config_hash(), b.config_hash());

        let mut changed = Config::default();
        changed.search.deadline_ms = 1_000;
        assert_ne!(state(changed).config_hash(), a.config_hash());
    }
}
