use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Provider ids known to the metadata layer.
pub const KNOWN_PROVIDERS: [&str; 4] = ["tmdb", "imdb", "metacritic", "rotten_tomatoes"];

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    /// Torrent sources, in registration order.
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub metadata: MetadataConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Default time budgets for a search.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Overall deadline for one query, across both phases (default: 15000).
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
    /// Timeout for a single source search (default: 8000).
    #[serde(default = "default_source_timeout_ms")]
    pub source_timeout_ms: u64,
    /// Timeout for a single provider lookup (default: 5000).
    #[serde(default = "default_provider_timeout_ms")]
    pub provider_timeout_ms: u64,
    /// Maximum number of title groups returned (default: unlimited).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_groups: Option<usize>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            deadline_ms: default_deadline_ms(),
            source_timeout_ms: default_source_timeout_ms(),
            provider_timeout_ms: default_provider_timeout_ms(),
            max_groups: None,
        }
    }
}

fn default_deadline_ms() -> u64 {
    15_000
}

fn default_source_timeout_ms() -> u64 {
    8_000
}

fn default_provider_timeout_ms() -> u64 {
    5_000
}

/// Cache sizing and lifetimes.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Max total weight of cached source listings, in listings (default: 5000).
    #[serde(default = "default_listing_capacity")]
    pub listing_capacity: u64,
    /// Listing TTL in seconds (default: 300). Listings are time-sensitive.
    #[serde(default = "default_listing_ttl_secs")]
    pub listing_ttl_secs: u64,
    /// Max number of cached metadata records (default: 2048).
    #[serde(default = "default_metadata_capacity")]
    pub metadata_capacity: u64,
    /// Metadata TTL in seconds (default: 86400).
    #[serde(default = "default_metadata_ttl_secs")]
    pub metadata_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            listing_capacity: default_listing_capacity(),
            listing_ttl_secs: default_listing_ttl_secs(),
            metadata_capacity: default_metadata_capacity(),
            metadata_ttl_secs: default_metadata_ttl_secs(),
        }
    }
}

fn default_listing_capacity() -> u64 {
    5_000
}

fn default_listing_ttl_secs() -> u64 {
    300
}

fn default_metadata_capacity() -> u64 {
    2_048
}

fn default_metadata_ttl_secs() -> u64 {
    86_400
}

/// A torrent source entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    Yts(YtsConfig),
    Jackett(JackettConfig),
    Leetx(LeetxConfig),
}

impl SourceConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            SourceConfig::Yts(_) => "yts",
            SourceConfig::Jackett(_) => "jackett",
            SourceConfig::Leetx(_) => "leetx",
        }
    }

    pub fn enabled(&self) -> bool {
        match self {
            SourceConfig::Yts(c) => c.enabled,
            SourceConfig::Jackett(c) => c.enabled,
            SourceConfig::Leetx(c) => c.enabled,
        }
    }

    /// Source ids this entry registers. Jackett registers one per indexer.
    pub fn source_ids(&self) -> Vec<String> {
        match self {
            SourceConfig::Yts(c) => vec![c.id.clone()],
            SourceConfig::Jackett(c) => c.indexers.iter().map(|i| c.source_id(i)).collect(),
            SourceConfig::Leetx(c) => vec![c.id.clone()],
        }
    }
}

/// YTS movie API source.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct YtsConfig {
    #[serde(default = "default_yts_id")]
    pub id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// API base URL (default: "https://yts.mx")
    #[serde(default = "default_yts_url")]
    pub base_url: String,
    /// Max movies requested per search (default: 50)
    #[serde(default = "default_yts_limit")]
    pub limit: u32,
}

impl Default for YtsConfig {
    fn default() -> Self {
        Self {
            id: default_yts_id(),
            enabled: true,
            base_url: default_yts_url(),
            limit: default_yts_limit(),
        }
    }
}

fn default_yts_id() -> String {
    "yts".to_string()
}

fn default_yts_url() -> String {
    "https://yts.mx".to_string()
}

fn default_yts_limit() -> u32 {
    50
}

/// Jackett backend; each indexer becomes its own source.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JackettConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Jackett server URL (e.g., "http://localhost:9117")
    pub url: String,
    /// Jackett API key
    pub api_key: String,
    /// Indexer ids to query (e.g. ["1337x", "rarbg"])
    pub indexers: Vec<String>,
}

impl JackettConfig {
    pub fn source_id(&self, indexer: &str) -> String {
        format!("jackett:{}", indexer)
    }
}

/// 1337x HTML listing source.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LeetxConfig {
    #[serde(default = "default_leetx_id")]
    pub id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Site base URL (default: "https://1337x.to")
    #[serde(default = "default_leetx_url")]
    pub base_url: String,
    /// Max result rows resolved per search (default: 20)
    #[serde(default = "default_leetx_max_results")]
    pub max_results: usize,
    /// Detail pages fetched concurrently (default: 4)
    #[serde(default = "default_leetx_detail_concurrency")]
    pub detail_concurrency: usize,
}

impl Default for LeetxConfig {
    fn default() -> Self {
        Self {
            id: default_leetx_id(),
            enabled: true,
            base_url: default_leetx_url(),
            max_results: default_leetx_max_results(),
            detail_concurrency: default_leetx_detail_concurrency(),
        }
    }
}

fn default_leetx_id() -> String {
    "1337x".to_string()
}

fn default_leetx_url() -> String {
    "https://1337x.to".to_string()
}

fn default_leetx_max_results() -> usize {
    20
}

fn default_leetx_detail_concurrency() -> usize {
    4
}

fn default_true() -> bool {
    true
}

/// Metadata providers and their merge priority.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetadataConfig {
    /// Provider ids, highest priority first
    /// (default: tmdb, imdb, metacritic, rotten_tomatoes).
    #[serde(default = "default_priority")]
    pub priority: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmdb: Option<TmdbConfig>,
    /// OMDb API, registered as the "imdb" provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub omdb: Option<OmdbConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metacritic: Option<MetacriticConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotten_tomatoes: Option<RottenTomatoesConfig>,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            priority: default_priority(),
            tmdb: None,
            omdb: None,
            metacritic: None,
            rotten_tomatoes: None,
        }
    }
}

fn default_priority() -> Vec<String> {
    KNOWN_PROVIDERS.iter().map(|p| p.to_string()).collect()
}

/// TMDB API configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TmdbConfig {
    /// TMDB API key. Missing or empty disables the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Base URL (default: https://api.themoviedb.org/3).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Image base URL for posters (default: https://image.tmdb.org/t/p).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_base_url: Option<String>,
    /// Client-side request budget (default: 600 per minute).
    #[serde(default = "default_tmdb_rpm")]
    pub rate_limit_rpm: u32,
}

fn default_tmdb_rpm() -> u32 {
    600
}

/// OMDb API configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OmdbConfig {
    /// OMDb API key. Missing or empty disables the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Base URL (default: https://www.omdbapi.com).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Client-side request budget (default: 60 per minute).
    #[serde(default = "default_omdb_rpm")]
    pub rate_limit_rpm: u32,
}

fn default_omdb_rpm() -> u32 {
    60
}

/// Metacritic page scraper configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetacriticConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Site base URL (default: https://www.metacritic.com).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Client-side request budget (default: 30 per minute).
    #[serde(default = "default_metacritic_rpm")]
    pub rate_limit_rpm: u32,
}

impl Default for MetacriticConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: None,
            rate_limit_rpm: default_metacritic_rpm(),
        }
    }
}

fn default_metacritic_rpm() -> u32 {
    30
}

/// Rotten Tomatoes page scraper configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RottenTomatoesConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Site base URL (default: https://www.rottentomatoes.com).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_rotten_tomatoes_rpm")]
    pub rate_limit_rpm: u32,
}

impl Default for RottenTomatoesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: None,
            rate_limit_rpm: default_rotten_tomatoes_rpm(),
        }
    }
}

fn default_rotten_tomatoes_rpm() -> u32 {
    30
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub search: SearchConfig,
    pub cache: CacheConfig,
    pub sources: Vec<SanitizedSourceConfig>,
    pub metadata: SanitizedMetadataConfig,
}

/// Sanitized source entry (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedSourceConfig {
    pub kind: String,
    pub ids: Vec<String>,
    pub enabled: bool,
    pub url: String,
    pub api_key_configured: bool,
}

/// Sanitized metadata config (API keys hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedMetadataConfig {
    pub priority: Vec<String>,
    pub tmdb_configured: bool,
    pub omdb_configured: bool,
    pub metacritic_enabled: bool,
    pub rotten_tomatoes_enabled: bool,
}

fn key_present(key: &Option<String>) -> bool {
    key.as_deref().map(|k| !k.trim().is_empty()).unwrap_or(false)
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            search: config.search.clone(),
            cache: config.cache.clone(),
            sources: config
                .sources
                .iter()
                .map(|s| {
                    let (url, api_key_configured) = match s {
                        SourceConfig::Yts(c) => (c.base_url.clone(), false),
                        SourceConfig::Jackett(c) => (c.url.clone(), !c.api_key.is_empty()),
                        SourceConfig::Leetx(c) => (c.base_url.clone(), false),
                    };
                    SanitizedSourceConfig {
                        kind: s.kind().to_string(),
                        ids: s.source_ids(),
                        enabled: s.enabled(),
                        url,
                        api_key_configured,
                    }
                })
                .collect(),
            metadata: SanitizedMetadataConfig {
                priority: config.metadata.priority.clone(),
                tmdb_configured: config
                    .metadata
                    .tmdb
                    .as_ref()
                    .map(|t| key_present(&t.api_key))
                    .unwrap_or(false),
                omdb_configured: config
                    .metadata
                    .omdb
                    .as_ref()
                    .map(|o| key_present(&o.api_key))
                    .unwrap_or(false),
                metacritic_enabled: config
                    .metadata
                    .metacritic
                    .as_ref()
                    .map(|m| m.enabled)
                    .unwrap_or(false),
                rotten_tomatoes_enabled: config
                    .metadata
                    .rotten_tomatoes
                    .as_ref()
                    .map(|r| r.enabled)
                    .unwrap_or(false),
            },
        }
    }
}
