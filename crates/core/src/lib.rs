pub mod aggregate;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod diagnostics;
pub mod metadata;
pub mod metrics;
pub mod reconcile;
pub mod registry;
pub mod source;
pub mod testing;

pub use aggregate::{
    AggregationEngine, Candidate, CandidateGroup, Codec, GatherError, GatherOutcome, ListingCache,
    QualityTier,
};
pub use cache::{Cache, CacheStats};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use coordinator::{
    ChannelHandoff, DownloadHandoff, EnrichedResult, HandoffError, QueryCoordinator, QueryError,
    SearchOptions, SearchResponse,
};
pub use diagnostics::{FailureKind, SoftFailure};
pub use metadata::{MetadataClient, MetadataFragment, ProviderError, ProviderRegistry};
pub use reconcile::{EnrichError, EnrichOutcome, MetadataCache, MetadataReconciler, MetadataRecord};
pub use registry::{Registry, RegistryError};
pub use source::{MediaKind, Query, RawListing, SourceBatch, SourceClient, SourceError, SourceRegistry};
