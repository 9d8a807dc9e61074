//! In-memory keyed cache shared by the source and metadata layers.
//!
//! Entries carry their own TTL and a size weight. The cache is bounded by a
//! maximum total weight and evicts least-recently-used entries only when an
//! insertion would exceed that bound. Expired entries are treated as misses
//! on read and purged during eviction sweeps.

mod store;

pub use store::{Cache, Weigher};

use serde::Serialize;

/// Point-in-time counters for a cache instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Cache name (used as the metrics label).
    pub name: String,
    /// Entries physically present (may include not-yet-purged expired ones).
    pub entries: usize,
    /// Sum of entry weights currently held.
    pub weight: u64,
    /// Maximum total weight.
    pub capacity: u64,
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    /// Entries removed to make room for a new one.
    pub evictions: u64,
    /// Entries removed because their TTL elapsed.
    pub expirations: u64,
}
