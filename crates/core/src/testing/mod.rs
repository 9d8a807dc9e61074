//! Testing utilities and mock implementations for E2E tests.
//!
//! This module provides mock implementations of the source and provider
//! traits, allowing the whole search pipeline to be exercised without
//! network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use reelscout_core::testing::{fixtures, MockProvider, MockSource};
//!
//! let source = MockSource::new("yts")
//!     .with_listings(vec![fixtures::listing("yts", "Alien.1979.1080p.BluRay.x264", 40)]);
//! let tmdb = MockProvider::new("tmdb").with_fragment(fixtures::fragment("Alien", 1979));
//!
//! // Register them and build a QueryCoordinator...
//! ```

mod mock_provider;
mod mock_source;

pub use mock_provider::{MockProvider, RecordedLookup};
pub use mock_source::MockSource;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::collections::BTreeMap;

    use crate::aggregate::normalize_title;
    use crate::metadata::MetadataFragment;
    use crate::source::RawListing;

    /// Create a raw listing with a magnet link derived from the source and name.
    pub fn listing(source_id: &str, display_name: &str, seeders: u32) -> RawListing {
        let hash = format!(
            "{}-{}",
            source_id,
            normalize_title(display_name).replace(' ', "-")
        );
        RawListing {
            source_id: source_id.to_string(),
            link: format!("magnet:?xt=urn:btih:{}", hash),
            display_name: display_name.to_string(),
            size_bytes: 1024 * 1024 * 1500, // 1.5 GB
            seeders,
            leechers: seeders / 4,
            uploaded_at: None,
            quality_tag: None,
            info_hash: None,
        }
    }

    /// Create a raw listing with an explicit info hash.
    pub fn hashed_listing(source_id: &str, display_name: &str, seeders: u32, hash: &str) -> RawListing {
        RawListing {
            link: format!("magnet:?xt=urn:btih:{}", hash),
            info_hash: Some(hash.to_string()),
            ..listing(source_id, display_name, seeders)
        }
    }

    /// Create a fragment with a title, year, and nothing else.
    pub fn fragment(title: &str, year: u32) -> MetadataFragment {
        MetadataFragment {
            title: Some(title.to_string()),
            year: Some(year),
            ..Default::default()
        }
    }

    /// Create a fragment carrying the given ratings.
    pub fn rated_fragment(title: &str, year: u32, ratings: &[(&str, f64)]) -> MetadataFragment {
        MetadataFragment {
            ratings: ratings
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect::<BTreeMap<_, _>>(),
            ..fragment(title, year)
        }
    }
}
