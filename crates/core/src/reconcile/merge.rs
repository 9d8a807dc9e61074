//! Priority merge of provider fragments into one record.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::metadata::MetadataFragment;

/// Merged metadata for one title.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetadataRecord {
    /// Slug of the lookup title and year. Never changes with merges.
    pub title_id: String,
    #[serde(default)]
    pub canonical_title: Option<String>,
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(default)]
    pub genres: BTreeSet<String>,
    #[serde(default)]
    pub cast: Vec<String>,
    #[serde(default)]
    pub ratings: BTreeMap<String, f64>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub poster_url: Option<String>,
    #[serde(default)]
    pub imdb_id: Option<String>,
    /// Providers that contributed, highest priority first.
    #[serde(default)]
    pub providers: Vec<String>,
}

impl MetadataRecord {
    /// A record with nothing but its id.
    pub fn empty(title_id: impl Into<String>) -> Self {
        Self {
            title_id: title_id.into(),
            canonical_title: None,
            year: None,
            genres: BTreeSet::new(),
            cast: Vec::new(),
            ratings: BTreeMap::new(),
            summary: None,
            poster_url: None,
            imdb_id: None,
            providers: Vec::new(),
        }
    }
}

/// Merge fragments given highest priority first.
///
/// Each field takes the first non-empty value; ratings merge per rating
/// source, so a lower-priority provider only fills sources nobody above it
/// reported.
pub fn merge_fragments<'a>(
    title_id: &str,
    fragments: impl IntoIterator<Item = (&'a str, &'a MetadataFragment)>,
) -> MetadataRecord {
    let mut record = MetadataRecord::empty(title_id);

    for (provider, fragment) in fragments {
        if fragment.is_empty() {
            continue;
        }
        record.providers.push(provider.to_string());

        fill(&mut record.canonical_title, &fragment.title);
        fill(&mut record.year, &fragment.year);
        fill(&mut record.summary, &fragment.summary);
        fill(&mut record.poster_url, &fragment.poster_url);
        fill(&mut record.imdb_id, &fragment.imdb_id);

        if record.genres.is_empty() {
            record.genres = fragment.genres.iter().cloned().collect();
        }
        if record.cast.is_empty() {
            record.cast = fragment.cast.clone();
        }
        for (source, score) in &fragment.ratings {
            record.ratings.entry(source.clone()).or_insert(*score);
        }
    }

    record
}

fn fill<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if slot.is_none() {
        slot.clone_from(value);
    }
}
