//! Deduplication, grouping and ranking of candidates.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::source::RawListing;

use super::normalize::normalize_title;
use super::types::{Candidate, CandidateGroup};

/// Collapse exact duplicates from a single source.
///
/// Listings with the same info_hash (or the same link, when no hash is
/// known) are merged, keeping the one with the most seeders. Ties keep the
/// smallest display name. First-seen order is preserved otherwise.
pub fn dedup_listings(raw: Vec<RawListing>) -> Vec<RawListing> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut kept: Vec<RawListing> = Vec::with_capacity(raw.len());

    for listing in raw {
        let key = match &listing.info_hash {
            Some(hash) if !hash.is_empty() => format!("hash:{}", hash.to_lowercase()),
            _ => format!("link:{}", listing.link),
        };

        match index.get(&key) {
            Some(&i) => {
                let existing = &kept[i];
                let better = listing.seeders > existing.seeders
                    || (listing.seeders == existing.seeders
                        && listing.display_name < existing.display_name);
                if better {
                    kept[i] = listing;
                }
            }
            None => {
                index.insert(key, kept.len());
                kept.push(listing);
            }
        }
    }

    kept
}

/// Total order on candidates: seeders desc, then source id, link and
/// display name ascending.
pub fn compare_candidates(a: &Candidate, b: &Candidate) -> Ordering {
    b.seeders
        .cmp(&a.seeders)
        .then_with(|| a.source_id.cmp(&b.source_id))
        .then_with(|| a.link.cmp(&b.link))
        .then_with(|| a.display_name.cmp(&b.display_name))
}

fn compare_groups(a: &CandidateGroup, b: &CandidateGroup) -> Ordering {
    b.best_seeders()
        .cmp(&a.best_seeders())
        .then_with(|| b.candidates.len().cmp(&a.candidates.len()))
        .then_with(|| a.canonical_title.cmp(&b.canonical_title))
        .then_with(|| a.year.cmp(&b.year))
}

/// Group candidates by (normalized title, year) and rank groups and their
/// members. The result does not depend on input order.
pub fn group_candidates(candidates: Vec<Candidate>) -> Vec<CandidateGroup> {
    let mut buckets: HashMap<(String, Option<u32>), Vec<Candidate>> = HashMap::new();
    for candidate in candidates {
        let key = (normalize_title(&candidate.canonical_title), candidate.year);
        buckets.entry(key).or_default().push(candidate);
    }

    let mut groups: Vec<CandidateGroup> = buckets
        .into_iter()
        .map(|((normalized, year), mut members)| {
            members.sort_by(compare_candidates);
            // The top-ranked member names the group, falling back to the key
            // when it carries no usable text.
            let canonical_title = members
                .first()
                .map(|c| c.canonical_title.clone())
                .unwrap_or(normalized);
            CandidateGroup {
                canonical_title,
                year,
                candidates: members,
            }
        })
        .collect();

    groups.sort_by(compare_groups);
    groups
}
