//! Staleness tracking for the consolidated view.
//!
//! The collection is fingerprinted at consolidation time; any later change
//! to the set of collected items makes the cached view stale. The signature
//! covers the `(id, origin node, text)` triples sorted by id, so drag
//! reordering alone never invalidates a consolidation.

use sha2::{Digest, Sha256};

use crate::models::CollectionItem;

/// Deterministic content fingerprint of the collection.
pub fn compute_signature(items: &[CollectionItem]) -> String {
    let mut triples: Vec<(&str, u64, &str)> = items
        .iter()
        .map(|item| (item.id.as_str(), item.origin_node_id, item.text.as_str()))
        .collect();
    triples.sort();

    let mut hasher = Sha256::new();
    for (id, origin, text) in triples {
        hasher.update(id.as_bytes());
        hasher.update([0]);
        hasher.update(origin.to_le_bytes());
        hasher.update([0]);
        hasher.update(text.as_bytes());
        hasher.update([0xff]);
    }
    hex::encode(hasher.finalize())
}

/// Decide whether a cached consolidation is stale relative to the current
/// collection.
///
/// A missing saved signature with a non-empty cached text and a non-empty
/// collection is treated as stale: provenance is unknown, so recompute.
pub fn is_stale(saved_signature: &str, cached_text: &str, items: &[CollectionItem]) -> bool {
    if saved_signature.is_empty() {
        return !cached_text.trim().is_empty() && !items.is_empty();
    }
    saved_signature != compute_signature(items)
}
