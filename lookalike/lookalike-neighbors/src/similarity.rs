//! Distance to similarity conversion and self-exclusion.

use lookalike_core::{ItemId, NeighborEntry};
use lookalike_index::IndexHit;

/// Convert a cosine distance to the stored similarity score.
///
/// The distance is truncated (not rounded) to 4 decimal digits, then
/// inverted: `1 - floor(d * 10000) / 10000`. Existing `IBSP` lists were
/// written with exactly this form.
pub fn distance_to_similarity(distance: f32) -> f64 {
    1.0 - (f64::from(distance) * 10_000.0).floor() / 10_000.0
}

/// Turn raw index hits for `item` into its ranked neighbor list.
///
/// Drops the item's own hit. When the approximate search did not return the
/// item itself, nothing is dropped and the list keeps all `k + 1` hits.
pub fn rank_neighbors(item: &ItemId, hits: Vec<IndexHit>) -> Vec<NeighborEntry> {
    hits.into_iter()
        .filter(|hit| &hit.id != item)
        .map(|hit| NeighborEntry {
            id: hit.id,
            similarity: distance_to_similarity(hit.distance),
        })
        .collect()
}
