//! Tolerance matching over the reference gallery.
//!
//! A linear scan: every enrolled entry whose Euclidean distance to the probe
//! is at or below the tolerance is reported, in gallery order. Results are
//! NOT sorted by distance — callers see entries in the order the roster
//! listed them.

use crate::types::{Embedding, MatchHit, ReferenceEntry};

/// Maximum Euclidean distance for two embeddings to count as the same person.
pub const DEFAULT_TOLERANCE: f32 = 0.5;

/// Scan `gallery` and return every entry within `tolerance` of `probe`.
///
/// Entries that never enrolled (no embedding) are skipped. The comparison is
/// inclusive (`distance <= tolerance`); the reported distance is rounded to
/// 4 decimal digits after the comparison. Zero hits is a normal outcome.
pub fn matches_within(
    gallery: &[ReferenceEntry],
    probe: &Embedding,
    tolerance: f32,
) -> Vec<MatchHit> {
    let mut hits = Vec::new();
    for entry in gallery {
        let Some(reference) = &entry.embedding else {
            continue;
        };
        let distance = probe.euclidean_distance(reference);
        if distance <= tolerance {
            hits.push(MatchHit {
                roll_no: entry.roll_no.clone(),
                matched_url: entry.url.clone(),
                distance: round4(distance),
            });
        }
    }
    hits
}

fn round4(distance: f32) -> f32 {
    (distance * 10_000.0).round() / 10_000.0
}
