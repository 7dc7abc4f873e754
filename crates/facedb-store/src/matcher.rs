//! Nearest-record matching with per-record acceptance thresholds.

use crate::error::StoreError;
use crate::record::{Record, UNKNOWN_LABEL};
use crate::store::RecordStore;
use facedb_core::Embedding;

/// Number of candidates fetched per probe.
pub const DEFAULT_TOP_K: usize = 1;

/// Result of matching a probe embedding against the store.
#[derive(Debug, Clone)]
pub enum MatchResult {
    /// The closest record accepted the probe.
    Matched {
        record: Record,
        /// Cosine similarity to the record's average, 1 - distance.
        similarity: f32,
    },
    /// Nothing accepted the probe, or the store is empty. The caller should
    /// create a new record.
    Unmatched {
        /// Fresh id the caller may use to track this face until a record
        /// is created for it.
        provisional_id: String,
    },
}

impl MatchResult {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Matched { .. })
    }

    /// Similarity of the accepted match, 0 when unmatched.
    pub fn similarity(&self) -> f32 {
        match self {
            Self::Matched { similarity, .. } => *similarity,
            Self::Unmatched { .. } => 0.0,
        }
    }

    pub fn global_id(&self) -> &str {
        match self {
            Self::Matched { record, .. } => &record.global_id,
            Self::Unmatched { provisional_id } => provisional_id,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Matched { record, .. } => &record.label,
            Self::Unmatched { .. } => UNKNOWN_LABEL,
        }
    }
}

/// Whether a candidate at cosine `distance` passes `threshold`.
///
/// A distance above 1.0 (negative similarity, or a malformed vector) never
/// passes, whatever the threshold.
pub fn accepts(distance: f32, threshold: f32) -> bool {
    distance <= 1.0 && (1.0 - distance) > threshold
}

impl RecordStore {
    /// Match `probe` against the `top_k` nearest records; only the closest
    /// one is tested against its own acceptance threshold.
    pub fn find_match(&self, probe: &Embedding, top_k: usize) -> Result<MatchResult, StoreError> {
        self.check_embedding(probe)?;
        let neighbors = self.repo().find_nearest(probe, top_k.max(1))?;

        if let Some(best) = neighbors.into_iter().next() {
            let similarity = 1.0 - best.distance;
            if accepts(best.distance, best.record.acceptance_threshold) {
                tracing::trace!(
                    global_id = %best.record.global_id,
                    similarity,
                    "probe matched"
                );
                return Ok(MatchResult::Matched {
                    record: best.record,
                    similarity,
                });
            }
            tracing::trace!(
                global_id = %best.record.global_id,
                similarity,
                threshold = best.record.acceptance_threshold,
                "closest record rejected probe"
            );
        }

        Ok(MatchResult::Unmatched {
            provisional_id: uuid::Uuid::new_v4().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::{emb, test_config, DIM};
    use facedb_core::Observation;

    #[test]
    fn test_accepts() {
        assert!(accepts(0.0, 0.3));
        assert!(accepts(0.69, 0.3));
        assert!(!accepts(0.8, 0.3));
        assert!(!accepts(1.1, -0.5));
        assert!(!accepts(f32::NAN, 0.0));
    }

    #[test]
    fn test_empty_store_is_unmatched() {
        let dir = tempfile::tempdir().unwrap();
        let store = crate::RecordStore::in_memory(test_config(dir.path()));
        let result = store.find_match(&emb([1.0, 0.0, 0.0, 0.0]), DEFAULT_TOP_K).unwrap();
        assert!(!result.is_match());
        assert_eq!(result.similarity(), 0.0);
        assert_eq!(result.label(), UNKNOWN_LABEL);
        assert!(!result.global_id().is_empty());
    }

    #[test]
    fn test_create_then_match_identical() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            crate::RecordStore::open(&dir.path().join("db/faces.db"), test_config(dir.path())).unwrap();
        let e1 = emb([0.2, 0.4, 0.1, 0.9]);

        assert!(!store.find_match(&e1, DEFAULT_TOP_K).unwrap().is_match());
        let r1 = store
            .create_record(Observation::new(e1.clone(), "img1", 1000), UNKNOWN_LABEL)
            .unwrap();

        match store.find_match(&e1, DEFAULT_TOP_K).unwrap() {
            MatchResult::Matched { record, similarity } => {
                assert_eq!(record.global_id, r1.global_id);
                assert!((similarity - 1.0).abs() < 1e-6, "similarity = {similarity}");
            }
            other => panic!("expected match, got {other:?}"),
        }
    }

    #[test]
    fn test_similar_probe_accepted_then_averaged() {
        let dir = tempfile::tempdir().unwrap();
        let store = crate::RecordStore::in_memory(test_config(dir.path()));
        let e1 = emb([1.0, 0.0, 0.0, 0.0]);
        // cos(e1, e2) = 0.95
        let e2 = emb([0.95, (1.0f32 - 0.95 * 0.95).sqrt(), 0.0, 0.0]);

        let r1 = store
            .create_record(Observation::new(e1.clone(), "img1", 1000), UNKNOWN_LABEL)
            .unwrap();
        store.update_threshold(&r1.global_id, 0.3).unwrap();

        let result = store.find_match(&e2, DEFAULT_TOP_K).unwrap();
        assert!(result.is_match());
        assert_eq!(result.global_id(), r1.global_id);
        assert!((result.similarity() - 0.95).abs() < 1e-4);

        let r1 = store
            .add_sample(&r1.global_id, Observation::new(e2.clone(), "img2", 2000))
            .unwrap();
        let mean = facedb_core::Embedding::mean([&e1, &e2]).unwrap();
        assert_eq!(r1.average_embedding, mean);
        assert_eq!(r1.last_sample_time, 2000);
    }

    #[test]
    fn test_per_record_threshold_rejects() {
        let dir = tempfile::tempdir().unwrap();
        let store = crate::RecordStore::in_memory(test_config(dir.path()));
        let r = store
            .create_record(Observation::new(emb([1.0, 0.0, 0.0, 0.0]), "a", 1), "Alice")
            .unwrap();
        store.update_threshold(&r.global_id, 0.99).unwrap();

        let probe = emb([0.95, 0.31, 0.0, 0.0]);
        assert!(!store.find_match(&probe, DEFAULT_TOP_K).unwrap().is_match());

        store.update_threshold(&r.global_id, 0.5).unwrap();
        assert!(store.find_match(&probe, DEFAULT_TOP_K).unwrap().is_match());
    }

    #[test]
    fn test_opposite_probe_never_matches() {
        let dir = tempfile::tempdir().unwrap();
        let store = crate::RecordStore::in_memory(test_config(dir.path()));
        let r = store
            .create_record(Observation::new(emb([1.0, 0.0, 0.0, 0.0]), "a", 1), "Alice")
            .unwrap();
        store.update_threshold(&r.global_id, -5.0).unwrap();

        let probe = emb([-1.0, 0.0, 0.0, 0.0]);
        assert!(!store.find_match(&probe, DEFAULT_TOP_K).unwrap().is_match());
    }

    #[test]
    fn test_picks_closest_of_several() {
        let dir = tempfile::tempdir().unwrap();
        let store = crate::RecordStore::in_memory(test_config(dir.path()));
        let labels = ["a", "b", "c"];
        let vectors = [[1.0, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0], [0.0, 0.0, 1.0, 0.0]];
        for (label, v) in labels.iter().zip(vectors) {
            store
                .create_record(Observation::new(emb(v), "x", 1), label)
                .unwrap();
        }
        let result = store.find_match(&emb([0.1, 0.2, 0.9, 0.0]), 3).unwrap();
        assert_eq!(result.label(), "c");
    }

    #[test]
    fn test_probe_dimension_checked() {
        let dir = tempfile::tempdir().unwrap();
        let store = crate::RecordStore::in_memory(test_config(dir.path()));
        let probe = facedb_core::Embedding::new(vec![1.0; DIM + 1]);
        assert!(matches!(
            store.find_match(&probe, 1),
            Err(StoreError::Validation(_))
        ));
    }
}
