use crate::error::StoreError;
use crate::record::{LabelFilter, Record};
use facedb_core::Embedding;

/// A record returned by a nearest-neighbour search.
#[derive(Debug, Clone)]
pub struct Neighbor {
    pub record: Record,
    /// Cosine distance between the probe and `record.average_embedding`.
    pub distance: f32,
}

/// Storage engine behind a [`RecordStore`](crate::RecordStore).
///
/// Implementations must be safe for concurrent use and must hand out whole
/// records: a reader never sees a record half-way through an update.
pub trait RecordRepository: Send + Sync {
    /// Fetch one record by id.
    fn get(&self, global_id: &str) -> Result<Option<Record>, StoreError>;

    /// All records matching `filter`, in insertion order.
    fn scan(&self, filter: &LabelFilter) -> Result<Vec<Record>, StoreError>;

    /// The `top_k` records whose average embedding is closest to `probe`,
    /// ordered by ascending cosine distance. Ties keep insertion order.
    fn find_nearest(&self, probe: &Embedding, top_k: usize) -> Result<Vec<Neighbor>, StoreError>;

    /// Write a record.
    ///
    /// With `expected_revision = None` the record must be new. Otherwise the
    /// write only lands if the stored revision still equals
    /// `expected_revision`; a mismatch is [`StoreError::Conflict`] and a
    /// missing record is [`StoreError::NotFound`].
    fn put(&self, record: &Record, expected_revision: Option<u64>) -> Result<(), StoreError>;

    /// Remove a record. Returns false if it did not exist.
    ///
    /// With `expected_revision` set, a revision mismatch is
    /// [`StoreError::Conflict`] and nothing is removed.
    fn delete(&self, global_id: &str, expected_revision: Option<u64>) -> Result<bool, StoreError>;

    /// Remove every record, returning how many were removed.
    fn delete_all(&self) -> Result<usize, StoreError>;

    fn len(&self) -> Result<usize, StoreError>;

    fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Build the vector index over average embeddings if the engine has one
    /// and it is not built yet. Returns true if an index was built.
    ///
    /// Must not change the results of any other method.
    fn ensure_vector_index(&self) -> Result<bool, StoreError> {
        Ok(false)
    }
}

/// Sort `(item, distance)` candidates and keep the `top_k` closest.
///
/// The sort is stable, so ties keep insertion order like the SQLite
/// repository's `ORDER BY distance, rowid`.
pub(crate) fn rank_candidates<T>(mut candidates: Vec<(T, f32)>, top_k: usize) -> Vec<(T, f32)> {
    candidates.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    candidates.truncate(top_k);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_candidates_orders_and_truncates() {
        let ranked = rank_candidates(vec![("a", 0.5), ("b", 0.1), ("c", 0.3)], 2);
        assert_eq!(ranked, vec![("b", 0.1), ("c", 0.3)]);
    }

    #[test]
    fn test_rank_candidates_ties_keep_order() {
        let ranked = rank_candidates(vec![("x", 0.2), ("y", 0.2), ("z", 0.2)], 3);
        let ids: Vec<_> = ranked.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec!["x", "y", "z"]);
    }
}
