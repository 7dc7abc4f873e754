use crate::error::StoreError;
use crate::matcher::{MatchResult, DEFAULT_TOP_K};
use crate::record::{Record, UNKNOWN_LABEL};
use crate::store::RecordStore;
use facedb_core::Observation;

/// Outcome of feeding one observation into the store.
#[derive(Debug, Clone)]
pub struct Ingested {
    /// The record the observation now belongs to.
    pub record: Record,
    /// Similarity to the matched record, 0 for a new record.
    pub similarity: f32,
    /// True when the observation started a new Unknown record.
    pub created: bool,
}

impl RecordStore {
    /// Match an observation and fold it into the store: append it to the
    /// accepting record, or start a new Unknown record.
    pub fn ingest(&self, observation: Observation) -> Result<Ingested, StoreError> {
        match self.find_match(&observation.embedding, DEFAULT_TOP_K)? {
            MatchResult::Matched { record, similarity } => {
                match self.add_sample(&record.global_id, observation.clone()) {
                    Ok(record) => {
                        return Ok(Ingested {
                            record,
                            similarity,
                            created: false,
                        })
                    }
                    // Deleted between match and append.
                    Err(e) if e.is_not_found() => {
                        tracing::debug!(global_id = %record.global_id, "matched record vanished");
                    }
                    Err(e) => return Err(e),
                }
            }
            MatchResult::Unmatched { .. } => {}
        }

        let record = self.create_record(observation, UNKNOWN_LABEL)?;
        Ok(Ingested {
            record,
            similarity: 0.0,
            created: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::{obs_in, test_config};

    #[test]
    fn test_ingest_creates_then_appends() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::in_memory(test_config(dir.path()));

        let first = store.ingest(obs_in(dir.path(), [1.0, 0.0, 0.0, 0.0], 1)).unwrap();
        assert!(first.created);
        assert_eq!(first.similarity, 0.0);
        assert!(first.record.is_unknown());

        let second = store.ingest(obs_in(dir.path(), [0.98, 0.2, 0.0, 0.0], 2)).unwrap();
        assert!(!second.created);
        assert_eq!(second.record.global_id, first.record.global_id);
        assert_eq!(second.record.num_samples(), 2);
        assert!(second.similarity > 0.9);

        let third = store.ingest(obs_in(dir.path(), [0.0, 0.0, 1.0, 0.0], 3)).unwrap();
        assert!(third.created);
        assert_ne!(third.record.global_id, first.record.global_id);
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn test_ingest_keeps_label() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::in_memory(test_config(dir.path()));
        let r = store
            .create_record(obs_in(dir.path(), [0.0, 1.0, 0.0, 0.0], 1), "Alice")
            .unwrap();

        let ingested = store.ingest(obs_in(dir.path(), [0.0, 1.0, 0.05, 0.0], 2)).unwrap();
        assert_eq!(ingested.record.global_id, r.global_id);
        assert_eq!(ingested.record.label, "Alice");
    }
}
