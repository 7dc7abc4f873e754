//! Pruning of Unknown identities.
//!
//! An Unknown cluster built up over one session collapses to a single
//! representative sample when the session ends; Unknowns left over from an
//! earlier session are purged.

use std::time::Duration;

use crate::error::StoreError;
use crate::record::{LabelFilter, Record};
use crate::store::RecordStore;

/// How recent the latest Unknown must be to survive consolidation.
pub const DEFAULT_RECENCY_WINDOW: Duration = Duration::from_secs(10);

/// What a keep-latest consolidation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsolidationReport {
    pub records_deleted: usize,
    /// Samples trimmed from the kept record.
    pub samples_removed: usize,
    /// The Unknown record that survived, if any.
    pub kept: Option<String>,
}

impl RecordStore {
    /// Delete every Unknown record and its crops. Returns how many records
    /// were deleted; a second call deletes nothing.
    pub fn clear_unknown(&self) -> Result<usize, StoreError> {
        let mut deleted = 0;
        for record in self.list_records(LabelFilter::Unknown)? {
            if self.delete_if_present(&record.global_id)? {
                deleted += 1;
            }
        }
        tracing::info!(deleted, "unknown records cleared");
        Ok(deleted)
    }

    /// Collapse the Unknown records to the most recent one.
    ///
    /// If the latest Unknown saw a sample less than `recency_window` before
    /// `now` (epoch seconds), every other Unknown is deleted and the latest
    /// is trimmed to its newest sample. Otherwise all Unknowns are deleted.
    pub fn clear_unknown_keep_latest(
        &self,
        recency_window: Duration,
        now: i64,
    ) -> Result<ConsolidationReport, StoreError> {
        let unknowns = self.list_records(LabelFilter::Unknown)?;
        let mut report = ConsolidationReport::default();

        let Some(latest) = select_latest(&unknowns) else {
            return Ok(report);
        };
        let window = i64::try_from(recency_window.as_secs()).unwrap_or(i64::MAX);
        let fresh = now.saturating_sub(latest.last_sample_time) < window;

        for record in &unknowns {
            if fresh && record.global_id == latest.global_id {
                continue;
            }
            if self.delete_if_present(&record.global_id)? {
                report.records_deleted += 1;
            }
        }

        if fresh {
            report.samples_removed = self.keep_only_last_sample(&latest.global_id)?;
            report.kept = Some(latest.global_id.clone());
        }

        tracing::info!(
            deleted = report.records_deleted,
            trimmed = report.samples_removed,
            kept = report.kept.as_deref().unwrap_or("-"),
            "unknown records consolidated"
        );
        Ok(report)
    }

    /// Remove every sample but the newest one. Returns how many were removed.
    pub fn keep_only_last_sample(&self, global_id: &str) -> Result<usize, StoreError> {
        let record = self.get_record(global_id)?;
        let Some((_, older)) = record.samples.split_last() else {
            return Ok(0);
        };

        let mut removed = 0;
        for sample in older {
            match self.remove_sample(global_id, &sample.sample_id) {
                Ok(_) => removed += 1,
                // Already gone; someone else trimmed it.
                Err(StoreError::NotFound { kind: "sample", .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(removed)
    }

    fn delete_if_present(&self, global_id: &str) -> Result<bool, StoreError> {
        match self.delete_record(global_id) {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// The record with the greatest `last_sample_time`; ties go to the
/// lexicographically smallest `global_id`.
fn select_latest(records: &[Record]) -> Option<&Record> {
    records.iter().max_by(|a, b| {
        a.last_sample_time
            .cmp(&b.last_sample_time)
            .then_with(|| b.global_id.cmp(&a.global_id))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::UNKNOWN_LABEL;
    use crate::store::tests::{obs_in, test_config};

    fn unknown_with_times(store: &RecordStore, dir: &std::path::Path, times: &[i64]) -> Record {
        let mut iter = times.iter();
        let first = *iter.next().unwrap();
        let mut record = store
            .create_record(obs_in(dir, [1.0, first as f32, 0.0, 0.0], first), UNKNOWN_LABEL)
            .unwrap();
        for &t in iter {
            record = store
                .add_sample(&record.global_id, obs_in(dir, [1.0, t as f32, 0.0, 0.0], t))
                .unwrap();
        }
        record
    }

    #[test]
    fn test_keep_latest_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(&dir.path().join("db/faces.db"), test_config(dir.path())).unwrap();
        let old = unknown_with_times(&store, dir.path(), &[90, 100]);
        let latest = unknown_with_times(&store, dir.path(), &[180, 190, 200]);
        let named = store
            .create_record(obs_in(dir.path(), [0.0, 0.0, 1.0, 0.0], 50), "Alice")
            .unwrap();

        let report = store.clear_unknown_keep_latest(Duration::from_secs(10), 205).unwrap();
        assert_eq!(report.records_deleted, 1);
        assert_eq!(report.samples_removed, 2);
        assert_eq!(report.kept.as_deref(), Some(latest.global_id.as_str()));

        assert!(store.get_record(&old.global_id).unwrap_err().is_not_found());
        assert!(old.samples.iter().all(|s| !s.image_reference.exists()));

        let kept = store.get_record(&latest.global_id).unwrap();
        assert_eq!(kept.num_samples(), 1);
        assert_eq!(kept.samples[0], latest.samples[2]);
        assert_eq!(kept.average_embedding, latest.samples[2].embedding);
        assert!(!latest.samples[0].image_reference.exists());
        assert!(latest.samples[2].image_reference.exists());

        // Named records are untouched.
        assert_eq!(store.get_record(&named.global_id).unwrap(), named);
    }

    #[test]
    fn test_keep_latest_stale_deletes_all() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::in_memory(test_config(dir.path()));
        unknown_with_times(&store, dir.path(), &[100]);
        unknown_with_times(&store, dir.path(), &[150, 200]);

        let report = store.clear_unknown_keep_latest(Duration::from_secs(10), 210).unwrap();
        assert_eq!(report.records_deleted, 2);
        assert_eq!(report.kept, None);
        assert!(store.list_records(LabelFilter::Unknown).unwrap().is_empty());
    }

    #[test]
    fn test_keep_latest_single_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::in_memory(test_config(dir.path()));

        let r = unknown_with_times(&store, dir.path(), &[1, 2, 3]);
        let report = store.clear_unknown_keep_latest(DEFAULT_RECENCY_WINDOW, 5).unwrap();
        assert_eq!(report.records_deleted, 0);
        assert_eq!(store.get_record(&r.global_id).unwrap().num_samples(), 1);

        let report = store.clear_unknown_keep_latest(DEFAULT_RECENCY_WINDOW, 1000).unwrap();
        assert_eq!(report.records_deleted, 1);
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_keep_latest_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::in_memory(test_config(dir.path()));
        let report = store.clear_unknown_keep_latest(DEFAULT_RECENCY_WINDOW, 0).unwrap();
        assert_eq!(report, ConsolidationReport::default());
    }

    #[test]
    fn test_clear_unknown_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::in_memory(test_config(dir.path()));
        unknown_with_times(&store, dir.path(), &[1, 2]);
        unknown_with_times(&store, dir.path(), &[3]);
        let named = store
            .create_record(obs_in(dir.path(), [0.0, 0.0, 0.0, 1.0], 4), "Bob")
            .unwrap();

        assert_eq!(store.clear_unknown().unwrap(), 2);
        assert_eq!(store.clear_unknown().unwrap(), 0);
        let remaining = store.list_records(LabelFilter::All).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].global_id, named.global_id);
    }

    #[test]
    fn test_select_latest_tie_break() {
        let mut a = Record::new(
            facedb_core::Observation::new(vec![1.0f32].into(), "a", 100),
            UNKNOWN_LABEL,
            0.3,
        );
        let mut b = a.clone();
        let mut c = a.clone();
        a.global_id = "bbb".into();
        b.global_id = "aaa".into();
        c.global_id = "ccc".into();
        c.last_sample_time = 99;

        let records = vec![a, b, c];
        assert_eq!(select_latest(&records).unwrap().global_id, "aaa");
        assert!(select_latest(&[]).is_none());
    }

    #[test]
    fn test_keep_only_last_sample_single() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::in_memory(test_config(dir.path()));
        let r = unknown_with_times(&store, dir.path(), &[7]);
        assert_eq!(store.keep_only_last_sample(&r.global_id).unwrap(), 0);
        assert!(store.keep_only_last_sample("missing").unwrap_err().is_not_found());
    }
}
