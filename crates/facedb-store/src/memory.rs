use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::StoreError;
use crate::record::{LabelFilter, Record};
use crate::repository::{rank_candidates, Neighbor, RecordRepository};
use facedb_core::Embedding;

/// In-memory [`RecordRepository`] using brute-force cosine search.
///
/// Data is lost on drop. Intended for tests and ephemeral sessions.
pub struct MemoryRepository {
    records: RwLock<Vec<Record>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<Record>>, StoreError> {
        self.records.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<Record>>, StoreError> {
        self.records.write().map_err(|_| StoreError::LockPoisoned)
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordRepository for MemoryRepository {
    fn get(&self, global_id: &str) -> Result<Option<Record>, StoreError> {
        Ok(self.read()?.iter().find(|r| r.global_id == global_id).cloned())
    }

    fn scan(&self, filter: &LabelFilter) -> Result<Vec<Record>, StoreError> {
        Ok(self
            .read()?
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    fn find_nearest(&self, probe: &Embedding, top_k: usize) -> Result<Vec<Neighbor>, StoreError> {
        let records = self.read()?;
        if records.is_empty() || top_k == 0 {
            return Ok(vec![]);
        }

        let candidates: Vec<(usize, f32)> = records
            .iter()
            .enumerate()
            .map(|(i, r)| (i, probe.cosine_distance(&r.average_embedding)))
            .collect();

        Ok(rank_candidates(candidates, top_k)
            .into_iter()
            .map(|(i, distance)| Neighbor {
                record: records[i].clone(),
                distance,
            })
            .collect())
    }

    fn put(&self, record: &Record, expected_revision: Option<u64>) -> Result<(), StoreError> {
        let mut records = self.write()?;
        let existing = records.iter().position(|r| r.global_id == record.global_id);

        match (existing, expected_revision) {
            (None, None) => records.push(record.clone()),
            (Some(_), None) => {
                return Err(StoreError::Conflict {
                    global_id: record.global_id.clone(),
                })
            }
            (None, Some(_)) => return Err(StoreError::record_not_found(&record.global_id)),
            (Some(i), Some(expected)) => {
                if records[i].revision != expected {
                    return Err(StoreError::Conflict {
                        global_id: record.global_id.clone(),
                    });
                }
                records[i] = record.clone();
            }
        }
        Ok(())
    }

    fn delete(&self, global_id: &str, expected_revision: Option<u64>) -> Result<bool, StoreError> {
        let mut records = self.write()?;
        let Some(i) = records.iter().position(|r| r.global_id == global_id) else {
            return Ok(false);
        };
        if let Some(expected) = expected_revision {
            if records[i].revision != expected {
                return Err(StoreError::Conflict {
                    global_id: global_id.to_string(),
                });
            }
        }
        records.remove(i);
        Ok(true)
    }

    fn delete_all(&self) -> Result<usize, StoreError> {
        let mut records = self.write()?;
        let n = records.len();
        records.clear();
        Ok(n)
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.len())
    }
}
