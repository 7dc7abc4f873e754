//! SQLite-backed [`RecordRepository`].
//!
//! One `records` table: scalar columns for id, label, timestamps and
//! threshold, the average embedding as a little-endian f32 blob, and the
//! samples as a JSON array. Sample images stay on disk; rows hold paths.
//! A `meta` table pins the embedding dimension the database was created for.
//!
//! Nearest-neighbour search runs inside SQLite through the sqlite-vec
//! extension. Small tables are ranked exactly with `vec_distance_cosine`;
//! past the index threshold a `vec0` table mirrors the averages and answers
//! KNN queries.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, Once};

use rusqlite::ffi::sqlite3_auto_extension;
use rusqlite::{params, Connection, OptionalExtension, Row};
use sqlite_vec::sqlite3_vec_init;

use crate::error::StoreError;
use crate::record::{LabelFilter, Record, Sample};
use crate::repository::{Neighbor, RecordRepository};
use facedb_core::Embedding;

const SCHEMA_VERSION: &str = "1";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS records (
    global_id            TEXT PRIMARY KEY,
    label                TEXT NOT NULL,
    average_embedding    BLOB NOT NULL,
    last_sample_time     INTEGER NOT NULL,
    samples_json         TEXT NOT NULL,
    acceptance_threshold REAL NOT NULL,
    revision             INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS records_label ON records(label);
";

const RECORD_COLUMNS: &str = "global_id, label, average_embedding, last_sample_time, \
                              samples_json, acceptance_threshold, revision";

/// `vec0` table keyed by `records.rowid`.
const VECTOR_TABLE: &str = "records_vec";

/// Every record ranked by exact cosine distance to `?1`. A zero-norm vector
/// has no direction; it sits at distance 2 like in [`Embedding::cosine_distance`].
const SCAN_NEAREST: &str = "
SELECT global_id, label, average_embedding, last_sample_time, samples_json,
       acceptance_threshold, revision,
       COALESCE(vec_distance_cosine(average_embedding, vec_f32(?1)), 2.0) AS distance
FROM records
ORDER BY distance, rowid
LIMIT ?2";

/// KNN through the `vec0` table.
const INDEX_NEAREST: &str = "
SELECT records.global_id, records.label, records.average_embedding,
       records.last_sample_time, records.samples_json,
       records.acceptance_threshold, records.revision, knn.distance
FROM (
    SELECT rowid, distance FROM records_vec
    WHERE embedding MATCH vec_f32(?1) AND k = ?2
) AS knn
JOIN records ON records.rowid = knn.rowid
ORDER BY knn.distance, records.rowid";

/// Load sqlite-vec into every connection opened after this call.
fn register_vec_extension() {
    static REGISTER: Once = Once::new();
    REGISTER.call_once(|| unsafe {
        sqlite3_auto_extension(Some(std::mem::transmute(sqlite3_vec_init as *const ())));
    });
}

struct Inner {
    conn: Connection,
    /// Whether the `vec0` table exists. It persists across reopens.
    indexed: bool,
}

/// SQLite [`RecordRepository`]. Safe to share between threads; all access
/// is serialized through one connection.
pub struct SqliteRepository {
    inner: Mutex<Inner>,
    dim: usize,
}

impl SqliteRepository {
    /// Open (or create) the database at `path` for `dim`-dimensional embeddings.
    ///
    /// Fails with [`StoreError::Validation`] if the database was created for
    /// a different embedding dimension.
    pub fn open(path: &Path, dim: usize) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        register_vec_extension();
        let conn = Connection::open(path)?;
        tracing::info!(path = %path.display(), dim, "opened record database");
        Self::init(conn, dim)
    }

    /// A private in-memory database, mostly for tests.
    pub fn open_in_memory(dim: usize) -> Result<Self, StoreError> {
        register_vec_extension();
        Self::init(Connection::open_in_memory()?, dim)
    }

    fn init(conn: Connection, dim: usize) -> Result<Self, StoreError> {
        if dim == 0 {
            return Err(StoreError::Validation(
                "embedding dimension must be positive".into(),
            ));
        }
        conn.execute_batch(SCHEMA)?;

        let stored: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'embedding_dim'",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match stored {
            Some(value) => {
                let stored_dim: usize = value.parse().map_err(|_| {
                    StoreError::Validation(format!("corrupt embedding_dim in meta table: {value}"))
                })?;
                if stored_dim != dim {
                    return Err(StoreError::Validation(format!(
                        "database holds {stored_dim}-dimensional embeddings, configured for {dim}"
                    )));
                }
            }
            None => {
                conn.execute(
                    "INSERT INTO meta (key, value) VALUES ('embedding_dim', ?1), ('schema_version', ?2)",
                    params![dim.to_string(), SCHEMA_VERSION],
                )?;
            }
        }

        let indexed: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE name = ?1)",
            params![VECTOR_TABLE],
            |row| row.get(0),
        )?;
        let version: String = conn.query_row("SELECT vec_version()", [], |row| row.get(0))?;
        tracing::debug!(sqlite_vec = %version, indexed, "vector search ready");

        Ok(Self {
            inner: Mutex::new(Inner { conn, indexed }),
            dim,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Whether the `vec0` index table has been built.
    pub fn has_vector_index(&self) -> Result<bool, StoreError> {
        Ok(self.lock()?.indexed)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn encode_embedding(&self, embedding: &Embedding) -> Result<Vec<u8>, StoreError> {
        if embedding.dim() != self.dim {
            return Err(StoreError::Validation(format!(
                "expected {}-dimensional embedding, got {}",
                self.dim,
                embedding.dim()
            )));
        }
        Ok(embedding
            .values
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect())
    }

    fn decode_embedding(&self, blob: &[u8]) -> Result<Embedding, StoreError> {
        if blob.len() != self.dim * 4 {
            return Err(StoreError::Validation(format!(
                "embedding blob of {} bytes, expected {}",
                blob.len(),
                self.dim * 4
            )));
        }
        Ok(Embedding::new(
            blob.chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ))
    }

    fn decode_record(&self, raw: RawRecord) -> Result<Record, StoreError> {
        let samples: Vec<Sample> = serde_json::from_str(&raw.samples_json)?;
        Ok(Record {
            average_embedding: self.decode_embedding(&raw.average_embedding)?,
            global_id: raw.global_id,
            label: raw.label,
            last_sample_time: raw.last_sample_time,
            samples,
            acceptance_threshold: raw.acceptance_threshold as f32,
            revision: raw.revision as u64,
        })
    }

    fn load(&self, conn: &Connection, global_id: &str) -> Result<Option<Record>, StoreError> {
        let raw = conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM records WHERE global_id = ?1"),
                params![global_id],
                RawRecord::from_row,
            )
            .optional()?;
        raw.map(|r| self.decode_record(r)).transpose()
    }
}

/// Mirror one row's average into the `vec0` table. Zero-norm averages are
/// left out: they are at distance 2 from every probe and never match.
fn index_row(
    conn: &Connection,
    rowid: i64,
    embedding: &Embedding,
    blob: &[u8],
) -> Result<(), StoreError> {
    conn.execute("DELETE FROM records_vec WHERE rowid = ?1", params![rowid])?;
    if !embedding.is_zero() {
        conn.execute(
            "INSERT INTO records_vec (rowid, embedding) VALUES (?1, ?2)",
            params![rowid, blob],
        )?;
    }
    Ok(())
}

fn rowid_of(conn: &Connection, global_id: &str) -> Result<Option<i64>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT rowid FROM records WHERE global_id = ?1",
            params![global_id],
            |row| row.get(0),
        )
        .optional()?)
}

/// Column values of one `records` row before decoding.
struct RawRecord {
    global_id: String,
    label: String,
    average_embedding: Vec<u8>,
    last_sample_time: i64,
    samples_json: String,
    acceptance_threshold: f64,
    revision: i64,
}

impl RawRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            global_id: row.get(0)?,
            label: row.get(1)?,
            average_embedding: row.get(2)?,
            last_sample_time: row.get(3)?,
            samples_json: row.get(4)?,
            acceptance_threshold: row.get(5)?,
            revision: row.get(6)?,
        })
    }
}

impl RecordRepository for SqliteRepository {
    fn get(&self, global_id: &str) -> Result<Option<Record>, StoreError> {
        let inner = self.lock()?;
        self.load(&inner.conn, global_id)
    }

    fn scan(&self, filter: &LabelFilter) -> Result<Vec<Record>, StoreError> {
        let inner = self.lock()?;
        let raws = match filter.label() {
            None => {
                let mut stmt = inner
                    .conn
                    .prepare(&format!("SELECT {RECORD_COLUMNS} FROM records ORDER BY rowid"))?;
                let rows = stmt
                    .query_map([], RawRecord::from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
            Some(label) => {
                let mut stmt = inner.conn.prepare(&format!(
                    "SELECT {RECORD_COLUMNS} FROM records WHERE label = ?1 ORDER BY rowid"
                ))?;
                let rows = stmt
                    .query_map(params![label], RawRecord::from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
        };
        raws.into_iter().map(|r| self.decode_record(r)).collect()
    }

    fn find_nearest(&self, probe: &Embedding, top_k: usize) -> Result<Vec<Neighbor>, StoreError> {
        if top_k == 0 {
            return Ok(vec![]);
        }
        let blob = self.encode_embedding(probe)?;
        let limit = i64::try_from(top_k).unwrap_or(i64::MAX);
        let inner = self.lock()?;

        // The index holds no zero-norm vectors, and a zero probe is equally
        // far from everything, so it keeps the exact scan.
        let query = if inner.indexed && !probe.is_zero() {
            INDEX_NEAREST
        } else {
            SCAN_NEAREST
        };
        let mut stmt = inner.conn.prepare_cached(query)?;
        let rows = stmt
            .query_map(params![blob, limit], |row| {
                Ok((RawRecord::from_row(row)?, row.get::<_, f64>(7)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(raw, distance)| {
                Ok(Neighbor {
                    record: self.decode_record(raw)?,
                    distance: (distance as f32).clamp(0.0, 2.0),
                })
            })
            .collect()
    }

    fn put(&self, record: &Record, expected_revision: Option<u64>) -> Result<(), StoreError> {
        let blob = self.encode_embedding(&record.average_embedding)?;
        let samples_json = serde_json::to_string(&record.samples)?;

        let mut inner = self.lock()?;
        let indexed = inner.indexed;
        let tx = inner.conn.transaction()?;

        let rowid = match expected_revision {
            None => {
                let inserted = tx.execute(
                    "INSERT OR IGNORE INTO records (global_id, label, average_embedding, \
                     last_sample_time, samples_json, acceptance_threshold, revision) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        record.global_id,
                        record.label,
                        blob,
                        record.last_sample_time,
                        samples_json,
                        record.acceptance_threshold as f64,
                        record.revision as i64,
                    ],
                )?;
                if inserted == 0 {
                    return Err(StoreError::Conflict {
                        global_id: record.global_id.clone(),
                    });
                }
                Some(tx.last_insert_rowid())
            }
            Some(expected) => {
                let updated = tx.execute(
                    "UPDATE records SET label = ?2, average_embedding = ?3, last_sample_time = ?4, \
                     samples_json = ?5, acceptance_threshold = ?6, revision = ?7 \
                     WHERE global_id = ?1 AND revision = ?8",
                    params![
                        record.global_id,
                        record.label,
                        blob,
                        record.last_sample_time,
                        samples_json,
                        record.acceptance_threshold as f64,
                        record.revision as i64,
                        expected as i64,
                    ],
                )?;
                if updated == 0 {
                    let exists: bool = tx.query_row(
                        "SELECT EXISTS(SELECT 1 FROM records WHERE global_id = ?1)",
                        params![record.global_id],
                        |row| row.get(0),
                    )?;
                    return Err(if exists {
                        StoreError::Conflict {
                            global_id: record.global_id.clone(),
                        }
                    } else {
                        StoreError::record_not_found(&record.global_id)
                    });
                }
                if indexed {
                    rowid_of(&tx, &record.global_id)?
                } else {
                    None
                }
            }
        };

        if let (true, Some(rowid)) = (indexed, rowid) {
            index_row(&tx, rowid, &record.average_embedding, &blob)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn delete(&self, global_id: &str, expected_revision: Option<u64>) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        let indexed = inner.indexed;
        let tx = inner.conn.transaction()?;
        let rowid = if indexed { rowid_of(&tx, global_id)? } else { None };

        let removed = match expected_revision {
            None => tx.execute("DELETE FROM records WHERE global_id = ?1", params![global_id])?,
            Some(expected) => {
                let removed = tx.execute(
                    "DELETE FROM records WHERE global_id = ?1 AND revision = ?2",
                    params![global_id, expected as i64],
                )?;
                if removed == 0 {
                    let exists: bool = tx.query_row(
                        "SELECT EXISTS(SELECT 1 FROM records WHERE global_id = ?1)",
                        params![global_id],
                        |row| row.get(0),
                    )?;
                    if exists {
                        return Err(StoreError::Conflict {
                            global_id: global_id.to_string(),
                        });
                    }
                }
                removed
            }
        };

        if let (true, Some(rowid)) = (removed > 0, rowid) {
            tx.execute("DELETE FROM records_vec WHERE rowid = ?1", params![rowid])?;
        }
        tx.commit()?;
        Ok(removed > 0)
    }

    fn delete_all(&self) -> Result<usize, StoreError> {
        let mut inner = self.lock()?;
        let indexed = inner.indexed;
        let tx = inner.conn.transaction()?;
        let removed = tx.execute("DELETE FROM records", [])?;
        if indexed {
            tx.execute("DELETE FROM records_vec", [])?;
        }
        tx.commit()?;
        Ok(removed)
    }

    fn len(&self) -> Result<usize, StoreError> {
        let inner = self.lock()?;
        let n: i64 = inner
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    fn ensure_vector_index(&self) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        if inner.indexed {
            return Ok(false);
        }
        let tx = inner.conn.transaction()?;
        tx.execute_batch(&format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS {VECTOR_TABLE} \
             USING vec0(embedding float[{}] distance_metric=cosine)",
            self.dim
        ))?;

        let rows = {
            let mut stmt = tx.prepare("SELECT rowid, average_embedding FROM records ORDER BY rowid")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };
        for (rowid, blob) in &rows {
            let embedding = self.decode_embedding(blob)?;
            index_row(&tx, *rowid, &embedding, blob)?;
        }
        tx.commit()?;

        inner.indexed = true;
        tracing::info!(records = rows.len(), dim = self.dim, "built vec0 index");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::UNKNOWN_LABEL;
    use facedb_core::Observation;

    fn record(values: &[f32], label: &str) -> Record {
        let obs = Observation::new(Embedding::new(values.to_vec()), "/tmp/x.jpg", 42);
        Record::new(obs, label, 0.3)
    }

    #[test]
    fn test_roundtrip_preserves_fields() {
        let repo = SqliteRepository::open_in_memory(3).unwrap();
        let r = record(&[0.25, -1.5, 3.0], UNKNOWN_LABEL);
        repo.put(&r, None).unwrap();
        assert_eq!(repo.get(&r.global_id).unwrap(), Some(r));
    }

    #[test]
    fn test_dimension_pinned_by_meta_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db").join("faces.db");
        {
            let repo = SqliteRepository::open(&path, 4).unwrap();
            repo.put(&record(&[1.0, 0.0, 0.0, 0.0], "a"), None).unwrap();
        }
        let err = SqliteRepository::open(&path, 8).err().unwrap();
        assert!(matches!(err, StoreError::Validation(_)), "got {err:?}");

        let reopened = SqliteRepository::open(&path, 4).unwrap();
        assert_eq!(reopened.len().unwrap(), 1);
    }

    #[test]
    fn test_put_rejects_wrong_dimension() {
        let repo = SqliteRepository::open_in_memory(3).unwrap();
        let err = repo.put(&record(&[1.0, 0.0], "a"), None).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn test_compare_and_set() {
        let repo = SqliteRepository::open_in_memory(2).unwrap();
        let mut r = record(&[1.0, 0.0], UNKNOWN_LABEL);
        repo.put(&r, None).unwrap();
        assert!(matches!(repo.put(&r, None), Err(StoreError::Conflict { .. })));

        r.label = "Alice".into();
        r.revision = 1;
        repo.put(&r, Some(0)).unwrap();
        assert!(matches!(repo.put(&r, Some(0)), Err(StoreError::Conflict { .. })));

        let ghost = record(&[1.0, 0.0], "ghost");
        assert!(repo.put(&ghost, Some(0)).unwrap_err().is_not_found());

        assert!(matches!(
            repo.delete(&r.global_id, Some(0)),
            Err(StoreError::Conflict { .. })
        ));
        assert!(repo.delete(&r.global_id, Some(1)).unwrap());
        assert!(!repo.delete(&r.global_id, Some(1)).unwrap());
    }

    #[test]
    fn test_scan_in_insertion_order() {
        let repo = SqliteRepository::open_in_memory(1).unwrap();
        let a = record(&[1.0], UNKNOWN_LABEL);
        let b = record(&[2.0], "Alice");
        let c = record(&[3.0], UNKNOWN_LABEL);
        for r in [&a, &b, &c] {
            repo.put(r, None).unwrap();
        }
        let ids: Vec<_> = repo
            .scan(&LabelFilter::Unknown)
            .unwrap()
            .into_iter()
            .map(|r| r.global_id)
            .collect();
        assert_eq!(ids, vec![a.global_id.clone(), c.global_id.clone()]);

        let alice = repo.scan(&LabelFilter::Label("Alice".into())).unwrap();
        assert_eq!(alice, vec![b]);
    }

    fn labels(neighbors: Vec<Neighbor>) -> Vec<String> {
        neighbors.into_iter().map(|n| n.record.label).collect()
    }

    #[test]
    fn test_nearest_distances_match_cosine() {
        let repo = SqliteRepository::open_in_memory(3).unwrap();
        let vectors: [[f32; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [-1.0, 0.2, 0.0]];
        for (i, v) in vectors.iter().enumerate() {
            repo.put(&record(v, &format!("r{i}")), None).unwrap();
        }
        let probe = Embedding::new(vec![0.8, 0.6, 0.0]);
        let hits = repo.find_nearest(&probe, 3).unwrap();

        assert_eq!(hits.len(), 3);
        for hit in &hits {
            let expected = probe.cosine_distance(&hit.record.average_embedding);
            assert!((hit.distance - expected).abs() < 1e-5, "{} != {expected}", hit.distance);
        }
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert_eq!(hits[2].record.label, "r2");
        assert!(hits[2].distance > 1.0);
    }

    #[test]
    fn test_zero_vectors_sit_at_distance_two() {
        let repo = SqliteRepository::open_in_memory(2).unwrap();
        let zero = record(&[0.0, 0.0], "zero");
        let x = record(&[1.0, 0.0], "x");
        repo.put(&zero, None).unwrap();
        repo.put(&x, None).unwrap();

        let hits = repo.find_nearest(&Embedding::new(vec![1.0, 0.0]), 2).unwrap();
        assert_eq!(labels(hits.clone()), vec!["x", "zero"]);
        assert_eq!(hits[1].distance, 2.0);

        // A zero probe is equally far from everything; insertion order wins.
        let hits = repo.find_nearest(&Embedding::new(vec![0.0, 0.0]), 2).unwrap();
        assert_eq!(labels(hits.clone()), vec!["zero", "x"]);
        assert!(hits.iter().all(|n| n.distance == 2.0));
    }

    #[test]
    fn test_vector_index_gives_same_results() {
        let repo = SqliteRepository::open_in_memory(3).unwrap();
        let vectors: [[f32; 3]; 4] = [
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.7, 0.7, 0.0],
            [0.0, 0.0, 1.0],
        ];
        for (i, v) in vectors.iter().enumerate() {
            repo.put(&record(v, &format!("r{i}")), None).unwrap();
        }
        let probe = Embedding::new(vec![0.9, 0.2, 0.0]);
        let before = labels(repo.find_nearest(&probe, 3).unwrap());

        assert!(!repo.has_vector_index().unwrap());
        assert!(repo.ensure_vector_index().unwrap());
        assert!(!repo.ensure_vector_index().unwrap());
        assert!(repo.has_vector_index().unwrap());

        let after = labels(repo.find_nearest(&probe, 3).unwrap());
        assert_eq!(before, after);
        assert_eq!(after[0], "r0");

        // The vec0 table follows later writes.
        let mut late = record(&[0.9, 0.2, 0.0], "late");
        repo.put(&late, None).unwrap();
        assert_eq!(repo.find_nearest(&probe, 1).unwrap()[0].record.label, "late");

        late.average_embedding = Embedding::new(vec![0.0, 0.0, 1.0]);
        late.revision = 1;
        repo.put(&late, Some(0)).unwrap();
        assert_eq!(repo.find_nearest(&probe, 1).unwrap()[0].record.label, "r0");

        repo.delete(&late.global_id, None).unwrap();
        let count: i64 = repo
            .lock()
            .unwrap()
            .conn
            .query_row("SELECT COUNT(*) FROM records_vec", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 4);

        repo.delete_all().unwrap();
        assert!(repo.find_nearest(&probe, 3).unwrap().is_empty());
    }

    #[test]
    fn test_vector_index_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faces.db");
        {
            let repo = SqliteRepository::open(&path, 2).unwrap();
            repo.put(&record(&[1.0, 0.0], "a"), None).unwrap();
            repo.put(&record(&[0.0, 1.0], "b"), None).unwrap();
            repo.ensure_vector_index().unwrap();
        }
        let repo = SqliteRepository::open(&path, 2).unwrap();
        assert!(repo.has_vector_index().unwrap());
        assert!(!repo.ensure_vector_index().unwrap());
        let hits = repo.find_nearest(&Embedding::new(vec![0.1, 1.0]), 1).unwrap();
        assert_eq!(hits[0].record.label, "b");
    }
}
