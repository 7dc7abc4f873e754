use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::memory::MemoryRepository;
use crate::record::{LabelFilter, Record};
use crate::repository::RecordRepository;
use crate::samples::SampleImages;
use crate::sqlite::SqliteRepository;
use facedb_core::{Embedding, Observation, DEFAULT_EMBEDDING_DIM};

// --- Named constants ---
/// Acceptance threshold given to new records until they are calibrated.
pub const DEFAULT_ACCEPTANCE_THRESHOLD: f32 = 0.3;
/// Record count above which the repository's vector index is built.
pub const DEFAULT_INDEX_REBUILD_THRESHOLD: usize = 256;
/// Attempts per record mutation before a revision conflict is surfaced.
const MAX_WRITE_ATTEMPTS: usize = 3;

/// Store settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub embedding_dim: usize,
    pub default_threshold: f32,
    /// Directory holding the sample crops.
    pub samples_dir: PathBuf,
    pub index_rebuild_threshold: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            default_threshold: DEFAULT_ACCEPTANCE_THRESHOLD,
            samples_dir: PathBuf::from("samples"),
            index_rebuild_threshold: DEFAULT_INDEX_REBUILD_THRESHOLD,
        }
    }
}

/// The face identity store.
///
/// Owns every record and, through them, every sample and crop file.
/// Each record mutation is a read → recompute → compare-and-set write, so a
/// reader never sees an average that disagrees with the samples, and two
/// racing writers never silently overwrite each other.
pub struct RecordStore {
    repo: Box<dyn RecordRepository>,
    images: SampleImages,
    config: StoreConfig,
}

impl RecordStore {
    pub fn new(repo: Box<dyn RecordRepository>, config: StoreConfig) -> Self {
        Self {
            repo,
            images: SampleImages::new(config.samples_dir.clone()),
            config,
        }
    }

    /// Open a SQLite-backed store at `db_path`.
    ///
    /// `clear_all` empties the samples directory, so it may not be the
    /// directory that holds the database.
    pub fn open(db_path: &Path, config: StoreConfig) -> Result<Self, StoreError> {
        if holds_database(&config.samples_dir, db_path) {
            return Err(StoreError::Validation(format!(
                "samples directory {} also holds the database",
                config.samples_dir.display()
            )));
        }
        let repo = SqliteRepository::open(db_path, config.embedding_dim)?;
        Ok(Self::new(Box::new(repo), config))
    }

    /// A store that lives only in memory. Crops still go to `samples_dir`.
    pub fn in_memory(config: StoreConfig) -> Self {
        Self::new(Box::new(MemoryRepository::new()), config)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn images(&self) -> &SampleImages {
        &self.images
    }

    pub(crate) fn repo(&self) -> &dyn RecordRepository {
        self.repo.as_ref()
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        self.repo.len()
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        self.repo.is_empty()
    }

    /// Create a record from its first observation.
    ///
    /// Once the store holds more than `index_rebuild_threshold` records the
    /// repository's vector index is built; this never changes results.
    pub fn create_record(&self, observation: Observation, label: &str) -> Result<Record, StoreError> {
        self.check_embedding(&observation.embedding)?;
        let record = Record::new(observation, label, self.config.default_threshold);
        self.repo.put(&record, None)?;
        tracing::info!(global_id = %record.global_id, label, "record created");

        if self.repo.len()? > self.config.index_rebuild_threshold && self.repo.ensure_vector_index()? {
            tracing::info!(
                threshold = self.config.index_rebuild_threshold,
                "record count crossed index threshold"
            );
        }
        Ok(record)
    }

    /// Append a sample to a record and recompute its average.
    pub fn add_sample(&self, global_id: &str, observation: Observation) -> Result<Record, StoreError> {
        self.check_embedding(&observation.embedding)?;
        let record = self.mutate(global_id, |record| record.push_sample(observation.clone()))?;
        tracing::debug!(global_id, samples = record.num_samples(), "sample added");
        Ok(record)
    }

    /// Remove one sample and its crop.
    ///
    /// Returns true if that was the record's last sample, in which case the
    /// record itself is deleted.
    pub fn remove_sample(&self, global_id: &str, sample_id: &str) -> Result<bool, StoreError> {
        let (record_removed, image) = self.with_retry(global_id, || {
            let mut record = self.get_record(global_id)?;
            let pos = record
                .samples
                .iter()
                .position(|s| s.sample_id == sample_id)
                .ok_or_else(|| StoreError::sample_not_found(sample_id))?;
            let removed = record.samples.remove(pos);
            let expected = record.revision;

            if record.samples.is_empty() {
                if !self.repo.delete(global_id, Some(expected))? {
                    return Err(StoreError::record_not_found(global_id));
                }
                return Ok((true, removed.image_reference));
            }

            record.recompute_average()?;
            record.revision = expected + 1;
            self.repo.put(&record, Some(expected))?;
            Ok((false, removed.image_reference))
        })?;

        self.images.remove(&image);
        if record_removed {
            tracing::info!(global_id, sample_id, "last sample removed, record deleted");
        } else {
            tracing::debug!(global_id, sample_id, "sample removed");
        }
        Ok(record_removed)
    }

    pub fn get_record(&self, global_id: &str) -> Result<Record, StoreError> {
        self.repo
            .get(global_id)?
            .ok_or_else(|| StoreError::record_not_found(global_id))
    }

    /// The first record (in insertion order) carrying `label`. Labels are not
    /// unique.
    pub fn get_record_by_label(&self, label: &str) -> Result<Option<Record>, StoreError> {
        Ok(self
            .repo
            .scan(&LabelFilter::Label(label.to_string()))?
            .into_iter()
            .next())
    }

    pub fn list_records(&self, filter: LabelFilter) -> Result<Vec<Record>, StoreError> {
        self.repo.scan(&filter)
    }

    pub fn update_label(&self, global_id: &str, label: &str) -> Result<Record, StoreError> {
        let record = self.mutate(global_id, |record| {
            record.label = label.to_string();
            Ok(())
        })?;
        tracing::info!(global_id, label, "label updated");
        Ok(record)
    }

    pub fn update_threshold(&self, global_id: &str, threshold: f32) -> Result<Record, StoreError> {
        check_threshold(threshold)?;
        self.mutate(global_id, |record| {
            record.acceptance_threshold = threshold;
            Ok(())
        })
    }

    /// Set every record's acceptance threshold. Returns how many were updated.
    pub fn update_threshold_for_all(&self, threshold: f32) -> Result<usize, StoreError> {
        check_threshold(threshold)?;
        let mut updated = 0;
        for record in self.repo.scan(&LabelFilter::All)? {
            match self.update_threshold(&record.global_id, threshold) {
                Ok(_) => updated += 1,
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        tracing::info!(threshold, updated, "threshold set for all records");
        Ok(updated)
    }

    /// Delete a record together with all of its crops.
    pub fn delete_record(&self, global_id: &str) -> Result<(), StoreError> {
        let record = self.get_record(global_id)?;
        for sample in &record.samples {
            self.images.remove(&sample.image_reference);
        }
        if !self.repo.delete(global_id, None)? {
            return Err(StoreError::record_not_found(global_id));
        }
        tracing::info!(global_id, samples = record.num_samples(), "record deleted");
        Ok(())
    }

    /// Delete every record and every file in the samples directory.
    /// Returns the number of records removed.
    pub fn clear_all(&self) -> Result<usize, StoreError> {
        let records = self.repo.delete_all()?;
        let files = self.images.clear();
        tracing::info!(records, files, "store cleared");
        Ok(records)
    }

    /// Reject an embedding this store could not hold.
    pub fn check_embedding(&self, embedding: &Embedding) -> Result<(), StoreError> {
        check_embedding(embedding, self.config.embedding_dim)
    }

    /// Read-modify-write one record under compare-and-set.
    fn mutate<F>(&self, global_id: &str, mut apply: F) -> Result<Record, StoreError>
    where
        F: FnMut(&mut Record) -> Result<(), StoreError>,
    {
        self.with_retry(global_id, || {
            let mut record = self.get_record(global_id)?;
            let expected = record.revision;
            apply(&mut record)?;
            record.revision = expected + 1;
            self.repo.put(&record, Some(expected))?;
            Ok(record)
        })
    }

    /// Run `op`, re-running it when it loses a revision race.
    fn with_retry<T, F>(&self, global_id: &str, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Result<T, StoreError>,
    {
        let mut attempt = 1;
        loop {
            match op() {
                Err(StoreError::Conflict { .. }) if attempt < MAX_WRITE_ATTEMPTS => {
                    tracing::debug!(global_id, attempt, "revision conflict, retrying");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

/// Reject an embedding of the wrong length or with non-finite values.
pub fn check_embedding(embedding: &Embedding, dim: usize) -> Result<(), StoreError> {
    if embedding.dim() != dim {
        return Err(StoreError::Validation(format!(
            "expected {dim}-dimensional embedding, got {}",
            embedding.dim()
        )));
    }
    if !embedding.is_finite() {
        return Err(StoreError::Validation(
            "embedding contains non-finite values".into(),
        ));
    }
    Ok(())
}

/// True if `dir` is the directory containing `db_path`.
pub fn holds_database(dir: &Path, db_path: &Path) -> bool {
    let parent = match db_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    match (dir.canonicalize(), parent.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => normalized(dir) == normalized(parent),
    }
}

fn normalized(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, std::path::Component::CurDir))
        .collect()
}

fn check_threshold(threshold: f32) -> Result<(), StoreError> {
    if !threshold.is_finite() {
        return Err(StoreError::Validation(format!(
            "acceptance threshold must be finite, got {threshold}"
        )));
    }
    Ok(())
}
