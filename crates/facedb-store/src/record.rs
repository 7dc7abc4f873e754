use crate::error::StoreError;
use facedb_core::{Embedding, Observation};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Label carried by identities no operator has named yet.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// One observed instance of a face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub embedding: Embedding,
    /// Path of the stored face crop.
    pub image_reference: PathBuf,
    pub sample_id: String,
}

impl Sample {
    pub fn from_observation(observation: Observation) -> Self {
        Self {
            embedding: observation.embedding,
            image_reference: observation.image_path,
            sample_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// One stored identity.
///
/// Snapshots returned by the store are owned copies; mutating one has no
/// effect on the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub global_id: String,
    pub label: String,
    /// Element-wise mean of every sample embedding.
    pub average_embedding: Embedding,
    /// Epoch seconds of the most recently added sample. Not rolled back
    /// when samples are removed.
    pub last_sample_time: i64,
    /// Samples in insertion order; the last one is the most recent.
    pub samples: Vec<Sample>,
    pub acceptance_threshold: f32,
    /// Bumped on every persisted mutation; used for compare-and-set.
    pub revision: u64,
}

impl Record {
    /// A fresh record holding a single sample.
    pub fn new(observation: Observation, label: &str, acceptance_threshold: f32) -> Self {
        let last_sample_time = observation.timestamp;
        let average_embedding = observation.embedding.clone();
        Self {
            global_id: uuid::Uuid::new_v4().to_string(),
            label: label.to_string(),
            average_embedding,
            last_sample_time,
            samples: vec![Sample::from_observation(observation)],
            acceptance_threshold,
            revision: 0,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.label == UNKNOWN_LABEL
    }

    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn latest_sample(&self) -> Option<&Sample> {
        self.samples.last()
    }

    pub fn sample_embeddings(&self) -> Vec<Embedding> {
        self.samples.iter().map(|s| s.embedding.clone()).collect()
    }

    /// Append an observation and fold it into the average.
    pub(crate) fn push_sample(&mut self, observation: Observation) -> Result<(), StoreError> {
        self.last_sample_time = observation.timestamp;
        self.samples.push(Sample::from_observation(observation));
        self.recompute_average()
    }

    /// Recompute `average_embedding` from the current samples.
    pub(crate) fn recompute_average(&mut self) -> Result<(), StoreError> {
        self.average_embedding = Embedding::mean(self.samples.iter().map(|s| &s.embedding))
            .ok_or_else(|| {
                StoreError::Validation(format!(
                    "record {} has no samples or mixed embedding dimensions",
                    self.global_id
                ))
            })?;
        Ok(())
    }
}

/// Which records a scan returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelFilter {
    All,
    /// Only records still labeled [`UNKNOWN_LABEL`].
    Unknown,
    Label(String),
}

impl LabelFilter {
    /// The label this filter pins, if any.
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::Unknown => Some(UNKNOWN_LABEL),
            Self::Label(label) => Some(label),
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.label().map_or(true, |label| record.label == label)
    }
}
