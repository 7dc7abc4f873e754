use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Embedding width produced by the ArcFace recognition network.
pub const DEFAULT_EMBEDDING_DIM: usize = 512;

/// Face embedding vector (512-dimensional for ArcFace).
///
/// Serializes as a bare JSON array so stored samples stay readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Compute cosine similarity between two embeddings.
    ///
    /// Returns a value in [-1, 1]. Higher = more similar.
    /// Zero-norm inputs have similarity 0 to everything.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let mut dot = 0.0f64;
        let mut norm_a = 0.0f64;
        let mut norm_b = 0.0f64;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            let (a, b) = (*a as f64, *b as f64);
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 {
            (dot / denom).clamp(-1.0, 1.0) as f32
        } else {
            0.0
        }
    }

    /// Cosine distance in [0, 2]: 0 for identical direction, 2 for opposite.
    ///
    /// Returns 2.0 for zero vectors or dimension mismatches, so a malformed
    /// embedding never lands within matching range of anything.
    pub fn cosine_distance(&self, other: &Embedding) -> f32 {
        if self.dim() != other.dim() || self.is_zero() || other.is_zero() {
            return 2.0;
        }
        1.0 - self.similarity(other)
    }

    /// True when every component is zero (or the vector is empty).
    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }

    /// True when no component is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }

    /// Element-wise mean of a set of equally sized embeddings.
    ///
    /// Returns `None` for an empty set or when dimensions disagree.
    pub fn mean<'a, I>(embeddings: I) -> Option<Embedding>
    where
        I: IntoIterator<Item = &'a Embedding>,
    {
        let mut iter = embeddings.into_iter();
        let first = iter.next()?;
        let mut sum: Vec<f64> = first.values.iter().map(|v| *v as f64).collect();
        let mut count = 1usize;

        for e in iter {
            if e.dim() != sum.len() {
                return None;
            }
            for (acc, v) in sum.iter_mut().zip(e.values.iter()) {
                *acc += *v as f64;
            }
            count += 1;
        }

        let n = count as f64;
        Some(Embedding {
            values: sum.into_iter().map(|s| (s / n) as f32).collect(),
        })
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self { values }
    }
}

/// One face observation handed over by the recognition pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub embedding: Embedding,
    /// Path of the stored face crop for this observation.
    pub image_path: PathBuf,
    /// Capture time, seconds since the Unix epoch.
    pub timestamp: i64,
}

impl Observation {
    pub fn new(embedding: Embedding, image_path: impl Into<PathBuf>, timestamp: i64) -> Self {
        Self {
            embedding,
            image_path: image_path.into(),
            timestamp,
        }
    }
}
