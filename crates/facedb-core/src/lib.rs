//! facedb-core — Face embedding math shared by the record store and tools.
//!
//! Provides the cosine metric over fixed-length face embeddings, a
//! deterministic PCA reducer, and the dispersion-based threshold
//! calibration formula.

pub mod calibrate;
pub mod pca;
pub mod types;

pub use calibrate::{confidence_area, thresholds_from_areas, MAX_THRESHOLD, MIN_THRESHOLD};
pub use pca::{Pca, PcaError};
pub use types::{Embedding, Observation, DEFAULT_EMBEDDING_DIM};
