use facedb_core::PcaError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("record {global_id} was modified concurrently")]
    Conflict { global_id: String },
    #[error("store lock poisoned")]
    LockPoisoned,
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("samples json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("image: {0}")]
    Image(#[from] image::ImageError),
    #[error("pca: {0}")]
    Pca(#[from] PcaError),
}

impl StoreError {
    pub fn record_not_found(global_id: &str) -> Self {
        Self::NotFound {
            kind: "record",
            id: global_id.to_string(),
        }
    }

    pub fn sample_not_found(sample_id: &str) -> Self {
        Self::NotFound {
            kind: "sample",
            id: sample_id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
