//! facedb-store — Persistent face identity records.
//!
//! A [`RecordStore`] keeps one [`Record`] per identity: the running mean of
//! its sample embeddings, the samples themselves and a per-record acceptance
//! threshold. Probes are matched against the stored means, unmatched faces
//! become "Unknown" records, and Unknown records are pruned once a session
//! ends. Storage sits behind the [`RecordRepository`] trait, with SQLite and
//! in-memory implementations.

pub mod calibration;
pub mod consolidate;
pub mod error;
pub mod ingest;
pub mod matcher;
pub mod memory;
pub mod record;
pub mod repository;
pub mod samples;
pub mod sqlite;
pub mod store;

pub use consolidate::{ConsolidationReport, DEFAULT_RECENCY_WINDOW};
pub use error::StoreError;
pub use ingest::Ingested;
pub use matcher::{MatchResult, DEFAULT_TOP_K};
pub use memory::MemoryRepository;
pub use record::{LabelFilter, Record, Sample, UNKNOWN_LABEL};
pub use repository::{Neighbor, RecordRepository};
pub use samples::SampleImages;
pub use sqlite::SqliteRepository;
pub use store::{RecordStore, StoreConfig};
