use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use facedb_core::DEFAULT_EMBEDDING_DIM;
use facedb_store::StoreConfig;
use serde::Deserialize;

/// Settings, loaded from an optional TOML file and `FACEDB_*` environment
/// variables. Environment variables win over the file.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Directory holding the sample face crops.
    pub samples_dir: PathBuf,
    /// Length of every stored embedding (default: 512).
    pub embedding_dim: usize,
    /// Acceptance threshold for new records, until calibrated.
    pub default_threshold: f32,
    /// Record count above which the vector index is built.
    pub index_rebuild_threshold: usize,
    /// How recent the latest Unknown must be to survive consolidation.
    pub recency_window_secs: u64,
    /// Minimum time between two alerts for the same identity.
    pub notify_cooldown_secs: u64,
    /// Interval between calibration runs in `watch`.
    pub calibrate_interval_secs: u64,
    /// Program run for each alert; alerts are only logged when unset.
    pub notify_command: Option<PathBuf>,
}

/// Keys accepted in the TOML file. All optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    db_path: Option<PathBuf>,
    samples_dir: Option<PathBuf>,
    embedding_dim: Option<usize>,
    default_threshold: Option<f32>,
    index_rebuild_threshold: Option<usize>,
    recency_window_secs: Option<u64>,
    notify_cooldown_secs: Option<u64>,
    calibrate_interval_secs: Option<u64>,
    notify_command: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `FACEDB_*` environment variables, on top of
    /// the TOML file named by `FACEDB_CONFIG` if set.
    pub fn from_env() -> Result<Self> {
        let file = match std::env::var("FACEDB_CONFIG") {
            Ok(path) => read_file(Path::new(&path))?,
            Err(_) => FileConfig::default(),
        };
        let config = Self::resolve(file, default_data_dir(), |key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// `clear` empties the samples directory, so it must not be the one
    /// holding the database.
    fn validate(&self) -> Result<()> {
        if facedb_store::store::holds_database(&self.samples_dir, &self.db_path) {
            bail!(
                "samples_dir {} must not be the directory containing db_path {}",
                self.samples_dir.display(),
                self.db_path.display()
            );
        }
        Ok(())
    }

    fn resolve(file: FileConfig, data_dir: PathBuf, env: impl Fn(&str) -> Option<String>) -> Self {
        let path = |key: &str, from_file: Option<PathBuf>, default: PathBuf| {
            env(key).map(PathBuf::from).or(from_file).unwrap_or(default)
        };

        Self {
            db_path: path("FACEDB_DB_PATH", file.db_path, data_dir.join("faces.db")),
            samples_dir: path("FACEDB_SAMPLES_DIR", file.samples_dir, data_dir.join("samples")),
            embedding_dim: parsed(&env, "FACEDB_EMBEDDING_DIM", file.embedding_dim, DEFAULT_EMBEDDING_DIM),
            default_threshold: parsed(
                &env,
                "FACEDB_DEFAULT_THRESHOLD",
                file.default_threshold,
                facedb_store::store::DEFAULT_ACCEPTANCE_THRESHOLD,
            ),
            index_rebuild_threshold: parsed(
                &env,
                "FACEDB_INDEX_REBUILD_THRESHOLD",
                file.index_rebuild_threshold,
                facedb_store::store::DEFAULT_INDEX_REBUILD_THRESHOLD,
            ),
            recency_window_secs: parsed(
                &env,
                "FACEDB_RECENCY_WINDOW_SECS",
                file.recency_window_secs,
                facedb_store::DEFAULT_RECENCY_WINDOW.as_secs(),
            ),
            notify_cooldown_secs: parsed(
                &env,
                "FACEDB_NOTIFY_COOLDOWN_SECS",
                file.notify_cooldown_secs,
                crate::notify::DEFAULT_NOTIFY_COOLDOWN.as_secs(),
            ),
            calibrate_interval_secs: parsed(
                &env,
                "FACEDB_CALIBRATE_INTERVAL_SECS",
                file.calibrate_interval_secs,
                300,
            ),
            notify_command: env("FACEDB_NOTIFY_COMMAND")
                .map(PathBuf::from)
                .or(file.notify_command),
        }
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            embedding_dim: self.embedding_dim,
            default_threshold: self.default_threshold,
            samples_dir: self.samples_dir.clone(),
            index_rebuild_threshold: self.index_rebuild_threshold,
        }
    }

    pub fn recency_window(&self) -> Duration {
        Duration::from_secs(self.recency_window_secs)
    }

    pub fn notify_cooldown(&self) -> Duration {
        Duration::from_secs(self.notify_cooldown_secs)
    }

    pub fn calibrate_interval(&self) -> Duration {
        // A zero interval would make tokio's interval panic.
        Duration::from_secs(self.calibrate_interval_secs.max(1))
    }
}

fn read_file(path: &Path) -> Result<FileConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read config file {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("invalid config file {}", path.display()))
}

/// `$XDG_DATA_HOME/facedb`, falling back to `~/.local/share/facedb`.
fn default_data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facedb")
}

/// Environment value if it parses, else the file value, else `default`.
fn parsed<T: std::str::FromStr>(
    env: &impl Fn(&str) -> Option<String>,
    key: &str,
    from_file: Option<T>,
    default: T,
) -> T {
    match env(key).map(|v| v.parse::<T>()) {
        Some(Ok(value)) => value,
        Some(Err(_)) => {
            tracing::warn!(key, "ignoring unparseable environment value");
            from_file.unwrap_or(default)
        }
        None => from_file.unwrap_or(default),
    }
}
