use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use facedb_core::{Embedding, Observation, Pca};
use facedb_store::store::check_embedding;
use facedb_store::{LabelFilter, Record, RecordStore, SampleImages};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod notify;

use config::Config;
use notify::{Alerts, CommandNotifier, CooldownGate, LogNotifier, Notifier};

#[derive(Parser)]
#[command(name = "facedb", about = "Face identity store: review, relabel, calibrate and ingest")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List stored identities
    List {
        /// Only identities still labeled Unknown
        #[arg(long)]
        unknown: bool,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show one identity and its samples
    Show {
        /// Record ID
        id: String,
    },
    /// Give an identity a name
    Label {
        /// Record ID
        id: String,
        /// New label (e.g., "Alice")
        name: String,
    },
    /// Set one identity's acceptance threshold
    Threshold {
        /// Record ID
        id: String,
        value: f32,
    },
    /// Set every identity's acceptance threshold
    ThresholdAll { value: f32 },
    /// Delete an identity and its crops
    Remove {
        /// Record ID
        id: String,
    },
    /// Delete one sample from an identity
    RemoveSample {
        /// Record ID
        id: String,
        sample_id: String,
    },
    /// Delete every identity and every crop
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Delete Unknown identities
    ClearUnknown {
        /// Keep the most recent Unknown, trimmed to its newest sample
        #[arg(long)]
        keep_latest: bool,
    },
    /// Recompute every acceptance threshold from sample spread
    Calibrate,
    /// Project every sample onto two principal axes
    Project {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Feed observations from a JSON-lines file
    Ingest {
        /// One `{"embedding": [...], "image": "...", "timestamp": ...}` per line
        file: PathBuf,
    },
    /// Feed observations from stdin until interrupted
    Watch,
}

/// One observation as read from a JSON line.
#[derive(Debug, Deserialize)]
struct ObservationLine {
    embedding: Vec<f32>,
    /// Face crop to copy into the samples directory.
    image: PathBuf,
    /// Epoch seconds; defaults to now.
    #[serde(default)]
    timestamp: Option<i64>,
}

/// Row printed by `list` and `show`.
#[derive(Debug, Serialize)]
struct RecordSummary<'a> {
    global_id: &'a str,
    label: &'a str,
    samples: usize,
    acceptance_threshold: f32,
    last_sample_time: i64,
}

impl<'a> From<&'a Record> for RecordSummary<'a> {
    fn from(record: &'a Record) -> Self {
        Self {
            global_id: &record.global_id,
            label: &record.label,
            samples: record.num_samples(),
            acceptance_threshold: record.acceptance_threshold,
            last_sample_time: record.last_sample_time,
        }
    }
}

/// One sample (or record centroid) on the 2-D projection.
#[derive(Debug, Serialize)]
struct ProjectedPoint {
    global_id: String,
    label: String,
    /// None for a record's centroid.
    sample_id: Option<String>,
    x: f64,
    y: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let store = RecordStore::open(&config.db_path, config.store_config())
        .with_context(|| format!("cannot open store at {}", config.db_path.display()))?;

    match cli.command {
        Commands::List { unknown, json } => {
            let filter = if unknown {
                LabelFilter::Unknown
            } else {
                LabelFilter::All
            };
            let records = store.list_records(filter)?;
            if json {
                let rows: Vec<RecordSummary> = records.iter().map(RecordSummary::from).collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if records.is_empty() {
                println!("No identities stored");
            } else {
                for record in &records {
                    print_summary(record);
                }
            }
        }
        Commands::Show { id } => {
            let record = store.get_record(&id)?;
            print_summary(&record);
            for sample in &record.samples {
                println!("  {}  {}", sample.sample_id, sample.image_reference.display());
            }
        }
        Commands::Label { id, name } => {
            let record = store.update_label(&id, &name)?;
            println!("{} is now {}", record.global_id, record.label);
        }
        Commands::Threshold { id, value } => {
            store.update_threshold(&id, value)?;
            println!("Threshold of {id} set to {value:.3}");
        }
        Commands::ThresholdAll { value } => {
            let updated = store.update_threshold_for_all(value)?;
            println!("Threshold set to {value:.3} on {updated} identities");
        }
        Commands::Remove { id } => {
            store.delete_record(&id)?;
            println!("Removed {id}");
        }
        Commands::RemoveSample { id, sample_id } => {
            if store.remove_sample(&id, &sample_id)? {
                println!("Removed last sample; {id} deleted");
            } else {
                println!("Removed sample {sample_id}");
            }
        }
        Commands::Clear { yes } => {
            if !yes {
                bail!("refusing to delete every identity without --yes");
            }
            let removed = store.clear_all()?;
            println!("Removed {removed} identities");
        }
        Commands::ClearUnknown { keep_latest } => {
            if keep_latest {
                let report = store.clear_unknown_keep_latest(config.recency_window(), now())?;
                println!(
                    "Removed {} Unknown identities, trimmed {} samples",
                    report.records_deleted, report.samples_removed
                );
                if let Some(kept) = report.kept {
                    println!("Kept {kept}");
                }
            } else {
                let removed = store.clear_unknown()?;
                println!("Removed {removed} Unknown identities");
            }
        }
        Commands::Calibrate => {
            for (id, threshold) in store.calibrate()? {
                println!("{id}  {threshold:.3}");
            }
        }
        Commands::Project { json } => {
            let points = project(&store.list_records(LabelFilter::All)?)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&points)?);
            } else {
                for p in &points {
                    println!(
                        "{:>9.4} {:>9.4}  {:<16} {}  {}",
                        p.x,
                        p.y,
                        p.label,
                        p.global_id,
                        p.sample_id.as_deref().unwrap_or("(centroid)")
                    );
                }
            }
        }
        Commands::Ingest { file } => {
            let (created, matched) = ingest_file(&store, &file)?;
            println!("Ingested {} observations: {created} new, {matched} matched", created + matched);
        }
        Commands::Watch => watch(store, &config).await?,
    }

    Ok(())
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn format_time(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| secs.to_string())
}

fn print_summary(record: &Record) {
    println!(
        "{}  {:<16} samples={:<4} threshold={:.3}  last={}",
        record.global_id,
        record.label,
        record.num_samples(),
        record.acceptance_threshold,
        format_time(record.last_sample_time)
    );
}

/// Parse one JSON line and copy its crop into the samples directory.
///
/// The embedding is checked first so a rejected line leaves no crop behind.
fn load_observation(line: &str, images: &SampleImages, dim: usize) -> Result<Observation> {
    let parsed: ObservationLine = serde_json::from_str(line).context("malformed observation")?;
    let embedding = Embedding::new(parsed.embedding);
    check_embedding(&embedding, dim)?;
    let timestamp = parsed.timestamp.unwrap_or_else(now);
    let crop = images
        .import(&parsed.image, timestamp)
        .with_context(|| format!("cannot import crop {}", parsed.image.display()))?;
    Ok(Observation::new(embedding, crop, timestamp))
}

/// Returns `(created, matched)` counts.
fn ingest_file(store: &RecordStore, file: &Path) -> Result<(usize, usize)> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("cannot read {}", file.display()))?;

    let (mut created, mut matched) = (0, 0);
    for (n, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let observation = load_observation(line, store.images(), store.config().embedding_dim)
            .with_context(|| format!("{}:{}", file.display(), n + 1))?;
        let crop = observation.image_path.clone();
        let ingested = match store.ingest(observation) {
            Ok(ingested) => ingested,
            Err(e) => {
                store.images().remove(&crop);
                return Err(e).with_context(|| format!("{}:{}", file.display(), n + 1));
            }
        };
        if ingested.created {
            created += 1;
        } else {
            matched += 1;
        }
    }
    Ok((created, matched))
}

/// Fit a 2-axis PCA over every sample and place each sample and each
/// record's centroid on it.
fn project(records: &[Record]) -> Result<Vec<ProjectedPoint>> {
    let embeddings: Vec<Embedding> = records.iter().flat_map(|r| r.sample_embeddings()).collect();
    let pca = Pca::fit(&embeddings, 2).context("not enough samples to project")?;
    let axis = |coords: &[f64]| {
        (
            coords.first().copied().unwrap_or(0.0),
            coords.get(1).copied().unwrap_or(0.0),
        )
    };

    let mut points = Vec::with_capacity(embeddings.len() + records.len());
    let mut row = 0;
    for record in records {
        for sample in &record.samples {
            let coords: Vec<f64> = pca.projected.row(row).to_vec();
            let (x, y) = axis(&coords);
            points.push(ProjectedPoint {
                global_id: record.global_id.clone(),
                label: record.label.clone(),
                sample_id: Some(sample.sample_id.clone()),
                x,
                y,
            });
            row += 1;
        }
        let centroid = pca.transform(&record.average_embedding)?.to_vec();
        let (x, y) = axis(&centroid);
        points.push(ProjectedPoint {
            global_id: record.global_id.clone(),
            label: record.label.clone(),
            sample_id: None,
            x,
            y,
        });
    }
    Ok(points)
}

/// Long-running mode: observations arrive as JSON lines on stdin, thresholds
/// are recalibrated periodically, and Unknowns are consolidated on shutdown.
async fn watch(store: RecordStore, config: &Config) -> Result<()> {
    let images = store.images().clone();
    let dim = store.config().embedding_dim;
    let notifier: Box<dyn Notifier> = match &config.notify_command {
        Some(program) => Box::new(CommandNotifier::new(program.clone())),
        None => Box::new(LogNotifier),
    };
    let alerts = Alerts::new(CooldownGate::new(config.notify_cooldown()), notifier);
    let engine = engine::spawn_engine(store, alerts)?;
    tracing::info!("facedb watching stdin");

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(config.calibrate_interval());
    // The first tick completes immediately.
    ticker.tick().await;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            read = lines.next_line() => {
                let line = match next_input(read) {
                    Input::Line(line) => line,
                    Input::Skip => continue,
                    Input::End => break,
                };
                if line.trim().is_empty() {
                    continue;
                }
                let loader = images.clone();
                let loaded = tokio::task::spawn_blocking(move || load_observation(&line, &loader, dim)).await?;
                match loaded {
                    Ok(observation) => {
                        let crop = observation.image_path.clone();
                        if let Err(e) = engine.observe(observation).await {
                            tracing::warn!(error = %e, "observation rejected");
                            images.remove(&crop);
                        }
                    }
                    Err(e) => tracing::warn!(error = %format!("{e:#}"), "skipping input line"),
                }
            }
            _ = ticker.tick() => {
                match engine.calibrate(now()).await {
                    Ok(updated) => tracing::debug!(updated, "periodic calibration"),
                    Err(e) => tracing::warn!(error = %e, "periodic calibration failed"),
                }
            }
            _ = &mut shutdown => break,
        }
    }

    tracing::info!("facedb shutting down");
    let report = engine.consolidate(config.recency_window(), now()).await?;
    tracing::info!(
        deleted = report.records_deleted,
        trimmed = report.samples_removed,
        "session consolidated"
    );
    engine.calibrate(now()).await?;
    Ok(())
}

/// One read from the observation stream.
enum Input {
    Line(String),
    Skip,
    End,
}

/// A line that is not UTF-8 is skipped like any other bad line. Any other
/// read error ends the session, which still gets consolidated.
fn next_input(read: std::io::Result<Option<String>>) -> Input {
    match read {
        Ok(Some(line)) => Input::Line(line),
        Ok(None) => Input::End,
        Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
            tracing::warn!(error = %e, "skipping undecodable input line");
            Input::Skip
        }
        Err(e) => {
            tracing::error!(error = %e, "cannot read stdin, stopping");
            Input::End
        }
    }
}
