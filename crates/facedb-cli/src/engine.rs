use std::time::Duration;

use facedb_core::Observation;
use facedb_store::{ConsolidationReport, Ingested, RecordStore, StoreError};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::notify::{Alerts, Detection};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("cannot start engine thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Messages sent to the engine thread.
enum EngineRequest {
    Observe {
        observation: Observation,
        reply: oneshot::Sender<Result<Ingested, EngineError>>,
    },
    Calibrate {
        now: i64,
        reply: oneshot::Sender<Result<usize, EngineError>>,
    },
    Consolidate {
        recency_window: Duration,
        now: i64,
        reply: oneshot::Sender<Result<ConsolidationReport, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Match an observation, store it, and alert on it.
    pub async fn observe(&self, observation: Observation) -> Result<Ingested, EngineError> {
        self.request(|reply| EngineRequest::Observe { observation, reply })
            .await
    }

    /// Recalibrate every record's threshold and drop expired alert
    /// cooldowns. Returns how many thresholds were updated.
    pub async fn calibrate(&self, now: i64) -> Result<usize, EngineError> {
        self.request(|reply| EngineRequest::Calibrate { now, reply })
            .await
    }

    /// Collapse Unknown records to the latest one.
    pub async fn consolidate(
        &self,
        recency_window: Duration,
        now: i64,
    ) -> Result<ConsolidationReport, EngineError> {
        self.request(|reply| EngineRequest::Consolidate {
            recency_window,
            now,
            reply,
        })
        .await
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T, EngineError>>) -> EngineRequest,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// The thread owns the store and serializes every request, so store writes
/// never race each other. It exits once every handle is dropped.
pub fn spawn_engine(store: RecordStore, mut alerts: Alerts) -> Result<EngineHandle, EngineError> {
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(16);

    std::thread::Builder::new()
        .name("facedb-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Observe { observation, reply } => {
                        let result = run_observe(&store, &mut alerts, observation);
                        let _ = reply.send(result);
                    }
                    EngineRequest::Calibrate { now, reply } => {
                        prune_cooldowns(&mut alerts, now);
                        let result = store.calibrate().map(|applied| applied.len());
                        let _ = reply.send(result.map_err(EngineError::from));
                    }
                    EngineRequest::Consolidate {
                        recency_window,
                        now,
                        reply,
                    } => {
                        prune_cooldowns(&mut alerts, now);
                        let result = store.clear_unknown_keep_latest(recency_window, now);
                        let _ = reply.send(result.map_err(EngineError::from));
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })?;

    Ok(EngineHandle { tx })
}

fn prune_cooldowns(alerts: &mut Alerts, now: i64) {
    let gate = alerts.gate_mut();
    gate.prune(now);
    tracing::debug!(tracked = gate.tracked(), "alert cooldowns pruned");
}

fn run_observe(
    store: &RecordStore,
    alerts: &mut Alerts,
    observation: Observation,
) -> Result<Ingested, EngineError> {
    let timestamp = observation.timestamp;
    let image = observation.image_path.clone();
    let ingested = store.ingest(observation)?;

    tracing::debug!(
        global_id = %ingested.record.global_id,
        label = %ingested.record.label,
        similarity = ingested.similarity,
        created = ingested.created,
        "observation stored"
    );

    alerts.observe(&Detection::from_ingested(&ingested, image), timestamp);
    Ok(ingested)
}
