//! Single-flight update queue, polling loop and model lifecycle operations

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use cashcast_core::{
    BayesianUpdateEngine, ModelState, ModelSummary, Observation, ObservationExtractor,
    PredictionEngine, RateRecord, Timestamp,
};
use cashcast_ports::{Clock, HistoryOrder, HistorySource, ModelSyncPayload, ModelSyncSink};
use cashcast_store::PersistenceError;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::anomaly::{Anomaly, AnomalyDetector, DEFAULT_MIN_UPSIZE_PCT, DEFAULT_SIGMA_THRESHOLD};
use crate::bus::{EventBus, Subscription};
use crate::error::{OrchestratorError, Result};
use crate::events::OrchestratorEvent;
use crate::model::SharedModel;
use crate::validation::{ValidationReport, validate};

/// Shortest allowed polling interval
pub const MIN_UPDATE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub update_interval: Duration,
    /// Records requested per poll
    pub history_limit: usize,
    /// Records requested by a forced resync
    pub resync_history_limit: usize,
    pub detect_anomalies: bool,
    /// Push posteriors to the sync sink after every batch
    pub sync_after_update: bool,
    pub event_capacity: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            update_interval: Duration::from_secs(300),
            history_limit: 100,
            resync_history_limit: 500,
            detect_anomalies: true,
            sync_after_update: false,
            event_capacity: 1024,
        }
    }
}

/// Input of one queued update
#[derive(Debug, Clone, PartialEq)]
pub enum WorkBatch {
    /// Raw records; observations are extracted and anomalies checked
    Records(Vec<RateRecord>),
    /// Ready-made observations, e.g. from the live feed
    Observations(Vec<Observation>),
}

impl WorkBatch {
    pub fn len(&self) -> usize {
        match self {
            WorkBatch::Records(records) => records.len(),
            WorkBatch::Observations(observations) => observations.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

enum WorkItem {
    Update {
        model: SharedModel,
        batch: WorkBatch,
    },
    Rebuild {
        model: SharedModel,
        records: Vec<RateRecord>,
        reply: oneshot::Sender<Result<String>>,
    },
    Restore {
        model: SharedModel,
        reply: oneshot::Sender<Result<Option<String>>>,
    },
    Barrier(oneshot::Sender<()>),
    Shutdown,
}

/// State shared between the orchestrator handles and its worker
struct Shared {
    bus: EventBus,
    history: Arc<dyn HistorySource>,
    sync: Option<Arc<dyn ModelSyncSink>>,
    clock: Arc<dyn Clock>,
    extractor: ObservationExtractor,
    engine: BayesianUpdateEngine,
    predictor: PredictionEngine,
    detector: AnomalyDetector,
    settings: OrchestratorSettings,
}

impl Shared {
    async fn process(&self, model: &SharedModel, batch: WorkBatch) {
        if batch.is_empty() {
            return;
        }
        let entity = model.entity().to_string();
        self.bus.publish(OrchestratorEvent::UpdateStarted {
            entity: entity.clone(),
            batch_size: batch.len(),
        });

        let (observations, records) = match batch {
            WorkBatch::Records(records) => (self.extractor.extract(&records), Some(records)),
            WorkBatch::Observations(observations) => (observations, None),
        };

        let now = self.clock.now();
        let updated = model.update(|state| {
            self.engine.apply_batch(state, &observations, now);
            state.clone()
        });

        let snapshot_key = match model.persistence().save(&updated).await {
            Ok(key) => Some(key),
            Err(e) => {
                log::error!("Snapshot of '{}' failed: {}", entity, e);
                self.bus.publish(OrchestratorEvent::Error {
                    message: format!("snapshot of '{entity}' failed: {e}"),
                });
                None
            }
        };

        log::info!(
            "Model '{}' updated: {} observations applied, {} total",
            entity,
            observations.len(),
            updated.observation_count()
        );
        self.bus.publish(OrchestratorEvent::UpdateCompleted {
            entity,
            observations_applied: observations.len(),
            total_observations: updated.observation_count(),
            snapshot_key,
        });

        if self.settings.detect_anomalies
            && let Some(records) = &records
        {
            self.detect_anomalies(model.entity(), &updated, records);
        }

        if self.settings.sync_after_update {
            self.sync(model).await;
        }
    }

    fn detect_anomalies(
        &self,
        entity: &str,
        state: &ModelState,
        records: &[RateRecord],
    ) -> Vec<Anomaly> {
        let anomalies = self.detector.detect(state, records);
        if !anomalies.is_empty() {
            log::warn!("{} anomalies detected for '{}'", anomalies.len(), entity);
            self.bus.publish(OrchestratorEvent::AnomaliesDetected {
                entity: entity.to_string(),
                anomalies: anomalies.clone(),
            });
        }
        anomalies
    }

    async fn sync(&self, model: &SharedModel) -> bool {
        let Some(sink) = &self.sync else {
            log::debug!("No sync sink configured, skipping sync");
            return false;
        };

        let state = model.state();
        let payload = ModelSyncPayload {
            posteriors: *state.posteriors(),
            observation_count: state.observation_count(),
            last_update: state.last_update(),
        };

        let entity = model.entity().to_string();
        match sink.push_model(&payload).await {
            Ok(()) => {
                self.bus.publish(OrchestratorEvent::SyncCompleted { entity });
                true
            }
            Err(e) => {
                log::warn!("Sync of '{}' failed: {}", entity, e);
                self.bus.publish(OrchestratorEvent::SyncFailed {
                    entity,
                    error: e.to_string(),
                });
                false
            }
        }
    }

    /// Rebuild from the model's priors, snapshot, then swap in
    async fn rebuild(&self, model: &SharedModel, records: Vec<RateRecord>) -> Result<String> {
        let now = self.clock.now();
        let mut fresh = model.state().fresh(now);
        let observations = self.extractor.extract(&records);
        self.engine.apply_batch(&mut fresh, &observations, now);

        let entity = model.entity().to_string();
        match model.persistence().save(&fresh).await {
            Ok(snapshot_key) => {
                let observation_count = fresh.observation_count();
                model.replace(fresh);
                log::info!(
                    "Model '{}' resynced from {} records ({} observations)",
                    entity,
                    records.len(),
                    observation_count
                );
                self.bus.publish(OrchestratorEvent::ForceResyncCompleted {
                    entity,
                    observation_count,
                    snapshot_key: snapshot_key.clone(),
                });
                Ok(snapshot_key)
            }
            Err(e) => {
                self.bus.publish(OrchestratorEvent::ForceResyncFailed {
                    entity,
                    error: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    /// Swap in the latest snapshot, or a fresh model if there is none
    ///
    /// Storage failures leave the live state untouched.
    async fn restore(&self, model: &SharedModel) -> Result<Option<String>> {
        let entity = model.entity().to_string();
        match model.persistence().load_latest().await {
            Ok(snapshot) => {
                log::info!(
                    "Restored '{}' from {} ({} observations)",
                    entity,
                    snapshot.snapshot_key,
                    snapshot.model_state.observation_count()
                );
                model.replace(snapshot.model_state);
                self.bus.publish(OrchestratorEvent::ModelRestored {
                    entity,
                    snapshot_key: Some(snapshot.snapshot_key.clone()),
                });
                Ok(Some(snapshot.snapshot_key))
            }
            Err(PersistenceError::NotFound(_)) => {
                log::info!("No snapshot for '{}', starting fresh", entity);
                model.replace(model.state().fresh(self.clock.now()));
                self.bus.publish(OrchestratorEvent::ModelRestored {
                    entity,
                    snapshot_key: None,
                });
                Ok(None)
            }
            Err(e) => {
                log::warn!("Restoring '{}' failed, keeping current state: {}", entity, e);
                self.bus.publish(OrchestratorEvent::Error {
                    message: format!("restore of '{entity}' failed: {e}"),
                });
                Err(e.into())
            }
        }
    }
}

async fn run_worker(shared: Arc<Shared>, mut queue: mpsc::UnboundedReceiver<WorkItem>) {
    log::debug!("Update worker started");
    while let Some(item) = queue.recv().await {
        match item {
            WorkItem::Update { model, batch } => shared.process(&model, batch).await,
            WorkItem::Rebuild {
                model,
                records,
                reply,
            } => {
                let _ = reply.send(shared.rebuild(&model, records).await);
            }
            WorkItem::Restore { model, reply } => {
                let _ = reply.send(shared.restore(&model).await);
            }
            WorkItem::Barrier(done) => {
                let _ = done.send(());
            }
            WorkItem::Shutdown => break,
        }
    }
    log::info!("Update worker stopped");
}

/// Builder for [`UpdateOrchestrator`]
pub struct OrchestratorBuilder {
    history: Arc<dyn HistorySource>,
    clock: Arc<dyn Clock>,
    sync: Option<Arc<dyn ModelSyncSink>>,
    predictor: PredictionEngine,
    settings: OrchestratorSettings,
    extractor: ObservationExtractor,
    thresholds: (f64, f64),
}

impl OrchestratorBuilder {
    pub fn sync_sink(mut self, sink: Arc<dyn ModelSyncSink>) -> Self {
        self.sync = Some(sink);
        self
    }

    pub fn predictor(mut self, predictor: PredictionEngine) -> Self {
        self.predictor = predictor;
        self
    }

    pub fn settings(mut self, settings: OrchestratorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Dead band and minimum interval used to turn records into observations
    pub fn extractor(mut self, extractor: ObservationExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn anomaly_thresholds(mut self, sigma_threshold: f64, min_upsize_pct: f64) -> Self {
        self.thresholds = (sigma_threshold, min_upsize_pct);
        self
    }

    /// Start the worker task; must be called within a tokio runtime
    pub fn spawn(self) -> UpdateOrchestrator {
        let interval = self.settings.update_interval.max(MIN_UPDATE_INTERVAL);
        let shared = Arc::new(Shared {
            bus: EventBus::new(self.settings.event_capacity),
            history: self.history,
            sync: self.sync,
            clock: self.clock,
            extractor: self.extractor,
            engine: BayesianUpdateEngine::new(),
            detector: AnomalyDetector::new(self.predictor.clone())
                .with_thresholds(self.thresholds.0, self.thresholds.1),
            predictor: self.predictor,
            settings: self.settings,
        });

        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(Arc::clone(&shared), queue_rx));
        let (interval_tx, _) = watch::channel(interval);

        UpdateOrchestrator {
            shared,
            queue: queue_tx,
            worker: Arc::new(Mutex::new(Some(worker))),
            interval: Arc::new(interval_tx),
            paused: Arc::new(AtomicBool::new(false)),
            watermark: Arc::new(Mutex::new(None)),
        }
    }
}

/// Serializes every model mutation through one worker task
///
/// Cheap to clone; all clones drive the same queue and event bus.
#[derive(Clone)]
pub struct UpdateOrchestrator {
    shared: Arc<Shared>,
    queue: mpsc::UnboundedSender<WorkItem>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
    interval: Arc<watch::Sender<Duration>>,
    paused: Arc<AtomicBool>,
    watermark: Arc<Mutex<Option<Timestamp>>>,
}

impl UpdateOrchestrator {
    pub fn builder(history: Arc<dyn HistorySource>, clock: Arc<dyn Clock>) -> OrchestratorBuilder {
        OrchestratorBuilder {
            history,
            clock,
            sync: None,
            predictor: PredictionEngine::default(),
            settings: OrchestratorSettings::default(),
            extractor: ObservationExtractor::default(),
            thresholds: (DEFAULT_SIGMA_THRESHOLD, DEFAULT_MIN_UPSIZE_PCT),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.shared.bus
    }

    /// Subscribe to lifecycle events; drop the subscription to unsubscribe
    pub fn subscribe(&self) -> Subscription {
        self.shared.bus.subscribe()
    }

    pub fn predictor(&self) -> &PredictionEngine {
        &self.shared.predictor
    }

    /// Queue a batch for `model`. Never blocks; empty batches are ignored.
    pub fn enqueue(&self, model: &SharedModel, batch: WorkBatch) {
        if batch.is_empty() {
            return;
        }
        let item = WorkItem::Update {
            model: model.clone(),
            batch,
        };
        if self.queue.send(item).is_err() {
            log::warn!("Update for '{}' dropped: worker stopped", model.entity());
        }
    }

    /// Wait until everything queued before this call has been processed
    pub async fn flush(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.queue
            .send(WorkItem::Barrier(done_tx))
            .map_err(|_| OrchestratorError::Stopped)?;
        done_rx.await.map_err(|_| OrchestratorError::Stopped)
    }

    /// Fetch recent history and keep only records newer than the last poll
    ///
    /// The first call returns the whole batch. Failures are published as
    /// [`OrchestratorEvent::Error`] and yield no records.
    pub async fn check_for_new_data(&self) -> Vec<RateRecord> {
        let records = match self
            .shared
            .history
            .fetch_history(self.shared.settings.history_limit, HistoryOrder::Desc)
            .await
        {
            Ok(records) => records,
            Err(e) => {
                log::warn!("Checking for new data failed: {}", e);
                self.shared.bus.publish(OrchestratorEvent::Error {
                    message: format!("checking for new data failed: {e}"),
                });
                return Vec::new();
            }
        };

        let now = self.shared.clock.now();
        let fresh = {
            let mut watermark = self.watermark.lock();
            let fresh: Vec<RateRecord> = match *watermark {
                None => records,
                Some(mark) => records
                    .into_iter()
                    .filter(|record| record.scraped_at > mark)
                    .collect(),
            };
            if watermark.is_none() || !fresh.is_empty() {
                *watermark = Some(now);
            }
            fresh
        };

        if !fresh.is_empty() {
            self.shared.bus.publish(OrchestratorEvent::NewDataDetected {
                count: fresh.len(),
            });
        }
        fresh
    }

    /// One polling step: check for new data and queue it for `model`
    pub async fn poll_once(&self, model: &SharedModel) -> usize {
        let records = self.check_for_new_data().await;
        let count = records.len();
        self.enqueue(model, WorkBatch::Records(records));
        count
    }

    /// Poll now, then every update interval, until the handle is dropped
    pub fn start_auto_update(&self, model: SharedModel) -> AutoUpdateHandle {
        let orchestrator = self.clone();
        let mut interval_rx = self.interval.subscribe();
        log::info!(
            "Auto-update started for '{}' every {:?}",
            model.entity(),
            *interval_rx.borrow()
        );

        let task = tokio::spawn(async move {
            loop {
                if orchestrator.is_paused() {
                    log::debug!("Auto-update paused, skipping poll");
                } else {
                    orchestrator.poll_once(&model).await;
                }

                let mut deadline = Instant::now() + *interval_rx.borrow_and_update();
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep_until(deadline) => break,
                        changed = interval_rx.changed() => {
                            if changed.is_err() {
                                return;
                            }
                            deadline = Instant::now() + *interval_rx.borrow_and_update();
                        }
                    }
                }
            }
        });

        AutoUpdateHandle { task }
    }

    /// Change the polling interval (at least [`MIN_UPDATE_INTERVAL`]);
    /// returns the interval actually applied
    pub fn set_update_interval(&self, interval: Duration) -> Duration {
        let interval = interval.max(MIN_UPDATE_INTERVAL);
        self.interval.send_replace(interval);
        self.shared
            .bus
            .publish(OrchestratorEvent::UpdateIntervalChanged { interval });
        interval
    }

    pub fn update_interval(&self) -> Duration {
        *self.interval.borrow()
    }

    pub fn pause_auto_update(&self) {
        self.paused.store(true, Ordering::SeqCst);
        self.shared.bus.publish(OrchestratorEvent::AutoUpdatePaused);
    }

    pub fn resume_auto_update(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.shared.bus.publish(OrchestratorEvent::AutoUpdateResumed);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Check records against the model's current predictions
    pub fn detect_anomalies(&self, model: &SharedModel, records: &[RateRecord]) -> Vec<Anomaly> {
        self.shared
            .detect_anomalies(model.entity(), &model.state(), records)
    }

    pub fn validate(&self, model: &SharedModel) -> ValidationReport {
        validate(&model.state(), &self.shared.predictor)
    }

    pub fn summarize(&self, model: &SharedModel) -> Result<ModelSummary> {
        let summary = self
            .shared
            .predictor
            .summarize(&model.state(), self.shared.clock.now())?;
        Ok(summary)
    }

    /// Push the model's posteriors to the sync sink; failures become events
    pub async fn sync_to_backend(&self, model: &SharedModel) -> bool {
        self.shared.sync(model).await
    }

    /// Rebuild `model` from a large history window, replacing its state
    pub async fn force_resync(&self, model: &SharedModel) -> Result<String> {
        let entity = model.entity().to_string();
        self.shared
            .bus
            .publish(OrchestratorEvent::ForceResyncStarted {
                entity: entity.clone(),
            });

        let records = match self
            .shared
            .history
            .fetch_history(self.shared.settings.resync_history_limit, HistoryOrder::Desc)
            .await
        {
            Ok(records) => records,
            Err(e) => {
                log::warn!("Force resync of '{}' failed: {}", entity, e);
                self.shared
                    .bus
                    .publish(OrchestratorEvent::ForceResyncFailed {
                        entity,
                        error: e.to_string(),
                    });
                return Err(e.into());
            }
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        self.queue
            .send(WorkItem::Rebuild {
                model: model.clone(),
                records,
                reply: reply_tx,
            })
            .map_err(|_| OrchestratorError::Stopped)?;
        reply_rx.await.map_err(|_| OrchestratorError::Stopped)?
    }

    /// Load the latest snapshot into `model`
    ///
    /// With no usable snapshot the model is reset to a fresh one from its
    /// priors; storage errors are returned and the model is left as is.
    pub async fn restore_latest(&self, model: &SharedModel) -> Result<Option<String>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.queue
            .send(WorkItem::Restore {
                model: model.clone(),
                reply: reply_tx,
            })
            .map_err(|_| OrchestratorError::Stopped)?;
        reply_rx.await.map_err(|_| OrchestratorError::Stopped)?
    }

    /// Keep only the newest `keep` snapshots of `model`
    pub async fn clean_old_snapshots(&self, model: &SharedModel, keep: usize) -> Result<usize> {
        let deleted = model.persistence().prune(keep).await?;
        if deleted > 0 {
            self.shared
                .bus
                .publish(OrchestratorEvent::CleanupCompleted {
                    entity: model.entity().to_string(),
                    deleted,
                    kept: keep,
                });
        }
        Ok(deleted)
    }

    /// Process everything already queued, then stop the worker
    pub async fn shutdown(&self) {
        let _ = self.queue.send(WorkItem::Shutdown);
        let worker = self.worker.lock().take();
        if let Some(worker) = worker
            && let Err(e) = worker.await
        {
            log::warn!("Update worker ended abnormally: {}", e);
        }
    }
}

/// Running auto-update loop; dropping the handle stops it
pub struct AutoUpdateHandle {
    task: JoinHandle<()>,
}

impl AutoUpdateHandle {
    pub fn cancel(self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for AutoUpdateHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
