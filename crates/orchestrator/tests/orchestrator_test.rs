//! Queue, polling and lifecycle behaviour of the update orchestrator

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use cashcast_clock::ManualClock;
use cashcast_core::{Observation, ObservationExtractor, RateRecord, Timestamp};
use cashcast_orchestrator::{
    Anomaly, ModelRegistry, OrchestratorBuilder, OrchestratorEvent, OrchestratorSettings,
    SharedModel, Subscription, UpdateOrchestrator, WorkBatch,
};
use cashcast_ports::{
    Clock, FetchError, FetchResult, HistoryOrder, HistorySource, KeyValueStore, ModelSyncPayload,
    ModelSyncSink, StoreError, StoreResult,
};
use cashcast_store::InMemoryKeyValueStore;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn t0() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

fn record(store: &str, rate: f64, at: Timestamp) -> RateRecord {
    RateRecord {
        store_id: store.to_string(),
        store_name: Some(format!("{store} shop")),
        category: None,
        main_rate: Some(rate),
        category_rate: None,
        is_upsized: false,
        scraped_at: at,
    }
}

/// History source replaying queued responses, then empty batches
#[derive(Default)]
struct ScriptedHistory {
    responses: Mutex<VecDeque<FetchResult<Vec<RateRecord>>>>,
    limits: Mutex<Vec<usize>>,
    calls: AtomicUsize,
}

impl ScriptedHistory {
    fn push(&self, response: FetchResult<Vec<RateRecord>>) {
        self.responses.lock().push_back(response);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HistorySource for ScriptedHistory {
    async fn fetch_history(
        &self,
        limit: usize,
        order: HistoryOrder,
    ) -> FetchResult<Vec<RateRecord>> {
        assert_eq!(order, HistoryOrder::Desc);
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.limits.lock().push(limit);
        self.responses.lock().pop_front().unwrap_or(Ok(Vec::new()))
    }
}

#[derive(Default)]
struct RecordingSink {
    payloads: Mutex<Vec<ModelSyncPayload>>,
    fail: bool,
}

#[async_trait]
impl ModelSyncSink for RecordingSink {
    async fn push_model(&self, payload: &ModelSyncPayload) -> FetchResult<()> {
        if self.fail {
            return Err(FetchError::Status {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        self.payloads.lock().push(payload.clone());
        Ok(())
    }
}

/// In-memory store whose reads can be switched to fail
#[derive(Default)]
struct FlakyStore {
    inner: InMemoryKeyValueStore,
    fail_reads: AtomicBool,
}

impl FlakyStore {
    fn check(&self) -> StoreResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            Err(StoreError::Io("disk unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn put(&self, key: &str, value: String) -> StoreResult<()> {
        self.inner.put(key, value).await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.check()?;
        self.inner.list(prefix).await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.inner.delete(key).await
    }
}

struct Harness {
    clock: ManualClock,
    history: Arc<ScriptedHistory>,
    kv: Arc<dyn KeyValueStore>,
    registry: ModelRegistry,
    orchestrator: UpdateOrchestrator,
}

impl Harness {
    fn new(settings: OrchestratorSettings, sink: Option<Arc<RecordingSink>>) -> Self {
        Self::customized(settings, sink, |builder| builder)
    }

    fn customized(
        settings: OrchestratorSettings,
        sink: Option<Arc<RecordingSink>>,
        customize: impl FnOnce(OrchestratorBuilder) -> OrchestratorBuilder,
    ) -> Self {
        init_logging();
        let clock = ManualClock::new(t0());
        let history = Arc::new(ScriptedHistory::default());
        let kv: Arc<dyn KeyValueStore> = Arc::new(InMemoryKeyValueStore::new());
        let registry = ModelRegistry::new(Arc::clone(&kv), Arc::new(clock.clone()));

        let mut builder = UpdateOrchestrator::builder(
            Arc::clone(&history) as Arc<dyn HistorySource>,
            Arc::new(clock.clone()),
        )
        .settings(settings);
        if let Some(sink) = sink {
            builder = builder.sync_sink(sink);
        }

        Self {
            clock,
            history,
            kv,
            registry,
            orchestrator: customize(builder).spawn(),
        }
    }

    fn model(&self) -> SharedModel {
        self.registry.global()
    }
}

fn drain(sub: &mut Subscription) -> Vec<OrchestratorEvent> {
    std::iter::from_fn(|| sub.try_recv()).collect()
}

fn kinds(events: &[OrchestratorEvent]) -> Vec<&'static str> {
    events.iter().map(OrchestratorEvent::kind).collect()
}

#[tokio::test]
async fn test_check_for_new_data_filters_by_watermark() {
    let h = Harness::new(OrchestratorSettings::default(), None);
    let mut sub = h.orchestrator.subscribe();

    h.history.push(Ok(vec![
        record("s1", 5.0, t0() - chrono::Duration::hours(3)),
        record("s1", 6.0, t0() - chrono::Duration::hours(2)),
    ]));
    assert_eq!(h.orchestrator.check_for_new_data().await.len(), 2);

    h.clock.advance(chrono::Duration::hours(2));
    h.history.push(Ok(vec![
        record("s1", 6.0, t0() - chrono::Duration::hours(2)),
        record("s1", 7.0, t0() + chrono::Duration::hours(1)),
    ]));
    let fresh = h.orchestrator.check_for_new_data().await;
    assert_eq!(fresh.len(), 1);
    assert_eq!(fresh[0].main_rate, Some(7.0));

    h.history.push(Ok(vec![record("s1", 7.0, t0() + chrono::Duration::hours(1))]));
    assert!(h.orchestrator.check_for_new_data().await.is_empty());

    let events = drain(&mut sub);
    assert_eq!(
        events,
        vec![
            OrchestratorEvent::NewDataDetected { count: 2 },
            OrchestratorEvent::NewDataDetected { count: 1 },
        ]
    );
    assert_eq!(*h.history.limits.lock(), vec![100, 100, 100]);
}

#[tokio::test]
async fn test_fetch_failure_publishes_error_and_returns_nothing() {
    let h = Harness::new(OrchestratorSettings::default(), None);
    let mut sub = h.orchestrator.subscribe();

    h.history.push(Err(FetchError::Timeout));
    assert!(h.orchestrator.check_for_new_data().await.is_empty());

    let events = drain(&mut sub);
    assert_eq!(kinds(&events), vec!["error"]);
}

#[tokio::test]
async fn test_record_batch_updates_and_snapshots() {
    let settings = OrchestratorSettings {
        detect_anomalies: false,
        ..OrchestratorSettings::default()
    };
    let h = Harness::new(settings, None);
    let model = h.model();
    let mut sub = h.orchestrator.subscribe();

    let records = vec![
        record("s1", 5.0, t0()),
        record("s1", 5.5, t0() + chrono::Duration::days(2)),
        record("s1", 6.0, t0() + chrono::Duration::days(5)),
    ];
    h.orchestrator.enqueue(&model, WorkBatch::Records(records));
    h.orchestrator.flush().await.unwrap();

    assert_eq!(model.state().observation_count(), 2);
    let snapshots = model.persistence().list().await.unwrap();
    assert_eq!(snapshots.len(), 1);

    let events = drain(&mut sub);
    assert_eq!(kinds(&events), vec!["update_started", "update_completed"]);
    assert_eq!(
        events[1],
        OrchestratorEvent::UpdateCompleted {
            entity: "global".to_string(),
            observations_applied: 2,
            total_observations: 2,
            snapshot_key: Some(snapshots[0].key.clone()),
        }
    );
}

#[tokio::test]
async fn test_empty_batch_is_ignored() {
    let h = Harness::new(OrchestratorSettings::default(), None);
    let model = h.model();
    let mut sub = h.orchestrator.subscribe();

    h.orchestrator.enqueue(&model, WorkBatch::Records(Vec::new()));
    h.orchestrator.flush().await.unwrap();

    assert!(drain(&mut sub).is_empty());
    assert!(model.persistence().list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_enqueues_are_all_applied_once() {
    let h = Harness::new(OrchestratorSettings::default(), None);
    let model = h.model();

    let mut tasks = Vec::new();
    for i in 0..10 {
        let orchestrator = h.orchestrator.clone();
        let model = model.clone();
        tasks.push(tokio::spawn(async move {
            let obs = Observation::empty("feed", t0())
                .with_interval(1.0 + i as f64)
                .with_magnitude(0.1);
            orchestrator.enqueue(&model, WorkBatch::Observations(vec![obs]));
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    h.orchestrator.flush().await.unwrap();

    let state = model.state();
    assert_eq!(state.observation_count(), 10);
    // alpha starts at 2 and grows by one per interval
    assert_eq!(state.time().alpha(), 12.0);
    // snapshots are capped at the default history of five
    assert_eq!(model.persistence().list().await.unwrap().len(), 5);
}

#[tokio::test]
async fn test_anomalies_published_after_record_batch() {
    let h = Harness::new(OrchestratorSettings::default(), None);
    let model = h.model();
    let mut sub = h.orchestrator.subscribe();

    let records = vec![
        record("s1", 5.0, t0()),
        record("s1", 10.0, t0() + chrono::Duration::days(1)),
    ];
    h.orchestrator.enqueue(&model, WorkBatch::Records(records));
    h.orchestrator.flush().await.unwrap();

    let events = drain(&mut sub);
    let anomalies = events
        .iter()
        .find_map(|event| match event {
            OrchestratorEvent::AnomaliesDetected { anomalies, .. } => Some(anomalies.clone()),
            _ => None,
        })
        .expect("anomalies event");

    assert_eq!(anomalies.len(), 1);
    match &anomalies[0] {
        Anomaly::UnusualRate { rate, expected, .. } => {
            assert_eq!(*rate, 10.0);
            assert!((expected - 2.5).abs() < 1e-9);
        }
        other => panic!("unexpected anomaly {other:?}"),
    }
}

#[tokio::test]
async fn test_custom_extractor_widens_dead_band() {
    let settings = OrchestratorSettings {
        detect_anomalies: false,
        ..OrchestratorSettings::default()
    };
    let h = Harness::customized(settings, None, |builder| {
        builder.extractor(ObservationExtractor::new(1.0, 0.1))
    });
    let model = h.model();

    let records = vec![
        record("s1", 5.0, t0()),
        record("s1", 5.5, t0() + chrono::Duration::days(2)),
        record("s1", 7.0, t0() + chrono::Duration::days(5)),
    ];
    h.orchestrator.enqueue(&model, WorkBatch::Records(records));
    h.orchestrator.flush().await.unwrap();

    // the half point move stays inside the band
    assert_eq!(model.state().observation_count(), 1);
}

#[tokio::test]
async fn test_anomaly_thresholds_are_configurable() {
    let h = Harness::customized(OrchestratorSettings::default(), None, |builder| {
        builder.anomaly_thresholds(100.0, 10.0)
    });
    let model = h.model();
    let mut sub = h.orchestrator.subscribe();

    let records = vec![
        record("s1", 5.0, t0()),
        record("s1", 10.0, t0() + chrono::Duration::days(1)),
    ];
    h.orchestrator.enqueue(&model, WorkBatch::Records(records.clone()));
    h.orchestrator.flush().await.unwrap();

    let events = drain(&mut sub);
    assert!(!kinds(&events).contains(&"anomalies_detected"));
    assert!(h.orchestrator.detect_anomalies(&model, &records).is_empty());
}

#[tokio::test]
async fn test_sync_after_update_reports_success() {
    let sink = Arc::new(RecordingSink::default());
    let settings = OrchestratorSettings {
        sync_after_update: true,
        ..OrchestratorSettings::default()
    };
    let h = Harness::new(settings, Some(Arc::clone(&sink)));
    let model = h.model();
    let mut sub = h.orchestrator.subscribe();

    let obs = Observation::empty("feed", t0()).with_interval(2.0);
    h.orchestrator.enqueue(&model, WorkBatch::Observations(vec![obs]));
    h.orchestrator.flush().await.unwrap();

    let payloads = sink.payloads.lock().clone();
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].observation_count, 1);
    assert_eq!(payloads[0].posteriors, *model.state().posteriors());
    assert!(kinds(&drain(&mut sub)).contains(&"sync_completed"));
}

#[tokio::test]
async fn test_sync_failure_is_an_event_not_an_error() {
    let sink = Arc::new(RecordingSink {
        fail: true,
        ..RecordingSink::default()
    });
    let h = Harness::new(OrchestratorSettings::default(), Some(sink));
    let model = h.model();
    let mut sub = h.orchestrator.subscribe();

    assert!(!h.orchestrator.sync_to_backend(&model).await);
    let events = drain(&mut sub);
    assert!(matches!(
        &events[..],
        [OrchestratorEvent::SyncFailed { entity, .. }] if entity == "global"
    ));
}

#[tokio::test]
async fn test_sync_without_sink_is_skipped() {
    let h = Harness::new(OrchestratorSettings::default(), None);
    assert!(!h.orchestrator.sync_to_backend(&h.model()).await);
}

#[tokio::test]
async fn test_force_resync_rebuilds_from_priors() {
    let h = Harness::new(OrchestratorSettings::default(), None);
    let model = h.model();

    // Train on some unrelated history first
    let obs: Vec<_> = (0..4)
        .map(|_| Observation::empty("feed", t0()).with_interval(1.0))
        .collect();
    h.orchestrator.enqueue(&model, WorkBatch::Observations(obs));
    h.orchestrator.flush().await.unwrap();
    assert_eq!(model.state().observation_count(), 4);

    let mut sub = h.orchestrator.subscribe();
    h.history.push(Ok(vec![
        record("s1", 5.0, t0()),
        record("s1", 6.0, t0() + chrono::Duration::days(3)),
    ]));
    let key = h.orchestrator.force_resync(&model).await.unwrap();

    let state = model.state();
    assert_eq!(state.observation_count(), 1);
    assert_eq!(state.time().alpha(), 3.0);
    assert!((state.time().beta() - 3.1).abs() < 1e-9);
    assert_eq!(*h.history.limits.lock(), vec![500]);

    let events = drain(&mut sub);
    assert_eq!(
        events,
        vec![
            OrchestratorEvent::ForceResyncStarted {
                entity: "global".to_string()
            },
            OrchestratorEvent::ForceResyncCompleted {
                entity: "global".to_string(),
                observation_count: 1,
                snapshot_key: key.clone(),
            },
        ]
    );
    let latest = model.persistence().load_latest().await.unwrap();
    assert_eq!(latest.snapshot_key, key);
}

#[tokio::test]
async fn test_force_resync_fetch_failure_keeps_model() {
    let h = Harness::new(OrchestratorSettings::default(), None);
    let model = h.model();
    let obs = Observation::empty("feed", t0()).with_interval(1.0);
    h.orchestrator.enqueue(&model, WorkBatch::Observations(vec![obs]));
    h.orchestrator.flush().await.unwrap();

    let mut sub = h.orchestrator.subscribe();
    h.history.push(Err(FetchError::Network("connection refused".to_string())));
    assert!(h.orchestrator.force_resync(&model).await.is_err());

    assert_eq!(model.state().observation_count(), 1);
    assert_eq!(
        kinds(&drain(&mut sub)),
        vec!["force_resync_started", "force_resync_failed"]
    );
}

#[tokio::test]
async fn test_restore_latest_loads_snapshot() {
    let h = Harness::new(OrchestratorSettings::default(), None);
    let model = h.model();
    let obs: Vec<_> = (0..3)
        .map(|_| Observation::empty("feed", t0()).with_interval(2.0))
        .collect();
    h.orchestrator.enqueue(&model, WorkBatch::Observations(obs));
    h.orchestrator.flush().await.unwrap();
    let trained = model.state();

    // A second registry over the same store plays the role of a restart
    let restarted = ModelRegistry::new(Arc::clone(&h.kv), Arc::new(h.clock.clone()));
    let fresh_model = restarted.global();
    assert_eq!(fresh_model.state().observation_count(), 0);

    let mut sub = h.orchestrator.subscribe();
    let key = h.orchestrator.restore_latest(&fresh_model).await.unwrap();

    assert!(key.is_some());
    let restored = fresh_model.state();
    assert_eq!(restored.observation_count(), 3);
    assert_eq!(restored.last_update(), trained.last_update());
    assert_eq!(restored.time().alpha(), trained.time().alpha());
    assert!((restored.time().beta() - trained.time().beta()).abs() < 1e-9);
    assert_eq!(
        drain(&mut sub),
        vec![OrchestratorEvent::ModelRestored {
            entity: "global".to_string(),
            snapshot_key: key,
        }]
    );
}

#[tokio::test]
async fn test_restore_without_snapshot_starts_fresh() {
    let h = Harness::new(OrchestratorSettings::default(), None);
    let model = h.registry.get_or_create("store-9");

    assert_eq!(h.orchestrator.restore_latest(&model).await.unwrap(), None);
    assert_eq!(model.state().observation_count(), 0);
    assert_eq!(model.state().last_update(), h.clock.now());
}

#[tokio::test]
async fn test_restore_storage_error_keeps_learned_state() {
    let h = Harness::new(OrchestratorSettings::default(), None);
    let store = Arc::new(FlakyStore::default());
    let registry = ModelRegistry::new(
        Arc::clone(&store) as Arc<dyn KeyValueStore>,
        Arc::new(h.clock.clone()),
    );
    let model = registry.global();

    let obs: Vec<_> = (0..3)
        .map(|_| Observation::empty("feed", t0()).with_interval(2.0))
        .collect();
    h.orchestrator.enqueue(&model, WorkBatch::Observations(obs));
    h.orchestrator.flush().await.unwrap();
    let trained = model.state();
    assert_eq!(trained.observation_count(), 3);

    store.fail_reads.store(true, Ordering::SeqCst);
    let mut sub = h.orchestrator.subscribe();
    assert!(h.orchestrator.restore_latest(&model).await.is_err());

    assert_eq!(model.state(), trained);
    assert_eq!(kinds(&drain(&mut sub)), vec!["error"]);

    // Once the store recovers the snapshot is picked up again
    store.fail_reads.store(false, Ordering::SeqCst);
    assert!(h.orchestrator.restore_latest(&model).await.unwrap().is_some());
    assert_eq!(model.state().observation_count(), 3);
}

#[tokio::test]
async fn test_clean_old_snapshots() {
    let h = Harness::new(OrchestratorSettings::default(), None);
    let model = h.model();
    for _ in 0..4 {
        h.clock.advance(chrono::Duration::minutes(1));
        let obs = Observation::empty("feed", h.clock.now()).with_interval(1.0);
        h.orchestrator.enqueue(&model, WorkBatch::Observations(vec![obs]));
        h.orchestrator.flush().await.unwrap();
    }

    let mut sub = h.orchestrator.subscribe();
    assert_eq!(h.orchestrator.clean_old_snapshots(&model, 2).await.unwrap(), 2);
    assert_eq!(h.orchestrator.clean_old_snapshots(&model, 2).await.unwrap(), 0);

    assert_eq!(model.persistence().list().await.unwrap().len(), 2);
    assert_eq!(
        drain(&mut sub),
        vec![OrchestratorEvent::CleanupCompleted {
            entity: "global".to_string(),
            deleted: 2,
            kept: 2,
        }]
    );
}

#[tokio::test]
async fn test_validate_fresh_model_flags_few_observations() {
    let h = Harness::new(OrchestratorSettings::default(), None);
    let report = h.orchestrator.validate(&h.model());

    assert!(!report.valid);
    assert!(!report.errors.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_auto_update_polls_immediately_then_every_interval() {
    let settings = OrchestratorSettings {
        update_interval: Duration::from_secs(60),
        ..OrchestratorSettings::default()
    };
    let h = Harness::new(settings, None);
    let handle = h.orchestrator.start_auto_update(h.model());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.history.calls(), 1);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(h.history.calls(), 3);

    handle.cancel();
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(h.history.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_auto_update_pause_skips_polls() {
    let settings = OrchestratorSettings {
        update_interval: Duration::from_secs(60),
        ..OrchestratorSettings::default()
    };
    let h = Harness::new(settings, None);
    let mut sub = h.orchestrator.subscribe();
    let _handle = h.orchestrator.start_auto_update(h.model());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.history.calls(), 1);

    h.orchestrator.pause_auto_update();
    assert!(h.orchestrator.is_paused());
    tokio::time::sleep(Duration::from_secs(180)).await;
    assert_eq!(h.history.calls(), 1);

    h.orchestrator.resume_auto_update();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.history.calls(), 2);

    assert_eq!(
        kinds(&drain(&mut sub)),
        vec!["auto_update_paused", "auto_update_resumed"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_update_interval_is_clamped_and_applied() {
    let settings = OrchestratorSettings {
        update_interval: Duration::from_secs(300),
        ..OrchestratorSettings::default()
    };
    let h = Harness::new(settings, None);
    let _handle = h.orchestrator.start_auto_update(h.model());
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.history.calls(), 1);

    let applied = h.orchestrator.set_update_interval(Duration::from_secs(5));
    assert_eq!(applied, Duration::from_secs(60));
    assert_eq!(h.orchestrator.update_interval(), Duration::from_secs(60));

    // The pending 300s wait is replaced by a 60s one
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(h.history.calls(), 2);
}

#[tokio::test]
async fn test_shutdown_drains_queue_then_stops() {
    let h = Harness::new(OrchestratorSettings::default(), None);
    let model = h.model();
    let obs = Observation::empty("feed", t0()).with_interval(1.0);
    h.orchestrator.enqueue(&model, WorkBatch::Observations(vec![obs]));

    h.orchestrator.shutdown().await;
    assert_eq!(model.state().observation_count(), 1);
    assert!(h.orchestrator.flush().await.is_err());
    assert!(h.orchestrator.restore_latest(&model).await.is_err());
}
