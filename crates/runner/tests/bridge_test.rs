//! Live feed events flowing through the bridge into the model

use std::sync::Arc;

use async_trait::async_trait;
use cashcast_clock::ManualClock;
use cashcast_core::RateRecord;
use cashcast_gateway::{Candle, FeedEvent};
use cashcast_orchestrator::{ModelRegistry, SharedModel, UpdateOrchestrator};
use cashcast_ports::{Clock, FetchResult, HistoryOrder, HistorySource};
use cashcast_runner::FeedBridge;
use cashcast_store::InMemoryKeyValueStore;
use chrono::{TimeZone, Utc};
use tokio::sync::mpsc;

struct NoHistory;

#[async_trait]
impl HistorySource for NoHistory {
    async fn fetch_history(&self, _limit: usize, _order: HistoryOrder) -> FetchResult<Vec<RateRecord>> {
        Ok(Vec::new())
    }
}

fn candle(minutes: i64, close: f64) -> FeedEvent {
    let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap().timestamp();
    FeedEvent::Candle(Candle {
        timestamp: start + minutes * 60,
        open: close,
        high: close,
        low: close,
        close,
        volume: 0.0,
    })
}

fn setup() -> (UpdateOrchestrator, SharedModel, Arc<dyn Clock>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
    ));
    let registry = ModelRegistry::new(Arc::new(InMemoryKeyValueStore::new()), Arc::clone(&clock));
    let orchestrator = UpdateOrchestrator::builder(Arc::new(NoHistory), Arc::clone(&clock)).spawn();
    let model = registry.get_or_create("eth");
    (orchestrator, model, clock)
}

#[tokio::test]
async fn test_candles_become_observations() {
    let (orchestrator, model, clock) = setup();
    let mut bridge = FeedBridge::new(orchestrator.clone(), model.clone(), clock);

    assert!(bridge
        .handle(&FeedEvent::Initial {
            current_price: 100.0,
            model_state: None,
        })
        .is_none());
    // inside the dead band
    assert!(bridge.handle(&candle(3, 100.005)).is_none());

    let obs = bridge.handle(&candle(6, 101.0)).expect("observation");
    assert_eq!(obs.store_id, "eth");
    assert!((obs.magnitude_of_change.unwrap() - 0.995).abs() < 1e-9);
    assert_eq!(obs.was_upsized, None);

    assert!(bridge.handle(&FeedEvent::Connected).is_none());
    assert!(bridge.handle(&candle(9, 99.0)).is_some());
    assert_eq!(bridge.enqueued(), 2);

    orchestrator.flush().await.unwrap();
    let state = model.state();
    assert_eq!(state.observation_count(), 2);
    // no upsize information on live candles
    assert_eq!(state.upsize().alpha(), 1.0);
    assert_eq!(state.upsize().beta(), 1.0);
}

#[tokio::test]
async fn test_spawned_bridge_stops_with_the_stream() {
    let (orchestrator, model, clock) = setup();
    let (tx, rx) = mpsc::channel(16);
    let task = FeedBridge::new(orchestrator.clone(), model.clone(), clock).spawn(rx);

    tx.send(candle(0, 10.0)).await.unwrap();
    tx.send(candle(3, 10.5)).await.unwrap();
    tx.send(candle(6, 10.5)).await.unwrap();
    tx.send(candle(9, 11.0)).await.unwrap();
    drop(tx);

    assert_eq!(task.await.unwrap(), 2);
    orchestrator.flush().await.unwrap();
    assert_eq!(model.state().observation_count(), 2);
}

#[tokio::test]
async fn test_bridge_thresholds_follow_configuration() {
    let (orchestrator, model, clock) = setup();
    let mut bridge =
        FeedBridge::new(orchestrator.clone(), model.clone(), clock).with_thresholds(2.0, 1.0);

    bridge.handle(&FeedEvent::Initial {
        current_price: 100.0,
        model_state: None,
    });
    // a point move is noise under a two point band
    assert!(bridge.handle(&candle(3, 101.0)).is_none());

    let obs = bridge.handle(&candle(6, 104.0)).expect("observation");
    assert_eq!(obs.magnitude_of_change, Some(3.0));
    // six minutes is floored to the configured day
    assert_eq!(obs.time_since_last_change_days, Some(1.0));

    orchestrator.flush().await.unwrap();
    assert_eq!(model.state().observation_count(), 1);
}
