//! Turns live feed events into queued model updates

use std::sync::Arc;

use cashcast_core::{Observation, StreamObservationBuilder};
use cashcast_gateway::FeedEvent;
use cashcast_orchestrator::{SharedModel, UpdateOrchestrator, WorkBatch};
use cashcast_ports::Clock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Routes streamed candles into the orchestrator for one model
///
/// Each close that moves beyond the dead band becomes one observation,
/// enqueued without waiting for the worker.
pub struct FeedBridge {
    orchestrator: UpdateOrchestrator,
    model: SharedModel,
    builder: StreamObservationBuilder,
    clock: Arc<dyn Clock>,
    enqueued: usize,
}

impl FeedBridge {
    pub fn new(orchestrator: UpdateOrchestrator, model: SharedModel, clock: Arc<dyn Clock>) -> Self {
        let builder = StreamObservationBuilder::new(model.entity());
        Self {
            orchestrator,
            model,
            builder,
            clock,
            enqueued: 0,
        }
    }

    /// Override the dead band and minimum interval applied to live closes
    pub fn with_thresholds(mut self, dead_band: f64, min_interval_days: f64) -> Self {
        self.builder = self
            .builder
            .with_dead_band(dead_band)
            .with_min_interval_days(min_interval_days);
        self
    }

    /// Observations enqueued so far
    pub fn enqueued(&self) -> usize {
        self.enqueued
    }

    /// Handle one feed event; returns the observation it produced, if any
    pub fn handle(&mut self, event: &FeedEvent) -> Option<Observation> {
        match event {
            FeedEvent::Initial { current_price, .. } => {
                log::info!(
                    "Feed '{}' initial price {}",
                    self.model.entity(),
                    current_price
                );
                self.builder.seed(*current_price, self.clock.now());
                None
            }
            FeedEvent::Candle(candle) => {
                let Some(at) = candle.time() else {
                    log::warn!("Candle with invalid timestamp {} ignored", candle.timestamp);
                    return None;
                };
                let observation = self.builder.observe_close(candle.close, at)?;
                log::debug!(
                    "Close moved by {:?} on '{}'",
                    observation.magnitude_of_change,
                    self.model.entity()
                );
                self.orchestrator
                    .enqueue(&self.model, WorkBatch::Observations(vec![observation.clone()]));
                self.enqueued += 1;
                Some(observation)
            }
            FeedEvent::Connected => {
                log::info!("Feed '{}' connected", self.model.entity());
                None
            }
            FeedEvent::Disconnected { reason } => {
                log::warn!("Feed '{}' disconnected: {}", self.model.entity(), reason);
                None
            }
            FeedEvent::ReconnectScheduled { attempt, delay } => {
                log::info!("Reconnect attempt {} in {:?}", attempt, delay);
                None
            }
            FeedEvent::Predictions(_) | FeedEvent::ModelState(_) => None,
        }
    }

    /// Drain `events` until the streaming client goes away; the task
    /// yields the number of observations enqueued
    pub fn spawn(mut self, mut events: mpsc::Receiver<FeedEvent>) -> JoinHandle<usize> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                self.handle(&event);
            }
            log::debug!("Feed bridge for '{}' stopped", self.model.entity());
            self.enqueued
        })
    }
}
