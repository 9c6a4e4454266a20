use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::backoff::ReconnectBackoff;
use super::connector::{FeedConnection, FeedConnector, FeedInbound};
use super::state::ConnectionState;
use super::view::FeedView;
use crate::messages::{Candle, FeedMessage, Predictions};

const EVENT_BUFFER: usize = 1024;
const MIN_HEALTH_CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// Timing and sizing of the live feed
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub health_check_interval: Duration,
    /// Silence (no ping) after which the connection is treated as dead
    pub stale_after: Duration,
    pub backoff_base: Duration,
    pub backoff_multiplier: f64,
    pub backoff_max: Duration,
    pub candle_window: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            health_check_interval: Duration::from_secs(10),
            stale_after: Duration::from_secs(60),
            backoff_base: Duration::from_secs(5),
            backoff_multiplier: 1.5,
            backoff_max: Duration::from_secs(30),
            candle_window: 100,
        }
    }
}

/// Events emitted by the streaming client
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Connected,
    Disconnected { reason: String },
    ReconnectScheduled { attempt: u32, delay: Duration },
    Initial {
        current_price: f64,
        model_state: Option<Value>,
    },
    Candle(Candle),
    Predictions(Predictions),
    ModelState(Value),
}

#[derive(Debug)]
enum Command {
    Reconnect,
    Disconnect,
}

enum SessionEnd {
    /// Connection lost or judged stale; retry after backoff
    Lost(String),
    /// Caller asked for an immediate reconnect
    Reconnect,
    Shutdown,
}

/// Handle to a running streaming client
pub struct StreamHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    view: Arc<RwLock<FeedView>>,
    task: JoinHandle<()>,
}

impl StreamHandle {
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch connection state transitions
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn view(&self) -> FeedView {
        self.view.read().clone()
    }

    pub fn current_price(&self) -> Option<f64> {
        self.view.read().current_price
    }

    /// Drop the current connection (or pending retry) and connect right away
    pub fn reconnect(&self) {
        let _ = self.commands.send(Command::Reconnect);
    }

    /// Cancel any pending reconnection, close the connection, and wait for
    /// the client task to finish. No retry follows.
    pub async fn disconnect(self) {
        let _ = self.commands.send(Command::Disconnect);
        if let Err(e) = self.task.await {
            log::warn!("Streaming client task ended abnormally: {}", e);
        }
    }
}

/// Long-lived live feed client
///
/// One task owns the connection, the heartbeat check and the reconnect
/// timer; data leaves through the [`FeedEvent`] channel and the shared
/// [`FeedView`].
pub struct StreamingClient {
    connector: Arc<dyn FeedConnector>,
    settings: StreamSettings,
    backoff: ReconnectBackoff,
    state: watch::Sender<ConnectionState>,
    view: Arc<RwLock<FeedView>>,
    events: mpsc::Sender<FeedEvent>,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl StreamingClient {
    /// Start the client; returns its handle and the event stream
    pub fn spawn(
        connector: Arc<dyn FeedConnector>,
        settings: StreamSettings,
    ) -> (StreamHandle, mpsc::Receiver<FeedEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let view = Arc::new(RwLock::new(FeedView::default()));

        let client = StreamingClient {
            connector,
            backoff: ReconnectBackoff::new(
                settings.backoff_base,
                settings.backoff_multiplier,
                settings.backoff_max,
            ),
            settings,
            state: state_tx,
            view: Arc::clone(&view),
            events: event_tx,
            commands: command_rx,
        };
        let task = tokio::spawn(client.run());

        (
            StreamHandle {
                commands: command_tx,
                state: state_rx,
                view,
                task,
            },
            event_rx,
        )
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    /// Never waits on the consumer; the session loop must keep serving
    /// pings, the health check and commands
    fn emit(&self, event: FeedEvent) {
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                log::warn!("Feed event channel full, event dropped");
            }
            // Nobody listening is fine; the view still updates
            Err(TrySendError::Closed(_)) => {}
        }
    }

    async fn run(mut self) {
        'connect: loop {
            self.set_state(ConnectionState::Connecting);
            log::info!("Connecting to live feed");

            let connector = Arc::clone(&self.connector);
            let attempt = tokio::select! {
                result = connector.connect() => Some(result),
                command = self.commands.recv() => match command {
                    Some(Command::Reconnect) => None,
                    Some(Command::Disconnect) | None => break 'connect,
                },
            };

            let reason = match attempt {
                None => continue 'connect,
                Some(Ok(connection)) => {
                    self.backoff.reset();
                    self.set_state(ConnectionState::Connected);
                    log::info!("Live feed connected");
                    self.emit(FeedEvent::Connected);

                    match self.session(connection).await {
                        SessionEnd::Lost(reason) => reason,
                        SessionEnd::Reconnect => continue 'connect,
                        SessionEnd::Shutdown => break 'connect,
                    }
                }
                Some(Err(e)) => e.to_string(),
            };

            self.set_state(ConnectionState::Disconnected);
            log::warn!("Live feed disconnected: {}", reason);
            self.emit(FeedEvent::Disconnected { reason });

            let attempt = self.backoff.attempt() + 1;
            let delay = self.backoff.next_delay();
            log::info!("Reconnecting in {:?} (attempt {})", delay, attempt);
            self.emit(FeedEvent::ReconnectScheduled { attempt, delay });

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                command = self.commands.recv() => match command {
                    Some(Command::Reconnect) => self.backoff.reset(),
                    Some(Command::Disconnect) | None => break 'connect,
                },
            }
        }

        self.set_state(ConnectionState::Disconnected);
        log::info!("Live feed client stopped");
    }

    /// Serve one open connection until it ends
    async fn session(&mut self, mut connection: FeedConnection) -> SessionEnd {
        let mut last_heartbeat = Instant::now();
        // interval_at panics on a zero period
        let period = self.settings.health_check_interval.max(MIN_HEALTH_CHECK_INTERVAL);
        let mut health = tokio::time::interval_at(Instant::now() + period, period);
        health.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                inbound = connection.recv() => match inbound {
                    Some(FeedInbound::Message(FeedMessage::Ping { .. })) => {
                        last_heartbeat = Instant::now();
                        let pong = FeedMessage::Pong {
                            timestamp: Utc::now().timestamp_millis(),
                        };
                        if connection.send(pong).await.is_err() {
                            return SessionEnd::Lost("transport writer closed".to_string());
                        }
                    }
                    Some(FeedInbound::Message(message)) => self.dispatch(message),
                    Some(FeedInbound::Malformed(text)) => {
                        log::warn!("Ignoring malformed feed message: {}", text);
                    }
                    Some(FeedInbound::Error(e)) => return SessionEnd::Lost(e),
                    Some(FeedInbound::Closed) | None => {
                        return SessionEnd::Lost("connection closed".to_string());
                    }
                },
                _ = health.tick() => {
                    let silence = last_heartbeat.elapsed();
                    if silence > self.settings.stale_after {
                        log::warn!("Live feed stale ({:?} without heartbeat), closing", silence);
                        connection.close().await;
                        return SessionEnd::Lost(format!("stale for {:?}", silence));
                    }
                },
                command = self.commands.recv() => match command {
                    Some(Command::Reconnect) => {
                        connection.close().await;
                        return SessionEnd::Reconnect;
                    }
                    Some(Command::Disconnect) | None => {
                        self.set_state(ConnectionState::Closing);
                        connection.close().await;
                        return SessionEnd::Shutdown;
                    }
                },
            }
        }
    }

    fn dispatch(&self, message: FeedMessage) {
        match message {
            FeedMessage::Initial {
                current_price,
                model_state,
            } => {
                {
                    let mut view = self.view.write();
                    view.current_price = Some(current_price);
                    view.model_state = model_state.clone();
                }
                self.emit(FeedEvent::Initial {
                    current_price,
                    model_state,
                });
            }
            FeedMessage::Update {
                candle,
                predictions,
                model_state,
            } => {
                {
                    let mut view = self.view.write();
                    if let Some(candle) = &candle {
                        view.push_candle(candle.clone(), self.settings.candle_window);
                    }
                    if let Some(predictions) = &predictions {
                        view.predictions = Some(predictions.clone());
                    }
                    if let Some(model_state) = &model_state {
                        view.model_state = Some(model_state.clone());
                    }
                }
                if let Some(candle) = candle {
                    self.emit(FeedEvent::Candle(candle));
                }
                if let Some(predictions) = predictions {
                    self.emit(FeedEvent::Predictions(predictions));
                }
                if let Some(model_state) = model_state {
                    self.emit(FeedEvent::ModelState(model_state));
                }
            }
            FeedMessage::Pong { .. } | FeedMessage::Ping { .. } => {}
            FeedMessage::Unknown => log::debug!("Ignoring feed message of unknown type"),
        }
    }
}
