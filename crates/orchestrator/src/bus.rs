use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;

use crate::events::OrchestratorEvent;

/// Broadcast bus for orchestrator lifecycle events
///
/// Publishing never blocks and never fails; events sent while nobody is
/// subscribed are dropped.
pub struct EventBus {
    tx: broadcast::Sender<OrchestratorEvent>,
    subscriber_count: Arc<AtomicUsize>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        EventBus {
            tx,
            subscriber_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn publish(&self, event: OrchestratorEvent) {
        log::debug!("Event {}", event.kind());
        // Ignore send errors (no subscribers)
        let _ = self.tx.send(event);
    }

    /// Subscribe to all events; dropping the subscription unsubscribes
    pub fn subscribe(&self) -> Subscription {
        self.subscriber_count.fetch_add(1, Ordering::SeqCst);
        Subscription {
            rx: self.tx.subscribe(),
            subscriber_count: Arc::clone(&self.subscriber_count),
        }
    }

    /// Run `callback` on every event in a background task until the
    /// returned listener is dropped
    pub fn listen<F>(&self, mut callback: F) -> Listener
    where
        F: FnMut(OrchestratorEvent) + Send + 'static,
    {
        let mut subscription = self.subscribe();
        let task = tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                callback(event);
            }
        });
        Listener { task }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriber_count.load(Ordering::SeqCst)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        EventBus {
            tx: self.tx.clone(),
            subscriber_count: Arc::clone(&self.subscriber_count),
        }
    }
}

/// Receiving end of the bus
pub struct Subscription {
    rx: broadcast::Receiver<OrchestratorEvent>,
    subscriber_count: Arc<AtomicUsize>,
}

impl Subscription {
    /// Next event; `None` once the bus is gone. Lagged events are skipped.
    pub async fn recv(&mut self) -> Option<OrchestratorEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(missed)) => {
                    log::warn!("Event subscriber lagged, {} events dropped", missed);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next already-published event, without waiting
    pub fn try_recv(&mut self) -> Option<OrchestratorEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(missed)) => {
                    log::warn!("Event subscriber lagged, {} events dropped", missed);
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.subscriber_count.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Callback subscription; dropping it stops the callback
pub struct Listener {
    task: JoinHandle<()>,
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[tokio::test]
    async fn test_subscribe_and_dispose() {
        let bus = EventBus::new(16);
        let mut sub = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.publish(OrchestratorEvent::AutoUpdatePaused);
        assert_eq!(sub.recv().await, Some(OrchestratorEvent::AutoUpdatePaused));

        drop(sub);
        assert_eq!(bus.subscriber_count(), 0);

        // No subscribers: still fine
        bus.publish(OrchestratorEvent::AutoUpdateResumed);
    }

    #[tokio::test]
    async fn test_listener_receives_until_dropped() {
        let bus = EventBus::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener = bus.listen(move |event| sink.lock().push(event.kind()));

        bus.publish(OrchestratorEvent::AutoUpdatePaused);
        bus.publish(OrchestratorEvent::AutoUpdateResumed);
        tokio::task::yield_now().await;
        while seen.lock().len() < 2 {
            tokio::task::yield_now().await;
        }
        assert_eq!(
            *seen.lock(),
            vec!["auto_update_paused", "auto_update_resumed"]
        );

        drop(listener);
        while bus.subscriber_count() > 0 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_lagged_subscriber_skips_ahead() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();
        for _ in 0..5 {
            bus.publish(OrchestratorEvent::AutoUpdatePaused);
        }
        bus.publish(OrchestratorEvent::AutoUpdateResumed);

        let mut last = None;
        while let Some(event) = sub.try_recv() {
            last = Some(event);
        }
        assert_eq!(last, Some(OrchestratorEvent::AutoUpdateResumed));
    }
}
