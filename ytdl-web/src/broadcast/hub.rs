//! Broadcast hub.
//!
//! Two paths reach observers:
//! - the tick loop drains every job's pending slot (coalesced engine progress);
//! - [`BroadcastHub::publish`] delivers executor lifecycle events right away,
//!   after first flushing that job's pending slot so a stale `downloading`
//!   event never arrives after a terminal one.
//!
//! Deliveries are serialized by one send lock, so every observer sees
//! events in the order they were sent.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::downloader::{JobRegistry, ProgressEvent};
use crate::{Error, Result};

/// Identifier assigned to an observer on connect.
pub type ObserverId = u64;

/// A connected progress consumer.
///
/// Any error from [`ProgressObserver::send`] is treated as a disconnect.
#[async_trait]
pub trait ProgressObserver: Send + Sync {
    async fn send(&self, payload: &str) -> Result<()>;
}

/// Observer backed by a bounded channel, drained by a connection task.
pub struct ChannelObserver {
    tx: mpsc::Sender<String>,
    timeout: Duration,
}

impl ChannelObserver {
    /// Default time a send may wait on a full buffer.
    pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self {
            tx,
            timeout: Self::DEFAULT_SEND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ProgressObserver for ChannelObserver {
    async fn send(&self, payload: &str) -> Result<()> {
        match tokio::time::timeout(self.timeout, self.tx.send(payload.to_string())).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(Error::Other("observer channel closed".to_string())),
            Err(_) => Err(Error::Other("observer send timed out".to_string())),
        }
    }
}

/// Set of connected observers plus the delivery loop.
pub struct BroadcastHub {
    registry: Arc<JobRegistry>,
    observers: DashMap<ObserverId, Arc<dyn ProgressObserver>>,
    next_id: AtomicU64,
    send_lock: Mutex<()>,
    tick: Duration,
}

impl BroadcastHub {
    pub fn new(registry: Arc<JobRegistry>, tick: Duration) -> Self {
        Self {
            registry,
            observers: DashMap::new(),
            next_id: AtomicU64::new(1),
            send_lock: Mutex::new(()),
            tick,
        }
    }

    pub fn connect(&self, observer: Arc<dyn ProgressObserver>) -> ObserverId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.observers.insert(id, observer);
        debug!(observer_id = id, observers = self.observers.len(), "Observer connected");
        id
    }

    /// Returns false if the observer was already gone.
    pub fn disconnect(&self, id: ObserverId) -> bool {
        let removed = self.observers.remove(&id).is_some();
        if removed {
            debug!(observer_id = id, observers = self.observers.len(), "Observer disconnected");
        }
        removed
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Send one event to every observer, dropping those that fail.
    ///
    /// Must be called with the send lock held.
    async fn deliver(&self, event: &ProgressEvent) -> usize {
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(e) => {
                error!(
                    download_id = %event.download_id,
                    error = %e,
                    "Failed to serialize progress event"
                );
                return 0;
            }
        };

        let observers: Vec<(ObserverId, Arc<dyn ProgressObserver>)> = self
            .observers
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        let mut delivered = 0;
        for (id, observer) in observers {
            match observer.send(&payload).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    debug!(observer_id = id, error = %e, "Send failed, dropping observer");
                    self.observers.remove(&id);
                }
            }
        }
        delivered
    }

    /// Deliver a lifecycle event now.
    ///
    /// Any progress still pending for the same job goes out first.
    pub async fn publish(&self, event: ProgressEvent) {
        let _guard = self.send_lock.lock().await;
        if let Some(pending) = self
            .registry
            .slot(&event.download_id)
            .and_then(|slot| slot.take())
        {
            self.deliver(&pending).await;
        }
        self.deliver(&event).await;
    }

    /// Drain every pending slot once. Returns the number of events sent.
    pub async fn tick_once(&self) -> usize {
        let _guard = self.send_lock.lock().await;
        let mut sent = 0;
        for (_, slot) in self.registry.pending_slots() {
            // Taken before sending: an event deposited meanwhile waits for the next tick.
            if let Some(event) = slot.take() {
                self.deliver(&event).await;
                sent += 1;
            }
        }
        sent
    }

    /// Spawn the tick loop; it stops when `cancel` fires.
    pub fn start(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let hub = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(hub.tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!(tick_ms = hub.tick.as_millis() as u64, "Broadcast hub started");

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Broadcast hub shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        if hub.observers.is_empty() {
                            // Nobody to tell; still consume so stale events are not replayed later.
                            for (_, slot) in hub.registry.pending_slots() {
                                slot.take();
                            }
                            continue;
                        }
                        hub.tick_once().await;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::Job;
    use parking_lot::Mutex as SyncMutex;
    use ytdl_options::NativeOptions;

    #[derive(Default)]
    struct Recorder {
        received: SyncMutex<Vec<ProgressEvent>>,
    }

    #[async_trait]
    impl ProgressObserver for Recorder {
        async fn send(&self, payload: &str) -> Result<()> {
            self.received.lock().push(serde_json::from_str(payload)?);
            Ok(())
        }
    }

    struct Broken;

    #[async_trait]
    impl ProgressObserver for Broken {
        async fn send(&self, _payload: &str) -> Result<()> {
            Err(Error::Other("connection reset".into()))
        }
    }

    fn setup() -> (Arc<JobRegistry>, BroadcastHub, String) {
        let registry = Arc::new(JobRegistry::new());
        let job = Job::single("https://example/video1", None, NativeOptions::default());
        let id = job.id.clone();
        registry.insert(job).unwrap();
        let hub = BroadcastHub::new(registry.clone(), Duration::from_millis(10));
        (registry, hub, id)
    }

    #[tokio::test]
    async fn test_tick_coalesces_and_clears() {
        let (registry, hub, id) = setup();
        let recorder = Arc::new(Recorder::default());
        hub.connect(recorder.clone());

        let slot = registry.slot(&id).unwrap();
        slot.deposit(ProgressEvent::new(&id, "downloading").with_message("E1"));
        slot.deposit(ProgressEvent::new(&id, "downloading").with_message("E2"));

        assert_eq!(hub.tick_once().await, 1);
        assert!(slot.is_empty());
        assert_eq!(hub.tick_once().await, 0);

        let received = recorder.received.lock();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].message.as_deref(), Some("E2"));
    }

    #[tokio::test]
    async fn test_failed_observer_is_removed() {
        let (registry, hub, id) = setup();
        let healthy = Arc::new(Recorder::default());
        hub.connect(healthy.clone());
        hub.connect(Arc::new(Broken));
        assert_eq!(hub.observer_count(), 2);

        let slot = registry.slot(&id).unwrap();
        slot.deposit(ProgressEvent::new(&id, "downloading"));
        hub.tick_once().await;
        assert_eq!(hub.observer_count(), 1);

        slot.deposit(ProgressEvent::new(&id, "completed"));
        hub.tick_once().await;
        assert_eq!(healthy.received.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_publish_flushes_pending_first() {
        let (registry, hub, id) = setup();
        let recorder = Arc::new(Recorder::default());
        hub.connect(recorder.clone());

        registry
            .slot(&id)
            .unwrap()
            .deposit(ProgressEvent::new(&id, "downloading"));
        hub.publish(ProgressEvent::failed(&id, "boom")).await;

        let statuses: Vec<String> = recorder
            .received
            .lock()
            .iter()
            .map(|e| e.status.clone())
            .collect();
        assert_eq!(statuses, vec!["downloading", "error"]);
        assert!(registry.slot(&id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_channel_observer_reports_closed_receiver() {
        let (tx, rx) = mpsc::channel(1);
        let observer = ChannelObserver::new(tx).with_timeout(Duration::from_millis(20));
        drop(rx);
        assert!(observer.send("{}").await.is_err());

        let (tx, _rx) = mpsc::channel(1);
        let observer = ChannelObserver::new(tx).with_timeout(Duration::from_millis(20));
        observer.send("{}").await.unwrap();
        // Buffer full and nobody reading.
        assert!(observer.send("{}").await.is_err());
    }

    #[tokio::test]
    async fn test_disconnect() {
        let (_, hub, _) = setup();
        let id = hub.connect(Arc::new(Recorder::default()));
        assert!(hub.disconnect(id));
        assert!(!hub.disconnect(id));
        assert_eq!(hub.observer_count(), 0);
    }

    #[tokio::test]
    async fn test_start_loop_delivers_and_stops() {
        let (registry, hub, id) = setup();
        let hub = Arc::new(hub);
        let recorder = Arc::new(Recorder::default());
        hub.connect(recorder.clone());

        let cancel = CancellationToken::new();
        let handle = hub.start(cancel.clone());
        registry
            .slot(&id)
            .unwrap()
            .deposit(ProgressEvent::new(&id, "completed").with_filename("Clip.webm"));

        for _ in 0..50 {
            if !recorder.received.lock().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        cancel.cancel();
        handle.await.unwrap();

        let received = recorder.received.lock();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].filename.as_deref(), Some("Clip.webm"));
    }
}
