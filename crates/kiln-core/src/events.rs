//! Generic event envelope and the `Publisher`/`Watcher` pair used by the
//! Reader Client and every domain projection.
//!
//! `EventBus<T>` is the one Publisher implementation in this crate: an
//! inbound channel plus a dynamic subscriber list, with a background task
//! that fans each event out to every subscriber on its own spawned delivery
//! task, so one slow consumer cannot stall the others. `Watcher<T>` is the
//! thin adapter trait a domain projection implements to react to
//! load/change/delete without re-deriving the dispatch machinery.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};

use crate::document::RelPath;
use crate::error::{CoreError, Result};

/// The bounded capacity of each per-subscriber delivery channel.
pub const SUBSCRIBER_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Load,
    Change,
    Delete,
    SubscriberLoadComplete,
}

/// A tagged record published by the Reader Client or a domain projection.
///
/// `key` and `payload` are populated for `Load`/`Change`; `Delete` carries
/// only `key`; `SubscriberLoadComplete` carries neither.
#[derive(Debug, Clone)]
pub struct Event<T> {
    pub operation: Operation,
    pub key: Option<RelPath>,
    pub payload: Option<T>,
}

impl<T> Event<T> {
    pub fn load(key: RelPath, payload: T) -> Self {
        Self { operation: Operation::Load, key: Some(key), payload: Some(payload) }
    }

    pub fn change(key: RelPath, payload: T) -> Self {
        Self { operation: Operation::Change, key: Some(key), payload: Some(payload) }
    }

    pub fn delete(key: RelPath) -> Self {
        Self { operation: Operation::Delete, key: Some(key), payload: None }
    }

    pub fn subscriber_load_complete() -> Self {
        Self { operation: Operation::SubscriberLoadComplete, key: None, payload: None }
    }
}

struct Subscriber<T> {
    id: u64,
    sender: mpsc::Sender<Event<T>>,
}

impl<T> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        Self { id: self.id, sender: self.sender.clone() }
    }
}

/// The handle returned by [`EventBus::subscribe`]. Pass `id` back to
/// [`EventBus::unsubscribe`] when the consumer is done; `receiver` delivers
/// events until then.
pub struct Subscription<T> {
    pub id: u64,
    pub receiver: mpsc::Receiver<Event<T>>,
}

/// A generic, fan-out publisher of `Event<T>`.
///
/// Construction spawns a background dispatch task bound to the bus's
/// lifetime; dropping every clone of the bus's sender side lets that task
/// exit once the inbound channel closes.
pub struct EventBus<T> {
    inbound: mpsc::Sender<Event<T>>,
    subscribers: Arc<RwLock<Vec<Subscriber<T>>>>,
    next_id: Arc<AtomicU64>,
}

impl<T> fmt::Debug for EventBus<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus").finish_non_exhaustive()
    }
}

impl<T: Clone + Send + Sync + 'static> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> EventBus<T> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CHANNEL_CAPACITY);
        let subscribers: Arc<RwLock<Vec<Subscriber<T>>>> = Arc::new(RwLock::new(Vec::new()));
        tokio::spawn(Self::dispatch_loop(rx, subscribers.clone()));
        Self { inbound: tx, subscribers, next_id: Arc::new(AtomicU64::new(0)) }
    }

    async fn dispatch_loop(mut rx: mpsc::Receiver<Event<T>>, subscribers: Arc<RwLock<Vec<Subscriber<T>>>>) {
        while let Some(event) = rx.recv().await {
            let targets = subscribers.read().await.clone();
            for subscriber in targets {
                let event = event.clone();
                tokio::spawn(async move {
                    if subscriber.sender.send(event).await.is_err() {
                        tracing::debug!(subscriber_id = subscriber.id, "subscriber channel closed during delivery");
                    }
                });
            }
        }
    }

    /// Publishes `event` to every current subscriber.
    pub async fn publish(&self, event: Event<T>) -> Result<()> {
        self.inbound.send(event).await.map_err(|_| CoreError::ShuttingDown)
    }

    /// Registers a new subscriber, returning its id and receiving end.
    pub async fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CHANNEL_CAPACITY);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.write().await.push(Subscriber { id, sender: tx });
        Subscription { id, receiver: rx }
    }

    /// Removes a subscriber previously returned by [`subscribe`](Self::subscribe).
    pub async fn unsubscribe(&self, id: u64) {
        self.subscribers.write().await.retain(|s| s.id != id);
    }

    /// Delivers `event` to exactly one subscriber, bypassing fan-out.
    ///
    /// Used to replay a cached backlog to a single late subscriber (so it
    /// sees `load` events for already-known documents without every other
    /// subscriber seeing them again).
    pub async fn send_to(&self, id: u64, event: Event<T>) {
        let target = self.subscribers.read().await.iter().find(|s| s.id == id).cloned();
        if let Some(subscriber) = target {
            if subscriber.sender.send(event).await.is_err() {
                tracing::debug!(subscriber_id = id, "subscriber channel closed during replay");
            }
        }
    }
}

/// Adapter trait implemented by a domain projection (or any consumer) that
/// wants typed callbacks instead of matching on [`Operation`] directly.
#[async_trait]
pub trait Watcher<T>: Send + Sync {
    async fn on_load(&self, key: &RelPath, payload: &T);
    async fn on_change(&self, key: &RelPath, payload: &T);
    async fn on_delete(&self, key: &RelPath);
}

/// Drives a [`Watcher`] from a `Subscription`'s receiver, tracking whether
/// the initial backlog has been fully delivered.
pub struct WatchAdapter<T> {
    initial_load_complete: Arc<AtomicBool>,
    receiver: mpsc::Receiver<Event<T>>,
}

impl<T: Send + Sync + 'static> WatchAdapter<T> {
    pub fn new(receiver: mpsc::Receiver<Event<T>>) -> Self {
        Self { initial_load_complete: Arc::new(AtomicBool::new(false)), receiver }
    }

    /// A cheap, cloneable flag a caller can poll without holding the
    /// adapter itself.
    pub fn load_flag(&self) -> Arc<AtomicBool> {
        self.initial_load_complete.clone()
    }

    /// Consumes events until the channel closes, dispatching each to
    /// `watcher`. Returns when the sender side (the `EventBus`) is dropped
    /// or the publisher shuts down.
    pub async fn run(mut self, watcher: Arc<dyn Watcher<T>>) {
        while let Some(event) = self.receiver.recv().await {
            match event.operation {
                Operation::Load => {
                    if let (Some(key), Some(payload)) = (&event.key, &event.payload) {
                        watcher.on_load(key, payload).await;
                    }
                }
                Operation::Change => {
                    if let (Some(key), Some(payload)) = (&event.key, &event.payload) {
                        watcher.on_change(key, payload).await;
                    }
                }
                Operation::Delete => {
                    if let Some(key) = &event.key {
                        watcher.on_delete(key).await;
                    }
                }
                Operation::SubscriberLoadComplete => {
                    self.initial_load_complete.store(true, Ordering::Release);
                }
            }
        }
    }

    /// Blocks, polling at `interval`, until the initial backlog has been
    /// fully delivered. Used by callers that need a synchronous warm start.
    pub async fn wait_until_loaded(flag: &AtomicBool, interval: Duration) {
        while !flag.load(Ordering::Acquire) {
            tokio::time::sleep(interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test]
    async fn subscriber_receives_published_events() {
        let bus: EventBus<String> = EventBus::new();
        let mut sub = bus.subscribe().await;
        bus.publish(Event::load(RelPath::new("a.md"), "hello".to_string())).await.unwrap();

        let event = sub.receiver.recv().await.unwrap();
        assert_eq!(event.operation, Operation::Load);
        assert_eq!(event.payload.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let bus: EventBus<String> = EventBus::new();
        let sub = bus.subscribe().await;
        bus.unsubscribe(sub.id).await;
        bus.publish(Event::delete(RelPath::new("a.md"))).await.unwrap();

        // give the dispatch loop a chance to run; the channel should close
        // since no subscribers remain to hold it open indefinitely.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let mut receiver = sub.receiver;
        assert!(receiver.recv().await.is_none() || receiver.try_recv().is_err());
    }

    struct RecordingWatcher {
        loads: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Watcher<String> for RecordingWatcher {
        async fn on_load(&self, key: &RelPath, _payload: &String) {
            self.loads.lock().unwrap().push(key.as_str().to_string());
        }
        async fn on_change(&self, _key: &RelPath, _payload: &String) {}
        async fn on_delete(&self, _key: &RelPath) {}
    }

    #[tokio::test]
    async fn watch_adapter_sets_load_flag_on_subscriber_load_complete() {
        let bus: EventBus<String> = EventBus::new();
        let sub = bus.subscribe().await;
        let adapter = WatchAdapter::new(sub.receiver);
        let flag = adapter.load_flag();

        let watcher = Arc::new(RecordingWatcher { loads: Mutex::new(Vec::new()) });
        let handle = tokio::spawn(adapter.run(watcher.clone()));

        bus.publish(Event::load(RelPath::new("a.md"), "x".to_string())).await.unwrap();
        bus.publish(Event::subscriber_load_complete()).await.unwrap();

        WatchAdapter::<String>::wait_until_loaded(&flag, Duration::from_millis(5)).await;
        assert!(flag.load(Ordering::Acquire));

        drop(bus);
        let _ = tokio::time::timeout(Duration::from_millis(100), handle).await;
        assert_eq!(watcher.loads.lock().unwrap().as_slice(), ["a.md"]);
    }
}
