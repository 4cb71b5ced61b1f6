//! Shared plumbing for the metadata-filtered projections (Project, Source,
//! Daily): each is a `path → entity` map populated by filtering Reader
//! Client events to a single `type` value, republished as its own typed
//! `load|change|delete` event stream.
//!
//! The Task projection does not use this: a document can hold many tasks,
//! not one entity per path, so it scans the body directly instead of
//! extracting a single value per document.

use std::collections::HashMap;
use std::sync::Arc;

use kiln_core::{Document, Event, EventBus, Operation, RelPath};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Runs until the Reader Client's subscription closes or `cancel` fires.
/// `extract` decides whether a document belongs to this projection (by
/// inspecting its `type` metadata) and, if so, converts it to the domain
/// entity `T`.
pub(crate) async fn run_projection_loop<T, F>(
    mut subscription: kiln_core::Subscription<Document>,
    cache: Arc<RwLock<HashMap<RelPath, T>>>,
    bus: Arc<EventBus<T>>,
    cancel: CancellationToken,
    extract: F,
) where
    T: Clone + Send + Sync + 'static,
    F: Fn(&Document) -> Option<T> + Send + Sync + 'static,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = subscription.receiver.recv() => {
                let Some(event) = event else { break };
                match event.operation {
                    Operation::Load | Operation::Change => {
                        let (Some(key), Some(doc)) = (event.key, event.payload) else { continue };
                        match extract(&doc) {
                            Some(entity) => {
                                cache.write().await.insert(key.clone(), entity.clone());
                                let out = if event.operation == Operation::Load {
                                    Event::load(key, entity)
                                } else {
                                    Event::change(key, entity)
                                };
                                let _ = bus.publish(out).await;
                            }
                            None => {
                                // Document no longer matches this projection's type; if it used
                                // to, treat the transition as a delete.
                                if cache.write().await.remove(&key).is_some() {
                                    let _ = bus.publish(Event::delete(key)).await;
                                }
                            }
                        }
                    }
                    Operation::Delete => {
                        if let Some(key) = event.key {
                            if cache.write().await.remove(&key).is_some() {
                                let _ = bus.publish(Event::delete(key)).await;
                            }
                        }
                    }
                    Operation::SubscriberLoadComplete => {
                        let _ = bus.publish(Event::subscriber_load_complete()).await;
                    }
                }
            }
        }
    }
}
