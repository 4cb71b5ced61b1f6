//! The Reader Client (§4.C): crawls the root once, then watches it,
//! maintaining a `path → Document` cache and publishing `load`/`change`/
//! `delete` events to subscribers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use kiln_core::{ContentHasher, Document, Event, RelPath, Sha256Hasher, Subscription};
use kiln_parser::WeekendPolicy;
use tokio::sync::{RwLock, Semaphore};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use crate::error::{Result, WatchError};
use crate::watcher::{RawEventKind, RecursiveWatcher, DEFAULT_RECOGNIZED_EXTENSIONS};

/// Options controlling what a newly-registered subscriber receives.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubscribeOptions {
    /// Replay current cache contents as `load` events, followed by
    /// `subscriber-load-complete`, before any live events.
    pub replay: bool,
}

/// Owns the root path, the document cache, the watcher, and the event bus
/// subscribers read from.
///
/// Construction performs the full initial crawl before returning, so by
/// the time any caller has a `ReaderClient` in hand the cache already
/// reflects the tree on disk; a subscriber that needs to see that backlog
/// as `load` events asks for it via [`SubscribeOptions::replay`].
pub struct ReaderClient {
    root: PathBuf,
    documents: Arc<RwLock<HashMap<RelPath, Document>>>,
    bus: Arc<kiln_core::EventBus<Document>>,
    cancel: CancellationToken,
    hasher: Arc<dyn ContentHasher>,
}

impl ReaderClient {
    /// Validates `root`, performs the initial crawl, and starts the
    /// background watcher loop. `worker_pool_permits` bounds concurrent
    /// file reads during both the initial crawl and steady-state updates.
    pub async fn new(root: impl Into<PathBuf>, ignore: globset::GlobSet, worker_pool_permits: usize) -> Result<Self> {
        let root = root.into();
        if !root.exists() {
            return Err(WatchError::RootNotFound(root));
        }

        let documents = Arc::new(RwLock::new(HashMap::new()));
        let bus = Arc::new(kiln_core::EventBus::new());
        let hasher: Arc<dyn ContentHasher> = Arc::new(Sha256Hasher);
        let cancel = CancellationToken::new();

        let permits = Arc::new(Semaphore::new(worker_pool_permits.max(1)));
        crawl_once(&root, &documents, &bus, &hasher, &permits).await?;

        let watcher = RecursiveWatcher::new(&root, ignore)?;
        tokio::spawn(watch_loop(
            watcher,
            root.clone(),
            documents.clone(),
            bus.clone(),
            hasher.clone(),
            permits,
            cancel.clone(),
        ));

        Ok(Self { root, documents, bus, cancel, hasher })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn get(&self, path: &RelPath) -> Option<Document> {
        self.documents.read().await.get(path).cloned()
    }

    pub async fn list(&self) -> Vec<Document> {
        self.documents.read().await.values().cloned().collect()
    }

    /// Registers a new subscriber, optionally replaying the current cache
    /// as `load` events before live updates begin.
    pub async fn subscribe(&self, options: SubscribeOptions) -> Subscription<Document> {
        let subscription = self.bus.subscribe().await;
        if options.replay {
            let snapshot: Vec<Document> = self.documents.read().await.values().cloned().collect();
            for doc in snapshot {
                self.bus.send_to(subscription.id, Event::load(doc.path().clone(), doc)).await;
            }
            self.bus.send_to(subscription.id, Event::subscriber_load_complete()).await;
        }
        subscription
    }

    pub async fn unsubscribe(&self, id: u64) {
        self.bus.unsubscribe(id).await;
    }

    /// Requests the watcher loop stop; in-flight work drains, then
    /// channels close.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

async fn crawl_once(
    root: &Path,
    documents: &Arc<RwLock<HashMap<RelPath, Document>>>,
    bus: &Arc<kiln_core::EventBus<Document>>,
    hasher: &Arc<dyn ContentHasher>,
    permits: &Arc<Semaphore>,
) -> Result<()> {
    let mut handles = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        if !has_recognized_extension(entry.path()) {
            continue;
        }
        let path = entry.path().to_path_buf();
        let root = root.to_path_buf();
        let documents = documents.clone();
        let bus = bus.clone();
        let hasher = hasher.clone();
        let permits = permits.clone();
        handles.push(tokio::spawn(async move {
            let _permit = permits.acquire_owned().await.expect("semaphore not closed during crawl");
            if let Err(err) = read_and_upsert(&path, &root, &documents, &bus, &hasher, true).await {
                tracing::warn!(path = %path.display(), error = %err, "failed to read file during initial crawl");
            }
        }));
    }
    // join_all rather than a plain await-loop: the crawl's wall time is the
    // slowest single file, not the sum, and this reads the same way as the
    // fan-out join points elsewhere in this workspace's scan/fetch code.
    futures::future::join_all(handles).await;
    Ok(())
}

async fn watch_loop(
    mut watcher: RecursiveWatcher,
    root: PathBuf,
    documents: Arc<RwLock<HashMap<RelPath, Document>>>,
    bus: Arc<kiln_core::EventBus<Document>>,
    hasher: Arc<dyn ContentHasher>,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("watch loop cancelled, draining");
                break;
            }
            maybe_error = watcher.errors().recv() => {
                match maybe_error {
                    Some(err) => tracing::error!(error = %err, "watcher error"),
                    None => {
                        tracing::error!("watcher error channel closed, stopping watch loop");
                        break;
                    }
                }
            }
            maybe_event = watcher.events().recv() => {
                let Some(event) = maybe_event else {
                    tracing::info!("watcher event channel closed, stopping watch loop");
                    break;
                };
                handle_raw_event(event, &root, &documents, &bus, &hasher, &permits).await;
            }
        }
    }
}

async fn handle_raw_event(
    event: crate::watcher::RawWatchEvent,
    root: &Path,
    documents: &Arc<RwLock<HashMap<RelPath, Document>>>,
    bus: &Arc<kiln_core::EventBus<Document>>,
    hasher: &Arc<dyn ContentHasher>,
    permits: &Arc<Semaphore>,
) {
    match event.kind {
        RawEventKind::Chmod => {}
        RawEventKind::Remove | RawEventKind::Rename => {
            for path in &event.paths {
                if let Some(rel) = to_rel_path(path, root) {
                    documents.write().await.remove(&rel);
                    if let Err(err) = bus.publish(Event::delete(rel)).await {
                        tracing::error!(error = %err, "failed to publish delete event");
                    }
                }
            }
        }
        RawEventKind::Create | RawEventKind::Write => {
            for path in &event.paths {
                let permit = match permits.clone().acquire_owned().await {
                    Ok(p) => p,
                    Err(_) => return,
                };
                let path = path.clone();
                let root = root.to_path_buf();
                let documents = documents.clone();
                let bus = bus.clone();
                let hasher = hasher.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    if let Err(err) = read_and_upsert(&path, &root, &documents, &bus, &hasher, false).await {
                        tracing::warn!(path = %path.display(), error = %err, "failed to read changed file");
                    }
                });
            }
        }
    }
}

async fn read_and_upsert(
    path: &Path,
    root: &Path,
    documents: &Arc<RwLock<HashMap<RelPath, Document>>>,
    bus: &Arc<kiln_core::EventBus<Document>>,
    hasher: &Arc<dyn ContentHasher>,
    is_initial_load: bool,
) -> Result<()> {
    let Some(rel) = to_rel_path(path, root) else {
        return Ok(());
    };

    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(source) => return Err(WatchError::Io { path: path.to_path_buf(), source }),
    };

    let fingerprint = hasher.fingerprint(&bytes);
    let text = String::from_utf8_lossy(&bytes).into_owned();
    let parsed = kiln_parser::parse_document(&text).map_err(|source| WatchError::Parse { path: path.to_path_buf(), source })?;

    let doc = Document::new(rel.clone(), fingerprint, parsed.metadata, parsed.content, parsed.content_start, SystemTime::now());

    documents.write().await.insert(rel.clone(), doc.clone());

    let event = if is_initial_load { Event::load(rel, doc) } else { Event::change(rel, doc) };
    bus.publish(event).await?;
    Ok(())
}

fn to_rel_path(path: &Path, root: &Path) -> Option<RelPath> {
    path.strip_prefix(root).ok().map(|p| RelPath::new(p.to_string_lossy()))
}

fn has_recognized_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| DEFAULT_RECOGNIZED_EXTENSIONS.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// The recurrence weekend policy the Task projection uses, threaded
/// through the Reader Client's consumers. Not read by the reader itself;
/// exposed so callers wiring up a projection don't need a second import.
pub fn default_weekend_policy() -> WeekendPolicy {
    WeekendPolicy::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_config::build_ignore_set;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::time::Duration;

    #[tokio::test]
    async fn initial_crawl_populates_cache() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.md"), "---\ntype: project\n---\nbody\n").unwrap();

        let client = ReaderClient::new(dir.path(), build_ignore_set(&[]).unwrap(), 8).await.unwrap();
        let docs = client.list().await;
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].metadata().get_scalar("type"), Some("project"));
        client.shutdown();
    }

    #[tokio::test]
    async fn subscribe_with_replay_delivers_load_then_complete() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.md"), "body\n").unwrap();

        let client = ReaderClient::new(dir.path(), build_ignore_set(&[]).unwrap(), 8).await.unwrap();
        let mut sub = client.subscribe(SubscribeOptions { replay: true }).await;

        let first = tokio::time::timeout(Duration::from_secs(2), sub.receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.operation, kiln_core::Operation::Load);

        let second = tokio::time::timeout(Duration::from_secs(2), sub.receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.operation, kiln_core::Operation::SubscriberLoadComplete);
        client.shutdown();
    }

    #[tokio::test]
    async fn new_file_after_construction_emits_change_event() {
        let dir = tempfile::tempdir().unwrap();
        let client = ReaderClient::new(dir.path(), build_ignore_set(&[]).unwrap(), 8).await.unwrap();
        let mut sub = client.subscribe(SubscribeOptions::default()).await;

        fs::write(dir.path().join("b.md"), "new body\n").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), sub.receiver.recv())
            .await
            .expect("event within timeout")
            .unwrap();
        assert_eq!(event.operation, kiln_core::Operation::Change);
        client.shutdown();
    }

    #[tracing_test::traced_test]
    #[tokio::test]
    async fn malformed_document_logs_a_warning_instead_of_halting_the_crawl() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.md"), "---\nnot-a-kv-line\n---\nbody\n").unwrap();
        fs::write(dir.path().join("good.md"), "body\n").unwrap();

        let client = ReaderClient::new(dir.path(), build_ignore_set(&[]).unwrap(), 8).await.unwrap();
        assert_eq!(client.list().await.len(), 1, "the malformed file is skipped, not cached");
        assert!(tracing_test::logs_contain("failed to read file during initial crawl"));
        client.shutdown();
    }
}
