//! The Daily projection (§4.I): documents whose `type` metadata is `daily`,
//! keyed additionally by a date parsed from the filename.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use kiln_core::{Metadata, MetadataValue, RelPath, Subscription};
use kiln_watch::ReaderClient;
use kiln_writer::LineWriter;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::{ProjectionError, Result};
use crate::projection::run_projection_loop;

/// The poll tick `ensure` uses while waiting for a just-created daily note
/// to surface in the cache via the Reader Client's watch loop.
pub const ENSURE_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Daily {
    pub path: RelPath,
    pub fingerprint: String,
    pub date: NaiveDate,
}

pub struct DailyProjection {
    cache: Arc<RwLock<HashMap<RelPath, Daily>>>,
    bus: Arc<kiln_core::EventBus<Daily>>,
    writer: Arc<LineWriter>,
    daily_dir: String,
    extension: String,
    cancel: CancellationToken,
}

impl DailyProjection {
    pub async fn new(reader: &ReaderClient, writer: Arc<LineWriter>, daily_dir: impl Into<String>, extension: impl Into<String>) -> Self {
        let cache = Arc::new(RwLock::new(HashMap::new()));
        let bus = Arc::new(kiln_core::EventBus::new());
        let cancel = CancellationToken::new();

        let subscription = reader.subscribe(kiln_watch::SubscribeOptions { replay: true }).await;
        tokio::spawn(run_projection_loop(subscription, cache.clone(), bus.clone(), cancel.clone(), extract));

        Self { cache, bus, writer, daily_dir: daily_dir.into(), extension: extension.into(), cancel }
    }

    pub async fn subscribe(&self) -> Subscription<Daily> {
        self.bus.subscribe().await
    }

    pub async fn unsubscribe(&self, id: u64) {
        self.bus.unsubscribe(id).await;
    }

    pub async fn summary(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn list(&self) -> Vec<Daily> {
        self.cache.read().await.values().cloned().collect()
    }

    fn path_for(&self, date: NaiveDate) -> RelPath {
        RelPath::new(format!("{}/{}.{}", self.daily_dir, date.format("%Y-%m-%d"), self.extension))
    }

    async fn cached_for(&self, date: NaiveDate) -> Option<Daily> {
        self.cache.read().await.values().find(|d| d.date == date).cloned()
    }

    /// If a daily for `date` is already cached, returns it immediately.
    /// Otherwise issues a create and, if `wait` is non-zero, polls the
    /// cache for up to `wait` before giving up with
    /// [`ProjectionError::Timeout`]. With `wait` zero, returns `Ok(None)`
    /// right after issuing the create ("not yet present").
    pub async fn ensure(&self, date: NaiveDate, wait: Duration) -> Result<Option<Daily>> {
        if let Some(daily) = self.cached_for(date).await {
            return Ok(Some(daily));
        }

        let path = self.path_for(date);
        let mut metadata = Metadata::new();
        metadata.insert(kiln_core::TYPE_KEY, MetadataValue::Scalar("daily".to_string()));
        self.writer.create(&path, &metadata, "").await?;

        if wait.is_zero() {
            return Ok(None);
        }

        let deadline = tokio::time::Instant::now() + wait;
        while tokio::time::Instant::now() < deadline {
            if let Some(daily) = self.cached_for(date).await {
                return Ok(Some(daily));
            }
            tokio::time::sleep(ENSURE_POLL_INTERVAL).await;
        }

        Err(ProjectionError::Timeout { deadline_ms: wait.as_millis() as u64 })
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

fn extract(doc: &kiln_core::Document) -> Option<Daily> {
    if doc.metadata().doc_type() != Some("daily") {
        return None;
    }
    let stem = doc.path().as_str().rsplit('/').next()?.rsplit_once('.').map(|(stem, _)| stem)?;
    let date = NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok()?;
    Some(Daily { path: doc.path().clone(), fingerprint: doc.fingerprint().to_string(), date })
}
