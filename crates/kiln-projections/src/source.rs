//! The Source projection (§4.H): documents whose `type` metadata is
//! `source`.

use std::collections::HashMap;
use std::sync::Arc;

use kiln_core::{Metadata, MetadataValue, RelPath, Subscription};
use kiln_watch::ReaderClient;
use kiln_writer::LineWriter;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::projection::run_projection_loop;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Article,
    Video,
    Unknown,
}

impl SourceFormat {
    fn parse(value: &str) -> Self {
        match value {
            "article" => Self::Article,
            "video" => Self::Video,
            _ => Self::Unknown,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Article => "article",
            Self::Video => "video",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub path: RelPath,
    pub fingerprint: String,
    pub title: Option<String>,
    pub format: SourceFormat,
    pub url: Option<String>,
}

pub struct SourceProjection {
    cache: Arc<RwLock<HashMap<RelPath, Source>>>,
    bus: Arc<kiln_core::EventBus<Source>>,
    writer: Arc<LineWriter>,
    cancel: CancellationToken,
}

impl SourceProjection {
    pub async fn new(reader: &ReaderClient, writer: Arc<LineWriter>) -> Self {
        let cache = Arc::new(RwLock::new(HashMap::new()));
        let bus = Arc::new(kiln_core::EventBus::new());
        let cancel = CancellationToken::new();

        let subscription = reader.subscribe(kiln_watch::SubscribeOptions { replay: true }).await;
        tokio::spawn(run_projection_loop(subscription, cache.clone(), bus.clone(), cancel.clone(), extract));

        Self { cache, bus, writer, cancel }
    }

    pub async fn subscribe(&self) -> Subscription<Source> {
        self.bus.subscribe().await
    }

    pub async fn unsubscribe(&self, id: u64) {
        self.bus.unsubscribe(id).await;
    }

    pub async fn summary(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn list(&self) -> Vec<Source> {
        self.cache.read().await.values().cloned().collect()
    }

    pub async fn create(&self, path: &RelPath, title: &str, format: SourceFormat, url: &str) -> Result<String> {
        let mut metadata = Metadata::new();
        metadata.insert(kiln_core::TYPE_KEY, MetadataValue::Scalar("source".to_string()));
        metadata.insert("title", MetadataValue::Scalar(title.to_string()));
        metadata.insert("format", MetadataValue::Scalar(format.as_str().to_string()));
        metadata.insert("url", MetadataValue::Scalar(url.to_string()));
        Ok(self.writer.create(path, &metadata, "").await?)
    }

    pub async fn delete(&self, path: &RelPath) -> Result<()> {
        Ok(self.writer.delete(path).await?)
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

fn extract(doc: &kiln_core::Document) -> Option<Source> {
    if doc.metadata().doc_type() != Some("source") {
        return None;
    }
    Some(Source {
        path: doc.path().clone(),
        fingerprint: doc.fingerprint().to_string(),
        title: doc.metadata().get_scalar("title").map(str::to_string),
        format: doc.metadata().get_scalar("format").map(SourceFormat::parse).unwrap_or(SourceFormat::Unknown),
        url: doc.metadata().get_scalar("url").map(str::to_string),
    })
}
