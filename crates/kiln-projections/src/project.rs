//! The Project projection (§4.G): documents whose `type` metadata is
//! `project`.

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
pub enum ProjectStatus {
    Active,
    Archived,
    Abandoned,
    Blocked,
    Backlog,
}

impl ProjectStatus {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "archived" => Some(Self::Archived),
            "abandoned" => Some(Self::Abandoned),
            "blocked" => Some(Self::Blocked),
            "backlog" => Some(Self::Backlog),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
            Self::Abandoned => "abandoned",
            Self::Blocked => "blocked",
            Self::Backlog => "backlog",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub path: RelPath,
    pub fingerprint: String,
    pub name: Option<String>,
    pub status: ProjectStatus,
}

pub struct ProjectProjection {
    cache: Arc<RwLock<HashMap<RelPath, Project>>>,
    bus: Arc<kiln_core::EventBus<Project>>,
    writer: Arc<LineWriter>,
    cancel: CancellationToken,
}

impl ProjectProjection {
    pub async fn new(reader: &ReaderClient, writer: Arc<LineWriter>) -> Self {
        let cache = Arc::new(RwLock::new(HashMap::new()));
        let bus = Arc::new(kiln_core::EventBus::new());
        let cancel = CancellationToken::new();

        let subscription = reader.subscribe(kiln_watch::SubscribeOptions { replay: true }).await;
        tokio::spawn(run_projection_loop(subscription, cache.clone(), bus.clone(), cancel.clone(), extract));

        Self { cache, bus, writer, cancel }
    }

    pub async fn subscribe(&self) -> Subscription<Project> {
        self.bus.subscribe().await
    }

    pub async fn unsubscribe(&self, id: u64) {
        self.bus.unsubscribe(id).await;
    }

    pub async fn summary(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn list(&self) -> Vec<Project> {
        self.cache.read().await.values().cloned().collect()
    }

    pub async fn create(&self, path: &RelPath, name: &str, status: ProjectStatus) -> Result<String> {
        let metadata = metadata_for(name, status);
        Ok(self.writer.create(path, &metadata, "").await?)
    }

    pub async fn update(&self, path: &RelPath, expected_fingerprint: &str, name: &str, status: ProjectStatus) -> Result<String> {
        let metadata = metadata_for(name, status);
        Ok(self.writer.update_metadata(path, expected_fingerprint, &metadata).await?)
    }

    pub async fn rename(&self, old: &RelPath, new: &RelPath) -> Result<()> {
        Ok(self.writer.rename(old, new).await?)
    }

    pub async fn delete(&self, path: &RelPath, expected_fingerprint: &str) -> Result<()> {
        let _ = expected_fingerprint;
        Ok(self.writer.delete(path).await?)
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

fn metadata_for(name: &str, status: ProjectStatus) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert(kiln_core::TYPE_KEY, MetadataValue::Scalar("project".to_string()));
    metadata.insert("name", MetadataValue::Scalar(name.to_string()));
    metadata.insert("status", MetadataValue::Scalar(status.as_str().to_string()));
    metadata
}

fn extract(doc: &kiln_core::Document) -> Option<Project> {
    if doc.metadata().doc_type() != Some("project") {
        return None;
    }
    let status = doc
        .metadata()
        .get_scalar("status")
        .and_then(ProjectStatus::parse)
        .unwrap_or(ProjectStatus::Backlog);
    let name = doc.metadata().get_scalar("name").map(str::to_string);
    Some(Project { path: doc.path().clone(), fingerprint: doc.fingerprint().to_string(), name, status })
}
