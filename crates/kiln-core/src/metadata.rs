//! The metadata map parsed from a document's front-matter block.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The reserved key that selects which domain projection (Task, Project,
/// Source, Daily) a document belongs to.
pub const TYPE_KEY: &str = "type";

/// A single front-matter value: either a bare scalar or a list of scalars.
///
/// The front-matter grammar (see `kiln-parser`) is deliberately a simple
/// key/value block, not a general-purpose data format, so this enum only
/// needs two shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Scalar(String),
    List(Vec<String>),
}

impl MetadataValue {
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            MetadataValue::Scalar(s) => Some(s),
            MetadataValue::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            MetadataValue::List(items) => Some(items),
            MetadataValue::Scalar(_) => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Scalar(s) => write!(f, "{s}"),
            MetadataValue::List(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

/// A document's front-matter, as a string-keyed map. `BTreeMap` keeps
/// iteration order stable, which matters for deterministic re-serialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata(BTreeMap<String, MetadataValue>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.0.get(key)
    }

    pub fn get_scalar(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(MetadataValue::as_scalar)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: MetadataValue) {
        self.0.insert(key.into(), value);
    }

    /// The value of the reserved `type` key, used to route a document to a
    /// domain projection (`task`, `project`, `source`, `daily`).
    pub fn doc_type(&self) -> Option<&str> {
        self.get_scalar(TYPE_KEY)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MetadataValue)> {
        self.0.iter()
    }
}

impl FromIterator<(String, MetadataValue)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (String, MetadataValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
