//! Core document model, content hashing and event-bus primitives shared by
//! every other crate in the kiln workspace.

pub mod document;
pub mod error;
pub mod events;
pub mod hashing;
pub mod metadata;

pub use document::{Document, RelPath};
pub use error::{CoreError, Result};
pub use events::{Event, EventBus, Operation, Subscription, WatchAdapter, Watcher};
pub use hashing::{ContentHasher, Sha256Hasher};
pub use metadata::{Metadata, MetadataValue, TYPE_KEY};
