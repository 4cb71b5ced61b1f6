//! Recursive filesystem watching and the Reader Client for the kiln note
//! engine.

pub mod error;
pub mod reader;
pub mod watcher;

pub use error::{Result, WatchError};
pub use reader::{ReaderClient, SubscribeOptions};
pub use watcher::{RawEventKind, RawWatchEvent, RecursiveWatcher};
