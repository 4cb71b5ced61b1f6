//! Recursive Watcher (§4.A): wraps `notify`'s recursive `RecommendedWatcher`
//! behind `notify-debouncer-full`, filtering out directory events and
//! well-known ignored paths before anything reaches the Reader Client.

use std::path::{Path, PathBuf};
use std::time::Duration;

use globset::GlobSet;
use notify_debouncer_full::notify::{EventKind, RecursiveMode, Watcher as _};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, DebouncedEvent, Debouncer, FileIdMap, RecommendedWatcher};
use tokio::sync::mpsc;

use crate::error::{Result, WatchError};

/// The debounce window rapid-fire editor writes (temp-file-then-rename) are
/// coalesced within, matching the pattern used elsewhere in this
/// workspace's watcher code.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(2);

/// The default set of file extensions the watcher and initial scan
/// recognize; anything else is filtered out before reaching the Reader
/// Client.
pub const DEFAULT_RECOGNIZED_EXTENSIONS: &[&str] = &["md", "markdown"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEventKind {
    Create,
    Write,
    Remove,
    Rename,
    Chmod,
}

#[derive(Debug, Clone)]
pub struct RawWatchEvent {
    pub kind: RawEventKind,
    pub paths: Vec<PathBuf>,
}

/// A live recursive filesystem watch over `root`.
///
/// Holds the underlying `Debouncer` alive for as long as this value is
/// alive; dropping it (or calling [`close`](Self::close)) stops the watch.
pub struct RecursiveWatcher {
    _debouncer: Debouncer<RecommendedWatcher, FileIdMap>,
    events: mpsc::UnboundedReceiver<RawWatchEvent>,
    errors: mpsc::UnboundedReceiver<WatchError>,
}

impl RecursiveWatcher {
    pub fn new(root: &Path, ignore: GlobSet) -> Result<Self> {
        Self::with_debounce(root, ignore, DEFAULT_DEBOUNCE, DEFAULT_RECOGNIZED_EXTENSIONS)
    }

    pub fn with_debounce(
        root: &Path,
        ignore: GlobSet,
        debounce: Duration,
        extensions: &'static [&'static str],
    ) -> Result<Self> {
        if !root.exists() {
            return Err(WatchError::RootNotFound(root.to_path_buf()));
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (error_tx, error_rx) = mpsc::unbounded_channel();
        let root_owned = root.to_path_buf();

        let mut debouncer = new_debouncer(debounce, None, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    for event in events.iter() {
                        dispatch_event(event, &root_owned, &ignore, extensions, &event_tx);
                    }
                }
                Err(errors) => {
                    for error in errors {
                        let _ = error_tx.send(WatchError::Notify(error));
                    }
                }
            }
        })?;

        debouncer.watcher().watch(root, RecursiveMode::Recursive)?;

        Ok(Self { _debouncer: debouncer, events: event_rx, errors: error_rx })
    }

    /// The stream of recognized, filtered filesystem events.
    pub fn events(&mut self) -> &mut mpsc::UnboundedReceiver<RawWatchEvent> {
        &mut self.events
    }

    /// The stream of watcher-level errors (not per-file parse errors).
    pub fn errors(&mut self) -> &mut mpsc::UnboundedReceiver<WatchError> {
        &mut self.errors
    }

    /// Stops the watch. Equivalent to dropping the value, spelled out for
    /// callers that want an explicit shutdown point.
    pub fn close(self) {
        drop(self);
    }
}

fn dispatch_event(
    event: &DebouncedEvent,
    root: &Path,
    ignore: &GlobSet,
    extensions: &[&str],
    event_tx: &mpsc::UnboundedSender<RawWatchEvent>,
) {
    let kind = match event.event.kind {
        EventKind::Create(_) => RawEventKind::Create,
        EventKind::Modify(notify_debouncer_full::notify::event::ModifyKind::Metadata(_)) => RawEventKind::Chmod,
        EventKind::Modify(notify_debouncer_full::notify::event::ModifyKind::Name(_)) => RawEventKind::Rename,
        EventKind::Modify(_) => RawEventKind::Write,
        EventKind::Remove(_) => RawEventKind::Remove,
        _ => return,
    };

    let paths: Vec<PathBuf> = event
        .paths
        .iter()
        .filter(|path| is_recognized_file(path, root, ignore, extensions))
        .cloned()
        .collect();

    if paths.is_empty() {
        return;
    }

    let _ = event_tx.send(RawWatchEvent { kind, paths });
}

fn is_recognized_file(path: &Path, root: &Path, ignore: &GlobSet, extensions: &[&str]) -> bool {
    if path.is_dir() {
        return false;
    }
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    if !extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)) {
        return false;
    }
    let Ok(relative) = path.strip_prefix(root) else {
        return true;
    };
    !ignore.is_match(relative)
}
