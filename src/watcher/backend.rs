//! Seam between the registry and the OS notification primitive.

use std::path::Path;

use notify::{Event, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::event::RawEvent;

/// One OS-level subscription that can register interest in paths.
///
/// Dropping the watcher must stop event delivery and drop the sender it was
/// opened with, so the receiving side observes the channel closing.
pub trait PathWatcher: Send {
    /// Register a non-recursive watch on `path`.
    fn watch(&mut self, path: &Path) -> notify::Result<()>;
}

/// Factory for OS-level subscriptions.
///
/// The event sender is unbounded: the OS notification thread must never block
/// on a consumer that is itself waiting on a watch registration. The cost is
/// memory: while a slow consumer holds back the bounded change stream, raw
/// events queue here without limit until the handle catches up or is released.
pub trait WatchBackend: Send + Sync {
    /// Allocate a new subscription delivering raw events into `events`.
    fn open(&self, events: mpsc::UnboundedSender<RawEvent>) -> notify::Result<Box<dyn PathWatcher>>;
}

/// Backend over `notify::RecommendedWatcher` (inotify, FSEvents, ReadDirectoryChanges).
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifyBackend;

impl WatchBackend for NotifyBackend {
    fn open(&self, events: mpsc::UnboundedSender<RawEvent>) -> notify::Result<Box<dyn PathWatcher>> {
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for raw in RawEvent::from_notify(event) {
                    // Receiver gone means the handle was released.
                    if events.send(raw).is_err() {
                        break;
                    }
                }
            }
            Err(e) => {
                tracing::warn!("[watcher] file watch error: {e}");
            }
        })?;

        Ok(Box::new(watcher))
    }
}

impl PathWatcher for notify::RecommendedWatcher {
    fn watch(&mut self, path: &Path) -> notify::Result<()> {
        Watcher::watch(self, path, RecursiveMode::NonRecursive)
    }
}
