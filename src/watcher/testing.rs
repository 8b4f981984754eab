//! Scripted backend for driving watch handles from tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::backend::{PathWatcher, WatchBackend};
use super::event::RawEvent;

#[derive(Default)]
struct ScriptState {
    senders: Vec<mpsc::WeakUnboundedSender<RawEvent>>,
    watched: Vec<PathBuf>,
    fail_open: bool,
    fail_watch: HashMap<PathBuf, bool>,
}

/// Backend whose events are injected by the test.
///
/// Watching a path that does not exist fails with `PathNotFound`, like the
/// platform watchers do.
#[derive(Clone, Default)]
pub(crate) struct ScriptedBackend {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail_open(&self, fail: bool) {
        self.state.lock().fail_open = fail;
    }

    /// Make registration of `path` fail, as not-found or as a generic failure.
    pub(crate) fn fail_watch(&self, path: impl Into<PathBuf>, not_found: bool) {
        self.state.lock().fail_watch.insert(path.into(), not_found);
    }

    /// Deliver an event to every open subscription. Returns how many received it.
    pub(crate) fn emit(&self, event: RawEvent) -> usize {
        let mut state = self.state.lock();
        state.senders.retain(|weak| weak.upgrade().is_some());

        state
            .senders
            .iter()
            .filter_map(|weak| weak.upgrade())
            .filter(|tx| tx.send(event.clone()).is_ok())
            .count()
    }

    /// Every path registered so far, in order.
    pub(crate) fn watched(&self) -> Vec<PathBuf> {
        self.state.lock().watched.clone()
    }

    /// Subscriptions that are still open.
    pub(crate) fn open_subscriptions(&self) -> usize {
        let state = self.state.lock();
        state.senders.iter().filter(|w| w.upgrade().is_some()).count()
    }
}

impl WatchBackend for ScriptedBackend {
    fn open(
        &self,
        events: mpsc::UnboundedSender<RawEvent>,
    ) -> notify::Result<Box<dyn PathWatcher>> {
        let mut state = self.state.lock();
        if state.fail_open {
            return Err(notify::Error::generic("too many open files"));
        }

        state.senders.push(events.downgrade());
        Ok(Box::new(ScriptedWatcher {
            _events: events,
            state: self.state.clone(),
        }))
    }
}

struct ScriptedWatcher {
    // Holding the only strong sender ties channel lifetime to the watcher.
    _events: mpsc::UnboundedSender<RawEvent>,
    state: Arc<Mutex<ScriptState>>,
}

impl PathWatcher for ScriptedWatcher {
    fn watch(&mut self, path: &Path) -> notify::Result<()> {
        let mut state = self.state.lock();
        if let Some(&not_found) = state.fail_watch.get(path) {
            let err = if not_found {
                notify::Error::path_not_found()
            } else {
                notify::Error::new(notify::ErrorKind::MaxFilesWatch)
            };
            return Err(err.add_path(path.to_path_buf()));
        }
        if !path.exists() {
            return Err(notify::Error::path_not_found().add_path(path.to_path_buf()));
        }

        state.watched.push(path.to_path_buf());
        Ok(())
    }
}
