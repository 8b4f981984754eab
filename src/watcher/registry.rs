//! Central ownership of OS-level watch handles.
//!
//! Every OS watcher lives in one registry map so that creation failures are
//! reported uniformly and all outstanding watchers can be torn down together.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::config::WatchConfig;

use super::backend::{NotifyBackend, PathWatcher, WatchBackend};
use super::error::WatchError;
use super::event::RawEvent;

/// Identity of one acquired watch handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type SharedWatcher = Arc<Mutex<Box<dyn PathWatcher>>>;

struct RegistryInner {
    backend: Box<dyn WatchBackend>,
    max_handles: Option<usize>,
    event_capacity: usize,
    next_id: AtomicU64,
    watchers: Mutex<HashMap<HandleId, SharedWatcher>>,
}

/// Registry of live watch handles. Clones share the same state.
#[derive(Clone)]
pub struct WatcherRegistry {
    inner: Arc<RegistryInner>,
}

impl WatcherRegistry {
    /// Registry over the platform watcher with default limits.
    pub fn new() -> Self {
        Self::from_config(&WatchConfig::default())
    }

    /// Registry over the platform watcher.
    pub fn from_config(config: &WatchConfig) -> Self {
        Self::with_backend(NotifyBackend, config)
    }

    /// Registry over a custom backend.
    pub fn with_backend(backend: impl WatchBackend + 'static, config: &WatchConfig) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                backend: Box::new(backend),
                max_handles: config.max_handles,
                event_capacity: config.event_capacity(),
                next_id: AtomicU64::new(1),
                watchers: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Allocate a new OS-level subscription.
    pub fn acquire(&self) -> Result<WatcherHandle, WatchError> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watchers = self.inner.watchers.lock();
        if let Some(max) = self.inner.max_handles
            && watchers.len() >= max
        {
            return Err(WatchError::WatchCreation {
                reason: format!("watch handle limit reached ({max} outstanding)"),
            });
        }

        let watcher = self.inner.backend.open(tx)?;
        let id = HandleId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        watchers.insert(id, Arc::new(Mutex::new(watcher)));

        crate::debug_event!(
            "registry",
            "acquired",
            "handle {id} ({} outstanding)",
            watchers.len()
        );

        Ok(WatcherHandle {
            id,
            events: rx,
            registry: self.clone(),
        })
    }

    /// Close a handle's OS subscription. Returns false if it was already closed.
    pub fn release(&self, handle: &WatcherHandle) -> bool {
        self.release_id(handle.id)
    }

    /// Close the OS subscription with the given id. Idempotent.
    pub fn release_id(&self, id: HandleId) -> bool {
        let removed = self.inner.watchers.lock().remove(&id);

        // Dropped outside the registry lock.
        match removed {
            Some(watcher) => {
                drop(watcher);
                crate::debug_event!("registry", "released", "handle {id}");
                true
            }
            None => false,
        }
    }

    /// Close every outstanding handle, returning how many were closed.
    ///
    /// New handles may still be acquired afterwards.
    pub fn release_all(&self) -> usize {
        let drained: Vec<SharedWatcher> = {
            let mut watchers = self.inner.watchers.lock();
            watchers.drain().map(|(_, watcher)| watcher).collect()
        };

        let count = drained.len();
        drop(drained);

        if count > 0 {
            crate::log_event!("registry", "released all", "{count} handles");
        }
        count
    }

    /// Number of handles currently open.
    pub fn outstanding(&self) -> usize {
        self.inner.watchers.lock().len()
    }

    /// Capacity for change streams built on this registry.
    pub(crate) fn event_capacity(&self) -> usize {
        self.inner.event_capacity
    }

    fn watcher(&self, id: HandleId) -> Option<SharedWatcher> {
        self.inner.watchers.lock().get(&id).cloned()
    }
}

impl Default for WatcherRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for WatcherRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatcherRegistry")
            .field("outstanding", &self.outstanding())
            .field("max_handles", &self.inner.max_handles)
            .finish()
    }
}

/// One acquired subscription: registration through the registry plus the
/// stream of raw events it delivers.
///
/// Dropping the handle releases it.
pub struct WatcherHandle {
    id: HandleId,
    events: mpsc::UnboundedReceiver<RawEvent>,
    registry: WatcherRegistry,
}

impl WatcherHandle {
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Register interest in `path` on this handle's OS watcher.
    pub fn watch(&self, path: &Path) -> Result<(), WatchError> {
        // Registry lock is not held while the backend registers the path.
        let watcher = self.registry.watcher(self.id).ok_or(WatchError::WatcherClosed)?;
        let result = watcher.lock().watch(path);

        result.map_err(|e| WatchError::registration(path, e))?;
        crate::debug_event!("registry", "watching", "{} on {}", path.display(), self.id);
        Ok(())
    }

    /// Next raw event, or `None` once the handle has been released.
    pub async fn recv(&mut self) -> Option<RawEvent> {
        self.events.recv().await
    }

    /// Release this handle. Same as `WatcherRegistry::release`.
    pub fn release(&self) -> bool {
        self.registry.release_id(self.id)
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.registry.release_id(self.id);
    }
}

impl fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatcherHandle").field("id", &self.id).finish()
    }
}
