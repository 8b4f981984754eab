//! Per-path change detection.
//!
//! A [`TrackedFile`] turns raw notifications about one path and its parent
//! directory into [`ChangeEvent`]s:
//!
//! ```text
//! Remove on path           -> Deleted (terminal)
//! Rename on path or parent -> Deleted (terminal)
//! Create on path           -> re-watch path, then as Write
//! Write on path            -> stat: missing -> Deleted (terminal)
//!                                   shrank  -> Truncated
//!                                   else    -> Modified
//! anything else            -> ignored
//! ```

use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

use super::changes::{ChangeSender, FileChanges};
use super::error::WatchError;
use super::event::{ChangeEvent, RawEvent, RawEventKind};
use super::faults::FaultSender;
use super::registry::{WatcherHandle, WatcherRegistry};

/// A single file observed through a [`WatcherRegistry`].
///
/// The path does not need to exist yet. One active change stream per
/// `TrackedFile` is expected; concurrent streams share the size state.
#[derive(Debug)]
pub struct TrackedFile {
    path: PathBuf,
    dir: PathBuf,
    size: Arc<AtomicU64>,
    registry: WatcherRegistry,
}

impl TrackedFile {
    /// Track `path`. Relative paths resolve against the current directory.
    pub fn new(path: impl AsRef<Path>, registry: WatcherRegistry) -> Self {
        let path = normalize(path.as_ref());
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        Self {
            path,
            dir,
            size: Arc::new(AtomicU64::new(0)),
            registry,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size recorded by the most recent stat in a change stream.
    pub fn last_known_size(&self) -> u64 {
        self.size.load(Ordering::Acquire)
    }

    /// Wait in the calling task until the path exists.
    ///
    /// Returns `Cancelled` if `cancel` fires first and `WatcherClosed` if the
    /// watch is torn down underneath (e.g. `release_all`). A stat failure other
    /// than not-found is returned as-is.
    pub async fn block_until_exists(&self, cancel: &CancellationToken) -> Result<(), WatchError> {
        let mut handle = self.registry.acquire()?;

        // The file is not there yet, so watch for it being created in its directory.
        handle.watch(&self.dir)?;

        // Re-check after registering: the file may have appeared in between.
        match tokio::fs::metadata(&self.path).await {
            Ok(_) => return Ok(()),
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                return Err(WatchError::Stat {
                    path: self.path.clone(),
                    source: e,
                });
            }
            Err(_) => {}
        }

        crate::debug_event!("tracked", "waiting for", "{}", self.path.display());

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(WatchError::Cancelled),
                raw = handle.recv() => match raw {
                    None => return Err(WatchError::WatcherClosed),
                    Some(raw) if raw.kind == RawEventKind::Create && raw.path == self.path => {
                        crate::log_event!("tracked", "created", "{}", self.path.display());
                        return Ok(());
                    }
                    Some(_) => {}
                },
            }
        }
    }

    /// Start streaming change events for this file.
    ///
    /// `initial` seeds the last known size, typically from the metadata the
    /// caller read before it started following the file. Setup failures are
    /// reported on `faults` and yield a stream that has already ended.
    pub fn change_events(
        &self,
        cancel: CancellationToken,
        initial: Option<&Metadata>,
        faults: &FaultSender,
    ) -> FileChanges {
        let handle = match self.open_watch() {
            Ok(handle) => handle,
            Err(e) => {
                faults.report(&self.path, e);
                return FileChanges::closed();
            }
        };

        if let Some(meta) = initial {
            self.size.store(meta.len(), Ordering::Release);
        }

        let (tx, changes) = FileChanges::channel(self.registry.event_capacity());
        let stream = ChangeStream {
            classifier: Classifier {
                path: self.path.clone(),
                dir: self.dir.clone(),
                size: self.size.clone(),
            },
            handle,
            tx,
            cancel,
            faults: faults.clone(),
        };

        tokio::spawn(stream.run());
        changes
    }

    /// Acquire a handle watching the path (if present) and its directory.
    fn open_watch(&self) -> Result<WatcherHandle, WatchError> {
        let handle = self.registry.acquire()?;

        for target in [&self.path, &self.dir] {
            match handle.watch(target) {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    crate::debug_event!("tracked", "not present yet", "{}", target.display());
                }
                Err(e) => return Err(e),
            }
        }

        Ok(handle)
    }
}

/// What a raw event asks the stream to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Triage {
    Ignore,
    Deleted,
    Stat { rewatch: bool },
}

/// Classification state for one stream.
#[derive(Debug)]
struct Classifier {
    path: PathBuf,
    dir: PathBuf,
    size: Arc<AtomicU64>,
}

impl Classifier {
    fn triage(&self, raw: &RawEvent) -> Triage {
        let on_path = raw.path == self.path;

        match raw.kind {
            RawEventKind::Remove if on_path => Triage::Deleted,
            RawEventKind::Rename if on_path || raw.path == self.dir => Triage::Deleted,
            RawEventKind::Create if on_path => Triage::Stat { rewatch: true },
            RawEventKind::Write if on_path => Triage::Stat { rewatch: false },
            _ => Triage::Ignore,
        }
    }

    /// Classify a stat of the tracked path against the last known size.
    ///
    /// The size is updated only when the stat succeeded.
    fn classify(&self, stat: io::Result<u64>) -> Result<ChangeEvent, WatchError> {
        let current = match stat {
            Ok(len) => len,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ChangeEvent::Deleted),
            Err(e) => {
                return Err(WatchError::Stat {
                    path: self.path.clone(),
                    source: e,
                });
            }
        };

        let previous = self.size.swap(current, Ordering::AcqRel);
        Ok(size_change(previous, current))
    }
}

/// Truncated when a non-empty file shrank, Modified otherwise.
fn size_change(previous: u64, current: u64) -> ChangeEvent {
    if previous > 0 && current < previous {
        ChangeEvent::Truncated
    } else {
        ChangeEvent::Modified
    }
}

/// Background task state for one `change_events` call.
struct ChangeStream {
    classifier: Classifier,
    handle: WatcherHandle,
    tx: ChangeSender,
    cancel: CancellationToken,
    faults: FaultSender,
}

impl ChangeStream {
    async fn run(mut self) {
        let path = self.classifier.path.clone();
        crate::debug_event!("tracked", "streaming", "{} on {}", path.display(), self.handle.id());

        loop {
            let raw = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    crate::debug_event!("tracked", "cancelled", "{}", path.display());
                    break;
                }
                raw = self.handle.recv() => raw,
            };

            let Some(raw) = raw else {
                tracing::warn!("[tracked] watcher closed for {}", path.display());
                self.tx.deliver(ChangeEvent::WatcherClosed, &self.cancel).await;
                break;
            };

            let event = match self.classifier.triage(&raw) {
                Triage::Ignore => {
                    tracing::trace!("[tracked] ignored {:?} {}", raw.kind, raw.path.display());
                    continue;
                }
                Triage::Deleted => ChangeEvent::Deleted,
                Triage::Stat { rewatch } => {
                    if rewatch && let Err(e) = self.handle.watch(&path) {
                        tracing::warn!("[tracked] failed to re-watch {}: {e}", path.display());
                    }

                    let stat = tokio::fs::metadata(&path).await.map(|meta| meta.len());
                    match self.classifier.classify(stat) {
                        Ok(event) => event,
                        Err(e) => {
                            self.faults.report(&path, e);
                            break;
                        }
                    }
                }
            };

            crate::debug_event!("tracked", "event", "{event:?} {}", path.display());

            if !self.tx.deliver(event, &self.cancel).await {
                break;
            }
            if event.is_terminal() {
                crate::log_event!("tracked", "stream ended", "{event:?} {}", path.display());
                break;
            }
        }

        self.handle.release();
    }
}

/// Absolute form of `path`, with the parent directory canonicalized when it exists.
///
/// Platform watchers report events under the canonical directory path.
fn normalize(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => match parent.canonicalize() {
            Ok(dir) => dir.join(name),
            Err(_) => absolute,
        },
        _ => absolute,
    }
}
