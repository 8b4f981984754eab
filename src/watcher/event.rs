//! Raw notifications and the semantic events derived from them.

use std::path::PathBuf;

use notify::EventKind;
use notify::event::{ModifyKind, RenameMode};

/// Operation carried by a raw notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawEventKind {
    Create,
    Write,
    Remove,
    Rename,
}

/// A single per-path notification from the OS layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub path: PathBuf,
    pub kind: RawEventKind,
}

impl RawEvent {
    pub fn new(path: impl Into<PathBuf>, kind: RawEventKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// Split a `notify` event into one raw event per path.
    ///
    /// The destination of a move is a creation: `Name(To)` paths and the
    /// second path of `Name(Both)` become `Create`, so a file renamed into
    /// place is picked up like a new one. Metadata changes, access events and
    /// unclassified kinds produce nothing.
    pub fn from_notify(event: notify::Event) -> Vec<RawEvent> {
        match event.kind {
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event
                .paths
                .into_iter()
                .enumerate()
                .map(|(i, path)| {
                    let kind = if i == 0 {
                        RawEventKind::Rename
                    } else {
                        RawEventKind::Create
                    };
                    RawEvent::new(path, kind)
                })
                .collect(),
            kind => {
                let Some(kind) = RawEventKind::from_notify(&kind) else {
                    return Vec::new();
                };
                event
                    .paths
                    .into_iter()
                    .map(|path| RawEvent { path, kind })
                    .collect()
            }
        }
    }
}

impl RawEventKind {
    fn from_notify(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(RawEventKind::Create),
            EventKind::Remove(_) => Some(RawEventKind::Remove),
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(RawEventKind::Create),
            EventKind::Modify(ModifyKind::Name(_)) => Some(RawEventKind::Rename),
            EventKind::Modify(ModifyKind::Metadata(_)) => None,
            EventKind::Modify(_) => Some(RawEventKind::Write),
            EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
        }
    }
}

/// Semantic change reported to the consumer of a tracked file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeEvent {
    /// File content changed and did not shrink.
    Modified,
    /// File shrank below its last known non-zero size.
    Truncated,
    /// File was removed or renamed away. Terminal.
    Deleted,
    /// The underlying notification channel closed. Terminal.
    WatcherClosed,
}

impl ChangeEvent {
    /// Whether this event ends the stream.
    pub fn is_terminal(self) -> bool {
        matches!(self, ChangeEvent::Deleted | ChangeEvent::WatcherClosed)
    }
}
