//! File change detection for a single tracked path.
//!
//! Raw notifications come from one OS watcher per acquired handle, owned by a
//! shared registry. A tracked file classifies them into change events.
//!
//! # Architecture
//!
//! ```text
//! WatchBackend (notify::RecommendedWatcher)
//!         | RawEvent
//! WatcherRegistry
//!   - one OS watcher per WatcherHandle
//!   - release / release_all
//!         |
//! TrackedFile
//!   - block_until_exists (caller's task)
//!   - change_events (background task) --> FileChanges --> consumer
//!                                     \-> FaultSender (fatal errors)
//! ```

mod backend;
mod changes;
mod error;
mod event;
pub mod faults;
mod registry;
mod tracked;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{NotifyBackend, PathWatcher, WatchBackend};
pub use changes::FileChanges;
pub use error::WatchError;
pub use event::{ChangeEvent, RawEvent, RawEventKind};
pub use faults::{Fault, FaultReceiver, FaultSender};
pub use registry::{HandleId, WatcherHandle, WatcherRegistry};
pub use tracked::TrackedFile;
