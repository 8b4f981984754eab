//! Follow a single file on disk and receive classified change events.
//!
//! ```no_run
//! use tailwatch::{ChangeEvent, TrackedFile, WatcherRegistry, faults};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), tailwatch::WatchError> {
//! let registry = WatcherRegistry::new();
//! let cancel = CancellationToken::new();
//! let (fault_tx, _fault_rx) = faults::channel();
//!
//! let file = TrackedFile::new("/var/log/app.log", registry.clone());
//! file.block_until_exists(&cancel).await?;
//!
//! let mut changes = file.change_events(cancel.clone(), None, &fault_tx);
//! while let Some(event) = changes.recv().await {
//!     match event {
//!         ChangeEvent::Modified => { /* read appended data */ }
//!         ChangeEvent::Truncated => { /* seek back to the start */ }
//!         ChangeEvent::Deleted | ChangeEvent::WatcherClosed => break,
//!     }
//! }
//!
//! registry.release_all();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod logging;
pub mod watcher;

pub use config::{LoggingConfig, Settings, WatchConfig};
pub use watcher::{
    ChangeEvent, FileChanges, RawEvent, RawEventKind, TrackedFile, WatchError, WatcherHandle,
    WatcherRegistry, faults,
};
