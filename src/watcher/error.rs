//! Error types for watch handles and tracked files.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from watcher operations.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to create watcher: {reason}")]
    WatchCreation { reason: String },

    #[error("Cannot watch path {path}: {reason}")]
    PathRegistration {
        path: PathBuf,
        not_found: bool,
        reason: String,
    },

    #[error("Failed to stat {path}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Watcher has been closed")]
    WatcherClosed,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Failed to load config: {reason}")]
    Config { reason: String },
}

impl WatchError {
    /// Build a registration error from a backend failure.
    pub fn registration(path: impl Into<PathBuf>, err: notify::Error) -> Self {
        WatchError::PathRegistration {
            path: path.into(),
            not_found: notify_not_found(&err),
            reason: err.to_string(),
        }
    }

    /// True for the failures that mean "the path does not exist yet".
    pub fn is_not_found(&self) -> bool {
        match self {
            WatchError::PathRegistration { not_found, .. } => *not_found,
            WatchError::Stat { source, .. } => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

impl From<notify::Error> for WatchError {
    fn from(e: notify::Error) -> Self {
        WatchError::WatchCreation {
            reason: e.to_string(),
        }
    }
}

fn notify_not_found(err: &notify::Error) -> bool {
    match &err.kind {
        notify::ErrorKind::PathNotFound => true,
        notify::ErrorKind::Io(io_err) => io_err.kind() == io::ErrorKind::NotFound,
        _ => false,
    }
}
