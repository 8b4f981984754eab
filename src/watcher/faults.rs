//! Fault reporting for errors raised inside background watch tasks.
//!
//! A change stream has no caller to return an error to once its task is
//! running, so unrecoverable failures travel on this side channel instead.

use std::path::PathBuf;

use tokio::sync::mpsc;

use super::WatchError;

/// An unrecoverable failure for one tracked path.
#[derive(Debug)]
pub struct Fault {
    pub path: PathBuf,
    pub error: WatchError,
}

/// Sending half of the fault channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct FaultSender {
    tx: mpsc::UnboundedSender<Fault>,
}

/// Receiving half of the fault channel.
#[derive(Debug)]
pub struct FaultReceiver {
    rx: mpsc::UnboundedReceiver<Fault>,
}

/// Create a connected fault sender/receiver pair.
pub fn channel() -> (FaultSender, FaultReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (FaultSender { tx }, FaultReceiver { rx })
}

impl FaultSender {
    /// Log the failure and forward it to the receiver, if one is still listening.
    pub fn report(&self, path: impl Into<PathBuf>, error: WatchError) {
        let path = path.into();
        tracing::error!("[tracked] fatal for {}: {error}", path.display());

        if self.tx.send(Fault { path, error }).is_err() {
            crate::debug_event!("tracked", "fault receiver dropped");
        }
    }
}

impl FaultReceiver {
    /// Wait for the next fault. `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<Fault> {
        self.rx.recv().await
    }

    /// Take a fault if one is already queued.
    pub fn try_recv(&mut self) -> Option<Fault> {
        self.rx.try_recv().ok()
    }
}
