//! Outbound stream of change events for one tracked file.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::event::ChangeEvent;

/// Finite, single-consumer stream of [`ChangeEvent`]s.
///
/// Ends after a terminal event, on cancellation, or on a fatal error. A new
/// stream requires a new `change_events` call.
#[derive(Debug)]
pub struct FileChanges {
    rx: mpsc::Receiver<ChangeEvent>,
}

impl FileChanges {
    pub(crate) fn channel(capacity: usize) -> (ChangeSender, FileChanges) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (ChangeSender { tx }, FileChanges { rx })
    }

    /// A stream that has already ended.
    pub(crate) fn closed() -> Self {
        let (_, changes) = Self::channel(1);
        changes
    }

    /// Next event, or `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }
}

/// Producing half owned by the background task.
#[derive(Debug)]
pub(crate) struct ChangeSender {
    tx: mpsc::Sender<ChangeEvent>,
}

impl ChangeSender {
    /// Hand an event to the consumer, waiting for room.
    ///
    /// Returns false if cancellation fired first or the consumer is gone; the
    /// event is not delivered in either case.
    pub(crate) async fn deliver(&self, event: ChangeEvent, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            sent = self.tx.send(event) => sent.is_ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_deliver_in_order() {
        let (tx, mut changes) = FileChanges::channel(4);
        let cancel = CancellationToken::new();

        assert!(tx.deliver(ChangeEvent::Modified, &cancel).await);
        assert!(tx.deliver(ChangeEvent::Truncated, &cancel).await);
        drop(tx);

        assert_eq!(changes.recv().await, Some(ChangeEvent::Modified));
        assert_eq!(changes.recv().await, Some(ChangeEvent::Truncated));
        assert_eq!(changes.recv().await, None);
    }

    #[tokio::test]
    async fn test_deliver_waits_for_consumer() {
        let (tx, mut changes) = FileChanges::channel(1);
        let cancel = CancellationToken::new();

        assert!(tx.deliver(ChangeEvent::Modified, &cancel).await);

        // Buffer full: the second delivery stalls until the consumer reads
        let pending = tokio::spawn(async move {
            let delivered = tx.deliver(ChangeEvent::Deleted, &cancel).await;
            (delivered, tx)
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!pending.is_finished());

        assert_eq!(changes.recv().await, Some(ChangeEvent::Modified));
        let (delivered, _tx) = pending.await.unwrap();
        assert!(delivered);
        assert_eq!(changes.recv().await, Some(ChangeEvent::Deleted));
    }

    #[tokio::test]
    async fn test_cancel_unblocks_pending_delivery() {
        let (tx, mut changes) = FileChanges::channel(1);
        let cancel = CancellationToken::new();

        assert!(tx.deliver(ChangeEvent::Modified, &cancel).await);

        let stalled = {
            let cancel = cancel.clone();
            tokio::spawn(async move { tx.deliver(ChangeEvent::Modified, &cancel).await })
        };
        cancel.cancel();
        assert!(!stalled.await.unwrap());

        assert_eq!(changes.recv().await, Some(ChangeEvent::Modified));
        assert_eq!(changes.recv().await, None);
    }

    #[tokio::test]
    async fn test_deliver_to_dropped_consumer() {
        let (tx, changes) = FileChanges::channel(1);
        drop(changes);
        assert!(!tx.deliver(ChangeEvent::Modified, &CancellationToken::new()).await);
    }

    #[tokio::test]
    async fn test_closed_stream() {
        let mut changes = FileChanges::closed();
        assert_eq!(changes.recv().await, None);
    }
}
