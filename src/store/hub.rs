//! In-process snapshot fan-out shared by store implementations.
//!
//! One `watch` channel per document. Publishing replaces the latest value,
//! so a slow subscriber skips intermediate snapshots and only ever sees the
//! newest one, which is all a snapshot consumer needs.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::watch;
use uuid::Uuid;

use crate::doc::Document;

#[derive(Default)]
pub struct SnapshotHub {
    channels: Mutex<HashMap<Uuid, watch::Sender<Document>>>,
}

impl SnapshotHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push `doc` to every subscriber of `doc_id`. No-op without subscribers.
    pub fn publish(&self, doc_id: Uuid, doc: &Document) {
        let mut channels = self
            .channels
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(tx) = channels.get(&doc_id) else {
            return;
        };
        if tx.send(doc.clone()).is_err() {
            // Every receiver has been dropped.
            channels.remove(&doc_id);
        }
    }

    /// Subscribe to `doc_id`, seeding a new channel with `current` if needed.
    pub fn subscribe(&self, doc_id: Uuid, current: Document) -> watch::Receiver<Document> {
        let mut channels = self
            .channels
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(tx) = channels.get(&doc_id) {
            return tx.subscribe();
        }
        let (tx, rx) = watch::channel(current);
        channels.insert(doc_id, tx);
        rx
    }

    #[must_use]
    pub fn subscriber_count(&self, doc_id: Uuid) -> usize {
        let channels = self
            .channels
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        channels.get(&doc_id).map_or(0, watch::Sender::receiver_count)
    }
}
