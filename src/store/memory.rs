//! In-memory document store.
//!
//! DESIGN
//! ======
//! Documents live in a `RwLock<HashMap>`; every accepted write publishes the
//! new document through the snapshot hub. Writes can be made to fail on
//! demand so callers can exercise sync-failure paths without a network.

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{RwLock, watch};
use tracing::debug;
use uuid::Uuid;

use super::hub::SnapshotHub;
use super::{DocumentStore, StoreError};
use crate::doc::{Document, DocumentPatch, Shape};
use crate::error::now_ms;

#[derive(Default)]
pub struct InMemoryDocumentStore {
    docs: RwLock<HashMap<Uuid, Document>>,
    hub: SnapshotHub,
    failing_writes: AtomicUsize,
    accepted_writes: AtomicUsize,
}

impl InMemoryDocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed (or replace) a document without publishing.
    pub async fn insert_document(&self, doc_id: Uuid, doc: Document) {
        self.docs.write().await.insert(doc_id, doc);
    }

    /// Reject the next `count` writes with `StoreError::Rejected`.
    pub fn fail_next_writes(&self, count: usize) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    /// Number of writes accepted so far.
    #[must_use]
    pub fn accepted_writes(&self) -> usize {
        self.accepted_writes.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn subscriber_count(&self, doc_id: Uuid) -> usize {
        self.hub.subscriber_count(doc_id)
    }

    fn take_injected_failure(&self) -> bool {
        self.failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    async fn mutate<F>(&self, doc_id: Uuid, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Document) + Send,
    {
        if self.take_injected_failure() {
            return Err(StoreError::Rejected(format!("injected failure for {doc_id}")));
        }
        let snapshot = {
            let mut docs = self.docs.write().await;
            let doc = docs.entry(doc_id).or_default();
            f(doc);
            doc.last_updated = now_ms();
            doc.clone()
        };
        self.accepted_writes.fetch_add(1, Ordering::SeqCst);
        debug!(%doc_id, shapes = snapshot.shapes.len(), "memory store: write accepted");
        self.hub.publish(doc_id, &snapshot);
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn read_once(&self, doc_id: Uuid) -> Result<Document, StoreError> {
        let docs = self.docs.read().await;
        docs.get(&doc_id).cloned().ok_or(StoreError::NotFound(doc_id))
    }

    async fn write_merge(&self, doc_id: Uuid, patch: DocumentPatch) -> Result<(), StoreError> {
        self.mutate(doc_id, |doc| patch.apply_to(doc, now_ms())).await
    }

    async fn append_shapes(&self, doc_id: Uuid, shapes: Vec<Shape>) -> Result<(), StoreError> {
        self.mutate(doc_id, |doc| doc.shapes.extend(shapes)).await
    }

    async fn subscribe(&self, doc_id: Uuid) -> Result<watch::Receiver<Document>, StoreError> {
        let current = self.read_once(doc_id).await?;
        Ok(self.hub.subscribe(doc_id, current))
    }

    async fn list_documents(&self) -> Result<Vec<Uuid>, StoreError> {
        let docs = self.docs.read().await;
        Ok(docs.keys().copied().collect())
    }
}
