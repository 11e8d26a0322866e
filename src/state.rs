//! Per-client session state.
//!
//! DESIGN
//! ======
//! `SessionState` is what every service function receives. It bundles one
//! client's view of one shared document: the store handle, the local cache
//! that optimistic writes land in, a `watch` channel that republishes the
//! cache to the rendering surface, the undo history, optimistic connection
//! edits awaiting confirmation, and the clipboard.
//!
//! Clone is cheap; every mutable field is `Arc`-wrapped so background tasks
//! (snapshot sync, lock sweeper) share the same session.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock, watch};
use uuid::Uuid;

use crate::clipboard::ClipboardData;
use crate::config::EngineConfig;
use crate::doc::{Connection, ConnectionId, Document, UserId};
use crate::history::HistoryStack;
use crate::store::DocumentStore;

// =============================================================================
// HISTORY MODE
// =============================================================================

/// Whether a mutation is a fresh user action or part of an undo/redo replay.
///
/// Replayed mutations are written like any other but never re-enter history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMode {
    Record,
    Replay,
}

impl HistoryMode {
    #[must_use]
    pub fn records(self) -> bool {
        matches!(self, HistoryMode::Record)
    }
}

// =============================================================================
// SESSION STATE
// =============================================================================

#[derive(Clone)]
pub struct SessionState {
    pub doc_id: Uuid,
    pub user_id: UserId,
    pub store: Arc<dyn DocumentStore>,
    /// Local document: last snapshot plus optimistic writes since.
    pub cache: Arc<RwLock<Document>>,
    /// Live view of `cache` for the rendering surface.
    pub view: Arc<watch::Sender<Document>>,
    pub history: Arc<Mutex<HistoryStack>>,
    /// Connection edits applied optimistically but not yet confirmed.
    pub pending_connections: Arc<Mutex<HashMap<ConnectionId, Connection>>>,
    pub clipboard: Arc<Mutex<Option<ClipboardData>>>,
    pub config: EngineConfig,
}

impl SessionState {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, doc_id: Uuid, user_id: UserId, config: EngineConfig) -> Self {
        let (view, _) = watch::channel(Document::default());
        Self {
            doc_id,
            user_id,
            store,
            cache: Arc::new(RwLock::new(Document::default())),
            view: Arc::new(view),
            history: Arc::new(Mutex::new(HistoryStack::new(config.history_max_entries))),
            pending_connections: Arc::new(Mutex::new(HashMap::new())),
            clipboard: Arc::new(Mutex::new(None)),
            config,
        }
    }

    /// Copy of the local document.
    pub async fn snapshot(&self) -> Document {
        self.cache.read().await.clone()
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use super::*;
    use crate::doc::{DocumentPatch, Shape, ShapeKind};
    use crate::store::{InMemoryDocumentStore, StoreError};

    /// A free-standing shape with explicit geometry. Circular kinds get
    /// `radius = width / 2` and `(x, y)` is their center.
    #[must_use]
    pub fn shape_at(kind: ShapeKind, x: f64, y: f64, width: f64, height: f64) -> Shape {
        let mut shape = Shape::with_defaults(kind, x, y, Uuid::nil(), 0);
        shape.width = width;
        shape.height = height;
        shape.radius = kind.is_circular().then_some(width / 2.0);
        shape
    }

    /// A session over a fresh in-memory store with an empty document.
    pub async fn test_state() -> (SessionState, Arc<InMemoryDocumentStore>) {
        test_state_with_config(EngineConfig::default()).await
    }

    pub async fn test_state_with_config(config: EngineConfig) -> (SessionState, Arc<InMemoryDocumentStore>) {
        let store = Arc::new(InMemoryDocumentStore::new());
        let doc_id = Uuid::new_v4();
        store.insert_document(doc_id, Document::default()).await;
        let state = SessionState::new(store.clone(), doc_id, Uuid::new_v4(), config);
        (state, store)
    }

    /// A second client on the same document and store.
    #[must_use]
    pub fn peer_of(state: &SessionState) -> SessionState {
        SessionState::new(state.store.clone(), state.doc_id, Uuid::new_v4(), state.config)
    }

    /// Seed shapes into both the store and the session cache, with ascending z.
    pub async fn seed_shapes(state: &SessionState, store: &InMemoryDocumentStore, shapes: Vec<Shape>) {
        let shapes: Vec<Shape> = shapes
            .into_iter()
            .zip(0_i64..)
            .map(|(mut s, z)| {
                s.z_index = z;
                s
            })
            .collect();
        let doc = Document { shapes, ..Document::default() };
        seed_document(state, store, doc).await;
    }

    pub async fn seed_document(state: &SessionState, store: &InMemoryDocumentStore, doc: Document) {
        store.insert_document(state.doc_id, doc.clone()).await;
        *state.cache.write().await = doc;
    }

    /// A store whose writes wait for `open` before reaching the inner
    /// in-memory store. Reads and subscriptions pass straight through.
    pub struct GatedStore {
        pub inner: Arc<InMemoryDocumentStore>,
        gate: tokio::sync::Semaphore,
    }

    impl GatedStore {
        #[must_use]
        pub fn new(inner: Arc<InMemoryDocumentStore>) -> Self {
            Self { inner, gate: tokio::sync::Semaphore::new(0) }
        }

        /// Let the next `writes` writes through.
        pub fn open(&self, writes: usize) {
            self.gate.add_permits(writes);
        }

        async fn pass(&self) -> Result<(), StoreError> {
            match self.gate.acquire().await {
                Ok(permit) => {
                    permit.forget();
                    Ok(())
                }
                Err(e) => Err(StoreError::Rejected(e.to_string())),
            }
        }
    }

    #[async_trait::async_trait]
    impl DocumentStore for GatedStore {
        async fn read_once(&self, doc_id: Uuid) -> Result<Document, StoreError> {
            self.inner.read_once(doc_id).await
        }

        async fn write_merge(&self, doc_id: Uuid, patch: DocumentPatch) -> Result<(), StoreError> {
            self.pass().await?;
            self.inner.write_merge(doc_id, patch).await
        }

        async fn append_shapes(&self, doc_id: Uuid, shapes: Vec<Shape>) -> Result<(), StoreError> {
            self.pass().await?;
            self.inner.append_shapes(doc_id, shapes).await
        }

        async fn subscribe(&self, doc_id: Uuid) -> Result<watch::Receiver<Document>, StoreError> {
            self.inner.subscribe(doc_id).await
        }

        async fn list_documents(&self) -> Result<Vec<Uuid>, StoreError> {
            self.inner.list_documents().await
        }
    }

    /// A session on `state`'s document whose writes go through a closed gate.
    #[must_use]
    pub fn gated_peer(state: &SessionState, store: &Arc<InMemoryDocumentStore>) -> (SessionState, Arc<GatedStore>) {
        let gated = Arc::new(GatedStore::new(store.clone()));
        let session = SessionState::new(gated.clone(), state.doc_id, state.user_id, state.config);
        (session, gated)
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
