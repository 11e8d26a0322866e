//! Remote document store abstraction.
//!
//! ARCHITECTURE
//! ============
//! The collaboration engine treats the remote store as a keyed collection of
//! whole documents with three primitives: read once, merge-write (each
//! present array replaces the stored one in full), and push-based
//! subscription to snapshots. Every accepted write publishes the full
//! document to all subscribers, including the writer.
//!
//! TRADE-OFFS
//! ==========
//! Merge writes replace arrays wholesale. Two clients editing different
//! shapes of one document concurrently race, and the later write wins for
//! the whole array. Snapshots make every client converge on that winner.

pub mod hub;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use tokio::sync::watch;
use uuid::Uuid;

use crate::doc::{Document, DocumentPatch, Shape};

pub use memory::InMemoryDocumentStore;
pub use postgres::PgDocumentStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(Uuid),
    #[error("write rejected: {0}")]
    Rejected(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl crate::error::ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_DOCUMENT_NOT_FOUND",
            Self::Rejected(_) => "E_SYNC_FAILURE",
            Self::Database(_) => "E_DATABASE",
            Self::Serialization(_) => "E_SERIALIZATION",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Rejected(_) | Self::Database(_))
    }
}

/// A subscribable key-document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch the current document.
    async fn read_once(&self, doc_id: Uuid) -> Result<Document, StoreError>;

    /// Replace each array present in `patch`, creating the document if absent.
    async fn write_merge(&self, doc_id: Uuid, patch: DocumentPatch) -> Result<(), StoreError>;

    /// Append shapes to the stored shape array, creating the document if absent.
    async fn append_shapes(&self, doc_id: Uuid, shapes: Vec<Shape>) -> Result<(), StoreError>;

    /// Subscribe to snapshots. The receiver starts at the current document;
    /// dropping it unsubscribes.
    async fn subscribe(&self, doc_id: Uuid) -> Result<watch::Receiver<Document>, StoreError>;

    /// Ids of every stored document.
    async fn list_documents(&self) -> Result<Vec<Uuid>, StoreError>;
}
