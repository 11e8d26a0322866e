//! Postgres-backed document store.
//!
//! DESIGN
//! ======
//! Each document is one row in `scene_documents` holding the whole document
//! as JSONB. Writes are read-modify-write inside a transaction that locks
//! the row with `SELECT ... FOR UPDATE`, so merge-writes from one process
//! serialize cleanly. Snapshots fan out in-process through the hub; clients
//! in other processes converge on their next read.

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

use super::hub::SnapshotHub;
use super::{DocumentStore, StoreError};
use crate::doc::{Document, DocumentPatch, Shape};
use crate::error::now_ms;

pub struct PgDocumentStore {
    pool: PgPool,
    hub: SnapshotHub,
}

impl PgDocumentStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool, hub: SnapshotHub::new() }
    }

    async fn mutate<F>(&self, doc_id: Uuid, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Document) + Send,
    {
        let mut tx = self.pool.begin().await?;

        let body: Option<serde_json::Value> =
            sqlx::query_scalar("SELECT body FROM scene_documents WHERE id = $1 FOR UPDATE")
                .bind(doc_id)
                .fetch_optional(tx.as_mut())
                .await?;
        let created = body.is_none();
        let mut doc = match body {
            Some(value) => serde_json::from_value::<Document>(value)?,
            None => Document::default(),
        };

        f(&mut doc);
        doc.last_updated = now_ms();
        let body = serde_json::to_value(&doc)?;

        sqlx::query(
            "INSERT INTO scene_documents (id, body, last_updated) VALUES ($1, $2, $3) \
             ON CONFLICT (id) DO UPDATE SET body = EXCLUDED.body, last_updated = EXCLUDED.last_updated",
        )
        .bind(doc_id)
        .bind(&body)
        .bind(doc.last_updated)
        .execute(tx.as_mut())
        .await?;
        tx.commit().await?;

        if created {
            info!(%doc_id, "pg store: document created");
        }
        debug!(%doc_id, shapes = doc.shapes.len(), "pg store: write committed");
        self.hub.publish(doc_id, &doc);
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn read_once(&self, doc_id: Uuid) -> Result<Document, StoreError> {
        let body: Option<serde_json::Value> = sqlx::query_scalar("SELECT body FROM scene_documents WHERE id = $1")
            .bind(doc_id)
            .fetch_optional(&self.pool)
            .await?;
        let body = body.ok_or(StoreError::NotFound(doc_id))?;
        Ok(serde_json::from_value(body)?)
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
        let ids: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM scene_documents ORDER BY last_updated DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }
}

#[cfg(test)]
#[path = "postgres_test.rs"]
mod tests;
