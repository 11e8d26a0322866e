//! Connection service: connectors between shape anchors.
//!
//! DESIGN
//! ======
//! Create and delete go through `sync::commit` like shape edits. Updates are
//! tracked differently: the edited connection is parked in
//! `SessionState::pending_connections` and overlaid on the cached list by
//! `visible_connections` and the live view until the remote write settles.
//! The entry is cleared either way; a failed write reverts to the
//! authoritative connection instead of retrying.
//!
//! Update patches distinguish "omitted" from "cleared" through `Patch`, so
//! an optional field such as a label can be removed explicitly.

use tracing::{debug, warn};
use uuid::Uuid;

use super::sync::{RemoteWrite, commit, confirm_local, republish};
use crate::doc::{Anchor, ArrowType, Connection, ConnectionId, ConnectionPatch, Document, DocumentPatch, Shape, ShapeId};
use crate::error::{ErrorCode, now_ms};
use crate::geometry::Point;
use crate::geometry::anchor::{SnapTarget, anchor_position, find_snappable, optimal_anchor_pair};
use crate::history::{ActionKind, HistoryAction};
use crate::state::{HistoryMode, SessionState};
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("connection not found: {0}")]
    NotFound(ConnectionId),
    #[error("shape not found: {0}")]
    ShapeNotFound(ShapeId),
    #[error("shape {0} does not take connectors")]
    AnchorUnsupported(ShapeId),
    #[error("sync failed: {0}")]
    Sync(#[from] StoreError),
}

impl ErrorCode for ConnectionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_CONNECTION_NOT_FOUND",
            Self::ShapeNotFound(_) => "E_SHAPE_NOT_FOUND",
            Self::AnchorUnsupported(_) => "E_ANCHOR_UNSUPPORTED",
            Self::Sync(_) => "E_SYNC_FAILURE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Sync(e) if e.retryable())
    }
}

fn endpoint(doc: &Document, shape_id: ShapeId) -> Result<&Shape, ConnectionError> {
    let shape = doc.shape(shape_id).ok_or(ConnectionError::ShapeNotFound(shape_id))?;
    if !shape.kind.supports_anchors() {
        return Err(ConnectionError::AnchorUnsupported(shape_id));
    }
    Ok(shape)
}

/// Connect two shapes.
///
/// With `anchors` unset, the pair pointing from one shape toward the other
/// is chosen. Endpoint fields in `style` are ignored.
///
/// # Errors
///
/// `ShapeNotFound` or `AnchorUnsupported` for a bad endpoint, `Sync` if the
/// remote write fails.
pub async fn create_connection(
    state: &SessionState,
    from: ShapeId,
    to: ShapeId,
    anchors: Option<(Anchor, Anchor)>,
    style: &ConnectionPatch,
    mode: HistoryMode,
) -> Result<ConnectionId, ConnectionError> {
    let user_id = state.user_id;
    let now = now_ms();
    let style = ConnectionPatch {
        from_shape_id: None,
        from_anchor: None,
        to_shape_id: None,
        to_anchor: None,
        ..style.clone()
    };
    let id = commit(state, ActionKind::Create, mode.records(), RemoteWrite::Merge, |doc| {
        let facing = optimal_anchor_pair(endpoint(doc, from)?, endpoint(doc, to)?);
        let (from_anchor, to_anchor) = anchors.unwrap_or(facing);
        let mut connection = Connection {
            id: Uuid::new_v4(),
            from_shape_id: from,
            from_anchor,
            to_shape_id: to,
            to_anchor,
            arrow_type: ArrowType::default(),
            stroke: None,
            stroke_width: None,
            dashed: false,
            label: None,
            created_by: user_id,
            created_at: now,
            last_modified_by: None,
            last_modified_at: None,
        };
        style.apply(&mut connection);
        let id = connection.id;
        doc.connections.push(connection);
        Ok::<_, ConnectionError>(id)
    })
    .await?;
    debug!(doc_id = %state.doc_id, connection_id = %id, %from, %to, "connection: created");
    Ok(id)
}

/// Apply a patch to a connection.
///
/// The edit is visible through `visible_connections` and the live view at
/// once, and lands in the cache when the remote write is accepted.
///
/// # Errors
///
/// `NotFound` for an unknown connection, `ShapeNotFound`/`AnchorUnsupported`
/// for a bad new endpoint, `Sync` if the remote write fails (the optimistic
/// edit is dropped).
pub async fn update_connection(
    state: &SessionState,
    connection_id: ConnectionId,
    patch: ConnectionPatch,
    mode: HistoryMode,
) -> Result<(), ConnectionError> {
    let (before, updated, connections) = {
        let cache = state.cache.read().await;
        let before = cache.connection(connection_id).cloned().ok_or(ConnectionError::NotFound(connection_id))?;
        let mut updated = before.clone();
        if !patch.apply(&mut updated) {
            return Ok(());
        }
        endpoint(&cache, updated.from_shape_id)?;
        endpoint(&cache, updated.to_shape_id)?;
        updated.last_modified_by = Some(state.user_id);
        updated.last_modified_at = Some(now_ms());

        let connections: Vec<Connection> = cache
            .connections
            .iter()
            .map(|c| if c.id == connection_id { updated.clone() } else { c.clone() })
            .collect();
        (before, updated, connections)
    };

    state.pending_connections.lock().await.insert(connection_id, updated.clone());
    republish(state).await;
    let patch = DocumentPatch::default().with_connections(connections);
    let written = state.store.write_merge(state.doc_id, patch).await;
    if written.is_ok() {
        let confirmed = updated.clone();
        confirm_local(state, move |doc| {
            if let Some(slot) = doc.connections.iter_mut().find(|c| c.id == connection_id) {
                *slot = confirmed;
            }
        })
        .await;
    }
    state.pending_connections.lock().await.remove(&connection_id);
    republish(state).await;

    if let Err(e) = written {
        warn!(
            doc_id = %state.doc_id,
            %connection_id,
            error = %e,
            code = e.error_code(),
            "connection: update rejected; reverting optimistic edit"
        );
        return Err(e.into());
    }

    if mode.records() {
        let action = HistoryAction::new(ActionKind::Update, state.user_id, now_ms())
            .with_connections([&before], [&updated]);
        state.history.lock().await.record(action);
    }
    Ok(())
}

/// Remove a connection.
///
/// # Errors
///
/// `NotFound` for an unknown connection, `Sync` if the remote write fails.
pub async fn delete_connection(
    state: &SessionState,
    connection_id: ConnectionId,
    mode: HistoryMode,
) -> Result<(), ConnectionError> {
    commit(state, ActionKind::Delete, mode.records(), RemoteWrite::Merge, |doc| {
        let before = doc.connections.len();
        doc.connections.retain(|c| c.id != connection_id);
        if doc.connections.len() == before {
            return Err(ConnectionError::NotFound(connection_id));
        }
        Ok(())
    })
    .await
}

/// Connections with `shape_id` at either end.
pub async fn connections_for_shape(state: &SessionState, shape_id: ShapeId) -> Vec<Connection> {
    visible_connections(state).await.into_iter().filter(|c| c.touches(shape_id)).collect()
}

/// Cached connections with pending optimistic edits laid over them.
pub async fn visible_connections(state: &SessionState) -> Vec<Connection> {
    let connections = state.cache.read().await.connections.clone();
    let pending = state.pending_connections.lock().await;
    if pending.is_empty() {
        return connections;
    }
    connections.into_iter().map(|c| pending.get(&c.id).cloned().unwrap_or(c)).collect()
}

/// Canvas positions of a connection's two ends.
///
/// # Errors
///
/// `NotFound` for an unknown connection, `ShapeNotFound` for a dangling end.
pub async fn endpoints(state: &SessionState, connection_id: ConnectionId) -> Result<(Point, Point), ConnectionError> {
    let connection = visible_connections(state)
        .await
        .into_iter()
        .find(|c| c.id == connection_id)
        .ok_or(ConnectionError::NotFound(connection_id))?;
    let cache = state.cache.read().await;
    let from = cache
        .shape(connection.from_shape_id)
        .ok_or(ConnectionError::ShapeNotFound(connection.from_shape_id))?;
    let to = cache
        .shape(connection.to_shape_id)
        .ok_or(ConnectionError::ShapeNotFound(connection.to_shape_id))?;
    Ok((anchor_position(from, connection.from_anchor), anchor_position(to, connection.to_anchor)))
}

/// Nearest anchor within the snap radius of a dragged connector end.
pub async fn snap_endpoint(state: &SessionState, point: Point, exclude: Option<ShapeId>) -> Option<SnapTarget> {
    let cache = state.cache.read().await;
    find_snappable(&cache.shapes, point, exclude, state.config.snap_radius)
}

#[cfg(test)]
#[path = "connection_test.rs"]
mod tests;
