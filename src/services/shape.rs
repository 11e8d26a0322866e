//! Shape service: add, update, remove, and positional edits.
//!
//! DESIGN
//! ======
//! Every operation goes through `sync::commit`, so it is applied to the
//! local cache first and written remotely after. Adds use the store's append
//! primitive; everything else merge-writes the arrays it changed.
//!
//! Batches are atomic at the validation step: every id is checked before
//! any shape is touched, and a batch records a single history entry.
//!
//! Removing shapes cascades in the same write: connections touching a
//! removed shape are pruned, the ids are dropped from group membership, and
//! groups left with fewer than two members are dissolved.

use std::collections::HashSet;

use tokio::sync::watch;
use tracing::debug;

use super::group::{ancestors, detach_members, refresh_bounds};
use super::lock::{LockError, ensure_unlocked};
use super::sync::{RemoteWrite, commit};
use crate::doc::{Document, Patch, Shape, ShapeId, ShapeKind, ShapePatch, UserId};
use crate::error::{ErrorCode, now_ms};
use crate::geometry::{Bounds, Point, clamp_to_canvas, lasso};
use crate::history::ActionKind;
use crate::state::{HistoryMode, SessionState};
use crate::store::StoreError;

/// Tolerance used to simplify a freehand lasso path before hit-testing.
pub const LASSO_TOLERANCE: f64 = 2.0;

#[derive(Debug, thiserror::Error)]
pub enum ShapeError {
    #[error("shape not found: {0}")]
    NotFound(ShapeId),
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("sync failed: {0}")]
    Sync(#[from] StoreError),
}

impl ErrorCode for ShapeError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_SHAPE_NOT_FOUND",
            Self::Lock(e) => e.error_code(),
            Self::Sync(_) => "E_SYNC_FAILURE",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Lock(e) => e.retryable(),
            Self::Sync(e) => e.retryable(),
            Self::NotFound(_) => false,
        }
    }
}

/// Live view of the session's document.
#[must_use]
pub fn subscribe_view(state: &SessionState) -> watch::Receiver<Document> {
    state.view.subscribe()
}

/// Current shapes in stacking order.
pub async fn list_shapes(state: &SessionState) -> Vec<Shape> {
    let mut shapes = state.cache.read().await.shapes.clone();
    shapes.sort_by_key(|s| s.z_index);
    shapes
}

/// A new shape of `kind` at `(x, y)`: type defaults first, then `overrides`.
#[must_use]
pub fn build_shape(state: &SessionState, kind: ShapeKind, x: f64, y: f64, overrides: &ShapePatch) -> Shape {
    let mut shape = Shape::with_defaults(kind, x, y, state.user_id, now_ms());
    overrides.apply(&mut shape);
    if let Patch::Set(r) = overrides.radius {
        if kind.is_circular() {
            shape.width = overrides.width.unwrap_or(r * 2.0);
            shape.height = overrides.height.unwrap_or(r * 2.0);
        }
    }
    shape
}

/// Create one shape and return its id.
///
/// # Errors
///
/// `Sync` if the remote append fails.
pub async fn add_shape(
    state: &SessionState,
    kind: ShapeKind,
    x: f64,
    y: f64,
    overrides: &ShapePatch,
    mode: HistoryMode,
) -> Result<ShapeId, ShapeError> {
    let shape = build_shape(state, kind, x, y, overrides);
    let id = shape.id;
    add_shapes(state, vec![shape], mode).await?;
    Ok(id)
}

/// Append shapes on top of the stack, in the order given.
///
/// # Errors
///
/// `Sync` if the remote append fails.
pub async fn add_shapes(state: &SessionState, shapes: Vec<Shape>, mode: HistoryMode) -> Result<Vec<ShapeId>, ShapeError> {
    let ids: Vec<ShapeId> = shapes.iter().map(|s| s.id).collect();
    commit(state, ActionKind::Create, mode.records(), RemoteWrite::Append, |doc| {
        let mut z = doc.max_z_index();
        for mut shape in shapes {
            z += 1;
            shape.z_index = z;
            doc.shapes.push(shape);
        }
        Ok::<_, ShapeError>(())
    })
    .await?;
    debug!(doc_id = %state.doc_id, count = ids.len(), "shape: added");
    Ok(ids)
}

/// Apply a sparse update to one shape.
///
/// # Errors
///
/// `NotFound` for an unknown id, `Sync` if the remote write fails.
pub async fn update_shape(
    state: &SessionState,
    shape_id: ShapeId,
    patch: ShapePatch,
    mode: HistoryMode,
) -> Result<(), ShapeError> {
    update_shapes(state, vec![(shape_id, patch)], mode).await
}

/// Apply sparse updates to several shapes as one action.
///
/// Lock-only batches are written but not recorded in history.
///
/// # Errors
///
/// `NotFound` for the first unknown id (nothing is applied), `Sync` if the
/// remote write fails.
pub async fn update_shapes(
    state: &SessionState,
    updates: Vec<(ShapeId, ShapePatch)>,
    mode: HistoryMode,
) -> Result<(), ShapeError> {
    let record = mode.records() && !updates.iter().all(|(_, p)| p.is_lock_only());
    let user_id = state.user_id;
    let now = now_ms();
    commit(state, ActionKind::Update, record, RemoteWrite::Merge, |doc| {
        require_all(doc, updates.iter().map(|(id, _)| *id))?;
        let mut touched_groups = Vec::new();
        for (id, patch) in &updates {
            if let Some(shape) = doc.shape_mut(*id) {
                if patch.apply(shape) {
                    shape.touch(user_id, now);
                    if patch.is_positional() {
                        touched_groups.extend(ancestors(doc, *id));
                    }
                }
            }
        }
        refresh_bounds(doc, touched_groups);
        Ok(())
    })
    .await
}

/// Remove one shape, cascading to its connections and group membership.
///
/// # Errors
///
/// `NotFound` for an unknown id, `Sync` if the remote write fails.
pub async fn remove_shape(state: &SessionState, shape_id: ShapeId, mode: HistoryMode) -> Result<(), ShapeError> {
    remove_shapes(state, &[shape_id], mode).await
}

/// Remove several shapes as one action.
///
/// # Errors
///
/// `NotFound` for the first unknown id (nothing is removed), `Sync` if the
/// remote write fails.
pub async fn remove_shapes(state: &SessionState, shape_ids: &[ShapeId], mode: HistoryMode) -> Result<(), ShapeError> {
    commit(state, ActionKind::Delete, mode.records(), RemoteWrite::Merge, |doc| {
        require_all(doc, shape_ids.iter().copied())?;
        let removed: HashSet<ShapeId> = shape_ids.iter().copied().collect();
        remove_from(doc, &removed);
        Ok(())
    })
    .await
}

/// Drop shapes, the connections touching them, and their group memberships.
pub(crate) fn remove_from(doc: &mut Document, removed: &HashSet<ShapeId>) {
    doc.shapes.retain(|s| !removed.contains(&s.id));
    doc.connections
        .retain(|c| !removed.contains(&c.from_shape_id) && !removed.contains(&c.to_shape_id));
    detach_members(doc, removed);
}

/// Move a shape so its box's top-left sits at the clamped `(x, y)`.
///
/// For circular kinds `(x, y)` is the center, as stored.
///
/// # Errors
///
/// `NotFound`, `Lock(Conflict)` if another user holds the shape, or `Sync`.
pub async fn move_shape(
    state: &SessionState,
    shape_id: ShapeId,
    x: f64,
    y: f64,
    mode: HistoryMode,
) -> Result<(), ShapeError> {
    let user_id = state.user_id;
    let (cw, ch) = (state.config.canvas_width, state.config.canvas_height);
    let now = now_ms();
    commit(state, ActionKind::Update, mode.records(), RemoteWrite::Merge, |doc| {
        let shape = doc.shape(shape_id).ok_or(ShapeError::NotFound(shape_id))?;
        ensure_unlocked([shape], user_id)?;
        let mut moved = shape.clone();
        moved.x = x;
        moved.y = y;
        reposition_clamped(doc, shape_id, moved.bounds(), (cw, ch), user_id, now);
        refresh_bounds(doc, ancestors(doc, shape_id));
        Ok(())
    })
    .await
}

/// Translate shapes by `(dx, dy)`, clamping each one to the canvas.
///
/// # Errors
///
/// `NotFound`, `Lock(Conflict)` on the first shape another user holds
/// (nothing moves), or `Sync`.
pub async fn nudge_shapes(
    state: &SessionState,
    shape_ids: &[ShapeId],
    dx: f64,
    dy: f64,
    mode: HistoryMode,
) -> Result<(), ShapeError> {
    let user_id = state.user_id;
    let (cw, ch) = (state.config.canvas_width, state.config.canvas_height);
    let now = now_ms();
    commit(state, ActionKind::Update, mode.records(), RemoteWrite::Merge, |doc| {
        require_all(doc, shape_ids.iter().copied())?;
        ensure_unlocked(doc.shapes.iter().filter(|s| shape_ids.contains(&s.id)), user_id)?;
        let mut seen = HashSet::new();
        let mut touched_groups = Vec::new();
        for id in shape_ids.iter().filter(|id| seen.insert(**id)) {
            let Some(bounds) = doc.shape(*id).map(Shape::bounds) else {
                continue;
            };
            let target = Bounds::new(bounds.x + dx, bounds.y + dy, bounds.width, bounds.height);
            reposition_clamped(doc, *id, target, (cw, ch), user_id, now);
            touched_groups.extend(ancestors(doc, *id));
        }
        refresh_bounds(doc, touched_groups);
        Ok(())
    })
    .await
}

fn reposition_clamped(
    doc: &mut Document,
    shape_id: ShapeId,
    target: Bounds,
    (canvas_width, canvas_height): (f64, f64),
    user_id: UserId,
    now: i64,
) {
    let Some(shape) = doc.shape_mut(shape_id) else {
        return;
    };
    let (left, top) = clamp_to_canvas(target, canvas_width, canvas_height);
    let (x, y) = shape.origin_for_bounds(left, top);
    if ShapePatch::position(x, y).apply(shape) {
        shape.touch(user_id, now);
    }
}

/// Raise shapes above everything else, keeping their relative order.
///
/// # Errors
///
/// `NotFound` for an unknown id, `Sync` if the remote write fails.
pub async fn bring_to_front(state: &SessionState, shape_ids: &[ShapeId], mode: HistoryMode) -> Result<(), ShapeError> {
    restack(state, shape_ids, mode, true).await
}

/// Lower shapes below everything else, keeping their relative order.
///
/// # Errors
///
/// `NotFound` for an unknown id, `Sync` if the remote write fails.
pub async fn send_to_back(state: &SessionState, shape_ids: &[ShapeId], mode: HistoryMode) -> Result<(), ShapeError> {
    restack(state, shape_ids, mode, false).await
}

async fn restack(state: &SessionState, shape_ids: &[ShapeId], mode: HistoryMode, to_front: bool) -> Result<(), ShapeError> {
    let user_id = state.user_id;
    let now = now_ms();
    commit(state, ActionKind::Update, mode.records(), RemoteWrite::Merge, |doc| {
        require_all(doc, shape_ids.iter().copied())?;
        let mut selected: Vec<(i64, ShapeId)> = doc
            .shapes
            .iter()
            .filter(|s| shape_ids.contains(&s.id))
            .map(|s| (s.z_index, s.id))
            .collect();
        selected.sort_unstable();

        let count = i64::try_from(selected.len()).unwrap_or(i64::MAX);
        let base = if to_front {
            doc.max_z_index() + 1
        } else {
            doc.shapes.iter().map(|s| s.z_index).min().unwrap_or(0) - count
        };
        for ((_, id), z) in selected.into_iter().zip(base..) {
            let restacked = ShapePatch { z_index: Some(z), ..ShapePatch::default() };
            if let Some(shape) = doc.shape_mut(id) {
                if restacked.apply(shape) {
                    shape.touch(user_id, now);
                }
            }
        }
        Ok(())
    })
    .await
}

/// Delete every shape, group, and connection as one action.
///
/// # Errors
///
/// `Sync` if the remote write fails.
pub async fn clear_canvas(state: &SessionState, mode: HistoryMode) -> Result<(), ShapeError> {
    commit(state, ActionKind::Delete, mode.records(), RemoteWrite::Merge, |doc| {
        doc.shapes.clear();
        doc.groups.clear();
        doc.connections.clear();
        Ok::<_, ShapeError>(())
    })
    .await
}

/// Ids of shapes hit by a freehand lasso path, after simplifying it.
pub async fn select_in_lasso(state: &SessionState, path: &[Point]) -> Vec<ShapeId> {
    let polygon = lasso::simplify_path(path, LASSO_TOLERANCE);
    let cache = state.cache.read().await;
    lasso::select_in_lasso(&cache.shapes, &polygon)
}

fn require_all(doc: &Document, ids: impl IntoIterator<Item = ShapeId>) -> Result<(), ShapeError> {
    for id in ids {
        if doc.shape(id).is_none() {
            return Err(ShapeError::NotFound(id));
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "shape_test.rs"]
mod tests;
