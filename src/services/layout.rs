//! Layout service: align and distribute a selection.
//!
//! The geometry lives in `geometry::align`; this module validates the
//! selection against the cache, honors locks, and applies the placements as
//! one batched update so a layout undoes in a single step.

use tracing::debug;

use super::lock::{LockError, ensure_unlocked};
use super::shape::{ShapeError, update_shapes};
use crate::doc::{Shape, ShapeId, ShapePatch};
use crate::error::ErrorCode;
use crate::geometry::align::{self, AlignMode, DistributeDirection, InsufficientSelection, Placement};
use crate::state::{HistoryMode, SessionState};

#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("selection too small: need at least {required} shapes, got {actual}")]
    InsufficientSelection { required: usize, actual: usize },
    #[error("shape not found: {0}")]
    ShapeNotFound(ShapeId),
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error(transparent)]
    Shape(#[from] ShapeError),
}

impl From<InsufficientSelection> for LayoutError {
    fn from(e: InsufficientSelection) -> Self {
        Self::InsufficientSelection { required: e.required, actual: e.actual }
    }
}

impl ErrorCode for LayoutError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InsufficientSelection { .. } => "E_INSUFFICIENT_SELECTION",
            Self::ShapeNotFound(_) => "E_SHAPE_NOT_FOUND",
            Self::Lock(e) => e.error_code(),
            Self::Shape(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Lock(e) => e.retryable(),
            Self::Shape(e) => e.retryable(),
            _ => false,
        }
    }
}

/// Distinct selected shapes from the cache, in selection order.
async fn selection(state: &SessionState, shape_ids: &[ShapeId]) -> Result<Vec<Shape>, LayoutError> {
    let cache = state.cache.read().await;
    let mut shapes: Vec<Shape> = Vec::with_capacity(shape_ids.len());
    for id in shape_ids {
        if shapes.iter().any(|s| s.id == *id) {
            continue;
        }
        shapes.push(cache.shape(*id).cloned().ok_or(LayoutError::ShapeNotFound(*id))?);
    }
    ensure_unlocked(&shapes, state.user_id)?;
    Ok(shapes)
}

async fn apply(state: &SessionState, placements: Vec<Placement>, mode: HistoryMode) -> Result<Vec<Placement>, LayoutError> {
    let updates = placements.iter().map(|p| (p.id, ShapePatch::position(p.x, p.y))).collect();
    update_shapes(state, updates, mode).await?;
    Ok(placements)
}

/// Align the selection's edges or centers to its union box.
///
/// # Errors
///
/// `InsufficientSelection` below two shapes, `ShapeNotFound`,
/// `Lock(Conflict)` if another user holds any selected shape (nothing
/// moves), or `Shape` if the update fails.
pub async fn align_shapes(
    state: &SessionState,
    shape_ids: &[ShapeId],
    align_mode: AlignMode,
    mode: HistoryMode,
) -> Result<Vec<Placement>, LayoutError> {
    let shapes = selection(state, shape_ids).await?;
    let placements = align::align(&shapes, align_mode)?;
    debug!(doc_id = %state.doc_id, count = placements.len(), ?align_mode, "layout: aligning");
    apply(state, placements, mode).await
}

/// Space the selection evenly, keeping the outermost shapes fixed.
///
/// # Errors
///
/// `InsufficientSelection` below three shapes, otherwise as `align_shapes`.
pub async fn distribute_shapes(
    state: &SessionState,
    shape_ids: &[ShapeId],
    direction: DistributeDirection,
    mode: HistoryMode,
) -> Result<Vec<Placement>, LayoutError> {
    let shapes = selection(state, shape_ids).await?;
    let placements = align::distribute(&shapes, direction)?;
    debug!(doc_id = %state.doc_id, count = placements.len(), ?direction, "layout: distributing");
    apply(state, placements, mode).await
}

#[cfg(test)]
#[path = "layout_test.rs"]
mod tests;
