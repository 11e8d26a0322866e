//! Clipboard service: copy, cut, paste, and component stamping.
//!
//! The capture lives in `SessionState::clipboard`, one per session. Pasted
//! and stamped shapes are created through `shape::add_shapes`, so they land
//! on top of the stack and undo as one action.
//!
//! The clipboard lock is held across a paste's write so two pastes from one
//! capture always get distinct offsets. The counter only advances when the
//! write succeeds.

use tracing::debug;

use super::shape::{ShapeError, add_shapes};
use crate::clipboard::{ClipboardData, Component, ShapeTemplate, extract_component as extract};
use crate::doc::{Shape, ShapeId};
use crate::error::{ErrorCode, now_ms};
use crate::geometry::Point;
use crate::state::{HistoryMode, SessionState};

#[derive(Debug, thiserror::Error)]
pub enum ClipboardError {
    #[error("clipboard is empty")]
    Empty,
    #[error("clipboard capture is {age_ms}ms old")]
    Stale { age_ms: i64 },
    #[error("shape not found: {0}")]
    ShapeNotFound(ShapeId),
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error("clipboard text is not a capture: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ErrorCode for ClipboardError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Empty => "E_CLIPBOARD_EMPTY",
            Self::Stale { .. } => "E_CLIPBOARD_STALE",
            Self::ShapeNotFound(_) => "E_SHAPE_NOT_FOUND",
            Self::Shape(e) => e.error_code(),
            Self::Serialization(_) => "E_SERIALIZATION",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Shape(e) if e.retryable())
    }
}

async fn selected(state: &SessionState, shape_ids: &[ShapeId]) -> Result<Vec<Shape>, ClipboardError> {
    if shape_ids.is_empty() {
        return Err(ClipboardError::Empty);
    }
    let cache = state.cache.read().await;
    let mut shapes: Vec<Shape> = Vec::with_capacity(shape_ids.len());
    for id in shape_ids {
        if shapes.iter().any(|s| s.id == *id) {
            continue;
        }
        shapes.push(cache.shape(*id).cloned().ok_or(ClipboardError::ShapeNotFound(*id))?);
    }
    Ok(shapes)
}

async fn instantiate_all(
    state: &SessionState,
    templates: &[ShapeTemplate],
    mode: HistoryMode,
) -> Result<Vec<ShapeId>, ClipboardError> {
    let now = now_ms();
    let shapes = templates.iter().map(|t| t.instantiate(state.user_id, now)).collect();
    Ok(add_shapes(state, shapes, mode).await?)
}

/// Capture the selection, replacing any previous capture. Returns the number
/// of shapes captured.
///
/// # Errors
///
/// `Empty` for an empty selection, `ShapeNotFound` for an unknown id.
pub async fn copy(state: &SessionState, shape_ids: &[ShapeId]) -> Result<usize, ClipboardError> {
    let shapes = selected(state, shape_ids).await?;
    let data = ClipboardData::capture(&shapes, now_ms());
    let count = data.shapes.len();
    *state.clipboard.lock().await = Some(data);
    debug!(doc_id = %state.doc_id, count, "clipboard: captured");
    Ok(count)
}

/// Capture the selection, then remove it.
///
/// # Errors
///
/// As `copy`, plus `Shape` if the removal fails. The capture is kept even
/// when the removal fails.
pub async fn cut(state: &SessionState, shape_ids: &[ShapeId], mode: HistoryMode) -> Result<usize, ClipboardError> {
    let count = copy(state, shape_ids).await?;
    super::shape::remove_shapes(state, shape_ids, mode).await?;
    Ok(count)
}

/// Paste the capture centered on `viewport_center`, offset diagonally by
/// how many times it has been pasted already. Returns the new shape ids.
///
/// # Errors
///
/// `Empty` with no capture, `Stale` when the capture is past the configured
/// age, `Shape` if the append fails.
pub async fn paste(
    state: &SessionState,
    viewport_center: Point,
    mode: HistoryMode,
) -> Result<Vec<ShapeId>, ClipboardError> {
    let mut clipboard = state.clipboard.lock().await;
    let data = clipboard.as_mut().ok_or(ClipboardError::Empty)?;
    let now = now_ms();
    if data.shapes.is_empty() {
        return Err(ClipboardError::Empty);
    }
    if !data.is_valid(now, state.config.clipboard_max_age_ms) {
        return Err(ClipboardError::Stale { age_ms: now - data.captured_at });
    }

    let templates = data.plan_paste(viewport_center, state.config.paste_offset_step);
    let ids = instantiate_all(state, &templates, mode).await?;
    data.paste_count += 1;
    debug!(doc_id = %state.doc_id, count = ids.len(), paste_count = data.paste_count, "clipboard: pasted");
    Ok(ids)
}

/// Normalize the selection into a position-independent component.
///
/// # Errors
///
/// `Empty` for an empty selection, `ShapeNotFound` for an unknown id.
pub async fn extract_component(state: &SessionState, shape_ids: &[ShapeId]) -> Result<Component, ClipboardError> {
    let shapes = selected(state, shape_ids).await?;
    extract(&shapes).ok_or(ClipboardError::Empty)
}

/// Stamp a component with its top-left at `origin`. Returns the new shape ids.
///
/// # Errors
///
/// `Empty` for a component without shapes, `Shape` if the append fails.
pub async fn insert_component(
    state: &SessionState,
    component: &Component,
    origin: Point,
    mode: HistoryMode,
) -> Result<Vec<ShapeId>, ClipboardError> {
    if component.shapes.is_empty() {
        return Err(ClipboardError::Empty);
    }
    instantiate_all(state, &component.placed_at(origin), mode).await
}

/// The capture as text for a system clipboard.
///
/// # Errors
///
/// `Empty` with no capture, `Serialization` if encoding fails.
pub async fn export_text(state: &SessionState) -> Result<String, ClipboardError> {
    let clipboard = state.clipboard.lock().await;
    let data = clipboard.as_ref().ok_or(ClipboardError::Empty)?;
    Ok(data.to_text()?)
}

/// Replace the capture with one decoded from text. The imported capture
/// counts as fresh: its age and paste count restart.
///
/// # Errors
///
/// `Serialization` for text that is not a capture, `Empty` for a capture
/// without shapes.
pub async fn import_text(state: &SessionState, text: &str) -> Result<usize, ClipboardError> {
    let mut data = ClipboardData::from_text(text)?;
    if data.shapes.is_empty() {
        return Err(ClipboardError::Empty);
    }
    data.captured_at = now_ms();
    data.paste_count = 0;
    let count = data.shapes.len();
    *state.clipboard.lock().await = Some(data);
    Ok(count)
}

#[cfg(test)]
#[path = "clipboard_test.rs"]
mod tests;
