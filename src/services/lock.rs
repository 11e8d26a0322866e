//! Advisory shape locks.
//!
//! DESIGN
//! ======
//! A lock is three fields on the shape (`is_locked`, `locked_by`,
//! `locked_at`) written like any other edit. Nothing in the store enforces
//! them: the contract is cooperative. Before a positional edit a caller
//! checks `ensure_unlocked` and abandons the edit on `LockError::Conflict`.
//! The positional services in this crate (`shape::move_shape`,
//! `shape::nudge_shapes`, `layout`, `group::move_group`) all do so.
//!
//! A sweeper reclaims locks older than the TTL regardless of owner, so a
//! client that vanished mid-drag cannot pin a shape forever.
//!
//! Lock edits never enter undo history.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::sync::{RemoteWrite, commit};
use crate::doc::{Shape, ShapeId, UserId};
use crate::error::{ErrorCode, now_ms};
use crate::history::ActionKind;
use crate::state::SessionState;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("shape not found: {0}")]
    NotFound(ShapeId),
    #[error("shape {shape_id} is locked by another user")]
    Conflict { shape_id: ShapeId, locked_by: Option<UserId> },
    #[error("sync failed: {0}")]
    Sync(#[from] StoreError),
}

impl ErrorCode for LockError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_SHAPE_NOT_FOUND",
            Self::Conflict { .. } => "E_LOCK_CONFLICT",
            Self::Sync(_) => "E_SYNC_FAILURE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Sync(e) if e.retryable())
    }
}

/// Fail with `Conflict` on the first shape another user holds.
///
/// # Errors
///
/// Returns `LockError::Conflict` naming the shape and its owner, if recorded.
pub fn ensure_unlocked<'a>(shapes: impl IntoIterator<Item = &'a Shape>, user_id: UserId) -> Result<(), LockError> {
    for shape in shapes {
        if shape.is_locked_by_other(user_id) {
            return Err(LockError::Conflict { shape_id: shape.id, locked_by: shape.locked_by });
        }
    }
    Ok(())
}

/// Whether a held lock has outlived `ttl_ms`. Locks without a timestamp
/// count as expired.
#[must_use]
pub fn is_expired(shape: &Shape, now: i64, ttl_ms: i64) -> bool {
    shape.is_locked && shape.locked_at.is_none_or(|at| now - at > ttl_ms)
}

/// Take the lock on `shape_id` for this session's user.
///
/// The write is unconditional; use `check_lock` first to honor other
/// holders.
///
/// # Errors
///
/// `NotFound` for an unknown shape, `Sync` if the remote write fails.
pub async fn acquire_lock(state: &SessionState, shape_id: ShapeId) -> Result<(), LockError> {
    let user_id = state.user_id;
    let now = now_ms();
    commit(state, ActionKind::Update, false, RemoteWrite::Merge, |doc| {
        let shape = doc.shape_mut(shape_id).ok_or(LockError::NotFound(shape_id))?;
        shape.is_locked = true;
        shape.locked_by = Some(user_id);
        shape.locked_at = Some(now);
        Ok(())
    })
    .await
}

/// Clear the lock on `shape_id`.
///
/// # Errors
///
/// `NotFound` for an unknown shape, `Sync` if the remote write fails.
pub async fn release_lock(state: &SessionState, shape_id: ShapeId) -> Result<(), LockError> {
    commit(state, ActionKind::Update, false, RemoteWrite::Merge, |doc| {
        let shape = doc.shape_mut(shape_id).ok_or(LockError::NotFound(shape_id))?;
        clear_lock(shape);
        Ok(())
    })
    .await
}

/// Check whether this session may edit `shape_id` positionally.
///
/// # Errors
///
/// `NotFound` for an unknown shape, `Conflict` if another user holds it.
pub async fn check_lock(state: &SessionState, shape_id: ShapeId) -> Result<(), LockError> {
    let cache = state.cache.read().await;
    let shape = cache.shape(shape_id).ok_or(LockError::NotFound(shape_id))?;
    ensure_unlocked([shape], state.user_id)
}

/// Release every lock older than the configured TTL. Returns the shapes freed.
///
/// # Errors
///
/// `Sync` if the remote write fails.
pub async fn sweep_expired(state: &SessionState, now: i64) -> Result<Vec<ShapeId>, LockError> {
    let ttl_ms = state.config.lock_ttl_ms;
    let reclaimed = commit(state, ActionKind::Update, false, RemoteWrite::Merge, |doc| {
        let mut reclaimed = Vec::new();
        for shape in doc.shapes.iter_mut().filter(|s| is_expired(s, now, ttl_ms)) {
            clear_lock(shape);
            reclaimed.push(shape.id);
        }
        Ok::<_, LockError>(reclaimed)
    })
    .await?;
    if !reclaimed.is_empty() {
        info!(doc_id = %state.doc_id, count = reclaimed.len(), "lock: reclaimed stale locks");
    }
    Ok(reclaimed)
}

/// Spawn the periodic lock sweeper for a session.
pub fn spawn_lock_sweeper(state: SessionState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = Duration::from_millis(state.config.lock_sweep_interval_ms.max(1));
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            if let Err(e) = sweep_expired(&state, now_ms()).await {
                warn!(doc_id = %state.doc_id, error = %e, "lock: sweep failed");
            }
        }
    })
}

fn clear_lock(shape: &mut Shape) {
    shape.is_locked = false;
    shape.locked_by = None;
    shape.locked_at = None;
}

#[cfg(test)]
#[path = "lock_test.rs"]
mod tests;
