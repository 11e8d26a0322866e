//! Undo/redo replay.
//!
//! DESIGN
//! ======
//! A history action holds full snapshots of both sides. Undo makes the
//! document match the `before` side, redo the `after` side; the same
//! `apply_side` routine serves both. Replays run through `sync::commit` with
//! recording off, so they never enter history themselves.
//!
//! Lock fields are owned by the live document, not by history: a restored
//! shape keeps whatever lock it holds now, and a re-created shape comes back
//! unlocked.
//!
//! The history cursor moves before the replay write. If the write fails the
//! cursor stays moved and the next snapshot corrects the cache.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, warn};

use super::sync::{RemoteWrite, commit};
use crate::doc::{Connection, Document, ShapeGroup};
use crate::error::ErrorCode;
use crate::history::{ActionKind, HistoryAction};
use crate::state::SessionState;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum UndoError {
    #[error("sync failed: {0}")]
    Sync(#[from] StoreError),
}

impl ErrorCode for UndoError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Sync(_) => "E_SYNC_FAILURE",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Sync(e) => e.retryable(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Before,
    After,
}

/// Revert the most recent action. Returns `false` when there is nothing to undo.
///
/// # Errors
///
/// `Sync` if the replay write fails.
pub async fn undo(state: &SessionState) -> Result<bool, UndoError> {
    let action = state.history.lock().await.undo();
    let Some(action) = action else {
        return Ok(false);
    };
    let kind = match action.kind {
        ActionKind::Create => ActionKind::Delete,
        ActionKind::Delete => ActionKind::Create,
        ActionKind::Update => ActionKind::Update,
    };
    replay(state, &action, Side::Before, kind).await?;
    Ok(true)
}

/// Reapply the most recently undone action. Returns `false` when there is
/// nothing to redo.
///
/// # Errors
///
/// `Sync` if the replay write fails.
pub async fn redo(state: &SessionState) -> Result<bool, UndoError> {
    let action = state.history.lock().await.redo();
    let Some(action) = action else {
        return Ok(false);
    };
    replay(state, &action, Side::After, action.kind).await?;
    Ok(true)
}

pub async fn can_undo(state: &SessionState) -> bool {
    state.history.lock().await.can_undo()
}

pub async fn can_redo(state: &SessionState) -> bool {
    state.history.lock().await.can_redo()
}

async fn replay(state: &SessionState, action: &HistoryAction, side: Side, kind: ActionKind) -> Result<(), UndoError> {
    debug!(
        doc_id = %state.doc_id,
        ?side,
        ?kind,
        shapes = action.shapes_affected.len(),
        "undo: replaying action"
    );
    commit(state, kind, false, RemoteWrite::Merge, |doc| {
        apply_side(doc, action, side);
        Ok::<_, UndoError>(())
    })
    .await
}

/// Make `doc` match one side of `action`.
fn apply_side(doc: &mut Document, action: &HistoryAction, side: Side) {
    let (target, other) = match side {
        Side::Before => (&action.before, &action.after),
        Side::After => (&action.after, &action.before),
    };
    for id in &action.shapes_affected {
        let Some(snapshot) = target.get(id) else {
            doc.shapes.retain(|s| s.id != *id);
            continue;
        };
        if let Some(current) = doc.shape_mut(*id) {
            current.restore_from(snapshot);
        } else if other.contains_key(id) {
            warn!(shape_id = %id, "undo: shape was removed since this edit; skipping");
        } else {
            let mut shape = snapshot.clone();
            shape.is_locked = false;
            shape.locked_by = None;
            shape.locked_at = None;
            doc.shapes.push(shape);
        }
    }

    let (groups, other_groups) = match side {
        Side::Before => (&action.groups_before, &action.groups_after),
        Side::After => (&action.groups_after, &action.groups_before),
    };
    replace_by_id(&mut doc.groups, groups, other_groups, |g: &ShapeGroup| g.id);

    let (connections, other_connections) = match side {
        Side::Before => (&action.connections_before, &action.connections_after),
        Side::After => (&action.connections_after, &action.connections_before),
    };
    replace_by_id(&mut doc.connections, connections, other_connections, |c: &Connection| c.id);

    let live: HashSet<_> = doc.shapes.iter().map(|s| s.id).collect();
    doc.connections.retain(|c| live.contains(&c.from_shape_id) && live.contains(&c.to_shape_id));
}

/// Replace entries present in `target`, remove those only in `other`.
fn replace_by_id<T, K, F>(items: &mut Vec<T>, target: &BTreeMap<K, T>, other: &BTreeMap<K, T>, key: F)
where
    T: Clone,
    K: Ord + Copy,
    F: Fn(&T) -> K,
{
    items.retain(|item| {
        let id = key(item);
        target.contains_key(&id) || !other.contains_key(&id)
    });
    for (id, snapshot) in target {
        match items.iter_mut().find(|item| key(item) == *id) {
            Some(item) => *item = snapshot.clone(),
            None => items.push(snapshot.clone()),
        }
    }
}

#[cfg(test)]
#[path = "undo_test.rs"]
mod tests;
