//! Snapshot sync and the shared write pipeline.
//!
//! DESIGN
//! ======
//! Local edits are optimistic: `commit` applies a mutation to a copy of the
//! cache, swaps it in, republishes the view, and only then issues the remote
//! write. On failure the optimistic state is left alone; the next snapshot
//! overwrites it. History is recorded only after the remote write succeeds.
//!
//! Snapshots are authoritative. `apply_snapshot` replaces the cache outright,
//! discarding any optimistic edit the store did not accept.
//!
//! The live view is the cache with pending connection edits laid over it.

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::doc::{Document, DocumentPatch, Shape};
use crate::error::{ErrorCode, now_ms};
use crate::history::{ActionKind, HistoryAction};
use crate::state::SessionState;
use crate::store::StoreError;

/// How a commit reaches the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RemoteWrite {
    /// Replace every array the mutation changed.
    Merge,
    /// Append the shapes the mutation added.
    Append,
}

enum PendingWrite {
    Merge(DocumentPatch),
    Append(Vec<Shape>),
}

/// Replace the local cache with an authoritative snapshot.
pub async fn apply_snapshot(state: &SessionState, doc: Document) {
    let mut cache = state.cache.write().await;
    debug!(
        doc_id = %state.doc_id,
        shapes = doc.shapes.len(),
        groups = doc.groups.len(),
        connections = doc.connections.len(),
        "sync: applying snapshot"
    );
    *cache = doc;
    publish(state, &cache).await;
}

/// Send `doc` to the live view with pending connection edits laid over it.
async fn publish(state: &SessionState, doc: &Document) {
    let pending = state.pending_connections.lock().await;
    let mut view = doc.clone();
    for connection in &mut view.connections {
        if let Some(edit) = pending.get(&connection.id) {
            *connection = edit.clone();
        }
    }
    state.view.send_replace(view);
}

/// Republish the live view after the pending overlay changed.
pub(crate) async fn republish(state: &SessionState) {
    let cache = state.cache.read().await;
    publish(state, &cache).await;
}

/// Fetch the document once and apply it as a snapshot.
///
/// # Errors
///
/// Returns the store error if the read fails.
pub async fn resync(state: &SessionState) -> Result<(), StoreError> {
    let doc = state.store.read_once(state.doc_id).await?;
    apply_snapshot(state, doc).await;
    Ok(())
}

/// Subscribe to the document, apply the current snapshot, and spawn a task
/// that applies every later one. Abort the handle to unsubscribe.
///
/// # Errors
///
/// Returns the store error if the subscription cannot be opened.
pub async fn start_sync(state: SessionState) -> Result<JoinHandle<()>, StoreError> {
    let mut rx = state.store.subscribe(state.doc_id).await?;
    let initial = rx.borrow_and_update().clone();
    apply_snapshot(&state, initial).await;

    Ok(tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let doc = rx.borrow_and_update().clone();
            apply_snapshot(&state, doc).await;
        }
        info!(doc_id = %state.doc_id, "sync: snapshot channel closed");
    }))
}

/// Arrays of `after` that differ from `before`.
pub(crate) fn changed_arrays(before: &Document, after: &Document) -> DocumentPatch {
    DocumentPatch {
        shapes: (before.shapes != after.shapes).then(|| after.shapes.clone()),
        groups: (before.groups != after.groups).then(|| after.groups.clone()),
        connections: (before.connections != after.connections).then(|| after.connections.clone()),
    }
}

/// Apply `f` optimistically, write the result remotely, then record history.
///
/// `f` runs against a copy of the cache; an error from it leaves the cache
/// untouched and nothing is written. A mutation that changes nothing is not
/// written or recorded.
pub(crate) async fn commit<R, E, F>(
    state: &SessionState,
    kind: ActionKind,
    record: bool,
    write: RemoteWrite,
    f: F,
) -> Result<R, E>
where
    F: FnOnce(&mut Document) -> Result<R, E>,
    E: From<StoreError>,
{
    let (result, action, pending) = {
        let mut cache = state.cache.write().await;
        let mut next = cache.clone();
        let result = f(&mut next)?;

        let action = HistoryAction::between(kind, state.user_id, now_ms(), &cache, &next);
        if action.is_noop() {
            return Ok(result);
        }
        let pending = match write {
            RemoteWrite::Merge => PendingWrite::Merge(changed_arrays(&cache, &next)),
            RemoteWrite::Append => PendingWrite::Append(
                next.shapes.iter().filter(|s| cache.shape(s.id).is_none()).cloned().collect(),
            ),
        };
        *cache = next;
        publish(state, &cache).await;
        (result, action, pending)
    };

    let written = match pending {
        PendingWrite::Merge(patch) => state.store.write_merge(state.doc_id, patch).await,
        PendingWrite::Append(shapes) => state.store.append_shapes(state.doc_id, shapes).await,
    };
    if let Err(e) = written {
        warn!(
            doc_id = %state.doc_id,
            error = %e,
            code = e.error_code(),
            affected = action.shapes_affected.len(),
            "sync: remote write failed; keeping optimistic state until next snapshot"
        );
        return Err(e.into());
    }

    if record {
        state.history.lock().await.record(action);
    }
    Ok(result)
}

/// Mutate the cache without a remote write, for state the store already holds.
pub(crate) async fn confirm_local<F>(state: &SessionState, f: F)
where
    F: FnOnce(&mut Document),
{
    let mut cache = state.cache.write().await;
    f(&mut cache);
    publish(state, &cache).await;
}

#[cfg(test)]
#[path = "sync_test.rs"]
mod tests;
