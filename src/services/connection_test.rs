use super::*;
use crate::doc::{Patch, ShapeKind};
use crate::services::sync::resync;
use crate::services::undo::undo;
use crate::state::test_helpers::*;
use crate::store::DocumentStore;

async fn two_boxes(state: &SessionState, store: &crate::store::InMemoryDocumentStore) -> (ShapeId, ShapeId) {
    let a = shape_at(ShapeKind::Rectangle, 0.0, 0.0, 100.0, 50.0);
    let b = shape_at(ShapeKind::Rectangle, 300.0, 0.0, 100.0, 50.0);
    let ids = (a.id, b.id);
    seed_shapes(state, store, vec![a, b]).await;
    ids
}

#[test]
fn connection_error_codes() {
    assert_eq!(ConnectionError::NotFound(Uuid::nil()).error_code(), "E_CONNECTION_NOT_FOUND");
    assert_eq!(ConnectionError::AnchorUnsupported(Uuid::nil()).error_code(), "E_ANCHOR_UNSUPPORTED");
    assert!(ConnectionError::Sync(StoreError::Rejected("x".into())).retryable());
}

#[tokio::test]
async fn create_picks_facing_anchors() {
    let (state, store) = test_state().await;
    let (a, b) = two_boxes(&state, &store).await;

    let id = create_connection(&state, a, b, None, &ConnectionPatch::default(), HistoryMode::Record)
        .await
        .unwrap();
    let stored = store.read_once(state.doc_id).await.unwrap();
    let connection = stored.connection(id).unwrap();
    assert_eq!(connection.from_anchor, Anchor::Right);
    assert_eq!(connection.to_anchor, Anchor::Left);
    assert_eq!(connection.arrow_type, ArrowType::End);
    assert_eq!(connection.created_by, state.user_id);
    assert_eq!(state.history.lock().await.len(), 1);
}

#[tokio::test]
async fn create_honors_explicit_anchors_and_style() {
    let (state, store) = test_state().await;
    let (a, b) = two_boxes(&state, &store).await;
    let style = ConnectionPatch {
        // Endpoint overrides in a style patch are ignored.
        to_shape_id: Some(a),
        arrow_type: Some(ArrowType::Both),
        label: Patch::Set("flows".into()),
        dashed: Some(true),
        ..ConnectionPatch::default()
    };

    let id = create_connection(&state, a, b, Some((Anchor::Bottom, Anchor::Bottom)), &style, HistoryMode::Record)
        .await
        .unwrap();
    let cached = state.snapshot().await;
    let connection = cached.connection(id).unwrap();
    assert_eq!(connection.to_shape_id, b);
    assert_eq!(connection.from_anchor, Anchor::Bottom);
    assert_eq!(connection.arrow_type, ArrowType::Both);
    assert_eq!(connection.label.as_deref(), Some("flows"));
    assert!(connection.dashed);
}

#[tokio::test]
async fn create_rejects_bad_endpoints_before_writing() {
    let (state, store) = test_state().await;
    let (a, _) = two_boxes(&state, &store).await;
    let missing = Uuid::new_v4();
    let result = create_connection(&state, a, missing, None, &ConnectionPatch::default(), HistoryMode::Record).await;
    assert!(matches!(result, Err(ConnectionError::ShapeNotFound(id)) if id == missing));

    let line = shape_at(ShapeKind::Line, 0.0, 400.0, 100.0, 0.0);
    let line_id = line.id;
    let mut doc = state.snapshot().await;
    doc.shapes.push(line);
    seed_document(&state, &store, doc).await;
    let result = create_connection(&state, a, line_id, None, &ConnectionPatch::default(), HistoryMode::Record).await;
    assert!(matches!(result, Err(ConnectionError::AnchorUnsupported(_))));
    assert_eq!(store.accepted_writes(), 0);
}

#[tokio::test]
async fn update_clears_field_and_records() {
    let (state, store) = test_state().await;
    let (a, b) = two_boxes(&state, &store).await;
    let style = ConnectionPatch { label: Patch::Set("yes".into()), ..ConnectionPatch::default() };
    let id = create_connection(&state, a, b, None, &style, HistoryMode::Replay).await.unwrap();

    let patch = ConnectionPatch { label: Patch::Clear, ..ConnectionPatch::default() };
    update_connection(&state, id, patch, HistoryMode::Record).await.unwrap();

    let stored = store.read_once(state.doc_id).await.unwrap();
    assert_eq!(stored.connection(id).unwrap().label, None);
    assert_eq!(state.snapshot().await.connection(id).unwrap().label, None);
    assert!(state.pending_connections.lock().await.is_empty());
    assert_eq!(state.history.lock().await.len(), 1);

    undo(&state).await.unwrap();
    assert_eq!(state.snapshot().await.connection(id).unwrap().label.as_deref(), Some("yes"));
}

#[tokio::test]
async fn keep_patch_is_a_no_op() {
    let (state, store) = test_state().await;
    let (a, b) = two_boxes(&state, &store).await;
    let id = create_connection(&state, a, b, None, &ConnectionPatch::default(), HistoryMode::Replay)
        .await
        .unwrap();
    let writes = store.accepted_writes();
    update_connection(&state, id, ConnectionPatch::default(), HistoryMode::Record).await.unwrap();
    assert_eq!(store.accepted_writes(), writes);
    assert!(state.history.lock().await.is_empty());
}

#[tokio::test]
async fn failed_update_reverts_to_authoritative() {
    let (state, store) = test_state().await;
    let (a, b) = two_boxes(&state, &store).await;
    let id = create_connection(&state, a, b, None, &ConnectionPatch::default(), HistoryMode::Replay)
        .await
        .unwrap();

    store.fail_next_writes(1);
    let patch = ConnectionPatch { dashed: Some(true), ..ConnectionPatch::default() };
    let err = update_connection(&state, id, patch, HistoryMode::Record).await.unwrap_err();
    assert!(matches!(err, ConnectionError::Sync(_)));
    assert!(state.pending_connections.lock().await.is_empty());
    let visible = visible_connections(&state).await;
    assert!(!visible.iter().any(|c| c.dashed));
    assert!(state.history.lock().await.is_empty());
}

#[tokio::test]
async fn pending_edits_overlay_the_cache() {
    let (state, store) = test_state().await;
    let (a, b) = two_boxes(&state, &store).await;
    let id = create_connection(&state, a, b, None, &ConnectionPatch::default(), HistoryMode::Replay)
        .await
        .unwrap();

    let mut optimistic = state.snapshot().await.connection(id).unwrap().clone();
    optimistic.label = Some("in flight".into());
    state.pending_connections.lock().await.insert(id, optimistic);

    let visible = connections_for_shape(&state, b).await;
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].label.as_deref(), Some("in flight"));
    assert_eq!(state.snapshot().await.connection(id).unwrap().label, None);
}

#[tokio::test]
async fn delete_and_lookup_by_shape() {
    let (state, store) = test_state().await;
    let (a, b) = two_boxes(&state, &store).await;
    let id = create_connection(&state, a, b, None, &ConnectionPatch::default(), HistoryMode::Record)
        .await
        .unwrap();
    assert_eq!(connections_for_shape(&state, a).await.len(), 1);

    delete_connection(&state, id, HistoryMode::Record).await.unwrap();
    assert!(connections_for_shape(&state, a).await.is_empty());
    assert!(matches!(
        delete_connection(&state, id, HistoryMode::Record).await,
        Err(ConnectionError::NotFound(_))
    ));
}

#[tokio::test]
async fn endpoints_follow_anchor_geometry() {
    let (state, store) = test_state().await;
    let (a, b) = two_boxes(&state, &store).await;
    let id = create_connection(&state, a, b, None, &ConnectionPatch::default(), HistoryMode::Record)
        .await
        .unwrap();
    let (from, to) = endpoints(&state, id).await.unwrap();
    assert_eq!(from, Point::new(100.0, 25.0));
    assert_eq!(to, Point::new(300.0, 25.0));
}

#[tokio::test]
async fn snapping_respects_radius_and_exclusion() {
    let (state, store) = test_state().await;
    let (a, b) = two_boxes(&state, &store).await;

    let target = snap_endpoint(&state, Point::new(295.0, 30.0), None).await.unwrap();
    assert_eq!(target.shape_id, b);
    assert_eq!(target.anchor, Anchor::Left);

    assert!(snap_endpoint(&state, Point::new(295.0, 30.0), Some(b)).await.is_none());
    assert!(snap_endpoint(&state, Point::new(200.0, 300.0), None).await.is_none());
    assert_eq!(snap_endpoint(&state, Point::new(102.0, 25.0), Some(b)).await.unwrap().shape_id, a);
}

fn label_in_view(state: &SessionState, id: ConnectionId) -> Option<String> {
    state.view.borrow().connection(id).and_then(|c| c.label.clone())
}

async fn connected_gated_session() -> (SessionState, std::sync::Arc<GatedStore>, ConnectionId) {
    let (seed, store) = test_state().await;
    let (a, b) = two_boxes(&seed, &store).await;
    let id = create_connection(&seed, a, b, None, &ConnectionPatch::default(), HistoryMode::Record)
        .await
        .unwrap();
    let (state, gate) = gated_peer(&seed, &store);
    resync(&state).await.unwrap();
    (state, gate, id)
}

#[tokio::test]
async fn live_view_shows_pending_edit_while_write_is_in_flight() {
    let (state, gate, id) = connected_gated_session().await;
    let mut view = state.view.subscribe();
    let patch = ConnectionPatch { label: Patch::Set("hi".into()), ..ConnectionPatch::default() };
    let task = tokio::spawn({
        let state = state.clone();
        async move { update_connection(&state, id, patch, HistoryMode::Record).await }
    });

    tokio::time::timeout(
        std::time::Duration::from_secs(1),
        view.wait_for(|doc| doc.connection(id).is_some_and(|c| c.label.as_deref() == Some("hi"))),
    )
    .await
    .expect("pending edit never reached the live view")
    .unwrap();
    assert_eq!(state.snapshot().await.connection(id).unwrap().label, None);

    gate.open(1);
    task.await.unwrap().unwrap();
    assert_eq!(label_in_view(&state, id).as_deref(), Some("hi"));
    assert_eq!(state.snapshot().await.connection(id).unwrap().label.as_deref(), Some("hi"));
    assert!(state.pending_connections.lock().await.is_empty());
}

#[tokio::test]
async fn live_view_reverts_when_pending_edit_is_rejected() {
    let (state, gate, id) = connected_gated_session().await;
    let mut view = state.view.subscribe();
    let patch = ConnectionPatch { label: Patch::Set("hi".into()), ..ConnectionPatch::default() };
    let task = tokio::spawn({
        let state = state.clone();
        async move { update_connection(&state, id, patch, HistoryMode::Record).await }
    });

    tokio::time::timeout(
        std::time::Duration::from_secs(1),
        view.wait_for(|doc| doc.connection(id).is_some_and(|c| c.label.is_some())),
    )
    .await
    .expect("pending edit never reached the live view")
    .unwrap();

    gate.inner.fail_next_writes(1);
    gate.open(1);
    let result = task.await.unwrap();
    assert!(matches!(result, Err(ConnectionError::Sync(StoreError::Rejected(_)))));
    assert_eq!(label_in_view(&state, id), None);
    assert!(visible_connections(&state).await.iter().all(|c| c.label.is_none()));
    assert!(state.history.lock().await.is_empty());
}
