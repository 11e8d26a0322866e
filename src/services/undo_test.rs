use super::*;
use crate::doc::{Anchor, ArrowType, ShapeKind, ShapePatch};
use crate::services::group::create_group;
use crate::services::lock::acquire_lock;
use crate::services::shape::{add_shape, remove_shape, update_shape};
use crate::state::HistoryMode;
use crate::state::test_helpers::*;
use crate::store::DocumentStore;
use uuid::Uuid;

fn connection(from: Uuid, to: Uuid) -> Connection {
    Connection {
        id: Uuid::new_v4(),
        from_shape_id: from,
        from_anchor: Anchor::Right,
        to_shape_id: to,
        to_anchor: Anchor::Left,
        arrow_type: ArrowType::End,
        stroke: None,
        stroke_width: None,
        dashed: false,
        label: None,
        created_by: Uuid::nil(),
        created_at: 0,
        last_modified_by: None,
        last_modified_at: None,
    }
}

#[tokio::test]
async fn empty_history_is_a_no_op() {
    let (state, store) = test_state().await;
    assert!(!undo(&state).await.unwrap());
    assert!(!redo(&state).await.unwrap());
    assert!(!can_undo(&state).await);
    assert_eq!(store.accepted_writes(), 0);
}

#[tokio::test]
async fn undo_restores_position_and_redo_reapplies() {
    let (state, store) = test_state().await;
    let shape = shape_at(ShapeKind::Rectangle, 100.0, 200.0, 50.0, 50.0);
    let id = shape.id;
    seed_shapes(&state, &store, vec![shape]).await;

    update_shape(&state, id, ShapePatch::position(10.0, 20.0), HistoryMode::Record).await.unwrap();
    let edited = state.snapshot().await.shapes;

    assert!(undo(&state).await.unwrap());
    let stored = store.read_once(state.doc_id).await.unwrap();
    let restored = stored.shape(id).unwrap();
    assert!((restored.x - 100.0).abs() < f64::EPSILON);
    assert!((restored.y - 200.0).abs() < f64::EPSILON);
    assert!(can_redo(&state).await);

    assert!(redo(&state).await.unwrap());
    assert_eq!(state.snapshot().await.shapes, edited);

    // Replays never enter history.
    assert_eq!(state.history.lock().await.len(), 1);
}

#[tokio::test]
async fn undo_then_redo_leaves_final_state_unchanged() {
    let (state, store) = test_state().await;
    let shape = shape_at(ShapeKind::Rectangle, 0.0, 0.0, 50.0, 50.0);
    let id = shape.id;
    seed_shapes(&state, &store, vec![shape]).await;
    let patch = ShapePatch { fill: Some("#123456".into()), ..ShapePatch::default() };
    update_shape(&state, id, patch, HistoryMode::Record).await.unwrap();

    let final_state = state.snapshot().await;
    undo(&state).await.unwrap();
    redo(&state).await.unwrap();
    let replayed = state.snapshot().await;
    assert_eq!(replayed.shapes, final_state.shapes);
    assert_eq!(replayed.groups, final_state.groups);
    assert_eq!(replayed.connections, final_state.connections);
}

#[tokio::test]
async fn create_and_delete_swap_on_replay() {
    let (state, _store) = test_state().await;
    let id = add_shape(&state, ShapeKind::Star, 10.0, 10.0, &ShapePatch::default(), HistoryMode::Record)
        .await
        .unwrap();

    undo(&state).await.unwrap();
    assert!(state.snapshot().await.shape(id).is_none());

    redo(&state).await.unwrap();
    assert!(state.snapshot().await.shape(id).is_some());
}

#[tokio::test]
async fn undoing_remove_restores_cascaded_state() {
    let (state, store) = test_state().await;
    let a = shape_at(ShapeKind::Rectangle, 0.0, 0.0, 10.0, 10.0);
    let b = shape_at(ShapeKind::Rectangle, 50.0, 0.0, 10.0, 10.0);
    let (a_id, b_id) = (a.id, b.id);
    seed_shapes(&state, &store, vec![a, b]).await;
    let group_id = create_group(&state, &[a_id, b_id], HistoryMode::Replay).await.unwrap();
    let link = connection(a_id, b_id);
    let link_id = link.id;
    let mut doc = state.snapshot().await;
    doc.connections.push(link);
    seed_document(&state, &store, doc).await;
    let before = state.snapshot().await;

    remove_shape(&state, a_id, HistoryMode::Record).await.unwrap();
    let removed = state.snapshot().await;
    assert!(removed.connection(link_id).is_none());
    assert!(removed.group(group_id).is_none());

    undo(&state).await.unwrap();
    let restored = store.read_once(state.doc_id).await.unwrap();
    assert_eq!(restored.shape(a_id), before.shape(a_id));
    assert_eq!(restored.shape(b_id).unwrap().group_id, Some(group_id));
    assert_eq!(restored.group(group_id), before.group(group_id));
    assert!(restored.connection(link_id).is_some());
}

#[tokio::test]
async fn restored_shape_keeps_current_lock() {
    let (state, store) = test_state().await;
    let shape = shape_at(ShapeKind::Rectangle, 0.0, 0.0, 10.0, 10.0);
    let id = shape.id;
    seed_shapes(&state, &store, vec![shape]).await;

    update_shape(&state, id, ShapePatch::position(30.0, 30.0), HistoryMode::Record).await.unwrap();
    acquire_lock(&state, id).await.unwrap();
    undo(&state).await.unwrap();

    let cached = state.snapshot().await;
    let shape = cached.shape(id).unwrap();
    assert!(shape.x.abs() < f64::EPSILON);
    assert!(shape.is_locked);
    assert_eq!(shape.locked_by, Some(state.user_id));
}

#[tokio::test]
async fn update_of_vanished_shape_is_skipped() {
    let (state, store) = test_state().await;
    let shape = shape_at(ShapeKind::Rectangle, 0.0, 0.0, 10.0, 10.0);
    let id = shape.id;
    seed_shapes(&state, &store, vec![shape]).await;

    update_shape(&state, id, ShapePatch::position(30.0, 30.0), HistoryMode::Record).await.unwrap();
    remove_shape(&state, id, HistoryMode::Replay).await.unwrap();

    assert!(undo(&state).await.unwrap());
    assert!(state.snapshot().await.shape(id).is_none());
}

#[tokio::test]
async fn failed_replay_write_surfaces_as_sync() {
    let (state, store) = test_state().await;
    let shape = shape_at(ShapeKind::Rectangle, 0.0, 0.0, 10.0, 10.0);
    let id = shape.id;
    seed_shapes(&state, &store, vec![shape]).await;
    update_shape(&state, id, ShapePatch::position(30.0, 30.0), HistoryMode::Record).await.unwrap();

    store.fail_next_writes(1);
    let err = undo(&state).await.unwrap_err();
    assert_eq!(err.error_code(), "E_SYNC_FAILURE");
    assert!(err.retryable());
    assert!(!can_undo(&state).await);
}
