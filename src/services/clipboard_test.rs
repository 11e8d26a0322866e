use super::*;
use crate::doc::ShapeKind;
use crate::geometry::Bounds;
use crate::state::test_helpers::*;
use crate::store::DocumentStore;
use uuid::Uuid;

const EPS: f64 = 1e-9;

async fn seeded_pair(state: &SessionState, store: &crate::store::InMemoryDocumentStore) -> Vec<ShapeId> {
    let shapes = vec![
        shape_at(ShapeKind::Rectangle, 100.0, 100.0, 40.0, 20.0),
        shape_at(ShapeKind::Rectangle, 160.0, 140.0, 40.0, 20.0),
    ];
    let ids = shapes.iter().map(|s| s.id).collect();
    seed_shapes(state, store, shapes).await;
    ids
}

fn union_of(doc: &crate::doc::Document, ids: &[ShapeId]) -> Bounds {
    Bounds::union_all(ids.iter().filter_map(|id| doc.shape(*id)).map(Shape::bounds)).unwrap()
}

#[tokio::test]
async fn first_paste_recenters_on_viewport() {
    let (state, store) = test_state().await;
    let ids = seeded_pair(&state, &store).await;
    assert_eq!(copy(&state, &ids).await.unwrap(), 2);

    let pasted = paste(&state, Point::new(1_000.0, 500.0), HistoryMode::Record).await.unwrap();
    assert_eq!(pasted.len(), 2);
    assert!(pasted.iter().all(|id| !ids.contains(id)));

    let cached = state.snapshot().await;
    let original = union_of(&cached, &ids);
    let copy_box = union_of(&cached, &pasted);
    assert!((copy_box.center().x - 1_000.0).abs() < EPS);
    assert!((copy_box.center().y - 500.0).abs() < EPS);
    assert!((copy_box.width - original.width).abs() < EPS);
    assert!((copy_box.height - original.height).abs() < EPS);
    assert!(cached.shape(pasted[0]).unwrap().z_index > cached.shape(ids[1]).unwrap().z_index);
    assert_eq!(state.history.lock().await.len(), 1);
}

#[tokio::test]
async fn repeated_pastes_fan_out_diagonally() {
    let (state, store) = test_state().await;
    let ids = seeded_pair(&state, &store).await;
    copy(&state, &ids).await.unwrap();
    let center = Point::new(500.0, 500.0);

    let first = paste(&state, center, HistoryMode::Record).await.unwrap();
    let second = paste(&state, center, HistoryMode::Record).await.unwrap();
    let cached = state.snapshot().await;
    let a = union_of(&cached, &first);
    let b = union_of(&cached, &second);
    let step = state.config.paste_offset_step;
    assert!((b.x - a.x - step).abs() < EPS);
    assert!((b.y - a.y - step).abs() < EPS);
    assert_eq!(state.clipboard.lock().await.as_ref().unwrap().paste_count, 2);

    // A new capture restarts the fan-out.
    copy(&state, &ids).await.unwrap();
    assert_eq!(state.clipboard.lock().await.as_ref().unwrap().paste_count, 0);
}

#[tokio::test]
async fn failed_paste_keeps_the_counter() {
    let (state, store) = test_state().await;
    let ids = seeded_pair(&state, &store).await;
    copy(&state, &ids).await.unwrap();

    store.fail_next_writes(1);
    let err = paste(&state, Point::new(0.0, 0.0), HistoryMode::Record).await.unwrap_err();
    assert_eq!(err.error_code(), "E_SYNC_FAILURE");
    assert!(err.retryable());
    assert_eq!(state.clipboard.lock().await.as_ref().unwrap().paste_count, 0);
}

#[tokio::test]
async fn cut_removes_the_selection() {
    let (state, store) = test_state().await;
    let ids = seeded_pair(&state, &store).await;
    cut(&state, &ids, HistoryMode::Record).await.unwrap();
    assert!(store.read_once(state.doc_id).await.unwrap().shapes.is_empty());

    let pasted = paste(&state, Point::new(300.0, 300.0), HistoryMode::Record).await.unwrap();
    assert_eq!(state.snapshot().await.shapes.len(), pasted.len());
}

#[tokio::test]
async fn empty_and_stale_captures_are_refused() {
    let (state, store) = test_state().await;
    assert!(matches!(paste(&state, Point::default(), HistoryMode::Record).await, Err(ClipboardError::Empty)));
    assert!(matches!(copy(&state, &[]).await, Err(ClipboardError::Empty)));
    assert!(matches!(copy(&state, &[Uuid::new_v4()]).await, Err(ClipboardError::ShapeNotFound(_))));

    let ids = seeded_pair(&state, &store).await;
    copy(&state, &ids).await.unwrap();
    if let Some(data) = state.clipboard.lock().await.as_mut() {
        data.captured_at -= state.config.clipboard_max_age_ms + 1;
    }
    let err = paste(&state, Point::default(), HistoryMode::Record).await.unwrap_err();
    assert!(matches!(err, ClipboardError::Stale { .. }));
    assert_eq!(err.error_code(), "E_CLIPBOARD_STALE");
}

#[tokio::test]
async fn component_stamps_at_origin() {
    let (state, store) = test_state().await;
    let ids = seeded_pair(&state, &store).await;
    let component = extract_component(&state, &ids).await.unwrap();
    assert!((component.width - 100.0).abs() < EPS);
    assert!((component.height - 60.0).abs() < EPS);

    let stamped = insert_component(&state, &component, Point::new(1_000.0, 2_000.0), HistoryMode::Record)
        .await
        .unwrap();
    let cached = state.snapshot().await;
    let placed = union_of(&cached, &stamped);
    assert!((placed.x - 1_000.0).abs() < EPS);
    assert!((placed.y - 2_000.0).abs() < EPS);
    assert!((placed.width - 100.0).abs() < EPS);

    let empty = Component { shapes: Vec::new(), width: 0.0, height: 0.0 };
    assert!(matches!(
        insert_component(&state, &empty, Point::default(), HistoryMode::Record).await,
        Err(ClipboardError::Empty)
    ));
}

#[tokio::test]
async fn text_export_round_trips_into_another_session() {
    let (state, store) = test_state().await;
    let ids = seeded_pair(&state, &store).await;
    assert!(matches!(export_text(&state).await, Err(ClipboardError::Empty)));
    copy(&state, &ids).await.unwrap();
    paste(&state, Point::default(), HistoryMode::Record).await.unwrap();
    let text = export_text(&state).await.unwrap();

    let (other, _other_store) = test_state().await;
    assert_eq!(import_text(&other, &text).await.unwrap(), 2);
    assert_eq!(other.clipboard.lock().await.as_ref().unwrap().paste_count, 0);
    assert_eq!(paste(&other, Point::new(50.0, 50.0), HistoryMode::Record).await.unwrap().len(), 2);

    let err = import_text(&other, "not a capture").await.unwrap_err();
    assert_eq!(err.error_code(), "E_SERIALIZATION");
}
