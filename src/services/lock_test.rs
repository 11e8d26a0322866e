use super::*;
use crate::doc::ShapeKind;
use crate::services::sync::resync;
use crate::state::test_helpers::*;
use crate::store::DocumentStore;
use uuid::Uuid;

#[test]
fn lock_error_codes() {
    let conflict = LockError::Conflict { shape_id: Uuid::nil(), locked_by: None };
    assert_eq!(conflict.error_code(), "E_LOCK_CONFLICT");
    assert!(!conflict.retryable());
    assert_eq!(LockError::NotFound(Uuid::nil()).error_code(), "E_SHAPE_NOT_FOUND");
    assert!(LockError::Sync(StoreError::Rejected("x".into())).retryable());
}

#[test]
fn expiry_uses_lock_age() {
    let mut shape = shape_at(ShapeKind::Rectangle, 0.0, 0.0, 10.0, 10.0);
    assert!(!is_expired(&shape, 10_000, 5_000));

    shape.is_locked = true;
    shape.locked_by = Some(Uuid::new_v4());
    shape.locked_at = Some(1_000);
    assert!(!is_expired(&shape, 6_000, 5_000));
    assert!(is_expired(&shape, 6_001, 5_000));

    shape.locked_at = None;
    assert!(is_expired(&shape, 0, 5_000));
}

#[test]
fn own_lock_is_not_a_conflict() {
    let me = Uuid::new_v4();
    let mut shape = shape_at(ShapeKind::Rectangle, 0.0, 0.0, 10.0, 10.0);
    shape.is_locked = true;
    shape.locked_by = Some(me);
    assert!(ensure_unlocked([&shape], me).is_ok());

    let other = Uuid::new_v4();
    match ensure_unlocked([&shape], other) {
        Err(LockError::Conflict { shape_id, locked_by }) => {
            assert_eq!(shape_id, shape.id);
            assert_eq!(locked_by, Some(me));
        }
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[test]
fn ownerless_lock_blocks_everyone() {
    let me = Uuid::new_v4();
    let mut shape = shape_at(ShapeKind::Rectangle, 0.0, 0.0, 10.0, 10.0);
    shape.is_locked = true;
    assert!(shape.is_locked_by_other(me));
    match ensure_unlocked([&shape], me) {
        Err(LockError::Conflict { shape_id, locked_by }) => {
            assert_eq!(shape_id, shape.id);
            assert_eq!(locked_by, None);
        }
        other => panic!("expected conflict, got {other:?}"),
    }

    shape.is_locked = false;
    assert!(ensure_unlocked([&shape], me).is_ok());
}

#[tokio::test]
async fn acquire_and_release_write_lock_fields_without_history() {
    let (state, store) = test_state().await;
    let shape = shape_at(ShapeKind::Rectangle, 0.0, 0.0, 10.0, 10.0);
    let id = shape.id;
    seed_shapes(&state, &store, vec![shape]).await;

    acquire_lock(&state, id).await.unwrap();
    let stored = store.read_once(state.doc_id).await.unwrap();
    let locked = stored.shape(id).unwrap();
    assert!(locked.is_locked);
    assert_eq!(locked.locked_by, Some(state.user_id));
    assert!(locked.locked_at.is_some());

    release_lock(&state, id).await.unwrap();
    let stored = store.read_once(state.doc_id).await.unwrap();
    assert!(!stored.shape(id).unwrap().is_locked);
    assert!(stored.shape(id).unwrap().locked_by.is_none());

    assert!(state.history.lock().await.is_empty());
}

#[tokio::test]
async fn unknown_shape_is_not_found() {
    let (state, _store) = test_state().await;
    let missing = Uuid::new_v4();
    assert!(matches!(acquire_lock(&state, missing).await, Err(LockError::NotFound(id)) if id == missing));
    assert!(matches!(check_lock(&state, missing).await, Err(LockError::NotFound(_))));
}

#[tokio::test]
async fn peer_lock_blocks_until_swept() {
    let (a, store) = test_state().await;
    let shape = shape_at(ShapeKind::Rectangle, 0.0, 0.0, 10.0, 10.0);
    let id = shape.id;
    seed_shapes(&a, &store, vec![shape]).await;

    let b = peer_of(&a);
    resync(&b).await.unwrap();
    acquire_lock(&b, id).await.unwrap();

    resync(&a).await.unwrap();
    assert!(matches!(check_lock(&a, id).await, Err(LockError::Conflict { .. })));

    // Not yet stale.
    assert!(sweep_expired(&a, now_ms()).await.unwrap().is_empty());
    assert!(check_lock(&a, id).await.is_err());

    let later = now_ms() + a.config.lock_ttl_ms + 1;
    assert_eq!(sweep_expired(&a, later).await.unwrap(), vec![id]);
    assert!(check_lock(&a, id).await.is_ok());

    resync(&b).await.unwrap();
    assert!(!b.snapshot().await.shape(id).unwrap().is_locked);
}

#[tokio::test]
async fn sweeper_task_reclaims_in_background() {
    let config = crate::config::EngineConfig { lock_ttl_ms: 0, lock_sweep_interval_ms: 5, ..Default::default() };
    let (state, store) = test_state_with_config(config).await;
    let mut shape = shape_at(ShapeKind::Rectangle, 0.0, 0.0, 10.0, 10.0);
    shape.is_locked = true;
    shape.locked_by = Some(Uuid::new_v4());
    shape.locked_at = Some(0);
    let id = shape.id;
    seed_shapes(&state, &store, vec![shape]).await;

    let handle = spawn_lock_sweeper(state.clone());
    tokio::time::timeout(std::time::Duration::from_secs(1), async {
        loop {
            if !state.snapshot().await.shape(id).is_some_and(|s| s.is_locked) {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("sweeper did not reclaim the lock");
    handle.abort();
}
