//! Group service: nested groups of shapes.
//!
//! DESIGN
//! ======
//! A group's `shape_ids` holds shape ids and nested group ids. A member
//! shape's `group_id` points at its direct parent. Group bounds are derived
//! from the resolved member shapes and refreshed whenever membership or
//! member geometry changes in the same write.
//!
//! Membership is walked with a visited set. A group reached twice (a cycle,
//! or a subgroup shared by two parents) is skipped with a warning instead of
//! recursing forever.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};
use uuid::Uuid;

use super::lock::{LockError, ensure_unlocked};
use super::shape::{ShapeError, update_shapes};
use super::sync::{RemoteWrite, commit, resync};
use crate::doc::{Connection, Document, GroupId, Shape, ShapeGroup, ShapeId, ShapePatch, UserId};
use crate::error::{ErrorCode, now_ms};
use crate::geometry::{Bounds, clamp_to_canvas};
use crate::history::{ActionKind, HistoryAction};
use crate::state::{HistoryMode, SessionState};
use crate::store::StoreError;

/// Fewest members a group may have.
pub const MIN_GROUP_MEMBERS: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum GroupError {
    #[error("group not found: {0}")]
    NotFound(GroupId),
    #[error("group member not found: {0}")]
    MemberNotFound(Uuid),
    #[error("a group needs at least {required} members, got {actual}")]
    InsufficientMembers { required: usize, actual: usize },
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error("sync failed: {0}")]
    Sync(#[from] StoreError),
}

impl ErrorCode for GroupError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_GROUP_NOT_FOUND",
            Self::MemberNotFound(_) => "E_SHAPE_NOT_FOUND",
            Self::InsufficientMembers { .. } => "E_INSUFFICIENT_SELECTION",
            Self::Lock(e) => e.error_code(),
            Self::Shape(e) => e.error_code(),
            Self::Sync(_) => "E_SYNC_FAILURE",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Lock(e) => e.retryable(),
            Self::Shape(e) => e.retryable(),
            Self::Sync(e) => e.retryable(),
            _ => false,
        }
    }
}

// =============================================================================
// RESOLUTION
// =============================================================================

/// Every shape and group reachable from a root group, each listed once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupTree {
    /// Leaf shapes in depth-first order.
    pub shape_ids: Vec<ShapeId>,
    /// The root and every nested group, in depth-first order.
    pub group_ids: Vec<GroupId>,
}

/// Walk `group_id`'s membership depth-first. Unknown ids are ignored.
#[must_use]
pub fn resolve_tree(doc: &Document, group_id: GroupId) -> GroupTree {
    let mut tree = GroupTree::default();
    let mut visited = HashSet::new();
    let mut seen_shapes = HashSet::new();
    walk(doc, group_id, &mut visited, &mut seen_shapes, &mut tree);
    tree
}

fn walk(
    doc: &Document,
    group_id: GroupId,
    visited: &mut HashSet<GroupId>,
    seen_shapes: &mut HashSet<ShapeId>,
    tree: &mut GroupTree,
) {
    let Some(group) = doc.group(group_id) else {
        return;
    };
    if !visited.insert(group_id) {
        warn!(%group_id, "group: membership reaches a group twice; skipping");
        return;
    }
    tree.group_ids.push(group_id);
    for member in &group.shape_ids {
        if doc.group(*member).is_some() {
            walk(doc, *member, visited, seen_shapes, tree);
        } else if doc.shape(*member).is_some() && seen_shapes.insert(*member) {
            tree.shape_ids.push(*member);
        }
    }
}

/// Leaf shape ids under `group_id`, nested groups expanded.
#[must_use]
pub fn resolve_recursive(doc: &Document, group_id: GroupId) -> Vec<ShapeId> {
    resolve_tree(doc, group_id).shape_ids
}

/// Union box of every resolved member shape.
#[must_use]
pub fn group_bounds(doc: &Document, group_id: GroupId) -> Option<Bounds> {
    let tree = resolve_tree(doc, group_id);
    Bounds::union_all(tree.shape_ids.iter().filter_map(|id| doc.shape(*id)).map(Shape::bounds))
}

/// Groups containing `member_id`, nearest first.
#[must_use]
pub fn ancestors(doc: &Document, member_id: Uuid) -> Vec<GroupId> {
    let mut found = Vec::new();
    let mut frontier = vec![member_id];
    let mut visited = HashSet::new();
    while let Some(id) = frontier.pop() {
        for group in doc.groups.iter().filter(|g| g.shape_ids.contains(&id)) {
            if visited.insert(group.id) {
                found.push(group.id);
                frontier.push(group.id);
            }
        }
    }
    found
}

/// Re-derive the bounds of each listed group that still exists and has members.
pub(crate) fn refresh_bounds(doc: &mut Document, group_ids: impl IntoIterator<Item = GroupId>) {
    for group_id in group_ids {
        let Some(bounds) = group_bounds(doc, group_id) else {
            continue;
        };
        if let Some(group) = doc.group_mut(group_id) {
            group.set_bounds(bounds);
        }
    }
}

/// Drop `ids` from every group's membership. Groups left with fewer than
/// two members are dissolved, which may cascade to their parents. Returns
/// the dissolved group ids.
pub(crate) fn detach_members(doc: &mut Document, ids: &HashSet<Uuid>) -> Vec<GroupId> {
    let mut detached = ids.clone();
    let mut touched: HashSet<GroupId> = HashSet::new();
    let mut dissolved = Vec::new();
    for shape in doc.shapes.iter_mut().filter(|s| ids.contains(&s.id)) {
        shape.group_id = None;
    }
    loop {
        for group in &mut doc.groups {
            let before = group.shape_ids.len();
            group.shape_ids.retain(|m| !detached.contains(m));
            if group.shape_ids.len() != before {
                touched.insert(group.id);
            }
        }
        let underfilled: Vec<GroupId> = doc
            .groups
            .iter()
            .filter(|g| touched.contains(&g.id) && g.shape_ids.len() < MIN_GROUP_MEMBERS)
            .map(|g| g.id)
            .collect();
        if underfilled.is_empty() {
            break;
        }
        for group_id in &underfilled {
            release_direct_members(doc, *group_id);
            detached.insert(*group_id);
        }
        doc.groups.retain(|g| !underfilled.contains(&g.id));
        dissolved.extend(underfilled);
    }
    if !dissolved.is_empty() {
        debug!(count = dissolved.len(), "group: dissolved underfilled groups");
    }
    refresh_bounds(doc, touched);
    dissolved
}

fn release_direct_members(doc: &mut Document, group_id: GroupId) {
    let Some(members) = doc.group(group_id).map(|g| g.shape_ids.clone()) else {
        return;
    };
    for member in members {
        if let Some(shape) = doc.shape_mut(member) {
            if shape.group_id == Some(group_id) {
                shape.group_id = None;
            }
        }
    }
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Group shapes and/or groups. Members leave any group they were in.
///
/// # Errors
///
/// `InsufficientMembers` below two distinct members, `MemberNotFound` for an
/// unknown id, `Sync` if the remote write fails.
pub async fn create_group(state: &SessionState, member_ids: &[Uuid], mode: HistoryMode) -> Result<GroupId, GroupError> {
    let mut members: Vec<Uuid> = Vec::with_capacity(member_ids.len());
    for id in member_ids {
        if !members.contains(id) {
            members.push(*id);
        }
    }
    if members.len() < MIN_GROUP_MEMBERS {
        return Err(GroupError::InsufficientMembers { required: MIN_GROUP_MEMBERS, actual: members.len() });
    }

    let user_id = state.user_id;
    let now = now_ms();
    let group_id = Uuid::new_v4();
    commit(state, ActionKind::Create, mode.records(), RemoteWrite::Merge, |doc| {
        if let Some(missing) = members.iter().find(|id| doc.shape(**id).is_none() && doc.group(**id).is_none()) {
            return Err(GroupError::MemberNotFound(*missing));
        }
        detach_members(doc, &members.iter().copied().collect());

        // Detaching may have dissolved a member group.
        members.retain(|id| doc.shape(*id).is_some() || doc.group(*id).is_some());
        if members.len() < MIN_GROUP_MEMBERS {
            return Err(GroupError::InsufficientMembers { required: MIN_GROUP_MEMBERS, actual: members.len() });
        }

        for id in &members {
            if let Some(shape) = doc.shape_mut(*id) {
                shape.group_id = Some(group_id);
            }
        }
        doc.groups.push(ShapeGroup {
            id: group_id,
            shape_ids: members,
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            created_by: user_id,
            created_at: now,
            last_modified_by: None,
            last_modified_at: None,
        });
        refresh_bounds(doc, [group_id]);
        Ok(())
    })
    .await?;
    debug!(doc_id = %state.doc_id, %group_id, "group: created");
    Ok(group_id)
}

/// Delete a group, every nested group, and every resolved shape.
///
/// Returns what was deleted. Connections touching deleted shapes go too.
///
/// # Errors
///
/// `NotFound` for an unknown group, `Sync` if the remote write fails.
pub async fn delete_recursive(state: &SessionState, group_id: GroupId, mode: HistoryMode) -> Result<GroupTree, GroupError> {
    let tree = commit(state, ActionKind::Delete, mode.records(), RemoteWrite::Merge, |doc| {
        if doc.group(group_id).is_none() {
            return Err(GroupError::NotFound(group_id));
        }
        let tree = resolve_tree(doc, group_id);
        let doomed_groups: HashSet<GroupId> = tree.group_ids.iter().copied().collect();
        doc.groups.retain(|g| !doomed_groups.contains(&g.id));

        let doomed_shapes: HashSet<ShapeId> = tree.shape_ids.iter().copied().collect();
        super::shape::remove_from(doc, &doomed_shapes);
        detach_members(doc, &doomed_groups);
        Ok(tree)
    })
    .await?;
    debug!(
        doc_id = %state.doc_id,
        %group_id,
        shapes = tree.shape_ids.len(),
        groups = tree.group_ids.len(),
        "group: deleted recursively"
    );
    Ok(tree)
}

struct DuplicatePlan {
    root: GroupId,
    shapes: Vec<Shape>,
    groups: Vec<ShapeGroup>,
    id_map: HashMap<Uuid, Uuid>,
}

fn plan_duplicate(doc: &Document, group_id: GroupId, offset: f64, user_id: UserId, now: i64) -> Option<DuplicatePlan> {
    let mut plan = DuplicatePlan { root: group_id, shapes: Vec::new(), groups: Vec::new(), id_map: HashMap::new() };
    let mut visited = HashSet::new();
    plan.root = copy_group(doc, group_id, offset, user_id, now, &mut visited, &mut plan)?;
    Some(plan)
}

fn copy_group(
    doc: &Document,
    group_id: GroupId,
    offset: f64,
    user_id: UserId,
    now: i64,
    visited: &mut HashSet<GroupId>,
    plan: &mut DuplicatePlan,
) -> Option<GroupId> {
    let group = doc.group(group_id)?;
    if !visited.insert(group_id) {
        warn!(%group_id, "group: duplicate reaches a group twice; skipping");
        return None;
    }
    let new_id = Uuid::new_v4();
    let mut members = Vec::with_capacity(group.shape_ids.len());
    for member in &group.shape_ids {
        if doc.group(*member).is_some() {
            if let Some(child) = copy_group(doc, *member, offset, user_id, now, visited, plan) {
                members.push(child);
            }
        } else if let Some(shape) = doc.shape(*member) {
            let mut copy = shape.clone();
            copy.id = Uuid::new_v4();
            copy.x += offset;
            copy.y += offset;
            copy.is_locked = false;
            copy.locked_by = None;
            copy.locked_at = None;
            copy.group_id = Some(new_id);
            copy.created_by = user_id;
            copy.created_at = now;
            copy.last_modified_by = None;
            copy.last_modified_at = None;
            plan.id_map.insert(shape.id, copy.id);
            members.push(copy.id);
            plan.shapes.push(copy);
        }
    }
    plan.id_map.insert(group_id, new_id);
    plan.groups.push(ShapeGroup {
        id: new_id,
        shape_ids: members,
        x: group.x + offset,
        y: group.y + offset,
        width: group.width,
        height: group.height,
        created_by: user_id,
        created_at: now,
        last_modified_by: None,
        last_modified_at: None,
    });
    Some(new_id)
}

/// Copy a group tree, shifted diagonally by `offset`. Interactive callers
/// pass `EngineConfig::duplicate_offset`.
///
/// Shapes are appended first; the new groups are written after a resync so
/// their bounds come from the stored copies. Connections with both ends
/// inside the group are copied too. Returns the new root group id.
///
/// # Errors
///
/// `NotFound` for an unknown group, `Sync` if any remote read or write fails.
pub async fn duplicate_group(
    state: &SessionState,
    group_id: GroupId,
    offset: f64,
    mode: HistoryMode,
) -> Result<GroupId, GroupError> {
    let user_id = state.user_id;
    let now = now_ms();
    let plan = {
        let cache = state.cache.read().await;
        plan_duplicate(&cache, group_id, offset, user_id, now)
    }
    .ok_or(GroupError::NotFound(group_id))?;

    let shapes = plan.shapes.clone();
    commit(state, ActionKind::Create, false, RemoteWrite::Append, |doc| {
        let mut ordered = shapes;
        ordered.sort_by_key(|s| s.z_index);
        let mut z = doc.max_z_index();
        for mut shape in ordered {
            z += 1;
            shape.z_index = z;
            doc.shapes.push(shape);
        }
        Ok::<_, GroupError>(())
    })
    .await?;

    resync(state).await?;

    let groups = plan.groups.clone();
    let id_map = plan.id_map.clone();
    let copied_connections = commit(state, ActionKind::Create, false, RemoteWrite::Merge, |doc| {
        let copied: Vec<Connection> = doc
            .connections
            .iter()
            .filter_map(|c| {
                let from = id_map.get(&c.from_shape_id)?;
                let to = id_map.get(&c.to_shape_id)?;
                Some(Connection {
                    id: Uuid::new_v4(),
                    from_shape_id: *from,
                    to_shape_id: *to,
                    created_by: user_id,
                    created_at: now,
                    last_modified_by: None,
                    last_modified_at: None,
                    ..c.clone()
                })
            })
            .collect();
        let copied_ids: HashSet<Uuid> = copied.iter().map(|c| c.id).collect();
        doc.connections.extend(copied);
        let new_ids: Vec<GroupId> = groups.iter().map(|g| g.id).collect();
        doc.groups.extend(groups);
        refresh_bounds(doc, new_ids);
        Ok::<_, GroupError>(copied_ids)
    })
    .await?;

    if mode.records() {
        let doc = state.snapshot().await;
        let shape_ids: HashSet<ShapeId> = plan.shapes.iter().map(|s| s.id).collect();
        let group_ids: HashSet<GroupId> = plan.groups.iter().map(|g| g.id).collect();
        let action = HistoryAction::new(ActionKind::Create, user_id, now)
            .with_shapes([], doc.shapes.iter().filter(|s| shape_ids.contains(&s.id)))
            .with_groups([], doc.groups.iter().filter(|g| group_ids.contains(&g.id)))
            .with_connections([], doc.connections.iter().filter(|c| copied_connections.contains(&c.id)));
        state.history.lock().await.record(action);
    }
    debug!(doc_id = %state.doc_id, from = %group_id, to = %plan.root, "group: duplicated");
    Ok(plan.root)
}

/// Apply a style patch to every resolved member shape as one action.
///
/// # Errors
///
/// `NotFound` for an unknown group, `Shape` if the update fails.
pub async fn update_group_style(
    state: &SessionState,
    group_id: GroupId,
    style: &ShapePatch,
    mode: HistoryMode,
) -> Result<(), GroupError> {
    let members = {
        let cache = state.cache.read().await;
        if cache.group(group_id).is_none() {
            return Err(GroupError::NotFound(group_id));
        }
        resolve_recursive(&cache, group_id)
    };
    let updates = members.into_iter().map(|id| (id, style.clone())).collect();
    update_shapes(state, updates, mode).await?;
    Ok(())
}

/// Re-derive a group's bounds from its members' current geometry.
///
/// Bounds are derived data and not recorded in history.
///
/// # Errors
///
/// `NotFound` for an unknown group, `Sync` if the remote write fails.
pub async fn recompute_bounds(state: &SessionState, group_id: GroupId) -> Result<Bounds, GroupError> {
    commit(state, ActionKind::Update, false, RemoteWrite::Merge, |doc| {
        let group = doc.group(group_id).ok_or(GroupError::NotFound(group_id))?;
        let bounds = group_bounds(doc, group_id).unwrap_or_else(|| group.bounds());
        if let Some(group) = doc.group_mut(group_id) {
            group.set_bounds(bounds);
        }
        Ok(bounds)
    })
    .await
}

/// Remove a group record, releasing its direct members. Returns them.
///
/// # Errors
///
/// `NotFound` for an unknown group, `Sync` if the remote write fails.
pub async fn ungroup(state: &SessionState, group_id: GroupId, mode: HistoryMode) -> Result<Vec<Uuid>, GroupError> {
    commit(state, ActionKind::Update, mode.records(), RemoteWrite::Merge, |doc| {
        let members = doc.group(group_id).ok_or(GroupError::NotFound(group_id))?.shape_ids.clone();
        release_direct_members(doc, group_id);
        doc.groups.retain(|g| g.id != group_id);
        detach_members(doc, &HashSet::from([group_id]));
        Ok(members)
    })
    .await
}

/// Translate every resolved member by `(dx, dy)`, clamping the group's box to
/// the canvas. Returns the offset actually applied.
///
/// # Errors
///
/// `NotFound`, `Lock(Conflict)` if another user holds any member (nothing
/// moves), or `Sync`.
pub async fn move_group(
    state: &SessionState,
    group_id: GroupId,
    dx: f64,
    dy: f64,
    mode: HistoryMode,
) -> Result<(f64, f64), GroupError> {
    let user_id = state.user_id;
    let (cw, ch) = (state.config.canvas_width, state.config.canvas_height);
    let now = now_ms();
    commit(state, ActionKind::Update, mode.records(), RemoteWrite::Merge, |doc| {
        if doc.group(group_id).is_none() {
            return Err(GroupError::NotFound(group_id));
        }
        let tree = resolve_tree(doc, group_id);
        ensure_unlocked(doc.shapes.iter().filter(|s| tree.shape_ids.contains(&s.id)), user_id)?;

        let Some(bounds) = group_bounds(doc, group_id) else {
            return Ok((0.0, 0.0));
        };
        let target = Bounds::new(bounds.x + dx, bounds.y + dy, bounds.width, bounds.height);
        let (left, top) = clamp_to_canvas(target, cw, ch);
        let (applied_dx, applied_dy) = (left - bounds.x, top - bounds.y);

        for id in &tree.shape_ids {
            if let Some(shape) = doc.shape_mut(*id) {
                let patch = ShapePatch::position(shape.x + applied_dx, shape.y + applied_dy);
                if patch.apply(shape) {
                    shape.touch(user_id, now);
                }
            }
        }
        let mut touched = tree.group_ids.clone();
        touched.extend(ancestors(doc, group_id));
        refresh_bounds(doc, touched);
        Ok((applied_dx, applied_dy))
    })
    .await
}

#[cfg(test)]
#[path = "group_test.rs"]
mod tests;
