//! Undo/redo history.
//!
//! DESIGN
//! ======
//! Every action stores full before/after snapshots keyed by id, for shapes
//! and for any groups or connections the action touched. An id absent from
//! a snapshot map means the entity did not exist on that side. Replaying an
//! action in either direction is therefore the same operation: make the
//! document match one side's snapshots (see `services::undo`).
//!
//! The stack is a vector plus a cursor. Entries below the cursor are undoable,
//! entries at or above it are redoable. Recording truncates the redo tail and
//! evicts the oldest entry once the bound is exceeded.

#[cfg(test)]
#[path = "history_test.rs"]
mod tests;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::doc::{Connection, ConnectionId, Document, GroupId, Shape, ShapeGroup, ShapeId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Create,
    Update,
    Delete,
}

/// One undoable unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryAction {
    pub kind: ActionKind,
    pub shapes_affected: Vec<ShapeId>,
    pub before: BTreeMap<ShapeId, Shape>,
    pub after: BTreeMap<ShapeId, Shape>,
    #[serde(default)]
    pub groups_before: BTreeMap<GroupId, ShapeGroup>,
    #[serde(default)]
    pub groups_after: BTreeMap<GroupId, ShapeGroup>,
    #[serde(default)]
    pub connections_before: BTreeMap<ConnectionId, Connection>,
    #[serde(default)]
    pub connections_after: BTreeMap<ConnectionId, Connection>,
    pub timestamp: i64,
    pub user_id: UserId,
}

impl HistoryAction {
    /// Start an action; callers fill in snapshots with the `with_*` builders.
    #[must_use]
    pub fn new(kind: ActionKind, user_id: UserId, timestamp: i64) -> Self {
        Self {
            kind,
            shapes_affected: Vec::new(),
            before: BTreeMap::new(),
            after: BTreeMap::new(),
            groups_before: BTreeMap::new(),
            groups_after: BTreeMap::new(),
            connections_before: BTreeMap::new(),
            connections_after: BTreeMap::new(),
            timestamp,
            user_id,
        }
    }

    #[must_use]
    pub fn with_shapes<'a>(
        mut self,
        before: impl IntoIterator<Item = &'a Shape>,
        after: impl IntoIterator<Item = &'a Shape>,
    ) -> Self {
        for shape in before {
            self.before.insert(shape.id, shape.clone());
        }
        for shape in after {
            self.after.insert(shape.id, shape.clone());
        }
        let mut ids: Vec<ShapeId> = self.before.keys().chain(self.after.keys()).copied().collect();
        ids.sort_unstable();
        ids.dedup();
        self.shapes_affected = ids;
        self
    }

    #[must_use]
    pub fn with_groups<'a>(
        mut self,
        before: impl IntoIterator<Item = &'a ShapeGroup>,
        after: impl IntoIterator<Item = &'a ShapeGroup>,
    ) -> Self {
        for group in before {
            self.groups_before.insert(group.id, group.clone());
        }
        for group in after {
            self.groups_after.insert(group.id, group.clone());
        }
        self
    }

    #[must_use]
    pub fn with_connections<'a>(
        mut self,
        before: impl IntoIterator<Item = &'a Connection>,
        after: impl IntoIterator<Item = &'a Connection>,
    ) -> Self {
        for connection in before {
            self.connections_before.insert(connection.id, connection.clone());
        }
        for connection in after {
            self.connections_after.insert(connection.id, connection.clone());
        }
        self
    }

    /// Capture every shape, group, and connection that differs between two
    /// versions of a document. Unchanged entities are left out.
    #[must_use]
    pub fn between(kind: ActionKind, user_id: UserId, timestamp: i64, before: &Document, after: &Document) -> Self {
        let shapes_before = before.shapes.iter().filter(|s| after.shape(s.id) != Some(*s));
        let shapes_after = after.shapes.iter().filter(|s| before.shape(s.id) != Some(*s));
        let groups_before = before.groups.iter().filter(|g| after.group(g.id) != Some(*g));
        let groups_after = after.groups.iter().filter(|g| before.group(g.id) != Some(*g));
        let connections_before = before.connections.iter().filter(|c| after.connection(c.id) != Some(*c));
        let connections_after = after.connections.iter().filter(|c| before.connection(c.id) != Some(*c));
        Self::new(kind, user_id, timestamp)
            .with_shapes(shapes_before, shapes_after)
            .with_groups(groups_before, groups_after)
            .with_connections(connections_before, connections_after)
    }

    /// True when both sides are identical and replay would do nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.before == self.after
            && self.groups_before == self.groups_after
            && self.connections_before == self.connections_after
    }
}

/// Bounded cursor-based undo stack.
#[derive(Debug, Clone)]
pub struct HistoryStack {
    entries: Vec<HistoryAction>,
    cursor: usize,
    max_entries: usize,
}

impl HistoryStack {
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self { entries: Vec::new(), cursor: 0, max_entries: max_entries.max(1) }
    }

    /// Record a new action, discarding any redo tail.
    pub fn record(&mut self, action: HistoryAction) {
        self.entries.truncate(self.cursor);
        self.entries.push(action);
        if self.entries.len() > self.max_entries {
            let overflow = self.entries.len() - self.max_entries;
            self.entries.drain(..overflow);
        }
        self.cursor = self.entries.len();
    }

    /// Step back, returning the action to revert.
    pub fn undo(&mut self) -> Option<HistoryAction> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        self.entries.get(self.cursor).cloned()
    }

    /// Step forward, returning the action to reapply.
    pub fn redo(&mut self) -> Option<HistoryAction> {
        let action = self.entries.get(self.cursor).cloned()?;
        self.cursor += 1;
        Some(action)
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
