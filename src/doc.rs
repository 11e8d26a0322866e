//! Document model: shapes, groups, connections, and the shared document.
//!
//! This module defines the data that lives in a shared scene document
//! (`Shape`, `ShapeGroup`, `Connection`), the sparse-update types used to
//! mutate them (`ShapePatch`, `ConnectionPatch`, `Patch`), and the document
//! envelope exchanged with the remote store (`Document`, `DocumentPatch`).
//!
//! Everything here is plain data. Services decide when and how a mutation
//! is applied and persisted; this layer only knows how to apply one.

#[cfg(test)]
#[path = "doc_test.rs"]
mod tests;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::{Bounds, Point, rotate};

pub type ShapeId = Uuid;
pub type GroupId = Uuid;
pub type ConnectionId = Uuid;
pub type UserId = Uuid;

// =============================================================================
// SHAPE KIND
// =============================================================================

/// The closed set of shape types a scene can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    // Primitives.
    Rectangle,
    Circle,
    Triangle,
    Star,
    Line,
    Arrow,
    Text,
    // Workflow symbols.
    Process,
    Decision,
    Terminator,
    InputOutput,
    Document,
    Database,
    // Form controls.
    Button,
    TextInput,
    Checkbox,
    Toggle,
    Dropdown,
}

/// Type-specific defaults applied by `add` before caller overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeDefaults {
    pub width: f64,
    pub height: f64,
    pub radius: Option<f64>,
    pub fill: &'static str,
    pub stroke: &'static str,
    pub stroke_width: f64,
    pub corner_radius: f64,
    pub font_size: f64,
    pub text: Option<&'static str>,
}

impl ShapeKind {
    pub const ALL: [ShapeKind; 18] = [
        ShapeKind::Rectangle,
        ShapeKind::Circle,
        ShapeKind::Triangle,
        ShapeKind::Star,
        ShapeKind::Line,
        ShapeKind::Arrow,
        ShapeKind::Text,
        ShapeKind::Process,
        ShapeKind::Decision,
        ShapeKind::Terminator,
        ShapeKind::InputOutput,
        ShapeKind::Document,
        ShapeKind::Database,
        ShapeKind::Button,
        ShapeKind::TextInput,
        ShapeKind::Checkbox,
        ShapeKind::Toggle,
        ShapeKind::Dropdown,
    ];

    /// Radius-based kinds whose `(x, y)` is the center rather than the top-left.
    #[must_use]
    pub fn is_circular(self) -> bool {
        matches!(self, ShapeKind::Circle | ShapeKind::Star)
    }

    /// Whether connectors may attach to this kind.
    #[must_use]
    pub fn supports_anchors(self) -> bool {
        !matches!(self, ShapeKind::Line | ShapeKind::Arrow | ShapeKind::Text)
    }

    #[must_use]
    pub fn is_workflow(self) -> bool {
        matches!(
            self,
            ShapeKind::Process
                | ShapeKind::Decision
                | ShapeKind::Terminator
                | ShapeKind::InputOutput
                | ShapeKind::Document
                | ShapeKind::Database
        )
    }

    #[must_use]
    pub fn is_form_control(self) -> bool {
        matches!(
            self,
            ShapeKind::Button | ShapeKind::TextInput | ShapeKind::Checkbox | ShapeKind::Toggle | ShapeKind::Dropdown
        )
    }

    /// Wire name, as used by the store and the agent surface.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ShapeKind::Rectangle => "rectangle",
            ShapeKind::Circle => "circle",
            ShapeKind::Triangle => "triangle",
            ShapeKind::Star => "star",
            ShapeKind::Line => "line",
            ShapeKind::Arrow => "arrow",
            ShapeKind::Text => "text",
            ShapeKind::Process => "process",
            ShapeKind::Decision => "decision",
            ShapeKind::Terminator => "terminator",
            ShapeKind::InputOutput => "input_output",
            ShapeKind::Document => "document",
            ShapeKind::Database => "database",
            ShapeKind::Button => "button",
            ShapeKind::TextInput => "text_input",
            ShapeKind::Checkbox => "checkbox",
            ShapeKind::Toggle => "toggle",
            ShapeKind::Dropdown => "dropdown",
        }
    }

    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    #[must_use]
    pub fn defaults(self) -> ShapeDefaults {
        let base = ShapeDefaults {
            width: 100.0,
            height: 100.0,
            radius: None,
            fill: "#3B82F6",
            stroke: "#1E293B",
            stroke_width: 2.0,
            corner_radius: 0.0,
            font_size: 16.0,
            text: None,
        };
        match self {
            ShapeKind::Rectangle | ShapeKind::Triangle => base,
            ShapeKind::Circle => ShapeDefaults { radius: Some(50.0), fill: "#10B981", ..base },
            ShapeKind::Star => ShapeDefaults { radius: Some(50.0), fill: "#F59E0B", ..base },
            ShapeKind::Line | ShapeKind::Arrow => {
                ShapeDefaults { width: 150.0, height: 0.0, fill: "transparent", ..base }
            }
            ShapeKind::Text => ShapeDefaults {
                width: 200.0,
                height: 30.0,
                fill: "#111827",
                stroke: "transparent",
                stroke_width: 0.0,
                font_size: 20.0,
                text: Some("Text"),
                ..base
            },
            ShapeKind::Process => ShapeDefaults { width: 140.0, height: 70.0, fill: "#DBEAFE", text: Some("Process"), ..base },
            ShapeKind::Decision => {
                ShapeDefaults { width: 120.0, height: 120.0, fill: "#FEF3C7", text: Some("Decision"), ..base }
            }
            ShapeKind::Terminator => ShapeDefaults {
                width: 140.0,
                height: 60.0,
                fill: "#DCFCE7",
                corner_radius: 30.0,
                text: Some("Start"),
                ..base
            },
            ShapeKind::InputOutput => {
                ShapeDefaults { width: 140.0, height: 70.0, fill: "#EDE9FE", text: Some("Input / Output"), ..base }
            }
            ShapeKind::Document => {
                ShapeDefaults { width: 140.0, height: 80.0, fill: "#FCE7F3", text: Some("Document"), ..base }
            }
            ShapeKind::Database => {
                ShapeDefaults { width: 100.0, height: 120.0, fill: "#E0F2FE", text: Some("Database"), ..base }
            }
            ShapeKind::Button => ShapeDefaults {
                width: 120.0,
                height: 40.0,
                fill: "#2563EB",
                stroke: "#1D4ED8",
                corner_radius: 6.0,
                font_size: 14.0,
                text: Some("Button"),
                ..base
            },
            ShapeKind::TextInput => ShapeDefaults {
                width: 220.0,
                height: 40.0,
                fill: "#FFFFFF",
                stroke: "#9CA3AF",
                stroke_width: 1.0,
                corner_radius: 4.0,
                font_size: 14.0,
                text: Some("Enter text..."),
                ..base
            },
            ShapeKind::Checkbox => ShapeDefaults {
                width: 24.0,
                height: 24.0,
                fill: "#FFFFFF",
                stroke: "#6B7280",
                stroke_width: 1.5,
                corner_radius: 3.0,
                font_size: 14.0,
                ..base
            },
            ShapeKind::Toggle => ShapeDefaults {
                width: 52.0,
                height: 28.0,
                fill: "#D1D5DB",
                stroke: "transparent",
                stroke_width: 0.0,
                corner_radius: 14.0,
                ..base
            },
            ShapeKind::Dropdown => ShapeDefaults {
                width: 200.0,
                height: 40.0,
                fill: "#FFFFFF",
                stroke: "#9CA3AF",
                stroke_width: 1.0,
                corner_radius: 4.0,
                font_size: 14.0,
                text: Some("Select..."),
                ..base
            },
        }
    }
}

// =============================================================================
// SHAPE
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

fn one() -> f64 {
    1.0
}

fn default_font_family() -> String {
    "Inter".into()
}

fn default_font_style() -> String {
    "normal".into()
}

/// A shape as stored in the shared document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub id: ShapeId,
    #[serde(rename = "type")]
    pub kind: ShapeKind,

    /// Top-left corner, or center for circular kinds.
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    /// Clockwise rotation in degrees around `(x, y)`.
    #[serde(default)]
    pub rotation: f64,
    #[serde(default = "one")]
    pub scale_x: f64,
    #[serde(default = "one")]
    pub scale_y: f64,

    pub fill: String,
    pub stroke: String,
    pub stroke_width: f64,
    #[serde(default = "one")]
    pub opacity: f64,
    #[serde(default)]
    pub corner_radius: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub font_size: f64,
    #[serde(default = "default_font_family")]
    pub font_family: String,
    #[serde(default = "default_font_style")]
    pub font_style: String,
    #[serde(default)]
    pub text_align: TextAlign,

    #[serde(default)]
    pub is_locked: bool,
    #[serde(default)]
    pub locked_by: Option<UserId>,
    #[serde(default)]
    pub locked_at: Option<i64>,

    #[serde(default)]
    pub z_index: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,

    pub created_by: UserId,
    pub created_at: i64,
    #[serde(default)]
    pub last_modified_by: Option<UserId>,
    #[serde(default)]
    pub last_modified_at: Option<i64>,
}

impl Shape {
    /// Build a shape of `kind` at `(x, y)` with type defaults applied.
    #[must_use]
    pub fn with_defaults(kind: ShapeKind, x: f64, y: f64, created_by: UserId, now: i64) -> Self {
        let d = kind.defaults();
        Self {
            id: Uuid::new_v4(),
            kind,
            x,
            y,
            width: d.radius.map_or(d.width, |r| r * 2.0),
            height: d.radius.map_or(d.height, |r| r * 2.0),
            radius: d.radius,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            fill: d.fill.to_owned(),
            stroke: d.stroke.to_owned(),
            stroke_width: d.stroke_width,
            opacity: 1.0,
            corner_radius: d.corner_radius,
            text: d.text.map(str::to_owned),
            font_size: d.font_size,
            font_family: default_font_family(),
            font_style: default_font_style(),
            text_align: TextAlign::default(),
            is_locked: false,
            locked_by: None,
            locked_at: None,
            z_index: 0,
            group_id: None,
            created_by,
            created_at: now,
            last_modified_by: None,
            last_modified_at: None,
        }
    }

    /// Width and height after scale, using `radius * 2` for circular kinds.
    #[must_use]
    pub fn effective_size(&self) -> (f64, f64) {
        if self.kind.is_circular() {
            let diameter = self.radius.map_or(self.width, |r| r * 2.0);
            (diameter * self.scale_x.abs(), diameter * self.scale_y.abs())
        } else {
            (self.width * self.scale_x.abs(), self.height * self.scale_y.abs())
        }
    }

    /// Axis-aligned box of the unrotated shape.
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        let (w, h) = self.effective_size();
        if self.kind.is_circular() {
            Bounds::new(self.x - w / 2.0, self.y - h / 2.0, w, h)
        } else {
            Bounds::new(self.x, self.y, w, h)
        }
    }

    /// Position `(x, y)` that places the unrotated bounds' top-left at `(left, top)`.
    #[must_use]
    pub fn origin_for_bounds(&self, left: f64, top: f64) -> (f64, f64) {
        if self.kind.is_circular() {
            let (w, h) = self.effective_size();
            (left + w / 2.0, top + h / 2.0)
        } else {
            (left, top)
        }
    }

    /// Visual center, rotation included.
    #[must_use]
    pub fn center(&self) -> Point {
        if self.kind.is_circular() {
            return Point::new(self.x, self.y);
        }
        let (w, h) = self.effective_size();
        let offset = rotate(Point::new(w / 2.0, h / 2.0), self.rotation);
        Point::new(self.x + offset.x, self.y + offset.y)
    }

    /// The four corners of the shape's box, rotated around its origin.
    #[must_use]
    pub fn corners(&self) -> [Point; 4] {
        let b = self.bounds();
        let origin = Point::new(self.x, self.y);
        [
            Point::new(b.x, b.y),
            Point::new(b.right(), b.y),
            Point::new(b.right(), b.bottom()),
            Point::new(b.x, b.bottom()),
        ]
        .map(|corner| {
            let local = rotate(Point::new(corner.x - origin.x, corner.y - origin.y), self.rotation);
            Point::new(origin.x + local.x, origin.y + local.y)
        })
    }

    /// True when the shape is locked and `user_id` is not the holder. A lock
    /// with no recorded owner counts as held by someone else.
    #[must_use]
    pub fn is_locked_by_other(&self, user_id: UserId) -> bool {
        self.is_locked && self.locked_by != Some(user_id)
    }

    /// Copy everything but identity, lock state, and creation provenance from `snapshot`.
    pub fn restore_from(&mut self, snapshot: &Shape) {
        let id = self.id;
        let (is_locked, locked_by, locked_at) = (self.is_locked, self.locked_by, self.locked_at);
        let (created_by, created_at) = (self.created_by, self.created_at);
        *self = snapshot.clone();
        self.id = id;
        self.is_locked = is_locked;
        self.locked_by = locked_by;
        self.locked_at = locked_at;
        self.created_by = created_by;
        self.created_at = created_at;
    }

    pub fn touch(&mut self, user_id: UserId, now: i64) {
        self.last_modified_by = Some(user_id);
        self.last_modified_at = Some(now);
    }
}

// =============================================================================
// PATCHES
// =============================================================================

/// Three-way field update for nullable fields.
///
/// `Keep` leaves the field alone, `Clear` removes it. An omitted field and a
/// field explicitly set to nothing are different requests.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Patch<T> {
    #[default]
    Keep,
    Set(T),
    Clear,
}

impl<T: Clone + PartialEq> Patch<T> {
    /// Apply to `slot`, returning whether the slot changed.
    pub fn apply_to(&self, slot: &mut Option<T>) -> bool {
        let next = match self {
            Patch::Keep => return false,
            Patch::Set(value) => Some(value.clone()),
            Patch::Clear => None,
        };
        if *slot == next {
            return false;
        }
        *slot = next;
        true
    }

    #[must_use]
    pub fn is_keep(&self) -> bool {
        matches!(self, Patch::Keep)
    }
}

fn set_if_changed<T: PartialEq + Clone>(slot: &mut T, value: Option<&T>) -> bool {
    match value {
        Some(v) if slot != v => {
            *slot = v.clone();
            true
        }
        _ => false,
    }
}

/// Sparse update for a shape. Only present fields are applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapePatch {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub radius: Patch<f64>,
    pub rotation: Option<f64>,
    pub scale_x: Option<f64>,
    pub scale_y: Option<f64>,
    pub fill: Option<String>,
    pub stroke: Option<String>,
    pub stroke_width: Option<f64>,
    pub opacity: Option<f64>,
    pub corner_radius: Option<f64>,
    pub text: Patch<String>,
    pub font_size: Option<f64>,
    pub font_family: Option<String>,
    pub font_style: Option<String>,
    pub text_align: Option<TextAlign>,
    pub is_locked: Option<bool>,
    pub locked_by: Patch<UserId>,
    pub locked_at: Patch<i64>,
    pub z_index: Option<i64>,
    pub group_id: Patch<GroupId>,
}

impl ShapePatch {
    #[must_use]
    pub fn position(x: f64, y: f64) -> Self {
        Self { x: Some(x), y: Some(y), ..Self::default() }
    }

    /// Whether the patch moves, resizes, or rotates the shape.
    #[must_use]
    pub fn is_positional(&self) -> bool {
        self.x.is_some()
            || self.y.is_some()
            || self.width.is_some()
            || self.height.is_some()
            || !self.radius.is_keep()
            || self.rotation.is_some()
            || self.scale_x.is_some()
            || self.scale_y.is_some()
    }

    /// Whether the patch touches only lock fields.
    #[must_use]
    pub fn is_lock_only(&self) -> bool {
        let lock_fields = Self {
            is_locked: self.is_locked,
            locked_by: self.locked_by.clone(),
            locked_at: self.locked_at.clone(),
            ..Self::default()
        };
        *self == lock_fields
    }

    /// Apply to `shape`, returning whether anything changed.
    pub fn apply(&self, shape: &mut Shape) -> bool {
        let mut changed = false;
        changed |= set_if_changed(&mut shape.x, self.x.as_ref());
        changed |= set_if_changed(&mut shape.y, self.y.as_ref());
        changed |= set_if_changed(&mut shape.width, self.width.as_ref());
        changed |= set_if_changed(&mut shape.height, self.height.as_ref());
        changed |= self.radius.apply_to(&mut shape.radius);
        changed |= set_if_changed(&mut shape.rotation, self.rotation.as_ref());
        changed |= set_if_changed(&mut shape.scale_x, self.scale_x.as_ref());
        changed |= set_if_changed(&mut shape.scale_y, self.scale_y.as_ref());
        changed |= set_if_changed(&mut shape.fill, self.fill.as_ref());
        changed |= set_if_changed(&mut shape.stroke, self.stroke.as_ref());
        changed |= set_if_changed(&mut shape.stroke_width, self.stroke_width.as_ref());
        changed |= set_if_changed(&mut shape.opacity, self.opacity.as_ref());
        changed |= set_if_changed(&mut shape.corner_radius, self.corner_radius.as_ref());
        changed |= self.text.apply_to(&mut shape.text);
        changed |= set_if_changed(&mut shape.font_size, self.font_size.as_ref());
        changed |= set_if_changed(&mut shape.font_family, self.font_family.as_ref());
        changed |= set_if_changed(&mut shape.font_style, self.font_style.as_ref());
        changed |= set_if_changed(&mut shape.text_align, self.text_align.as_ref());
        changed |= set_if_changed(&mut shape.is_locked, self.is_locked.as_ref());
        changed |= self.locked_by.apply_to(&mut shape.locked_by);
        changed |= self.locked_at.apply_to(&mut shape.locked_at);
        changed |= set_if_changed(&mut shape.z_index, self.z_index.as_ref());
        changed |= self.group_id.apply_to(&mut shape.group_id);
        changed
    }
}

// =============================================================================
// GROUP
// =============================================================================

/// A named set of shapes and nested groups. Bounds are derived from members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeGroup {
    pub id: GroupId,
    /// Shape ids or nested group ids, in insertion order.
    pub shape_ids: Vec<Uuid>,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub created_by: UserId,
    pub created_at: i64,
    #[serde(default)]
    pub last_modified_by: Option<UserId>,
    #[serde(default)]
    pub last_modified_at: Option<i64>,
}

impl ShapeGroup {
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.x, self.y, self.width, self.height)
    }

    pub fn set_bounds(&mut self, bounds: Bounds) {
        self.x = bounds.x;
        self.y = bounds.y;
        self.width = bounds.width;
        self.height = bounds.height;
    }
}

// =============================================================================
// CONNECTION
// =============================================================================

/// Named attachment point on a shape's edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Anchor {
    Top,
    Right,
    Bottom,
    Left,
}

impl Anchor {
    pub const ALL: [Anchor; 4] = [Anchor::Top, Anchor::Right, Anchor::Bottom, Anchor::Left];

    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "top" => Some(Anchor::Top),
            "right" => Some(Anchor::Right),
            "bottom" => Some(Anchor::Bottom),
            "left" => Some(Anchor::Left),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrowType {
    None,
    #[default]
    End,
    Both,
}

impl ArrowType {
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "none" => Some(ArrowType::None),
            "end" => Some(ArrowType::End),
            "both" => Some(ArrowType::Both),
            _ => None,
        }
    }
}

/// A connector between two shape anchors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub from_shape_id: ShapeId,
    pub from_anchor: Anchor,
    pub to_shape_id: ShapeId,
    pub to_anchor: Anchor,
    #[serde(default)]
    pub arrow_type: ArrowType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    #[serde(default)]
    pub dashed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub created_by: UserId,
    pub created_at: i64,
    #[serde(default)]
    pub last_modified_by: Option<UserId>,
    #[serde(default)]
    pub last_modified_at: Option<i64>,
}

impl Connection {
    /// Whether `shape_id` is either endpoint.
    #[must_use]
    pub fn touches(&self, shape_id: ShapeId) -> bool {
        self.from_shape_id == shape_id || self.to_shape_id == shape_id
    }
}

/// Sparse update for a connection. `Patch::Clear` deletes optional fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionPatch {
    pub from_shape_id: Option<ShapeId>,
    pub from_anchor: Option<Anchor>,
    pub to_shape_id: Option<ShapeId>,
    pub to_anchor: Option<Anchor>,
    pub arrow_type: Option<ArrowType>,
    pub stroke: Patch<String>,
    pub stroke_width: Patch<f64>,
    pub dashed: Option<bool>,
    pub label: Patch<String>,
}

impl ConnectionPatch {
    pub fn apply(&self, connection: &mut Connection) -> bool {
        let mut changed = false;
        changed |= set_if_changed(&mut connection.from_shape_id, self.from_shape_id.as_ref());
        changed |= set_if_changed(&mut connection.from_anchor, self.from_anchor.as_ref());
        changed |= set_if_changed(&mut connection.to_shape_id, self.to_shape_id.as_ref());
        changed |= set_if_changed(&mut connection.to_anchor, self.to_anchor.as_ref());
        changed |= set_if_changed(&mut connection.arrow_type, self.arrow_type.as_ref());
        changed |= self.stroke.apply_to(&mut connection.stroke);
        changed |= self.stroke_width.apply_to(&mut connection.stroke_width);
        changed |= set_if_changed(&mut connection.dashed, self.dashed.as_ref());
        changed |= self.label.apply_to(&mut connection.label);
        changed
    }
}

// =============================================================================
// DOCUMENT
// =============================================================================

/// The full shared document as held by the remote store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub shapes: Vec<Shape>,
    #[serde(default)]
    pub groups: Vec<ShapeGroup>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    /// Milliseconds since Unix epoch of the last accepted write.
    #[serde(default)]
    pub last_updated: i64,
}

impl Document {
    #[must_use]
    pub fn shape(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.iter().find(|s| s.id == id)
    }

    pub fn shape_mut(&mut self, id: ShapeId) -> Option<&mut Shape> {
        self.shapes.iter_mut().find(|s| s.id == id)
    }

    #[must_use]
    pub fn group(&self, id: GroupId) -> Option<&ShapeGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn group_mut(&mut self, id: GroupId) -> Option<&mut ShapeGroup> {
        self.groups.iter_mut().find(|g| g.id == id)
    }

    #[must_use]
    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id == id)
    }

    /// Highest z-index in use, or -1 for an empty document.
    #[must_use]
    pub fn max_z_index(&self) -> i64 {
        self.shapes.iter().map(|s| s.z_index).max().unwrap_or(-1)
    }
}

/// A merge-write: each present array replaces the stored array in full.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shapes: Option<Vec<Shape>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<ShapeGroup>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connections: Option<Vec<Connection>>,
}

impl DocumentPatch {
    #[must_use]
    pub fn with_shapes(mut self, shapes: Vec<Shape>) -> Self {
        self.shapes = Some(shapes);
        self
    }

    #[must_use]
    pub fn with_groups(mut self, groups: Vec<ShapeGroup>) -> Self {
        self.groups = Some(groups);
        self
    }

    #[must_use]
    pub fn with_connections(mut self, connections: Vec<Connection>) -> Self {
        self.connections = Some(connections);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shapes.is_none() && self.groups.is_none() && self.connections.is_none()
    }

    /// Overwrite every present array in `doc` and stamp `last_updated`.
    pub fn apply_to(self, doc: &mut Document, now: i64) {
        if let Some(shapes) = self.shapes {
            doc.shapes = shapes;
        }
        if let Some(groups) = self.groups {
            doc.groups = groups;
        }
        if let Some(connections) = self.connections {
            doc.connections = connections;
        }
        doc.last_updated = now;
    }
}
