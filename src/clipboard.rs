//! Clipboard captures and position-independent components.
//!
//! A capture stores portable shape templates (no id, lock, group, or
//! provenance), the capture time, and how many times it has been pasted.
//! Each paste recenters the selection on the viewport and fans out
//! diagonally by `step * paste_count`, so repeated pastes do not stack.

#[cfg(test)]
#[path = "clipboard_test.rs"]
mod tests;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::doc::{Shape, ShapeKind, TextAlign, UserId};
use crate::geometry::{Bounds, Point};

/// A shape stripped of identity, lock state, grouping, and provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeTemplate {
    #[serde(rename = "type")]
    pub kind: ShapeKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    pub rotation: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub fill: String,
    pub stroke: String,
    pub stroke_width: f64,
    pub opacity: f64,
    pub corner_radius: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub font_size: f64,
    pub font_family: String,
    pub font_style: String,
    pub text_align: TextAlign,
}

impl From<&Shape> for ShapeTemplate {
    fn from(shape: &Shape) -> Self {
        Self {
            kind: shape.kind,
            x: shape.x,
            y: shape.y,
            width: shape.width,
            height: shape.height,
            radius: shape.radius,
            rotation: shape.rotation,
            scale_x: shape.scale_x,
            scale_y: shape.scale_y,
            fill: shape.fill.clone(),
            stroke: shape.stroke.clone(),
            stroke_width: shape.stroke_width,
            opacity: shape.opacity,
            corner_radius: shape.corner_radius,
            text: shape.text.clone(),
            font_size: shape.font_size,
            font_family: shape.font_family.clone(),
            font_style: shape.font_style.clone(),
            text_align: shape.text_align,
        }
    }
}

impl ShapeTemplate {
    /// Materialize as a fresh, unlocked, ungrouped shape.
    #[must_use]
    pub fn instantiate(&self, created_by: UserId, now: i64) -> Shape {
        let mut shape = Shape::with_defaults(self.kind, self.x, self.y, created_by, now);
        shape.width = self.width;
        shape.height = self.height;
        shape.radius = self.radius;
        shape.rotation = self.rotation;
        shape.scale_x = self.scale_x;
        shape.scale_y = self.scale_y;
        shape.fill.clone_from(&self.fill);
        shape.stroke.clone_from(&self.stroke);
        shape.stroke_width = self.stroke_width;
        shape.opacity = self.opacity;
        shape.corner_radius = self.corner_radius;
        shape.text.clone_from(&self.text);
        shape.font_size = self.font_size;
        shape.font_family.clone_from(&self.font_family);
        shape.font_style.clone_from(&self.font_style);
        shape.text_align = self.text_align;
        shape
    }

    #[must_use]
    pub fn bounds(&self) -> Bounds {
        self.instantiate(Uuid::nil(), 0).bounds()
    }

    #[must_use]
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self { x: self.x + dx, y: self.y + dy, ..self.clone() }
    }
}

/// Union box of a template list.
#[must_use]
pub fn templates_bounds(templates: &[ShapeTemplate]) -> Option<Bounds> {
    Bounds::union_all(templates.iter().map(ShapeTemplate::bounds))
}

/// Templates for `shapes`, in stacking order.
#[must_use]
pub fn serialize(shapes: &[Shape]) -> Vec<ShapeTemplate> {
    let mut ordered: Vec<&Shape> = shapes.iter().collect();
    ordered.sort_by_key(|s| s.z_index);
    ordered.into_iter().map(ShapeTemplate::from).collect()
}

/// Diagonal displacement for the `paste_count`-th paste of one capture.
#[must_use]
pub fn paste_offset(paste_count: u32, step: f64) -> (f64, f64) {
    let d = step * f64::from(paste_count);
    (d, d)
}

/// A copied selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipboardData {
    pub shapes: Vec<ShapeTemplate>,
    pub captured_at: i64,
    pub paste_count: u32,
}

impl ClipboardData {
    #[must_use]
    pub fn capture(shapes: &[Shape], now: i64) -> Self {
        Self { shapes: serialize(shapes), captured_at: now, paste_count: 0 }
    }

    /// Non-empty and younger than `max_age_ms`.
    #[must_use]
    pub fn is_valid(&self, now: i64, max_age_ms: i64) -> bool {
        !self.shapes.is_empty() && now.saturating_sub(self.captured_at) < max_age_ms
    }

    /// Templates translated so the selection's center lands on
    /// `viewport_center`, plus the diagonal offset for the current count.
    /// Does not advance the counter.
    #[must_use]
    pub fn plan_paste(&self, viewport_center: Point, step: f64) -> Vec<ShapeTemplate> {
        let Some(bounds) = templates_bounds(&self.shapes) else {
            return Vec::new();
        };
        let center = bounds.center();
        let (ox, oy) = paste_offset(self.paste_count, step);
        let dx = viewport_center.x - center.x + ox;
        let dy = viewport_center.y - center.y + oy;
        self.shapes.iter().map(|t| t.translated(dx, dy)).collect()
    }

    /// Encode for an external (system) clipboard.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if a float is non-finite.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode a capture previously produced by `to_text`.
    ///
    /// # Errors
    ///
    /// Returns a serialization error for foreign or malformed text.
    pub fn from_text(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// A reusable, position-independent stamp built from a selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Templates positioned relative to the component's top-left.
    pub shapes: Vec<ShapeTemplate>,
    pub width: f64,
    pub height: f64,
}

impl Component {
    /// Templates re-anchored at `origin`.
    #[must_use]
    pub fn placed_at(&self, origin: Point) -> Vec<ShapeTemplate> {
        self.shapes.iter().map(|t| t.translated(origin.x, origin.y)).collect()
    }
}

/// Normalize a selection against its bounding box. `None` for an empty selection.
#[must_use]
pub fn extract_component(shapes: &[Shape]) -> Option<Component> {
    let bounds = Bounds::union_all(shapes.iter().map(Shape::bounds))?;
    let templates = serialize(shapes)
        .into_iter()
        .map(|t| t.translated(-bounds.x, -bounds.y))
        .collect();
    Some(Component { shapes: templates, width: bounds.width, height: bounds.height })
}
