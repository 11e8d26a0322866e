//! Alignment and distribution layout.
//!
//! Both operate on the unrotated bounding boxes of the selection and return
//! target positions; nothing here mutates shapes. `services::layout` turns
//! the result into one batched update.

#[cfg(test)]
#[path = "align_test.rs"]
mod tests;

use serde::{Deserialize, Serialize};

use crate::doc::{Shape, ShapeId};
use crate::geometry::Bounds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignMode {
    Left,
    Right,
    Top,
    Bottom,
    /// Horizontal centers on the union's vertical center line.
    CenterH,
    /// Vertical centers on the union's horizontal center line.
    CenterV,
}

impl AlignMode {
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "left" => Some(AlignMode::Left),
            "right" => Some(AlignMode::Right),
            "top" => Some(AlignMode::Top),
            "bottom" => Some(AlignMode::Bottom),
            "center_h" | "centerH" => Some(AlignMode::CenterH),
            "center_v" | "centerV" => Some(AlignMode::CenterV),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributeDirection {
    Horizontal,
    Vertical,
}

impl DistributeDirection {
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "horizontal" => Some(DistributeDirection::Horizontal),
            "vertical" => Some(DistributeDirection::Vertical),
            _ => None,
        }
    }
}

/// Target origin for one shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub id: ShapeId,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("selection too small: need at least {required} shapes, got {actual}")]
pub struct InsufficientSelection {
    pub required: usize,
    pub actual: usize,
}

pub const MIN_ALIGN: usize = 2;
pub const MIN_DISTRIBUTE: usize = 3;

/// Move each shape's edge (or center) to the matching edge of the union box.
///
/// # Errors
///
/// Returns `InsufficientSelection` for fewer than two shapes.
pub fn align(shapes: &[Shape], mode: AlignMode) -> Result<Vec<Placement>, InsufficientSelection> {
    if shapes.len() < MIN_ALIGN {
        return Err(InsufficientSelection { required: MIN_ALIGN, actual: shapes.len() });
    }
    let Some(union) = Bounds::union_all(shapes.iter().map(Shape::bounds)) else {
        return Err(InsufficientSelection { required: MIN_ALIGN, actual: 0 });
    };
    let center = union.center();

    Ok(shapes
        .iter()
        .map(|shape| {
            let b = shape.bounds();
            let (left, top) = match mode {
                AlignMode::Left => (union.x, b.y),
                AlignMode::Right => (union.right() - b.width, b.y),
                AlignMode::Top => (b.x, union.y),
                AlignMode::Bottom => (b.x, union.bottom() - b.height),
                AlignMode::CenterH => (center.x - b.width / 2.0, b.y),
                AlignMode::CenterV => (b.x, center.y - b.height / 2.0),
            };
            let (x, y) = shape.origin_for_bounds(left, top);
            Placement { id: shape.id, x, y }
        })
        .collect())
}

/// Space shapes evenly along an axis, keeping the outermost two fixed.
///
/// Only interior shapes are returned; the first and last do not move.
///
/// # Errors
///
/// Returns `InsufficientSelection` for fewer than three shapes.
pub fn distribute(shapes: &[Shape], direction: DistributeDirection) -> Result<Vec<Placement>, InsufficientSelection> {
    if shapes.len() < MIN_DISTRIBUTE {
        return Err(InsufficientSelection { required: MIN_DISTRIBUTE, actual: shapes.len() });
    }

    let horizontal = direction == DistributeDirection::Horizontal;
    let start = |b: &Bounds| if horizontal { b.x } else { b.y };
    let extent = |b: &Bounds| if horizontal { b.width } else { b.height };

    let mut sorted: Vec<(&Shape, Bounds)> = shapes.iter().map(|s| (s, s.bounds())).collect();
    sorted.sort_by(|a, b| start(&a.1).total_cmp(&start(&b.1)));

    let first = sorted[0].1;
    let last = sorted[sorted.len() - 1].1;
    let span = start(&last) + extent(&last) - start(&first);
    let occupied: f64 = sorted.iter().map(|(_, b)| extent(b)).sum();
    #[allow(clippy::cast_precision_loss)]
    let gap = (span - occupied) / (sorted.len() - 1) as f64;

    let mut cursor = start(&first) + extent(&first) + gap;
    let interior = &sorted[1..sorted.len() - 1];
    Ok(interior
        .iter()
        .map(|(shape, b)| {
            let (left, top) = if horizontal { (cursor, b.y) } else { (b.x, cursor) };
            cursor += extent(b) + gap;
            let (x, y) = shape.origin_for_bounds(left, top);
            Placement { id: shape.id, x, y }
        })
        .collect())
}
