//! Anchor geometry for connectors.
//!
//! Anchors sit at the midpoints of a shape's four edges. Positions follow
//! the shape's scale and rotation: the local offset is computed on the
//! unrotated box, rotated around the shape's origin, then translated by the
//! shape's position. Circular kinds use `radius * 2` as their extent and
//! are centered on their origin.

#[cfg(test)]
#[path = "anchor_test.rs"]
mod tests;

use crate::doc::{Anchor, Shape, ShapeId};
use crate::geometry::{Point, rotate};

/// Nearest anchor found within snapping range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapTarget {
    pub shape_id: ShapeId,
    pub anchor: Anchor,
    pub position: Point,
    pub distance: f64,
}

fn local_offset(shape: &Shape, anchor: Anchor) -> Point {
    let (w, h) = shape.effective_size();
    if shape.kind.is_circular() {
        match anchor {
            Anchor::Top => Point::new(0.0, -h / 2.0),
            Anchor::Right => Point::new(w / 2.0, 0.0),
            Anchor::Bottom => Point::new(0.0, h / 2.0),
            Anchor::Left => Point::new(-w / 2.0, 0.0),
        }
    } else {
        match anchor {
            Anchor::Top => Point::new(w / 2.0, 0.0),
            Anchor::Right => Point::new(w, h / 2.0),
            Anchor::Bottom => Point::new(w / 2.0, h),
            Anchor::Left => Point::new(0.0, h / 2.0),
        }
    }
}

/// Canvas position of `anchor` on `shape`.
#[must_use]
pub fn anchor_position(shape: &Shape, anchor: Anchor) -> Point {
    let offset = rotate(local_offset(shape, anchor), shape.rotation);
    Point::new(shape.x + offset.x, shape.y + offset.y)
}

/// Closest anchor on `shape` to `point`, with its distance.
///
/// Returns `None` for kinds that do not take connectors.
#[must_use]
pub fn nearest_anchor(shape: &Shape, point: Point) -> Option<(Anchor, f64)> {
    if !shape.kind.supports_anchors() {
        return None;
    }
    Anchor::ALL
        .into_iter()
        .map(|anchor| (anchor, anchor_position(shape, anchor).distance(point)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

/// Globally nearest anchor within `radius` of `point`, skipping `exclude`.
#[must_use]
pub fn find_snappable(shapes: &[Shape], point: Point, exclude: Option<ShapeId>, radius: f64) -> Option<SnapTarget> {
    shapes
        .iter()
        .filter(|shape| Some(shape.id) != exclude)
        .filter_map(|shape| {
            let (anchor, distance) = nearest_anchor(shape, point)?;
            Some(SnapTarget { shape_id: shape.id, anchor, position: anchor_position(shape, anchor), distance })
        })
        .filter(|target| target.distance <= radius)
        .min_by(|a, b| a.distance.total_cmp(&b.distance))
}

/// Pick a `(from, to)` anchor pair that points from one shape toward the other.
///
/// The direction between centers is bucketed into four 90-degree sectors.
/// Sectors are tested by comparing the axis deltas instead of a computed
/// angle, so the exact diagonals (+/-45 degrees) fall to the right-pointing
/// pair and +/-135 degrees to the vertical pairs.
#[must_use]
pub fn optimal_anchor_pair(from: &Shape, to: &Shape) -> (Anchor, Anchor) {
    let a = from.center();
    let b = to.center();
    let (dx, dy) = (b.x - a.x, b.y - a.y);

    if dx >= dy.abs() {
        (Anchor::Right, Anchor::Left)
    } else if dy > 0.0 && dy >= -dx {
        (Anchor::Bottom, Anchor::Top)
    } else if dy < 0.0 && dy <= dx {
        (Anchor::Top, Anchor::Bottom)
    } else {
        (Anchor::Left, Anchor::Right)
    }
}
