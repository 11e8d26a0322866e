//! Lasso selection: point-in-polygon tests and freehand path simplification.

#[cfg(test)]
#[path = "lasso_test.rs"]
mod tests;

use crate::doc::{Shape, ShapeId};
use crate::geometry::Point;

/// Even-odd ray-casting test. Polygons with fewer than three vertices contain nothing.
#[must_use]
pub fn point_in_polygon(point: Point, polygon: &[Point]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (pi, pj) = (polygon[i], polygon[j]);
        if (pi.y > point.y) != (pj.y > point.y) {
            let cross_x = (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x;
            if point.x < cross_x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// A shape is lassoed when its center or any of its four corners is inside.
#[must_use]
pub fn shape_in_lasso(shape: &Shape, polygon: &[Point]) -> bool {
    point_in_polygon(shape.center(), polygon) || shape.corners().into_iter().any(|c| point_in_polygon(c, polygon))
}

/// Ids of every shape caught by the lasso, in document order.
#[must_use]
pub fn select_in_lasso(shapes: &[Shape], polygon: &[Point]) -> Vec<ShapeId> {
    shapes
        .iter()
        .filter(|shape| shape_in_lasso(shape, polygon))
        .map(|shape| shape.id)
        .collect()
}

/// Perpendicular distance from `p` to the segment `a`-`b`.
fn segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len_sq = dx * dx + dy * dy;
    if len_sq <= f64::EPSILON {
        return p.distance(a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    p.distance(Point::new(a.x + t * dx, a.y + t * dy))
}

/// Douglas-Peucker simplification. Keeps both endpoints and every point
/// that deviates from the local chord by more than `tolerance`.
#[must_use]
pub fn simplify_path(points: &[Point], tolerance: f64) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;
    mark_kept(points, 0, points.len() - 1, tolerance, &mut keep);

    points
        .iter()
        .zip(keep)
        .filter_map(|(p, kept)| kept.then_some(*p))
        .collect()
}

fn mark_kept(points: &[Point], first: usize, last: usize, tolerance: f64, keep: &mut [bool]) {
    if last <= first + 1 {
        return;
    }
    let (mut max_dist, mut max_index) = (0.0, first);
    for i in first + 1..last {
        let d = segment_distance(points[i], points[first], points[last]);
        if d > max_dist {
            max_dist = d;
            max_index = i;
        }
    }
    if max_dist > tolerance {
        keep[max_index] = true;
        mark_kept(points, first, max_index, tolerance, keep);
        mark_kept(points, max_index, last, tolerance, keep);
    }
}
