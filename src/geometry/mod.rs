//! Pure 2-D geometry shared by the layout, selection, and connector code.
//!
//! Coordinates are canvas units with y growing downward. Rotations are in
//! degrees, clockwise on screen.

pub mod align;
pub mod anchor;
pub mod lasso;

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Axis-aligned rectangle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Smallest box containing both.
    #[must_use]
    pub fn union(&self, other: &Bounds) -> Bounds {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Bounds::new(x, y, self.right().max(other.right()) - x, self.bottom().max(other.bottom()) - y)
    }

    /// Union of every box in `iter`, or `None` when empty.
    pub fn union_all<I>(iter: I) -> Option<Bounds>
    where
        I: IntoIterator<Item = Bounds>,
    {
        iter.into_iter().reduce(|acc, b| acc.union(&b))
    }
}

/// Rotate `offset` clockwise by `degrees` around the origin.
#[must_use]
pub fn rotate(offset: Point, degrees: f64) -> Point {
    if degrees.abs() < f64::EPSILON {
        return offset;
    }
    let (sin, cos) = degrees.to_radians().sin_cos();
    Point::new(offset.x * cos - offset.y * sin, offset.x * sin + offset.y * cos)
}

/// Clamp a box's top-left so the whole box stays inside `[0, canvas]`.
///
/// Boxes larger than the canvas are pinned to the origin.
#[must_use]
pub fn clamp_to_canvas(bounds: Bounds, canvas_width: f64, canvas_height: f64) -> (f64, f64) {
    let max_x = (canvas_width - bounds.width).max(0.0);
    let max_y = (canvas_height - bounds.height).max(0.0);
    (bounds.x.clamp(0.0, max_x), bounds.y.clamp(0.0, max_y))
}
