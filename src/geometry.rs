//! Geometry primitives.
//!
//! Coordinates are signed: X11 window placement is routinely negative (a
//! window dragged partly off the left edge of a head, or parked at
//! `(-100, -100)` the way a selection owner or systray container window
//! is in the original implementation) and the wire values themselves are
//! signed 16-bit integers. Extents stay unsigned; a window cannot have a
//! negative width or height.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An x, y coordinate pair, relative to whatever origin the caller is
/// working in (root, parent, or screen-head local).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Point {
    /// x coordinate.
    pub x: i32,
    /// y coordinate.
    pub y: i32,
}

impl Point {
    /// Create a new [`Point`].
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point, used by head selection
    /// (nearest-by-center) in the screen geometry module.
    pub fn distance_to(&self, other: Point) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

impl From<Rect> for Point {
    fn from(r: Rect) -> Self {
        Point { x: r.x, y: r.y }
    }
}

/// A window or screen-head position: top-left corner plus extent.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Default, Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct Rect {
    /// x coordinate of the top left corner.
    pub x: i32,
    /// y coordinate of the top left corner.
    pub y: i32,
    /// Width.
    pub w: u32,
    /// Height.
    pub h: u32,
}

impl Rect {
    /// Create a new [`Rect`].
    pub fn new(x: i32, y: i32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// The midpoint of this rectangle, used by head-selection distance
    /// comparisons.
    pub fn midpoint(&self) -> Point {
        Point {
            x: self.x + self.w as i32 / 2,
            y: self.y + self.h as i32 / 2,
        }
    }

    /// Whether `p` lies strictly inside this rectangle.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x
            && p.y >= self.y
            && p.x < self.x + self.w as i32
            && p.y < self.y + self.h as i32
    }

    /// The intersection of two rectangles, or `None` if they do not
    /// overlap. Used by the shape engine to clip a propagated region to
    /// its window's bounding box and by the screen module to intersect a
    /// head's geometry with aggregate strut reservations.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (self.x + self.w as i32).min(other.x + other.w as i32);
        let y1 = (self.y + self.h as i32).min(other.y + other.h as i32);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Rect::new(x0, y0, (x1 - x0) as u32, (y1 - y0) as u32))
    }

    /// The smallest rectangle containing both `self` and `other`. Used by
    /// the event compressor to coalesce a run of `Expose` events into a
    /// single bounding rect.
    pub fn union(&self, other: &Rect) -> Rect {
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = (self.x + self.w as i32).max(other.x + other.w as i32);
        let y1 = (self.y + self.h as i32).max(other.y + other.h as i32);
        Rect::new(x0, y0, (x1 - x0) as u32, (y1 - y0) as u32)
    }

    /// A rectangle translated by `(dx, dy)`, used to convert a child's
    /// shape rectangles into its parent's coordinate space during shape
    /// propagation.
    pub fn translated(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.w, self.h)
    }

    /// True if this rect, placed at the origin, exactly matches `geom`'s
    /// extent: the "single rect equal to the full window" collapse case
    /// used throughout the shape engine.
    pub fn is_full_window(&self, geom: Rect) -> bool {
        self.x == 0 && self.y == 0 && self.w == geom.w && self.h == geom.h
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersection_of_disjoint_rects_is_none() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(20, 20, 5, 5);
        assert_eq!(a.intersection(&b), None);
    }

    #[test]
    fn intersection_clips_to_overlap() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(5, 5, 10, 10);
        assert_eq!(a.intersection(&b), Some(Rect::new(5, 5, 5, 5)));
    }

    #[test]
    fn union_is_bounding_box() {
        let a = Rect::new(0, 0, 4, 4);
        let b = Rect::new(10, 10, 2, 2);
        assert_eq!(a.union(&b), Rect::new(0, 0, 12, 12));
    }

    #[test]
    fn full_window_detection() {
        let geom = Rect::new(50, 50, 100, 80);
        assert!(Rect::new(0, 0, 100, 80).is_full_window(geom));
        assert!(!Rect::new(0, 0, 99, 80).is_full_window(geom));
    }
}
