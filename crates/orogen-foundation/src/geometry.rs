//! Map-space geometry.
//!
//! Rendering bounds are axis-aligned rectangles in map coordinate space.
//! The bounds-propagation pass works entirely in the algebra defined here:
//! expand a requested region by an operation's reach, clip it to the map
//! domain, and union it with whatever other consumers already require.
//!
//! Coordinates are signed so that expansion can momentarily step outside the
//! map before clipping; sizes are unsigned and `area()` widens to `u64` so a
//! maximal map cannot overflow.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A point in map coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(self, other: Point) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.y)
    }
}

/// Width and height of a map or tile, in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size2D {
    pub width: u32,
    pub height: u32,
}

impl Size2D {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total cell count.
    pub fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Whether both dimensions fit within `limit`.
    pub fn fits_within(self, limit: Size2D) -> bool {
        self.width <= limit.width && self.height <= limit.height
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Size2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Axis of a linear gradient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Horizontal,
    Vertical,
}

/// An axis-aligned rectangle in map coordinate space.
///
/// The rectangle covers cells `[origin.x, origin.x + width)` by
/// `[origin.y, origin.y + height)`. An empty rectangle (either dimension
/// zero) represents "no region required"; all empty rectangles compare
/// equal through [`Rect::is_empty`], regardless of origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub origin: Point,
    pub size: Size2D,
}

impl Rect {
    /// The canonical empty rectangle.
    pub const EMPTY: Rect = Rect {
        origin: Point { x: 0, y: 0 },
        size: Size2D {
            width: 0,
            height: 0,
        },
    };

    pub fn new(origin: Point, size: Size2D) -> Self {
        Self { origin, size }
    }

    /// Rectangle covering a whole map of the given size, anchored at origin.
    pub fn of_size(size: Size2D) -> Self {
        Self {
            origin: Point::new(0, 0),
            size,
        }
    }

    pub fn is_empty(self) -> bool {
        self.size.is_empty()
    }

    /// Exclusive right edge.
    pub fn right(self) -> i64 {
        self.origin.x as i64 + self.size.width as i64
    }

    /// Exclusive bottom edge.
    pub fn bottom(self) -> i64 {
        self.origin.y as i64 + self.size.height as i64
    }

    /// Whether the cell at `(x, y)` lies inside this rectangle.
    pub fn contains(self, x: i32, y: i32) -> bool {
        !self.is_empty()
            && x >= self.origin.x
            && y >= self.origin.y
            && (x as i64) < self.right()
            && (y as i64) < self.bottom()
    }

    /// Whether `other` lies entirely inside this rectangle.
    ///
    /// The empty rectangle is contained in everything.
    pub fn contains_rect(self, other: Rect) -> bool {
        if other.is_empty() {
            return true;
        }
        if self.is_empty() {
            return false;
        }
        other.origin.x >= self.origin.x
            && other.origin.y >= self.origin.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Intersection of two rectangles.
    pub fn intersect(self, other: Rect) -> Rect {
        if self.is_empty() || other.is_empty() {
            return Rect::EMPTY;
        }
        let x0 = self.origin.x.max(other.origin.x);
        let y0 = self.origin.y.max(other.origin.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if (x0 as i64) >= x1 || (y0 as i64) >= y1 {
            return Rect::EMPTY;
        }
        Rect::new(
            Point::new(x0, y0),
            Size2D::new((x1 - x0 as i64) as u32, (y1 - y0 as i64) as u32),
        )
    }

    /// Smallest rectangle covering both operands.
    ///
    /// Union is the accumulation step of bounds propagation: a slot consumed
    /// by several steps must be produced over the hull of their requests.
    pub fn union_with(self, other: Rect) -> Rect {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        let x0 = self.origin.x.min(other.origin.x);
        let y0 = self.origin.y.min(other.origin.y);
        let x1 = self.right().max(other.right());
        let y1 = self.bottom().max(other.bottom());
        Rect::new(
            Point::new(x0, y0),
            Size2D::new((x1 - x0 as i64) as u32, (y1 - y0 as i64) as u32),
        )
    }

    /// Grow the rectangle by `margin` cells in every direction.
    ///
    /// This is how an operation with spatial reach (a filter, a distance
    /// map) widens the region it needs from its input. The result may extend
    /// outside the map domain; callers clip with [`Rect::intersect`].
    pub fn expand(self, margin: u32) -> Rect {
        if self.is_empty() {
            return Rect::EMPTY;
        }
        let m = margin as i64;
        let x0 = (self.origin.x as i64 - m).max(i32::MIN as i64) as i32;
        let y0 = (self.origin.y as i64 - m).max(i32::MIN as i64) as i32;
        Rect::new(
            Point::new(x0, y0),
            Size2D::new(
                (self.size.width as i64 + 2 * m).min(u32::MAX as i64) as u32,
                (self.size.height as i64 + 2 * m).min(u32::MAX as i64) as u32,
            ),
        )
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "[empty]")
        } else {
            write!(f, "[{} {}]", self.origin, self.size)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: i32, y: i32, w: u32, h: u32) -> Rect {
        Rect::new(Point::new(x, y), Size2D::new(w, h))
    }

    #[test]
    fn test_intersect_overlap() {
        let a = rect(0, 0, 10, 10);
        let b = rect(5, 5, 10, 10);
        assert_eq!(a.intersect(b), rect(5, 5, 5, 5));
    }

    #[test]
    fn test_intersect_disjoint() {
        let a = rect(0, 0, 4, 4);
        let b = rect(10, 10, 4, 4);
        assert!(a.intersect(b).is_empty());
    }

    #[test]
    fn test_union_hull() {
        let a = rect(0, 0, 2, 2);
        let b = rect(8, 8, 2, 2);
        assert_eq!(a.union_with(b), rect(0, 0, 10, 10));
    }

    #[test]
    fn test_union_with_empty() {
        let a = rect(3, 3, 2, 2);
        assert_eq!(a.union_with(Rect::EMPTY), a);
        assert_eq!(Rect::EMPTY.union_with(a), a);
    }

    #[test]
    fn test_expand_and_clip() {
        let domain = rect(0, 0, 64, 64);
        let tile = rect(0, 0, 16, 16);
        let needed = tile.expand(4).intersect(domain);
        assert_eq!(needed, rect(0, 0, 20, 20));
    }

    #[test]
    fn test_expand_negative_origin() {
        let r = rect(2, 2, 4, 4).expand(5);
        assert_eq!(r, rect(-3, -3, 14, 14));
    }

    #[test]
    fn test_contains_rect() {
        let outer = rect(0, 0, 10, 10);
        assert!(outer.contains_rect(rect(2, 2, 3, 3)));
        assert!(!outer.contains_rect(rect(8, 8, 5, 5)));
        assert!(outer.contains_rect(Rect::EMPTY));
    }

    #[test]
    fn test_monotone_expand() {
        // A larger request never shrinks the expanded input region.
        let small = rect(4, 4, 8, 8);
        let large = rect(0, 0, 32, 32);
        assert!(large.contains_rect(small));
        assert!(large.expand(3).contains_rect(small.expand(3)));
    }
}
