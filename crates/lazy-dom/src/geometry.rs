//! Geometry
//!
//! Page-relative element rectangles and the overlap test used for
//! viewport visibility.

/// Axis-aligned rectangle in page coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// Create with dimensions
    pub const fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self { left, top, width, height }
    }

    /// Right edge
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    /// Bottom edge
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Move by a delta
    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self {
            left: self.left + dx,
            top: self.top + dy,
            ..*self
        }
    }

    /// Strict overlap. Rectangles that only share an edge do not overlap.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.left < other.right()
            && self.right() > other.left
            && self.top < other.bottom()
            && self.bottom() > other.top
    }

    /// How far this rectangle sticks out of `bounds` on each side.
    ///
    /// Each component is zero or negative, matching the sign convention of
    /// the distance from the bound to the edge.
    pub fn overhang(&self, bounds: &Rect) -> Insets {
        Insets {
            top: (self.top - bounds.top).min(0.0),
            bottom: (bounds.bottom() - self.bottom()).min(0.0),
            left: (self.left - bounds.left).min(0.0),
            right: (bounds.right() - self.right()).min(0.0),
        }
    }

    /// Grow by a fraction of the current size, keeping the centre fixed.
    ///
    /// A ratio of 0 is the identity; negative ratios shrink.
    pub fn scale_about_center(&self, extra_ratio: f64) -> Self {
        let extra_width = self.width * extra_ratio;
        let extra_height = self.height * extra_ratio;
        Self {
            left: self.left - extra_width / 2.0,
            top: self.top - extra_height / 2.0,
            width: self.width + extra_width,
            height: self.height + extra_height,
        }
    }
}

/// Per-side distances, see [`Rect::overhang`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Insets {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

impl Insets {
    pub fn is_zero(&self) -> bool {
        self.top == 0.0 && self.bottom == 0.0 && self.left == 0.0 && self.right == 0.0
    }
}
