//! Rubber-band selection rectangle.

use kurbo::{Point, Rect};

/// A selection rectangle dragged out in logical coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RubberBand {
    origin: Point,
    current: Point,
}

impl RubberBand {
    pub fn new(origin: Point) -> Self {
        Self { origin, current: origin }
    }

    pub fn update(&mut self, point: Point) {
        self.current = point;
    }

    pub fn origin(&self) -> Point {
        self.origin
    }

    /// Normalized rectangle, whichever direction it was dragged.
    pub fn rect(&self) -> Rect {
        Rect::from_points(self.origin, self.current)
    }

    /// True when the pointer barely moved, so the gesture counts as a click.
    pub fn is_click(&self, tolerance: f64) -> bool {
        (self.current - self.origin).hypot() <= tolerance
    }
}
