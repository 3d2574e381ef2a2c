//! Pure geometry helpers shared by shapes, connectors and the ink engine.
//!
//! Everything here is stateless. Degenerate input (zero-size rectangles,
//! coincident points, out-of-range angles) is normalized, never rejected.

use kurbo::{Affine, Point, Rect, Vec2};

/// Tolerance used when comparing coordinates for equality.
pub const GEOMETRY_EPSILON: f64 = 1e-9;

/// Normalize a rectangle given by origin and a possibly negative size.
///
/// A negative width means the shape grows to the left of `x`, so the drawn
/// frame starts at `x - |width|`.
pub fn normalize_frame(x: f64, y: f64, width: f64, height: f64) -> Rect {
    let offset_x = if width < 0.0 { -width } else { 0.0 };
    let offset_y = if height < 0.0 { -height } else { 0.0 };
    Rect::new(
        x - offset_x,
        y - offset_y,
        x - offset_x + width.abs(),
        y - offset_y + height.abs(),
    )
}

/// Half-open point-in-rectangle test (`x0 <= x < x1`), after normalizing the rect.
pub fn is_point_in_rect(point: Point, rect: Rect) -> bool {
    rect.abs().contains(point)
}

/// Check whether two rectangles overlap or touch.
///
/// Used as the coarse pre-filter before any per-point test.
pub fn is_rect_interact_rect(a: Rect, b: Rect) -> bool {
    let a = a.abs();
    let b = b.abs();
    a.x0 <= b.x1 && b.x0 <= a.x1 && a.y0 <= b.y1 && b.y0 <= a.y1
}

/// Axis-aligned bounding box of a point set, expanded by `half_width` on every side.
///
/// Returns `Rect::ZERO` for an empty set.
pub fn bounding_box(points: &[Point], half_width: f64) -> Rect {
    let Some(first) = points.first() else {
        return Rect::ZERO;
    };
    let mut bounds = Rect::from_points(*first, *first);
    for point in &points[1..] {
        bounds = bounds.union_pt(*point);
    }
    bounds.inflate(half_width, half_width)
}

/// Distance from a point to a line segment (a→b).
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = b - a;
    let pv = point - a;
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    let proj = a + seg * t;
    (point - proj).hypot()
}

/// Check whether `point` lies on a polyline stroke of the given width.
pub fn is_point_in_stroke(point: Point, points: &[Point], width: f64, tolerance: f64) -> bool {
    let reach = width / 2.0 + tolerance;
    match points {
        [] => false,
        [only] => (point - *only).hypot() <= reach,
        _ => points
            .windows(2)
            .any(|w| point_to_segment_dist(point, w[0], w[1]) <= reach),
    }
}

/// A line in general form `a·x + b·y + c = 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineEquation {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl LineEquation {
    /// The line through two points.
    pub fn through(p1: Point, p2: Point) -> Self {
        Self {
            a: p2.y - p1.y,
            b: p1.x - p2.x,
            c: p2.x * p1.y - p1.x * p2.y,
        }
    }

    /// Intersection with another line, `None` when parallel or coincident.
    pub fn intersect(&self, other: &LineEquation) -> Option<Point> {
        let det = self.a * other.b - other.a * self.b;
        if det.abs() < GEOMETRY_EPSILON {
            return None;
        }
        Some(Point::new(
            (self.b * other.c - other.b * self.c) / det,
            (other.a * self.c - self.a * other.c) / det,
        ))
    }
}

fn within_segment_box(p: Point, a: Point, b: Point) -> bool {
    let eps = 1e-7;
    p.x >= a.x.min(b.x) - eps
        && p.x <= a.x.max(b.x) + eps
        && p.y >= a.y.min(b.y) - eps
        && p.y <= a.y.max(b.y) + eps
}

/// Intersection point of segments (a-b) and (c-d), if they cross.
pub fn segment_intersection(a: Point, b: Point, c: Point, d: Point) -> Option<Point> {
    let hit = LineEquation::through(a, b).intersect(&LineEquation::through(c, d))?;
    (within_segment_box(hit, a, b) && within_segment_box(hit, c, d)).then_some(hit)
}

/// Corners of a rectangle in clockwise order starting at the top-left.
pub fn rect_vertices(rect: Rect) -> [Point; 4] {
    let rect = rect.abs();
    [
        Point::new(rect.x0, rect.y0),
        Point::new(rect.x1, rect.y0),
        Point::new(rect.x1, rect.y1),
        Point::new(rect.x0, rect.y1),
    ]
}

/// The four border segments of a rectangle.
pub fn rect_edges(rect: Rect) -> [(Point, Point); 4] {
    let [tl, tr, br, bl] = rect_vertices(rect);
    [(tl, tr), (tr, br), (br, bl), (bl, tl)]
}

/// Check whether a point coincides with one of the rectangle's vertices.
pub fn is_rect_vertex(point: Point, rect: Rect) -> bool {
    rect_vertices(rect)
        .iter()
        .any(|v| (v.x - point.x).abs() < GEOMETRY_EPSILON && (v.y - point.y).abs() < GEOMETRY_EPSILON)
}

/// Normalize an angle in degrees into `[0, 360)`.
pub fn normalize_degrees(degrees: f64) -> f64 {
    let d = degrees.rem_euclid(360.0);
    if d >= 360.0 - GEOMETRY_EPSILON { 0.0 } else { d }
}

/// Rotate a point around a center by an angle in degrees (clockwise on screen).
pub fn rotate_point(point: Point, center: Point, degrees: f64) -> Point {
    Affine::rotate_about(degrees.to_radians(), center) * point
}

/// Rotate a vector by an angle in degrees.
pub fn rotate_vec(v: Vec2, degrees: f64) -> Vec2 {
    let (sin, cos) = degrees.to_radians().sin_cos();
    Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

/// The affine applied to a frame: rotation and scale around the frame center.
///
/// Equivalent to CSS `transform-origin: center; transform: rotate(deg) scale(sx, sy)`.
pub fn frame_transform(frame: Rect, rotate_degree: f64, scale_x: f64, scale_y: f64) -> Affine {
    let center = frame.center().to_vec2();
    Affine::translate(center)
        * Affine::rotate(rotate_degree.to_radians())
        * Affine::scale_non_uniform(scale_x, scale_y)
        * Affine::translate(-center)
}

/// Map an outer (page) point into the frame's unrotated, unscaled space.
///
/// The result is still in page units; subtract `frame.origin()` for
/// element-local coordinates. A zero scale collapses the shape, in which case
/// the point is returned unchanged.
pub fn to_frame_space(point: Point, frame: Rect, rotate_degree: f64, scale_x: f64, scale_y: f64) -> Point {
    let affine = frame_transform(frame, rotate_degree, scale_x, scale_y);
    if affine.determinant().abs() < GEOMETRY_EPSILON {
        return point;
    }
    affine.inverse() * point
}
