//! A single ink line.

use kurbo::{Affine, BezPath, Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::eraser;
use crate::geometry::{bounding_box, is_point_in_stroke, is_rect_interact_rect};
use crate::shapes::SerializableColor;

/// Unique identifier for strokes.
pub type StrokeId = Uuid;

/// Points travel as `[[x, y], ...]` on the wire.
mod point_pairs {
    use kurbo::Point;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(points: &[Point], serializer: S) -> Result<S::Ok, S::Error> {
        let pairs: Vec<[f64; 2]> = points.iter().map(|p| [p.x, p.y]).collect();
        pairs.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Point>, D::Error> {
        let pairs = Vec::<[f64; 2]>::deserialize(deserializer)?;
        Ok(pairs.into_iter().map(|[x, y]| Point::new(x, y)).collect())
    }
}

/// A finished freehand stroke.
///
/// `bound` always reflects the current points expanded by half the line
/// width. Point mutation is crate-private so the page can drop the cached
/// path for this stroke at the same time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stroke {
    pub(crate) id: StrokeId,
    #[serde(with = "point_pairs")]
    pub(crate) points: Vec<Point>,
    pub color: SerializableColor,
    pub width: f64,
    pub alpha: f64,
    pub(crate) bound: Rect,
    #[serde(skip)]
    pub(crate) pre_selected: bool,
    #[serde(skip)]
    pub(crate) selected: bool,
}

impl Stroke {
    pub fn new(points: Vec<Point>, color: SerializableColor, width: f64, alpha: f64) -> Self {
        let bound = bounding_box(&points, width / 2.0);
        Self {
            id: Uuid::new_v4(),
            points,
            color,
            width,
            alpha,
            bound,
            pre_selected: false,
            selected: false,
        }
    }

    pub fn with_id(mut self, id: StrokeId) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> StrokeId {
        self.id
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn bound(&self) -> Rect {
        self.bound
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn is_pre_selected(&self) -> bool {
        self.pre_selected
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Build the vector path: `M` to the first point, `L` to every other one.
    pub fn to_path(&self) -> BezPath {
        build_path(&self.points)
    }

    /// Precise hit test against the stroke outline.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        self.bound.inflate(tolerance, tolerance).contains(point)
            && is_point_in_stroke(point, &self.points, self.width, tolerance)
    }

    /// Check whether the stroke touches a query rectangle.
    ///
    /// The bound check gates the per-point/per-segment test.
    pub fn intersects_rect(&self, rect: Rect) -> bool {
        if !is_rect_interact_rect(self.bound, rect) {
            return false;
        }
        self.points.iter().any(|p| eraser::point_inside(*p, rect))
            || !eraser::intersections(&self.points, rect).is_empty()
    }

    pub(crate) fn set_points(&mut self, points: Vec<Point>) {
        self.points = points;
        self.refit();
    }

    pub(crate) fn apply_affine(&mut self, affine: Affine) {
        for point in &mut self.points {
            *point = affine * *point;
        }
        self.refit();
    }

    pub(crate) fn translate(&mut self, delta: Vec2) {
        self.apply_affine(Affine::translate(delta));
    }

    /// Recompute the bound from the current points.
    pub(crate) fn refit(&mut self) {
        self.bound = bounding_box(&self.points, self.width / 2.0);
    }
}

/// Build a polyline path from points.
pub fn build_path(points: &[Point]) -> BezPath {
    let mut path = BezPath::new();
    let Some((first, rest)) = points.split_first() else {
        return path;
    };
    path.move_to(*first);
    for point in rest {
        path.line_to(*point);
    }
    path
}
