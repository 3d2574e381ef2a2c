//! Move, resize and rotate of a group of selected strokes.

use kurbo::{Affine, Point, Rect, Vec2};

use super::stroke::Stroke;
use crate::connector::{rotation_angle, ConnectorKind, ROTATION_SNAP_DEGREES};
use crate::geometry::{bounding_box, normalize_degrees, GEOMETRY_EPSILON};
use crate::shapes::{ShapeGeometry, ShapeId};

/// A running group transform.
///
/// The original strokes are captured once at gesture start and every frame
/// maps them again, so many small deltas never accumulate rounding error.
#[derive(Debug, Clone)]
pub struct StrokeGroupTransform {
    /// Handle being dragged; `None` moves the whole group.
    kind: Option<ConnectorKind>,
    start: Point,
    originals: Vec<(ShapeId, Stroke)>,
    bounds: Rect,
}

impl StrokeGroupTransform {
    /// Start a transform; `None` when there is nothing to transform.
    pub fn new(kind: Option<ConnectorKind>, start: Point, originals: Vec<(ShapeId, Stroke)>) -> Option<Self> {
        let bounds = originals
            .iter()
            .map(|(_, s)| bounding_box(s.points(), 0.0))
            .reduce(|acc, b| acc.union(b))?;
        Some(Self {
            kind,
            start,
            originals,
            bounds,
        })
    }

    pub fn kind(&self) -> Option<ConnectorKind> {
        self.kind
    }

    /// Bounding box of the original points, the pivot reference.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn originals(&self) -> &[(ShapeId, Stroke)] {
        &self.originals
    }

    /// The affine mapping original points to their position for `pointer`.
    pub fn affine(&self, pointer: Point, keep_aspect: bool, snap_rotation: bool) -> Affine {
        let center = self.bounds.center();
        let Some(kind) = self.kind else {
            return Affine::translate(pointer - self.start);
        };
        if kind == ConnectorKind::Rotate {
            let from = rotation_angle(center, self.start, false);
            let to = rotation_angle(center, pointer, false);
            let mut delta = normalize_degrees(to - from);
            if snap_rotation {
                delta = normalize_degrees((delta / ROTATION_SNAP_DEGREES).round() * ROTATION_SNAP_DEGREES);
            }
            return Affine::rotate_about(delta.to_radians(), center);
        }

        let original = ShapeGeometry {
            x: self.bounds.x0,
            y: self.bounds.y0,
            width: self.bounds.width(),
            height: self.bounds.height(),
            rotate_degree: 0.0,
        };
        let next = kind.moving(original, Vec2::new(1.0, 1.0), pointer - self.start, keep_aspect);
        let ratio = |new: f64, old: f64| if old.abs() < GEOMETRY_EPSILON { 1.0 } else { new / old };
        let sx = ratio(next.width, original.width);
        let sy = ratio(next.height, original.height);
        let pivot = kind.pivot_point(original).to_vec2();
        Affine::translate(pivot) * Affine::scale_non_uniform(sx, sy) * Affine::translate(-pivot)
    }

    /// Points of every original stroke mapped for `pointer`.
    pub fn apply(&self, pointer: Point, keep_aspect: bool, snap_rotation: bool) -> Vec<(ShapeId, Stroke)> {
        let affine = self.affine(pointer, keep_aspect, snap_rotation);
        self.originals
            .iter()
            .map(|(host, stroke)| {
                let mut next = stroke.clone();
                next.apply_affine(affine);
                (*host, next)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::SerializableColor;

    fn group() -> StrokeGroupTransform {
        let stroke = Stroke::new(
            vec![Point::new(0.0, 0.0), Point::new(100.0, 50.0)],
            SerializableColor::black(),
            2.0,
            1.0,
        );
        StrokeGroupTransform::new(Some(ConnectorKind::RightBottom), Point::new(100.0, 50.0), vec![(uuid::Uuid::new_v4(), stroke)]).unwrap()
    }

    #[test]
    fn test_empty_group_is_none() {
        assert!(StrokeGroupTransform::new(Some(ConnectorKind::Rotate), Point::ZERO, Vec::new()).is_none());
    }

    #[test]
    fn test_resize_scales_about_pivot() {
        let transform = group();
        let moved = transform.apply(Point::new(200.0, 100.0), false, false);
        let points = moved[0].1.points();
        assert!((points[0] - Point::new(0.0, 0.0)).hypot() < 1e-9);
        assert!((points[1] - Point::new(200.0, 100.0)).hypot() < 1e-9);
    }

    #[test]
    fn test_resize_from_left_top_keeps_right_bottom() {
        let stroke = Stroke::new(
            vec![Point::new(0.0, 0.0), Point::new(100.0, 50.0)],
            SerializableColor::black(),
            2.0,
            1.0,
        );
        let transform =
            StrokeGroupTransform::new(Some(ConnectorKind::LeftTop), Point::ZERO, vec![(uuid::Uuid::new_v4(), stroke)]).unwrap();
        let moved = transform.apply(Point::new(50.0, 25.0), false, false);
        let points = moved[0].1.points();
        assert!((points[0] - Point::new(50.0, 25.0)).hypot() < 1e-9);
        assert!((points[1] - Point::new(100.0, 50.0)).hypot() < 1e-9);
    }

    #[test]
    fn test_many_small_steps_match_one_step() {
        let transform = group();
        let mut last = Vec::new();
        for step in 1..=100 {
            last = transform.apply(Point::new(100.0 + step as f64 * 0.37, 50.0), false, false);
        }
        let direct = transform.apply(Point::new(137.0, 50.0), false, false);
        assert!((last[0].1.points()[1] - direct[0].1.points()[1]).hypot() < 1e-9);
    }

    #[test]
    fn test_move_translates() {
        let stroke = Stroke::new(
            vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)],
            SerializableColor::black(),
            2.0,
            1.0,
        );
        let transform = StrokeGroupTransform::new(None, Point::new(5.0, 5.0), vec![(uuid::Uuid::new_v4(), stroke)]).unwrap();
        let moved = transform.apply(Point::new(15.0, 0.0), false, false);
        assert!((moved[0].1.points()[1] - Point::new(20.0, -5.0)).hypot() < 1e-9);
    }

    #[test]
    fn test_rotate_half_turn_about_center() {
        let stroke = Stroke::new(
            vec![Point::new(0.0, 0.0), Point::new(100.0, 0.0), Point::new(100.0, 100.0)],
            SerializableColor::black(),
            2.0,
            1.0,
        );
        // Start straight above the center (50, 50), end straight below.
        let transform =
            StrokeGroupTransform::new(Some(ConnectorKind::Rotate), Point::new(50.0, -20.0), vec![(uuid::Uuid::new_v4(), stroke)])
                .unwrap();
        let moved = transform.apply(Point::new(50.0, 120.0), false, false);
        let points = moved[0].1.points();
        assert!((points[0] - Point::new(100.0, 100.0)).hypot() < 1e-9);
        assert!((points[2] - Point::new(0.0, 0.0)).hypot() < 1e-9);
    }
}
