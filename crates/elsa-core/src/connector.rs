//! Connectors: the resize and rotate handles of a shape.
//!
//! Resize is corner-anchored: the handle opposite the dragged one stays fixed
//! on the page. Width/height may cross zero while dragging; the sign flip is
//! kept and consumers normalize through [`Shape::frame`].

use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

use crate::geometry::{frame_transform, normalize_degrees, rotate_vec, GEOMETRY_EPSILON};
use crate::shapes::{Shape, ShapeGeometry, ShapeId};

/// Rotation snap increment in degrees.
pub const ROTATION_SNAP_DEGREES: f64 = 15.0;

/// Type of manipulation handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectorKind {
    LeftTop,
    Top,
    RightTop,
    Right,
    RightBottom,
    Bottom,
    LeftBottom,
    Left,
    Rotate,
}

impl ConnectorKind {
    /// The eight resize handles, clockwise from the top-left corner.
    pub const RESIZE: [ConnectorKind; 8] = [
        ConnectorKind::LeftTop,
        ConnectorKind::Top,
        ConnectorKind::RightTop,
        ConnectorKind::Right,
        ConnectorKind::RightBottom,
        ConnectorKind::Bottom,
        ConnectorKind::LeftBottom,
        ConnectorKind::Left,
    ];

    pub fn is_corner(self) -> bool {
        matches!(
            self,
            ConnectorKind::LeftTop | ConnectorKind::RightTop | ConnectorKind::RightBottom | ConnectorKind::LeftBottom
        )
    }

    /// Handle position as a fraction of the (unnormalized) width/height.
    fn anchor(self) -> (f64, f64) {
        match self {
            ConnectorKind::LeftTop => (0.0, 0.0),
            ConnectorKind::Top | ConnectorKind::Rotate => (0.5, 0.0),
            ConnectorKind::RightTop => (1.0, 0.0),
            ConnectorKind::Right => (1.0, 0.5),
            ConnectorKind::RightBottom => (1.0, 1.0),
            ConnectorKind::Bottom => (0.5, 1.0),
            ConnectorKind::LeftBottom => (0.0, 1.0),
            ConnectorKind::Left => (0.0, 0.5),
        }
    }

    /// The fixed pivot for this handle, as a fraction of width/height.
    fn pivot(self) -> (f64, f64) {
        let (ax, ay) = self.anchor();
        (1.0 - ax, 1.0 - ay)
    }

    /// Page position of the pivot for an unrotated geometry.
    pub(crate) fn pivot_point(self, geometry: ShapeGeometry) -> Point {
        let (px, py) = self.pivot();
        Point::new(geometry.x + px * geometry.width, geometry.y + py * geometry.height)
    }

    /// Compute the geometry produced by dragging this handle by `delta`.
    ///
    /// `delta` is the total page-space delta since the gesture started and
    /// `original` the geometry at gesture start, so the result never
    /// accumulates per-frame error. The delta is projected onto the shape's
    /// rotated axes and the pivot handle keeps its page position.
    pub fn moving(self, original: ShapeGeometry, scale: Vec2, delta: Vec2, keep_aspect: bool) -> ShapeGeometry {
        if self == ConnectorKind::Rotate {
            return original;
        }
        let local = rotate_vec(delta, -original.rotate_degree);
        let dx = local.x / nonzero(scale.x);
        let dy = local.y / nonzero(scale.y);

        let (ax, ay) = self.anchor();
        let grow = |anchor: f64, d: f64| {
            if anchor == 1.0 {
                d
            } else if anchor == 0.0 {
                -d
            } else {
                0.0
            }
        };
        let mut width = original.width + grow(ax, dx);
        let mut height = original.height + grow(ay, dy);

        if keep_aspect && self.is_corner() && original.width.abs() > GEOMETRY_EPSILON && original.height.abs() > GEOMETRY_EPSILON {
            let sx = width / original.width;
            let sy = height / original.height;
            let s = if sx.abs() >= sy.abs() { sx } else { sy };
            width = original.width * s;
            height = original.height * s;
        }

        let (px, py) = self.pivot();
        let mut next = ShapeGeometry {
            x: original.x + px * (original.width - width),
            y: original.y + py * (original.height - height),
            width,
            height,
            rotate_degree: original.rotate_degree,
        };

        // Rotated shapes rotate about the frame center, which moves with the
        // resize; shift the origin so the pivot stays put on the page.
        if original.rotate_degree.abs() > GEOMETRY_EPSILON {
            let before = pivot_on_page(original, scale, px, py);
            let after = pivot_on_page(next, scale, px, py);
            next.x += before.x - after.x;
            next.y += before.y - after.y;
        }
        next
    }
}

fn nonzero(v: f64) -> f64 {
    if v.abs() < GEOMETRY_EPSILON { 1.0 } else { v }
}

fn pivot_on_page(geometry: ShapeGeometry, scale: Vec2, px: f64, py: f64) -> Point {
    let frame = crate::geometry::normalize_frame(geometry.x, geometry.y, geometry.width, geometry.height);
    let local = Point::new(geometry.x + px * geometry.width, geometry.y + py * geometry.height);
    frame_transform(frame, geometry.rotate_degree, scale.x, scale.y) * local
}

/// Rotation for a rotate-handle drag: `atan2(dy, dx) + 90°`, in `[0, 360)`.
///
/// A pointer straight above the center yields 0°, straight below 180°.
pub fn rotation_angle(center: Point, pointer: Point, snap: bool) -> f64 {
    let dx = pointer.x - center.x;
    let dy = pointer.y - center.y;
    let mut angle = normalize_degrees(dy.atan2(dx).to_degrees() + 90.0);
    if snap {
        angle = normalize_degrees((angle / ROTATION_SNAP_DEGREES).round() * ROTATION_SNAP_DEGREES);
    }
    angle
}

/// A handle with its page position.
#[derive(Debug, Clone, Copy)]
pub struct Connector {
    pub kind: ConnectorKind,
    pub position: Point,
}

impl Connector {
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        (point - self.position).hypot2() <= tolerance * tolerance
    }
}

/// Handle positions for a shape, rotated and scaled with it.
///
/// The rotate handle sits `rotate_offset` above the top-center.
pub fn connectors(shape: &Shape, rotate_offset: f64) -> Vec<Connector> {
    let transform = shape.transform();
    let mut handles: Vec<Connector> = ConnectorKind::RESIZE
        .iter()
        .map(|&kind| {
            let (ax, ay) = kind.anchor();
            let local = Point::new(shape.x + ax * shape.width, shape.y + ay * shape.height);
            Connector {
                kind,
                position: transform * local,
            }
        })
        .collect();

    let frame = shape.frame();
    let top_center = Point::new(frame.center().x, frame.y0 - rotate_offset / nonzero(shape.scale_y));
    handles.push(Connector {
        kind: ConnectorKind::Rotate,
        position: transform * top_center,
    });
    handles
}

/// Find the handle under a page point. The rotate handle wins over resize handles.
pub fn hit_test_connector(shape: &Shape, point: Point, tolerance: f64, rotate_offset: f64) -> Option<ConnectorKind> {
    let handles = connectors(shape, rotate_offset);
    handles
        .iter()
        .rev()
        .find(|h| h.hit_test(point, tolerance))
        .map(|h| h.kind)
}

/// State of an active handle drag on one shape.
#[derive(Debug, Clone)]
pub struct ConnectorDrag {
    pub shape_id: ShapeId,
    pub kind: ConnectorKind,
    pub start: Point,
    original: ShapeGeometry,
    scale: Vec2,
    center: Point,
}

impl ConnectorDrag {
    pub fn new(shape: &Shape, kind: ConnectorKind, start: Point) -> Self {
        Self {
            shape_id: shape.id(),
            kind,
            start,
            original: shape.geometry(),
            scale: Vec2::new(shape.scale_x, shape.scale_y),
            center: shape.center(),
        }
    }

    pub fn original(&self) -> ShapeGeometry {
        self.original
    }

    /// Apply the drag with the pointer at `pointer` (page coordinates).
    pub fn moving(&self, shape: &mut Shape, pointer: Point, keep_aspect: bool, snap_rotation: bool) {
        let next = match self.kind {
            ConnectorKind::Rotate => ShapeGeometry {
                rotate_degree: rotation_angle(self.center, pointer, snap_rotation),
                ..self.original
            },
            kind => kind.moving(self.original, self.scale, pointer - self.start, keep_aspect),
        };
        shape.set_geometry(next);
    }

    /// Restore the geometry from gesture start.
    pub fn cancel(&self, shape: &mut Shape) {
        shape.set_geometry(self.original);
    }
}
