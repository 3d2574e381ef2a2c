//! The cursor canvas.
//!
//! A small square raster repainted only when the cursor kind changes and
//! blitted at the pointer every frame.

use std::f64::consts::PI;

use kurbo::{Affine, Arc, BezPath, Point, Rect, Shape as _, Vec2};
use peniko::Color;

use elsa_core::interaction::{CursorKind, CursorOverlay};

use crate::context::Context2d;
use crate::raster::PixelCanvas;

const INK: Color = Color::from_rgba8(17, 24, 39, 255);
const HALO: Color = Color::from_rgba8(255, 255, 255, 255);

fn line(from: Point, to: Point) -> BezPath {
    let mut path = BezPath::new();
    path.move_to(from);
    path.line_to(to);
    path
}

/// Double-headed arrow through the center, pointing along `angle` degrees.
fn double_arrow(c: f64, reach: f64, angle: f64) -> BezPath {
    let head = reach * 0.35;
    let mut path = BezPath::new();
    path.move_to((-reach, 0.0));
    path.line_to((reach, 0.0));
    path.move_to((reach - head, -head));
    path.line_to((reach, 0.0));
    path.line_to((reach - head, head));
    path.move_to((-reach + head, -head));
    path.line_to((-reach, 0.0));
    path.line_to((-reach + head, head));
    Affine::translate((c, c)) * Affine::rotate(angle.to_radians()) * path
}

/// Outline of the cursor for `kind` in a `size`-pixel square.
pub fn cursor_path(kind: CursorKind, size: f64) -> BezPath {
    let c = size / 2.0;
    let reach = size * 0.4;
    match kind {
        CursorKind::Default | CursorKind::Grab | CursorKind::Grabbing => {
            // Arrow with its tip on the hotspot at the center.
            let s = size * 0.45;
            let mut path = BezPath::new();
            path.move_to((c, c));
            path.line_to((c, c + s));
            path.line_to((c + s * 0.3, c + s * 0.72));
            path.line_to((c + s * 0.7, c + s * 0.7));
            path.close_path();
            path
        }
        CursorKind::Crosshair | CursorKind::Pen => {
            let mut path = line(Point::new(c - reach, c), Point::new(c + reach, c));
            path.extend(line(Point::new(c, c - reach), Point::new(c, c + reach)).iter());
            path
        }
        CursorKind::Eraser => Rect::new(c - reach / 2.0, c - reach / 2.0, c + reach / 2.0, c + reach / 2.0).to_path(0.1),
        CursorKind::Move => {
            let mut path = double_arrow(c, reach, 0.0);
            path.extend(double_arrow(c, reach, 90.0).iter());
            path
        }
        CursorKind::ResizeEw => double_arrow(c, reach, 0.0),
        CursorKind::ResizeNs => double_arrow(c, reach, 90.0),
        CursorKind::ResizeNwse => double_arrow(c, reach, 45.0),
        CursorKind::ResizeNesw => double_arrow(c, reach, -45.0),
        CursorKind::Rotate => {
            let arc = Arc {
                center: Point::new(c, c),
                radii: Vec2::new(reach * 0.7, reach * 0.7),
                start_angle: -PI / 2.0,
                sweep_angle: 1.5 * PI,
                x_rotation: 0.0,
            };
            let mut path: BezPath = arc.path_elements(0.1).collect();
            let head = reach * 0.3;
            path.move_to((c - head, c - reach * 0.7 - head));
            path.line_to((c, c - reach * 0.7));
            path.line_to((c - head, c - reach * 0.7 + head));
            path
        }
    }
}

/// Raster holding the current cursor image.
#[derive(Debug, Clone)]
pub struct CursorCanvas {
    canvas: PixelCanvas,
    painted: Option<CursorKind>,
    repaints: u64,
}

impl CursorCanvas {
    pub fn new(size: u32) -> Self {
        Self {
            canvas: PixelCanvas::new(size, size),
            painted: None,
            repaints: 0,
        }
    }

    pub fn canvas(&self) -> &PixelCanvas {
        &self.canvas
    }

    pub fn repaints(&self) -> u64 {
        self.repaints
    }

    /// Repaint when the overlay shows a different kind.
    pub fn update(&mut self, overlay: &CursorOverlay) -> bool {
        if overlay.size() != self.canvas.width() {
            self.canvas = PixelCanvas::new(overlay.size(), overlay.size());
            self.painted = None;
        }
        if self.painted == Some(overlay.kind()) {
            return false;
        }
        let size = f64::from(overlay.size());
        let path = cursor_path(overlay.kind(), size);
        self.canvas.clear();
        self.canvas.stroke_path(&path, HALO, 3.0);
        self.canvas.stroke_path(&path, INK, 1.0);
        self.painted = Some(overlay.kind());
        self.repaints += 1;
        true
    }

    /// Blit centered on the pointer onto a screen-space target.
    pub fn present(&self, overlay: &CursorOverlay, target: &mut dyn Context2d) {
        if !overlay.is_visible() || self.painted.is_none() {
            return;
        }
        let half = f64::from(overlay.size()) / 2.0;
        let at = overlay.position() - Vec2::new(half, half);
        target.draw_surface(&self.canvas, Affine::translate(at.to_vec2()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repaints_only_on_kind_change() {
        let mut overlay = CursorOverlay::new(32);
        let mut cursor = CursorCanvas::new(32);
        assert!(cursor.update(&overlay));
        overlay.move_to(Point::new(10.0, 10.0));
        assert!(!cursor.update(&overlay));
        overlay.set_kind(CursorKind::Crosshair);
        assert!(cursor.update(&overlay));
        assert_eq!(cursor.repaints(), 2);
    }

    #[test]
    fn test_crosshair_is_centered() {
        let mut overlay = CursorOverlay::new(32);
        overlay.set_kind(CursorKind::Crosshair);
        let mut cursor = CursorCanvas::new(32);
        cursor.update(&overlay);
        assert!(cursor.canvas().alpha_at(16, 16).is_some_and(|a| a > 0));
        assert_eq!(cursor.canvas().alpha_at(2, 2), Some(0));
    }

    #[test]
    fn test_present_follows_pointer_and_visibility() {
        let mut overlay = CursorOverlay::new(16);
        overlay.set_kind(CursorKind::Crosshair);
        let mut cursor = CursorCanvas::new(16);
        cursor.update(&overlay);

        let mut hidden = PixelCanvas::new(64, 64);
        cursor.present(&overlay, &mut hidden);
        assert!(hidden.to_rgba8().iter().all(|b| *b == 0));

        overlay.move_to(Point::new(40.0, 20.0));
        let mut target = PixelCanvas::new(64, 64);
        cursor.present(&overlay, &mut target);
        assert!(target.alpha_at(40, 20).is_some_and(|a| a > 0));
        assert_eq!(target.alpha_at(10, 50), Some(0));
    }

    #[test]
    fn test_every_kind_has_a_path() {
        for kind in [
            CursorKind::Default,
            CursorKind::Crosshair,
            CursorKind::Pen,
            CursorKind::Eraser,
            CursorKind::Move,
            CursorKind::Grab,
            CursorKind::Grabbing,
            CursorKind::ResizeNs,
            CursorKind::ResizeEw,
            CursorKind::ResizeNesw,
            CursorKind::ResizeNwse,
            CursorKind::Rotate,
        ] {
            let bounds = cursor_path(kind, 32.0).bounding_box();
            assert!(bounds.width() > 0.0 || bounds.height() > 0.0, "{kind:?}");
            assert!(Rect::new(0.0, 0.0, 32.0, 32.0).inflate(1.0, 1.0).contains(bounds.center()));
        }
    }
}
