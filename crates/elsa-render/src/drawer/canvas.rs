//! Raster backend.
//!
//! Each pass owns its own pixel layer sized to the shape frame. The
//! background hit test reads the alpha of one pixel back from the static
//! layer, so rounded corners and transparent backs are answered exactly.

use kurbo::{Affine, Point, Size};

use elsa_core::shapes::{DrawerKind, Shape};

use super::{element_affine, geometric_contains_back, local_point, paint_back, paint_border, DrawOutcome, Drawer};
use crate::context::Context2d;
use crate::error::RenderResult;
use crate::raster::PixelCanvas;

/// User paint callback for the dynamic pass.
pub type DynamicPainter = Box<dyn FnMut(&mut dyn Context2d, &Shape, u64) -> RenderResult<()>>;

#[derive(Default)]
pub struct CanvasDrawer {
    static_layer: Option<PixelCanvas>,
    border_layer: Option<PixelCanvas>,
    dynamic_layer: Option<PixelCanvas>,
    dynamic: Option<DynamicPainter>,
}

impl std::fmt::Debug for CanvasDrawer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanvasDrawer")
            .field("has_context", &self.static_layer.is_some())
            .field("has_dynamic", &self.dynamic.is_some())
            .finish()
    }
}

/// Backing pixel size of a frame.
fn pixel_size(size: Size) -> (u32, u32) {
    (size.width.ceil().max(0.0) as u32, size.height.ceil().max(0.0) as u32)
}

/// Allocate or resize one layer. Zero-sized elements have no context.
fn acquire(layer: &mut Option<PixelCanvas>, width: u32, height: u32) -> bool {
    if width == 0 || height == 0 {
        *layer = None;
        return false;
    }
    match layer {
        Some(canvas) => canvas.resize(width, height),
        None => *layer = Some(PixelCanvas::new(width, height)),
    }
    true
}

impl CanvasDrawer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paint dynamic content with `painter` on every animation frame.
    pub fn with_dynamic(mut self, painter: impl FnMut(&mut dyn Context2d, &Shape, u64) -> RenderResult<()> + 'static) -> Self {
        self.dynamic = Some(Box::new(painter));
        self
    }

    pub fn set_dynamic(&mut self, painter: Option<DynamicPainter>) {
        self.dynamic = painter;
    }

    pub fn static_layer(&self) -> Option<&PixelCanvas> {
        self.static_layer.as_ref()
    }

    pub fn has_context(&self) -> bool {
        self.static_layer.is_some()
    }
}

impl Drawer for CanvasDrawer {
    fn kind(&self) -> DrawerKind {
        DrawerKind::Canvas
    }

    fn initialize(&mut self, shape: &Shape) -> RenderResult<()> {
        let (width, height) = pixel_size(self.resize(shape));
        if !acquire(&mut self.static_layer, width, height) {
            log::warn!("No 2D context for zero-size shape {}, drawing is deferred", shape.id());
        }
        Ok(())
    }

    fn draw_static(&mut self, shape: &Shape) -> RenderResult<DrawOutcome> {
        let (width, height) = pixel_size(self.resize(shape));
        let had_context = self.static_layer.is_some();
        if !acquire(&mut self.static_layer, width, height) {
            log::warn!("Skipping static draw of shape {}: 2D context unavailable", shape.id());
            return Ok(DrawOutcome::Skipped);
        }
        if !had_context {
            log::debug!("2D context acquired for shape {}", shape.id());
        }
        let Some(layer) = self.static_layer.as_mut() else {
            return Ok(DrawOutcome::Skipped);
        };
        layer.clear();
        paint_back(layer, shape);
        Ok(DrawOutcome::Drawn)
    }

    fn draw_border(&mut self, shape: &Shape) -> RenderResult<DrawOutcome> {
        let (width, height) = pixel_size(self.resize(shape));
        if !acquire(&mut self.border_layer, width, height) {
            return Ok(DrawOutcome::Skipped);
        }
        let Some(layer) = self.border_layer.as_mut() else {
            return Ok(DrawOutcome::Skipped);
        };
        layer.clear();
        paint_border(layer, shape);
        Ok(DrawOutcome::Drawn)
    }

    fn draw_dynamic(&mut self, shape: &Shape, frame: u64) -> RenderResult<DrawOutcome> {
        if self.dynamic.is_none() {
            return Ok(DrawOutcome::Drawn);
        }
        let (width, height) = pixel_size(self.resize(shape));
        if !acquire(&mut self.dynamic_layer, width, height) {
            return Ok(DrawOutcome::Skipped);
        }
        let (Some(painter), Some(layer)) = (self.dynamic.as_mut(), self.dynamic_layer.as_mut()) else {
            return Ok(DrawOutcome::Skipped);
        };
        layer.clear();
        painter(layer, shape, frame)?;
        Ok(DrawOutcome::Drawn)
    }

    fn contains_back(&self, shape: &Shape, point: Point) -> bool {
        let Some(layer) = &self.static_layer else {
            return geometric_contains_back(shape, point);
        };
        let local = local_point(shape, point);
        if local.x < 0.0 || local.y < 0.0 {
            return false;
        }
        layer.alpha_at(local.x as u32, local.y as u32).is_some_and(|alpha| alpha > 0)
    }

    fn present(&self, shape: &Shape, target: &mut dyn Context2d, origin: Point) {
        target.save();
        target.transform(element_affine(shape, origin));
        for layer in [&self.static_layer, &self.border_layer, &self.dynamic_layer].into_iter().flatten() {
            target.draw_surface(layer, Affine::IDENTITY);
        }
        target.restore();
    }

    fn remove(&mut self) {
        self.static_layer = None;
        self.border_layer = None;
        self.dynamic_layer = None;
        self.dynamic = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elsa_core::geometry::is_point_in_rect;
    use kurbo::Rect;

    #[test]
    fn test_contains_back_agrees_with_point_in_rect() {
        let shape = Shape::rectangle(40.0, 30.0, 60.0, 50.0);
        let mut drawer = CanvasDrawer::new();
        drawer.initialize(&shape).unwrap();
        assert_eq!(drawer.draw_static(&shape).unwrap(), DrawOutcome::Drawn);

        let rect = Rect::new(40.0, 30.0, 100.0, 80.0);
        // Sample on a grid that avoids the exact edge pixel.
        for xi in 0..30 {
            for yi in 0..25 {
                let point = Point::new(25.25 + xi as f64 * 3.0, 15.25 + yi as f64 * 3.0);
                let on_edge = (point.x - rect.x1).abs() < 1.0 || (point.y - rect.y1).abs() < 1.0;
                if on_edge {
                    continue;
                }
                assert_eq!(
                    drawer.contains_back(&shape, point),
                    is_point_in_rect(point, rect),
                    "at {point:?}"
                );
                assert_eq!(drawer.contains_back(&shape, point), geometric_contains_back(&shape, point));
            }
        }
    }

    #[test]
    fn test_rounded_corner_is_transparent() {
        let mut shape = Shape::rectangle(0.0, 0.0, 40.0, 40.0);
        shape.style.corner_radius = 15.0;
        let mut drawer = CanvasDrawer::new();
        drawer.initialize(&shape).unwrap();
        drawer.draw_static(&shape).unwrap();
        assert!(!drawer.contains_back(&shape, Point::new(0.5, 0.5)));
        assert!(drawer.contains_back(&shape, Point::new(20.0, 20.0)));
    }

    #[test]
    fn test_rotated_readback() {
        let mut shape = Shape::rectangle(0.0, 0.0, 100.0, 10.0);
        shape.rotate_degree = 90.0;
        let mut drawer = CanvasDrawer::new();
        drawer.initialize(&shape).unwrap();
        drawer.draw_static(&shape).unwrap();
        // Rotated about (50, 5): the bar now runs vertically through x = 50.
        assert!(drawer.contains_back(&shape, Point::new(50.0, 40.0)));
        assert!(!drawer.contains_back(&shape, Point::new(90.0, 5.0)));
    }

    #[test]
    fn test_zero_size_degrades_to_noop() {
        let mut shape = Shape::rectangle(0.0, 0.0, 0.0, 20.0);
        let mut drawer = CanvasDrawer::new();
        drawer.initialize(&shape).unwrap();
        assert!(!drawer.has_context());
        assert_eq!(drawer.draw_static(&shape).unwrap(), DrawOutcome::Skipped);

        shape.width = 10.0;
        assert_eq!(drawer.draw_static(&shape).unwrap(), DrawOutcome::Drawn);
        assert!(drawer.has_context());
    }

    #[test]
    fn test_dynamic_painter_errors_propagate() {
        let shape = Shape::rectangle(0.0, 0.0, 10.0, 10.0);
        let mut drawer = CanvasDrawer::new().with_dynamic(|_, _, frame| {
            if frame % 2 == 1 {
                Err(crate::error::RenderError::Paint("odd frame".into()))
            } else {
                Ok(())
            }
        });
        assert_eq!(drawer.draw_dynamic(&shape, 0).unwrap(), DrawOutcome::Drawn);
        assert!(drawer.draw_dynamic(&shape, 1).is_err());
    }

    #[test]
    fn test_present_places_layers() {
        let mut shape = Shape::rectangle(10.0, 10.0, 5.0, 5.0);
        shape.style.border_width = 0.0;
        let mut drawer = CanvasDrawer::new();
        drawer.initialize(&shape).unwrap();
        drawer.draw_static(&shape).unwrap();
        let mut page = PixelCanvas::new(30, 30);
        drawer.present(&shape, &mut page, Point::new(10.0, 10.0));
        assert_eq!(page.alpha_at(12, 12), Some(255));
        assert_eq!(page.alpha_at(5, 5), Some(0));
    }
}
