//! The 2D drawing surface every backend paints through.
//!
//! The method set mirrors the subset of `CanvasRenderingContext2d` the
//! drawers need, so the software raster, the SVG recorder and the browser
//! context are interchangeable.

use kurbo::{Affine, BezPath, Rect};
use peniko::Color;

use crate::raster::PixelCanvas;

/// A Canvas2D-style drawing context.
pub trait Context2d {
    /// Backing size in device pixels.
    fn size(&self) -> (u32, u32);

    /// Push the current transform and global alpha.
    fn save(&mut self);

    /// Pop the state pushed by the matching [`Context2d::save`].
    fn restore(&mut self);

    /// Post-multiply the current transform, like `context.transform(...)`.
    fn transform(&mut self, affine: Affine);

    fn current_transform(&self) -> Affine;

    fn set_global_alpha(&mut self, alpha: f64);

    fn fill_path(&mut self, path: &BezPath, color: Color);

    /// Stroke with round joins and caps. `width` is in user units.
    fn stroke_path(&mut self, path: &BezPath, color: Color, width: f64);

    /// Clear a rectangle (user units) to transparent, like `clearRect`.
    fn clear_rect(&mut self, rect: Rect);

    /// Clear the whole surface, ignoring the transform.
    fn clear(&mut self);

    /// Start an isolated layer. `clear_rect` inside it only removes what was
    /// drawn since the push.
    fn push_layer(&mut self);

    /// Composite the top layer onto the one below.
    fn pop_layer(&mut self);

    /// Composite a raster surface placed by `at` (user units).
    fn draw_surface(&mut self, surface: &PixelCanvas, at: Affine);

    /// Alpha of one device pixel, when the surface can be read back.
    fn alpha_at(&self, x: u32, y: u32) -> Option<u8>;
}

/// CSS color string for a color.
pub fn css_color(color: Color) -> String {
    let rgba = color.to_rgba8();
    if rgba.a == 255 {
        format!("#{:02x}{:02x}{:02x}", rgba.r, rgba.g, rgba.b)
    } else {
        format!("rgba({}, {}, {}, {:.3})", rgba.r, rgba.g, rgba.b, f64::from(rgba.a) / 255.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_css_color() {
        assert_eq!(css_color(Color::from_rgba8(255, 0, 16, 255)), "#ff0010");
        assert_eq!(css_color(Color::from_rgba8(0, 0, 0, 0)), "rgba(0, 0, 0, 0.000)");
    }
}
