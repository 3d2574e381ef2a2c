//! Software raster surface.
//!
//! A `tiny_skia::Pixmap` behind a Canvas2D-like state stack. Anti-aliasing
//! is off so coverage is decided per pixel center and alpha read-back is
//! exact, which the canvas backend's hit test depends on.

use kurbo::{Affine, BezPath, PathEl, Rect};
use peniko::Color;
use tiny_skia::{
    BlendMode, FillRule, LineCap, LineJoin, Paint, PathBuilder, Pixmap, PixmapPaint, Stroke, Transform,
};

use crate::context::Context2d;
use crate::error::{RenderError, RenderResult};

#[derive(Debug, Clone, Copy)]
struct State {
    transform: Affine,
    alpha: f64,
}

impl Default for State {
    fn default() -> Self {
        Self {
            transform: Affine::IDENTITY,
            alpha: 1.0,
        }
    }
}

fn to_transform(affine: Affine) -> Transform {
    let [a, b, c, d, e, f] = affine.as_coeffs();
    Transform::from_row(a as f32, b as f32, c as f32, d as f32, e as f32, f as f32)
}

fn to_path(path: &BezPath) -> Option<tiny_skia::Path> {
    let mut pb = PathBuilder::new();
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => pb.move_to(p.x as f32, p.y as f32),
            PathEl::LineTo(p) => pb.line_to(p.x as f32, p.y as f32),
            PathEl::QuadTo(c, p) => pb.quad_to(c.x as f32, c.y as f32, p.x as f32, p.y as f32),
            PathEl::CurveTo(c1, c2, p) => {
                pb.cubic_to(c1.x as f32, c1.y as f32, c2.x as f32, c2.y as f32, p.x as f32, p.y as f32)
            }
            PathEl::ClosePath => pb.close(),
        }
    }
    pb.finish()
}

/// An RGBA8 raster surface.
#[derive(Debug, Clone)]
pub struct PixelCanvas {
    width: u32,
    height: u32,
    /// `None` for a zero-size surface.
    pixmap: Option<Pixmap>,
    /// Isolated layers above `pixmap`, innermost last.
    layers: Vec<Pixmap>,
    state: State,
    stack: Vec<State>,
}

impl PixelCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixmap: Pixmap::new(width, height),
            layers: Vec::new(),
            state: State::default(),
            stack: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.pixmap.is_none()
    }

    pub fn pixmap(&self) -> Option<&Pixmap> {
        self.pixmap.as_ref()
    }

    /// Straight (non-premultiplied) RGBA bytes, row-major.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let Some(pixmap) = &self.pixmap else {
            return Vec::new();
        };
        pixmap
            .pixels()
            .iter()
            .flat_map(|px| {
                let c = px.demultiply();
                [c.red(), c.green(), c.blue(), c.alpha()]
            })
            .collect()
    }

    /// Straight RGBA of one pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let c = self.pixmap.as_ref()?.pixel(x, y)?.demultiply();
        Some([c.red(), c.green(), c.blue(), c.alpha()])
    }

    /// Reallocate to a new size; the content is cleared.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width != self.width || height != self.height {
            *self = Self::new(width, height);
        }
    }

    /// Encode the surface as PNG.
    pub fn encode_png(&self) -> RenderResult<Vec<u8>> {
        if self.is_empty() {
            return Err(RenderError::Encode("empty surface".into()));
        }
        let mut png_data = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut png_data, self.width, self.height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder
                .write_header()
                .map_err(|e| RenderError::Encode(e.to_string()))?;
            writer
                .write_image_data(&self.to_rgba8())
                .map_err(|e| RenderError::Encode(e.to_string()))?;
        }
        Ok(png_data)
    }

    fn target(&mut self) -> Option<&mut Pixmap> {
        match self.layers.last_mut() {
            Some(layer) => Some(layer),
            None => self.pixmap.as_mut(),
        }
    }

    fn paint(&self, color: Color) -> Paint<'static> {
        let rgba = color.to_rgba8();
        let alpha = (f64::from(rgba.a) * self.state.alpha).round().clamp(0.0, 255.0) as u8;
        let mut paint = Paint::default();
        paint.set_color_rgba8(rgba.r, rgba.g, rgba.b, alpha);
        paint.anti_alias = false;
        paint
    }
}

impl Context2d for PixelCanvas {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn save(&mut self) {
        self.stack.push(self.state);
    }

    fn restore(&mut self) {
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
    }

    fn transform(&mut self, affine: Affine) {
        self.state.transform = self.state.transform * affine;
    }

    fn current_transform(&self) -> Affine {
        self.state.transform
    }

    fn set_global_alpha(&mut self, alpha: f64) {
        self.state.alpha = alpha.clamp(0.0, 1.0);
    }

    fn fill_path(&mut self, path: &BezPath, color: Color) {
        let Some(path) = to_path(path) else {
            return;
        };
        let paint = self.paint(color);
        let transform = to_transform(self.state.transform);
        if let Some(target) = self.target() {
            target.fill_path(&path, &paint, FillRule::Winding, transform, None);
        }
    }

    fn stroke_path(&mut self, path: &BezPath, color: Color, width: f64) {
        let Some(path) = to_path(path) else {
            return;
        };
        let paint = self.paint(color);
        let stroke = Stroke {
            width: width as f32,
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Stroke::default()
        };
        let transform = to_transform(self.state.transform);
        if let Some(target) = self.target() {
            target.stroke_path(&path, &paint, &stroke, transform, None);
        }
    }

    fn clear_rect(&mut self, rect: Rect) {
        let Some(rect) = tiny_skia::Rect::from_ltrb(rect.x0 as f32, rect.y0 as f32, rect.x1 as f32, rect.y1 as f32)
        else {
            return;
        };
        let mut paint = Paint::default();
        paint.blend_mode = BlendMode::Clear;
        paint.anti_alias = false;
        let transform = to_transform(self.state.transform);
        if let Some(target) = self.target() {
            target.fill_rect(rect, &paint, transform, None);
        }
    }

    fn clear(&mut self) {
        if let Some(target) = self.target() {
            target.fill(tiny_skia::Color::TRANSPARENT);
        }
    }

    fn push_layer(&mut self) {
        if let Some(layer) = Pixmap::new(self.width, self.height) {
            self.layers.push(layer);
        }
    }

    fn pop_layer(&mut self) {
        let Some(layer) = self.layers.pop() else {
            return;
        };
        if let Some(target) = self.target() {
            target.draw_pixmap(0, 0, layer.as_ref(), &PixmapPaint::default(), Transform::identity(), None);
        }
    }

    fn draw_surface(&mut self, surface: &PixelCanvas, at: Affine) {
        let Some(source) = surface.pixmap.as_ref() else {
            return;
        };
        let placement = self.state.transform * at;
        if placement.determinant().abs() < f64::EPSILON {
            return;
        }
        let paint = PixmapPaint {
            opacity: self.state.alpha as f32,
            ..PixmapPaint::default()
        };
        let transform = to_transform(placement);
        if let Some(target) = self.target() {
            target.draw_pixmap(0, 0, source.as_ref(), &paint, transform, None);
        }
    }

    fn alpha_at(&self, x: u32, y: u32) -> Option<u8> {
        self.pixel(x, y).map(|px| px[3])
    }
}
