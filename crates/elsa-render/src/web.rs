//! Browser backend: [`Context2d`] over a `CanvasRenderingContext2d`.
//!
//! The transform and alpha stacks are mirrored on the Rust side so
//! [`Context2d::current_transform`] never has to ask the browser. Layers
//! are offscreen canvases composited back with `drawImage`.

use kurbo::{Affine, BezPath, PathEl, Rect};
use peniko::Color;
use wasm_bindgen::{Clamped, JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, ImageData};

use crate::context::{css_color, Context2d};
use crate::error::{RenderError, RenderResult};
use crate::raster::PixelCanvas;

fn js_error(err: JsValue) -> RenderError {
    RenderError::Paint(format!("{err:?}"))
}

fn report(op: &str, result: Result<(), JsValue>) {
    if let Err(err) = result {
        log::warn!("Canvas {op} failed: {err:?}");
    }
}

fn context_of(canvas: &HtmlCanvasElement) -> RenderResult<CanvasRenderingContext2d> {
    canvas
        .get_context("2d")
        .map_err(js_error)?
        .ok_or(RenderError::ContextUnavailable)?
        .dyn_into::<CanvasRenderingContext2d>()
        .map_err(|_| RenderError::ContextUnavailable)
}

fn offscreen(width: u32, height: u32) -> RenderResult<(HtmlCanvasElement, CanvasRenderingContext2d)> {
    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or(RenderError::ContextUnavailable)?;
    let canvas = document
        .create_element("canvas")
        .map_err(js_error)?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|_| RenderError::ContextUnavailable)?;
    canvas.set_width(width);
    canvas.set_height(height);
    let ctx = context_of(&canvas)?;
    Ok((canvas, ctx))
}

fn trace(ctx: &CanvasRenderingContext2d, path: &BezPath) {
    ctx.begin_path();
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => ctx.move_to(p.x, p.y),
            PathEl::LineTo(p) => ctx.line_to(p.x, p.y),
            PathEl::QuadTo(c, p) => ctx.quadratic_curve_to(c.x, c.y, p.x, p.y),
            PathEl::CurveTo(c1, c2, p) => ctx.bezier_curve_to(c1.x, c1.y, c2.x, c2.y, p.x, p.y),
            PathEl::ClosePath => ctx.close_path(),
        }
    }
}

fn apply_transform(ctx: &CanvasRenderingContext2d, affine: Affine) {
    let [a, b, c, d, e, f] = affine.as_coeffs();
    report("setTransform", ctx.set_transform(a, b, c, d, e, f));
}

struct Layer {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
}

/// A browser canvas seen through [`Context2d`].
pub struct WebContext2d {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    layers: Vec<Layer>,
    transform: Affine,
    alpha: f64,
    stack: Vec<(Affine, f64)>,
}

impl WebContext2d {
    /// Wrap a page canvas. Fails when the 2d context cannot be obtained.
    pub fn from_canvas(canvas: HtmlCanvasElement) -> RenderResult<Self> {
        let ctx = context_of(&canvas)?;
        Ok(Self {
            canvas,
            ctx,
            layers: Vec::new(),
            transform: Affine::IDENTITY,
            alpha: 1.0,
            stack: Vec::new(),
        })
    }

    pub fn canvas(&self) -> &HtmlCanvasElement {
        &self.canvas
    }

    fn active(&self) -> &CanvasRenderingContext2d {
        self.layers.last().map_or(&self.ctx, |layer| &layer.ctx)
    }

    fn sync_state(&self) {
        let ctx = self.active();
        apply_transform(ctx, self.transform);
        ctx.set_global_alpha(self.alpha);
    }
}

impl Context2d for WebContext2d {
    fn size(&self) -> (u32, u32) {
        (self.canvas.width(), self.canvas.height())
    }

    fn save(&mut self) {
        self.stack.push((self.transform, self.alpha));
    }

    fn restore(&mut self) {
        if let Some((transform, alpha)) = self.stack.pop() {
            self.transform = transform;
            self.alpha = alpha;
            self.sync_state();
        }
    }

    fn transform(&mut self, affine: Affine) {
        self.transform = self.transform * affine;
        apply_transform(self.active(), self.transform);
    }

    fn current_transform(&self) -> Affine {
        self.transform
    }

    fn set_global_alpha(&mut self, alpha: f64) {
        self.alpha = alpha.clamp(0.0, 1.0);
        self.active().set_global_alpha(self.alpha);
    }

    fn fill_path(&mut self, path: &BezPath, color: Color) {
        let ctx = self.active();
        trace(ctx, path);
        ctx.set_fill_style_str(&css_color(color));
        ctx.fill();
    }

    fn stroke_path(&mut self, path: &BezPath, color: Color, width: f64) {
        let ctx = self.active();
        trace(ctx, path);
        ctx.set_line_width(width);
        ctx.set_line_cap("round");
        ctx.set_line_join("round");
        ctx.set_stroke_style_str(&css_color(color));
        ctx.stroke();
    }

    fn clear_rect(&mut self, rect: Rect) {
        self.active().clear_rect(rect.x0, rect.y0, rect.width(), rect.height());
    }

    fn clear(&mut self) {
        let (width, height) = self.size();
        let ctx = self.active();
        apply_transform(ctx, Affine::IDENTITY);
        ctx.clear_rect(0.0, 0.0, f64::from(width), f64::from(height));
        apply_transform(ctx, self.transform);
    }

    fn push_layer(&mut self) {
        let (width, height) = self.size();
        match offscreen(width, height) {
            Ok((canvas, ctx)) => {
                self.layers.push(Layer { canvas, ctx });
                self.sync_state();
            }
            Err(err) => log::warn!("Layer allocation failed, painting in place: {err}"),
        }
    }

    fn pop_layer(&mut self) {
        let Some(layer) = self.layers.pop() else {
            return;
        };
        let below = self.active();
        apply_transform(below, Affine::IDENTITY);
        below.set_global_alpha(1.0);
        report(
            "drawImage",
            below.draw_image_with_html_canvas_element(&layer.canvas, 0.0, 0.0),
        );
        self.sync_state();
    }

    fn draw_surface(&mut self, surface: &PixelCanvas, at: Affine) {
        if surface.is_empty() {
            return;
        }
        let blit = || -> RenderResult<()> {
            let (canvas, ctx) = offscreen(surface.width(), surface.height())?;
            let rgba = surface.to_rgba8();
            let image = ImageData::new_with_u8_clamped_array_and_sh(Clamped(&rgba), surface.width(), surface.height())
                .map_err(js_error)?;
            ctx.put_image_data(&image, 0.0, 0.0).map_err(js_error)?;
            let target = self.active();
            apply_transform(target, self.transform * at);
            target.draw_image_with_html_canvas_element(&canvas, 0.0, 0.0).map_err(js_error)?;
            apply_transform(target, self.transform);
            Ok(())
        };
        if let Err(err) = blit() {
            log::warn!("Surface blit failed: {err}");
        }
    }

    fn alpha_at(&self, x: u32, y: u32) -> Option<u8> {
        let image = self.ctx.get_image_data(f64::from(x), f64::from(y), 1.0, 1.0).ok()?;
        image.data().0.get(3).copied()
    }
}
