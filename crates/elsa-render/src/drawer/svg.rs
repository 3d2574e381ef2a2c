//! Vector backend.
//!
//! Passes are recorded as `<path>` operations by [`SvgRecorder`], a
//! [`Context2d`] that keeps geometry instead of pixels. The recording can be
//! serialized as SVG markup or replayed onto any other context.

use std::fmt::Write;

use kurbo::{Affine, BezPath, Point, Rect};
use peniko::Color;

use elsa_core::shapes::{DrawerKind, Shape};

use super::canvas::DynamicPainter;
use super::{element_affine, paint_back, paint_border, DrawOutcome, Drawer};
use crate::context::{css_color, Context2d};
use crate::error::RenderResult;
use crate::raster::PixelCanvas;

#[derive(Debug, Clone, PartialEq)]
enum Paint {
    Fill,
    Stroke(f64),
}

#[derive(Debug, Clone)]
enum SvgOp {
    Path {
        path: BezPath,
        paint: Paint,
        color: Color,
        alpha: f64,
        transform: Affine,
    },
    GroupStart,
    GroupEnd,
}

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

/// Records drawing operations as SVG elements.
#[derive(Debug, Clone, Default)]
pub struct SvgRecorder {
    width: u32,
    height: u32,
    ops: Vec<SvgOp>,
    state: State,
    saved: Vec<State>,
}

fn matrix(affine: Affine) -> String {
    let [a, b, c, d, e, f] = affine.as_coeffs();
    format!("matrix({a} {b} {c} {d} {e} {f})")
}

impl SvgRecorder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    /// Number of recorded paths.
    pub fn path_count(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, SvgOp::Path { .. })).count()
    }

    pub fn is_empty(&self) -> bool {
        self.path_count() == 0
    }

    /// Write the recorded elements, one per line, indented by `indent`.
    pub fn write_elements(&self, out: &mut String, indent: usize) {
        let mut depth = indent;
        for op in &self.ops {
            match op {
                SvgOp::GroupStart => {
                    let _ = writeln!(out, "{:depth$}<g>", "");
                    depth += 2;
                }
                SvgOp::GroupEnd => {
                    depth = depth.saturating_sub(2).max(indent);
                    let _ = writeln!(out, "{:depth$}</g>", "");
                }
                SvgOp::Path {
                    path,
                    paint,
                    color,
                    alpha,
                    transform,
                } => {
                    let paint_attrs = match paint {
                        Paint::Fill => format!(r#"fill="{}""#, css_color(*color)),
                        Paint::Stroke(width) => format!(
                            r#"fill="none" stroke="{}" stroke-width="{width}" stroke-linecap="round" stroke-linejoin="round""#,
                            css_color(*color)
                        ),
                    };
                    let opacity = if *alpha < 1.0 {
                        format!(r#" opacity="{alpha}""#)
                    } else {
                        String::new()
                    };
                    let placement = if *transform == Affine::IDENTITY {
                        String::new()
                    } else {
                        format!(r#" transform="{}""#, matrix(*transform))
                    };
                    let _ = writeln!(
                        out,
                        r#"{:depth$}<path d="{}" {paint_attrs}{opacity}{placement}/>"#,
                        "",
                        path.to_svg()
                    );
                }
            }
        }
    }

    /// Replay the recording onto another context.
    pub fn replay(&self, target: &mut dyn Context2d) {
        for op in &self.ops {
            match op {
                SvgOp::GroupStart => target.push_layer(),
                SvgOp::GroupEnd => target.pop_layer(),
                SvgOp::Path {
                    path,
                    paint,
                    color,
                    alpha,
                    transform,
                } => {
                    target.save();
                    target.transform(*transform);
                    target.set_global_alpha(*alpha);
                    match paint {
                        Paint::Fill => target.fill_path(path, *color),
                        Paint::Stroke(width) => target.stroke_path(path, *color, *width),
                    }
                    target.restore();
                }
            }
        }
    }

    /// A standalone SVG document holding the recording.
    pub fn to_document(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            r#"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = self.width,
            h = self.height
        );
        self.write_elements(&mut out, 2);
        let _ = writeln!(out, "</svg>");
        out
    }
}

impl Context2d for SvgRecorder {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn save(&mut self) {
        self.saved.push(self.state);
    }

    fn restore(&mut self) {
        if let Some(state) = self.saved.pop() {
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
        self.ops.push(SvgOp::Path {
            path: path.clone(),
            paint: Paint::Fill,
            color,
            alpha: self.state.alpha,
            transform: self.state.transform,
        });
    }

    fn stroke_path(&mut self, path: &BezPath, color: Color, width: f64) {
        self.ops.push(SvgOp::Path {
            path: path.clone(),
            paint: Paint::Stroke(width),
            color,
            alpha: self.state.alpha,
            transform: self.state.transform,
        });
    }

    /// Vector output cannot punch holes; cleared regions stay.
    fn clear_rect(&mut self, _rect: Rect) {}

    fn clear(&mut self) {
        self.ops.clear();
        self.state = State::default();
        self.saved.clear();
    }

    fn push_layer(&mut self) {
        self.ops.push(SvgOp::GroupStart);
    }

    fn pop_layer(&mut self) {
        self.ops.push(SvgOp::GroupEnd);
    }

    fn draw_surface(&mut self, surface: &PixelCanvas, _at: Affine) {
        log::debug!(
            "Raster surface {}x{} is not embedded in vector output",
            surface.width(),
            surface.height()
        );
    }

    fn alpha_at(&self, _x: u32, _y: u32) -> Option<u8> {
        None
    }
}

/// Vector drawer: one recorder per pass.
#[derive(Default)]
pub struct SvgDrawer {
    static_pass: Option<SvgRecorder>,
    border_pass: Option<SvgRecorder>,
    dynamic_pass: Option<SvgRecorder>,
    dynamic: Option<DynamicPainter>,
}

impl std::fmt::Debug for SvgDrawer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SvgDrawer")
            .field("initialized", &self.static_pass.is_some())
            .field("has_dynamic", &self.dynamic.is_some())
            .finish()
    }
}

fn recorder_for(shape: &Shape) -> SvgRecorder {
    let frame = shape.frame();
    SvgRecorder::new(frame.width().ceil() as u32, frame.height().ceil() as u32)
}

impl SvgDrawer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dynamic(mut self, painter: impl FnMut(&mut dyn Context2d, &Shape, u64) -> RenderResult<()> + 'static) -> Self {
        self.dynamic = Some(Box::new(painter));
        self
    }

    /// The shape as a `<g>` fragment placed at `origin`.
    pub fn to_svg(&self, shape: &Shape, origin: Point) -> String {
        let mut out = String::new();
        let _ = writeln!(out, r#"<g data-shape="{}" transform="{}">"#, shape.id(), matrix(element_affine(shape, origin)));
        for pass in [&self.static_pass, &self.border_pass, &self.dynamic_pass].into_iter().flatten() {
            pass.write_elements(&mut out, 2);
        }
        let _ = writeln!(out, "</g>");
        out
    }

    /// A standalone document for this shape alone, sized to its bounds.
    pub fn export_svg(&self, shape: &Shape) -> String {
        let bounds = shape.bounds();
        let origin = shape.frame().origin() - bounds.origin().to_vec2();
        let mut out = String::new();
        let _ = writeln!(
            out,
            r#"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = bounds.width(),
            h = bounds.height()
        );
        out.push_str(&self.to_svg(shape, Point::new(origin.x, origin.y)));
        let _ = writeln!(out, "</svg>");
        out
    }
}

impl Drawer for SvgDrawer {
    fn kind(&self) -> DrawerKind {
        DrawerKind::Svg
    }

    fn initialize(&mut self, shape: &Shape) -> RenderResult<()> {
        self.static_pass = Some(recorder_for(shape));
        self.border_pass = Some(recorder_for(shape));
        Ok(())
    }

    fn draw_static(&mut self, shape: &Shape) -> RenderResult<DrawOutcome> {
        let mut pass = recorder_for(shape);
        paint_back(&mut pass, shape);
        self.static_pass = Some(pass);
        Ok(DrawOutcome::Drawn)
    }

    fn draw_border(&mut self, shape: &Shape) -> RenderResult<DrawOutcome> {
        let mut pass = recorder_for(shape);
        paint_border(&mut pass, shape);
        self.border_pass = Some(pass);
        Ok(DrawOutcome::Drawn)
    }

    fn draw_dynamic(&mut self, shape: &Shape, frame: u64) -> RenderResult<DrawOutcome> {
        let Some(painter) = self.dynamic.as_mut() else {
            return Ok(DrawOutcome::Drawn);
        };
        let mut pass = recorder_for(shape);
        painter(&mut pass, shape, frame)?;
        self.dynamic_pass = Some(pass);
        Ok(DrawOutcome::Drawn)
    }

    fn present(&self, shape: &Shape, target: &mut dyn Context2d, origin: Point) {
        target.save();
        target.transform(element_affine(shape, origin));
        for pass in [&self.static_pass, &self.border_pass, &self.dynamic_pass].into_iter().flatten() {
            pass.replay(target);
        }
        target.restore();
    }

    fn remove(&mut self) {
        self.static_pass = None;
        self.border_pass = None;
        self.dynamic_pass = None;
        self.dynamic = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_writes_paths() {
        let mut recorder = SvgRecorder::new(100, 100);
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((10.0, 0.0));
        recorder.stroke_path(&path, Color::from_rgba8(255, 0, 0, 255), 2.0);
        recorder.save();
        recorder.transform(Affine::translate((5.0, 5.0)));
        recorder.set_global_alpha(0.5);
        recorder.fill_path(&path, Color::from_rgba8(0, 0, 0, 255));
        recorder.restore();

        let doc = recorder.to_document();
        assert!(doc.starts_with("<?xml"));
        assert!(doc.contains(&format!(r#"<path d="{}" fill="none""#, path.to_svg())));
        assert!(doc.contains(r##"stroke="#ff0000" stroke-width="2""##));
        assert!(doc.contains(r#"opacity="0.5""#));
        assert!(doc.contains("matrix(1 0 0 1 5 5)"));
        assert!(doc.trim_end().ends_with("</svg>"));
        assert_eq!(recorder.path_count(), 2);
    }

    #[test]
    fn test_layers_become_groups_and_clear_rect_is_ignored() {
        let mut recorder = SvgRecorder::new(10, 10);
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((5.0, 5.0));
        recorder.push_layer();
        recorder.stroke_path(&path, Color::from_rgba8(0, 0, 0, 255), 1.0);
        recorder.clear_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        recorder.pop_layer();
        let mut out = String::new();
        recorder.write_elements(&mut out, 0);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.first(), Some(&"<g>"));
        assert!(lines[1].starts_with("  <path"));
        assert_eq!(lines.last(), Some(&"</g>"));
        assert_eq!(recorder.alpha_at(0, 0), None);
    }

    #[test]
    fn test_drawer_exports_back_and_border() {
        let mut shape = Shape::rectangle(10.0, 10.0, 40.0, 20.0);
        shape.style.corner_radius = 4.0;
        let mut drawer = SvgDrawer::new();
        drawer.initialize(&shape).unwrap();
        drawer.draw_static(&shape).unwrap();
        drawer.draw_border(&shape).unwrap();
        let svg = drawer.export_svg(&shape);
        assert!(svg.contains(r#"width="40" height="20""#));
        assert!(svg.contains(r##"fill="#ffffff""##));
        assert!(svg.contains(r##"stroke="#000000""##));
        assert!(svg.contains(&format!(r#"data-shape="{}""#, shape.id())));
    }

    #[test]
    fn test_replay_matches_raster() {
        let mut shape = Shape::rectangle(2.0, 2.0, 6.0, 6.0);
        shape.style.border_width = 0.0;
        let mut drawer = SvgDrawer::new();
        drawer.initialize(&shape).unwrap();
        drawer.draw_static(&shape).unwrap();
        let mut target = PixelCanvas::new(10, 10);
        drawer.present(&shape, &mut target, Point::new(2.0, 2.0));
        assert_eq!(target.alpha_at(5, 5), Some(255));
        assert_eq!(target.alpha_at(0, 0), Some(0));
    }

    #[test]
    fn test_dynamic_pass_recorded() {
        let shape = Shape::rectangle(0.0, 0.0, 10.0, 10.0);
        let mut drawer = SvgDrawer::new().with_dynamic(|ctx, _, frame| {
            let mut path = BezPath::new();
            path.move_to((0.0, 0.0));
            path.line_to((frame as f64, 0.0));
            ctx.stroke_path(&path, Color::from_rgba8(0, 0, 0, 255), 1.0);
            Ok(())
        });
        drawer.initialize(&shape).unwrap();
        drawer.draw_dynamic(&shape, 3).unwrap();
        let mut expected = BezPath::new();
        expected.move_to((0.0, 0.0));
        expected.line_to((3.0, 0.0));
        assert!(drawer.to_svg(&shape, Point::ORIGIN).contains(&expected.to_svg()));
        drawer.remove();
        assert!(!drawer.to_svg(&shape, Point::ORIGIN).contains("<path"));
    }
}
