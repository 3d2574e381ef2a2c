//! DOM box-model backend.
//!
//! The drawer keeps the inline style a positioned `<div>` would carry. On
//! the web the style string is applied to the element as is; off the web
//! the same box is painted through a [`Context2d`] so exports match.

use kurbo::{Point, Rect};

use elsa_core::shapes::{DrawerKind, Shape};

use super::{element_affine, paint_back, paint_border, DrawOutcome, Drawer, SELECTION_COLOR};
use crate::context::{css_color, Context2d};
use crate::error::RenderResult;

/// Inline style of the shape element.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxStyle {
    pub width: f64,
    pub height: f64,
    /// CSS `transform` value (rotation then scale, about the center).
    pub transform: String,
    pub background: Option<String>,
    pub border: Option<String>,
    pub border_radius: f64,
    pub opacity: f64,
    /// Text box, relative to the element.
    pub text_box: Rect,
}

impl BoxStyle {
    /// Style for a shape in its current state.
    pub fn from_shape(shape: &Shape) -> Self {
        let frame = shape.frame();
        let text = shape.text_rect();
        let origin = frame.origin().to_vec2();
        let mut style = Self {
            width: frame.width(),
            height: frame.height(),
            transform: format!(
                "rotate({}deg) scale({}, {})",
                shape.rotate_degree, shape.scale_x, shape.scale_y
            ),
            background: shape.style.back_color.map(|c| c.to_css()),
            border: None,
            border_radius: shape.style.corner_radius.max(0.0),
            opacity: shape.style.opacity,
            text_box: Rect::from_points(text.origin() - origin, Point::new(text.x1, text.y1) - origin),
        };
        style.update_border(shape);
        style
    }

    fn update_border(&mut self, shape: &Shape) {
        self.border = if shape.is_selected() || shape.is_focused() {
            Some(format!("{}px solid {}", shape.style.border_width.max(1.0) + 1.0, css_color(SELECTION_COLOR)))
        } else if shape.style.border_width > 0.0 {
            Some(format!("{}px solid {}", shape.style.border_width, shape.style.border_color.to_css()))
        } else {
            None
        };
    }

    /// Inline CSS for an element placed at `origin`.
    pub fn css(&self, origin: Point) -> String {
        let mut css = format!(
            "position: absolute; left: {}px; top: {}px; width: {}px; height: {}px; transform: {}; transform-origin: center;",
            origin.x, origin.y, self.width, self.height, self.transform
        );
        if let Some(background) = &self.background {
            css.push_str(&format!(" background: {background};"));
        }
        if let Some(border) = &self.border {
            css.push_str(&format!(" border: {border}; box-sizing: border-box;"));
        }
        if self.border_radius > 0.0 {
            css.push_str(&format!(" border-radius: {}px;", self.border_radius));
        }
        if self.opacity < 1.0 {
            css.push_str(&format!(" opacity: {};", self.opacity));
        }
        css
    }
}

#[derive(Debug, Default)]
pub struct HtmlDrawer {
    style: Option<BoxStyle>,
    frames: u64,
}

impl HtmlDrawer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current inline style; None before initialization or after removal.
    pub fn style(&self) -> Option<&BoxStyle> {
        self.style.as_ref()
    }

    /// Animation frames painted so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Drawer for HtmlDrawer {
    fn kind(&self) -> DrawerKind {
        DrawerKind::Html
    }

    fn initialize(&mut self, shape: &Shape) -> RenderResult<()> {
        self.style = Some(BoxStyle::from_shape(shape));
        Ok(())
    }

    fn draw_static(&mut self, shape: &Shape) -> RenderResult<DrawOutcome> {
        self.style = Some(BoxStyle::from_shape(shape));
        Ok(DrawOutcome::Drawn)
    }

    fn draw_border(&mut self, shape: &Shape) -> RenderResult<DrawOutcome> {
        match self.style.as_mut() {
            Some(style) => {
                style.update_border(shape);
                Ok(DrawOutcome::Drawn)
            }
            None => Ok(DrawOutcome::Skipped),
        }
    }

    fn draw_dynamic(&mut self, _shape: &Shape, _frame: u64) -> RenderResult<DrawOutcome> {
        self.frames += 1;
        Ok(DrawOutcome::Drawn)
    }

    fn present(&self, shape: &Shape, target: &mut dyn Context2d, origin: Point) {
        if self.style.is_none() {
            return;
        }
        target.save();
        target.transform(element_affine(shape, origin));
        paint_back(target, shape);
        paint_border(target, shape);
        target.restore();
    }

    fn remove(&mut self) {
        self.style = None;
    }
}
