//! Shape drawers.
//!
//! A [`Drawer`] renders one shape through one backend. Every backend answers
//! the same questions (size, placement, transform, hit tests) and paints in
//! three passes: static content that is rarely repainted, the border that
//! follows focus and selection, and dynamic content repainted every
//! animation tick.
//!
//! [`DrawDriver`] owns a drawer and runs the fixed lifecycle around it:
//! initialize once, repaint when the shape's revision changes, invoke resize
//! hooks in registration order, isolate failures and retry a skipped draw on
//! the next resize.

mod canvas;
mod html;
mod svg;

pub use canvas::{CanvasDrawer, DynamicPainter};
pub use html::{BoxStyle, HtmlDrawer};
pub use svg::{SvgDrawer, SvgRecorder};

use kurbo::{Affine, BezPath, Point, Rect, RoundedRect, Shape as _, Size, Vec2};
use peniko::Color;

use elsa_core::geometry::{is_point_in_rect, to_frame_space};
use elsa_core::page::Page;
use elsa_core::shapes::{DrawerKind, Shape};

use crate::context::Context2d;
use crate::error::{RenderError, RenderResult};

/// Highlight used for selected and focused borders.
pub const SELECTION_COLOR: Color = Color::from_rgba8(59, 130, 246, 255);

/// Extra reach of the border hit test, in logical units.
const BORDER_HIT_SLOP: f64 = 2.0;

/// Whether a pass actually painted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
    Drawn,
    /// The backend had nothing to paint into; try again later.
    Skipped,
}

/// Lifecycle of a drawer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawerState {
    #[default]
    Uninitialized,
    Initialized,
    Resized,
    Moved,
    Transformed,
    /// Terminal.
    Removed,
}

/// A rendering backend for one shape.
pub trait Drawer {
    fn kind(&self) -> DrawerKind;

    /// Acquire backend resources.
    fn initialize(&mut self, shape: &Shape) -> RenderResult<()>;

    /// Rendered size of the shape. Reads the model only.
    fn resize(&self, shape: &Shape) -> Size {
        let frame = shape.frame();
        Size::new(frame.width(), frame.height())
    }

    /// Final offset of the element on the page, after the container chain's scroll.
    fn position(&self, page: &Page, shape: &Shape) -> Point {
        shape.frame().origin() - page.container_scroll(shape.id())
    }

    /// Rotation and scale about the frame center.
    fn transform(&self, shape: &Shape) -> Affine {
        shape.transform()
    }

    fn draw_static(&mut self, shape: &Shape) -> RenderResult<DrawOutcome>;

    fn draw_border(&mut self, shape: &Shape) -> RenderResult<DrawOutcome>;

    fn draw_dynamic(&mut self, shape: &Shape, frame: u64) -> RenderResult<DrawOutcome>;

    /// Hit test on the border band, in page coordinates.
    fn contains_border(&self, shape: &Shape, point: Point) -> bool {
        geometric_contains_border(shape, point)
    }

    /// Hit test on the background, in page coordinates.
    fn contains_back(&self, shape: &Shape, point: Point) -> bool {
        geometric_contains_back(shape, point)
    }

    /// Hit test on the text area, in page coordinates.
    fn contains_text(&self, shape: &Shape, point: Point) -> bool {
        let local = to_frame_space(point, shape.frame(), shape.rotate_degree, shape.scale_x, shape.scale_y);
        is_point_in_rect(local, shape.text_rect())
    }

    /// Composite this shape's output onto a page-level context whose
    /// transform maps page coordinates to pixels.
    fn present(&self, shape: &Shape, target: &mut dyn Context2d, origin: Point);

    /// Release backend resources.
    fn remove(&mut self);
}

/// Create the drawer for a backend kind.
pub fn create_drawer(kind: DrawerKind) -> Box<dyn Drawer> {
    match kind {
        DrawerKind::Html => Box::new(HtmlDrawer::new()),
        DrawerKind::Canvas => Box::new(CanvasDrawer::new()),
        DrawerKind::Svg => Box::new(SvgDrawer::new()),
    }
}

// --- Shared painting ---

/// Background outline in element-local coordinates.
pub fn back_path(shape: &Shape) -> BezPath {
    let frame = shape.frame();
    let local = Rect::new(0.0, 0.0, frame.width(), frame.height());
    let radius = shape.style.corner_radius.min(local.width() / 2.0).min(local.height() / 2.0).max(0.0);
    RoundedRect::from_rect(local, radius).to_path(0.1)
}

/// Paint the background in element-local coordinates.
pub fn paint_back(ctx: &mut dyn Context2d, shape: &Shape) {
    let Some(back) = shape.style.back_color else {
        return;
    };
    ctx.save();
    ctx.set_global_alpha(shape.style.opacity);
    ctx.fill_path(&back_path(shape), back.into());
    ctx.restore();
}

/// Paint the border; selection and focus switch to the highlight color.
pub fn paint_border(ctx: &mut dyn Context2d, shape: &Shape) {
    let highlighted = shape.is_selected() || shape.is_focused();
    let width = if highlighted {
        shape.style.border_width.max(1.0) + 1.0
    } else {
        shape.style.border_width
    };
    if width <= 0.0 {
        return;
    }
    let color = if highlighted {
        SELECTION_COLOR
    } else {
        shape.style.border_color.into()
    };
    ctx.stroke_path(&back_path(shape), color, width);
}

/// Element-local point for a page point, undoing rotation and scale.
pub fn local_point(shape: &Shape, point: Point) -> Point {
    let frame = shape.frame();
    let unrotated = to_frame_space(point, frame, shape.rotate_degree, shape.scale_x, shape.scale_y);
    unrotated - frame.origin().to_vec2()
}

pub fn geometric_contains_back(shape: &Shape, point: Point) -> bool {
    if shape.style.back_color.is_none() {
        return false;
    }
    let local = local_point(shape, point);
    let frame = shape.frame();
    let rect = Rect::new(0.0, 0.0, frame.width(), frame.height());
    if shape.style.corner_radius > 0.0 {
        back_path(shape).contains(local)
    } else {
        is_point_in_rect(local, rect)
    }
}

pub fn geometric_contains_border(shape: &Shape, point: Point) -> bool {
    let local = local_point(shape, point);
    let frame = shape.frame();
    let rect = Rect::new(0.0, 0.0, frame.width(), frame.height());
    let band = shape.style.border_width / 2.0 + BORDER_HIT_SLOP;
    let outer = rect.inflate(band, band);
    let inner = rect.inflate(-band, -band);
    outer.contains(local) && !(inner.width() > 0.0 && inner.height() > 0.0 && inner.contains(local))
}

/// Page-to-element affine for a shape placed at `origin`.
fn element_affine(shape: &Shape, origin: Point) -> Affine {
    let frame = shape.frame();
    let center = Vec2::new(frame.width() / 2.0, frame.height() / 2.0);
    Affine::translate(origin.to_vec2() + center)
        * Affine::rotate(shape.rotate_degree.to_radians())
        * Affine::scale_non_uniform(shape.scale_x, shape.scale_y)
        * Affine::translate(-center)
}

// --- Driver ---

/// Called after every resize with the new size.
pub type ResizeHook = Box<dyn FnMut(&Shape, Size)>;

/// Runs a drawer through its lifecycle.
pub struct DrawDriver {
    drawer: Box<dyn Drawer>,
    state: DrawerState,
    hooks: Vec<ResizeHook>,
    last_revision: Option<u64>,
    last_size: Option<Size>,
    last_position: Option<Point>,
    /// Set while a redraw runs; nested invalidations are dropped.
    invalidating: bool,
    /// A pass was skipped or failed; repaint on the next resize.
    needs_retry: bool,
    failures: u64,
    paints: u64,
}

impl std::fmt::Debug for DrawDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrawDriver")
            .field("kind", &self.drawer.kind())
            .field("state", &self.state)
            .field("hooks", &self.hooks.len())
            .field("needs_retry", &self.needs_retry)
            .field("failures", &self.failures)
            .finish()
    }
}

impl DrawDriver {
    pub fn new(drawer: Box<dyn Drawer>) -> Self {
        Self {
            drawer,
            state: DrawerState::Uninitialized,
            hooks: Vec::new(),
            last_revision: None,
            last_size: None,
            last_position: None,
            invalidating: false,
            needs_retry: false,
            failures: 0,
            paints: 0,
        }
    }

    /// Driver for the backend a shape asks for.
    pub fn for_shape(shape: &Shape) -> Self {
        Self::new(create_drawer(shape.drawer))
    }

    pub fn kind(&self) -> DrawerKind {
        self.drawer.kind()
    }

    pub fn state(&self) -> DrawerState {
        self.state
    }

    pub fn drawer(&self) -> &dyn Drawer {
        self.drawer.as_ref()
    }

    pub fn needs_retry(&self) -> bool {
        self.needs_retry
    }

    /// Number of failed passes so far.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn is_removed(&self) -> bool {
        self.state == DrawerState::Removed
    }

    /// Register a hook run after every resize, in registration order.
    pub fn add_resize_hook(&mut self, hook: impl FnMut(&Shape, Size) + 'static) {
        self.hooks.push(Box::new(hook));
    }

    fn ensure_live(&mut self, shape: &Shape) -> RenderResult<()> {
        match self.state {
            DrawerState::Removed => Err(RenderError::Removed),
            DrawerState::Uninitialized => {
                self.drawer.initialize(shape)?;
                self.state = DrawerState::Initialized;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Recompute the size and run the resize hooks; retries a skipped draw.
    pub fn resize(&mut self, shape: &Shape) -> RenderResult<Size> {
        self.ensure_live(shape)?;
        let size = self.drawer.resize(shape);
        self.state = DrawerState::Resized;
        for hook in &mut self.hooks {
            hook(shape, size);
        }
        let changed = self.last_size != Some(size);
        self.last_size = Some(size);
        if self.needs_retry || changed {
            self.redraw(shape);
        }
        Ok(size)
    }

    /// Recompute the element offset on the page.
    pub fn move_to(&mut self, page: &Page, shape: &Shape) -> RenderResult<Point> {
        self.ensure_live(shape)?;
        let position = self.drawer.position(page, shape);
        self.state = DrawerState::Moved;
        self.last_position = Some(position);
        Ok(position)
    }

    pub fn transform(&mut self, shape: &Shape) -> RenderResult<Affine> {
        self.ensure_live(shape)?;
        self.state = DrawerState::Transformed;
        Ok(self.drawer.transform(shape))
    }

    /// Bring the drawer up to date with the shape; returns true when it repainted.
    pub fn update(&mut self, page: &Page, shape: &Shape) -> bool {
        if self.is_removed() {
            return false;
        }
        let revision = shape.revision();
        if self.last_revision == Some(revision) && !self.needs_retry {
            return false;
        }
        let paints = self.paints;
        let placed = self
            .resize(shape)
            .and_then(|_| self.move_to(page, shape))
            .and_then(|_| self.transform(shape));
        if let Err(err) = placed {
            log::warn!("Drawer update failed for shape {}: {err}", shape.id());
            self.failures += 1;
            self.needs_retry = true;
            return false;
        }
        // `resize` already repainted when the size changed or a retry was due.
        if self.paints == paints {
            self.redraw(shape);
        }
        self.last_revision = Some(revision);
        true
    }

    /// Repaint the static and border passes, isolating failures.
    pub fn redraw(&mut self, shape: &Shape) {
        if self.invalidating {
            log::debug!("Skipping nested redraw of shape {}", shape.id());
            return;
        }
        if self.ensure_live(shape).is_err() {
            return;
        }
        self.invalidating = true;
        self.paints += 1;
        let outcome = self
            .drawer
            .draw_static(shape)
            .and_then(|a| self.drawer.draw_border(shape).map(|b| (a, b)));
        self.invalidating = false;
        self.needs_retry = match outcome {
            Ok((DrawOutcome::Drawn, DrawOutcome::Drawn)) => false,
            Ok(_) => true,
            Err(err) => {
                log::warn!("Draw failed for shape {}: {err}", shape.id());
                self.failures += 1;
                true
            }
        };
    }

    /// Repaint the border only, after a focus or selection change.
    pub fn redraw_border(&mut self, shape: &Shape) {
        if self.ensure_live(shape).is_err() {
            return;
        }
        match self.drawer.draw_border(shape) {
            Ok(DrawOutcome::Drawn) => {}
            Ok(DrawOutcome::Skipped) => self.needs_retry = true,
            Err(err) => {
                log::warn!("Border draw failed for shape {}: {err}", shape.id());
                self.failures += 1;
                self.needs_retry = true;
            }
        }
    }

    /// Dynamic pass for one animation frame. Failures are logged and skipped.
    pub fn draw_animation(&mut self, shape: &Shape, frame: u64) -> bool {
        if self.ensure_live(shape).is_err() {
            return false;
        }
        match self.drawer.draw_dynamic(shape, frame) {
            Ok(outcome) => outcome == DrawOutcome::Drawn,
            Err(err) => {
                log::warn!("Animation frame {frame} failed for shape {}: {err}", shape.id());
                self.failures += 1;
                false
            }
        }
    }

    pub fn contains_back(&self, shape: &Shape, point: Point) -> bool {
        !self.is_removed() && self.drawer.contains_back(shape, point)
    }

    pub fn contains_border(&self, shape: &Shape, point: Point) -> bool {
        !self.is_removed() && self.drawer.contains_border(shape, point)
    }

    pub fn contains_text(&self, shape: &Shape, point: Point) -> bool {
        !self.is_removed() && self.drawer.contains_text(shape, point)
    }

    /// Composite onto a page-level context.
    pub fn present(&self, page: &Page, shape: &Shape, target: &mut dyn Context2d) {
        if self.is_removed() {
            return;
        }
        let origin = self.last_position.unwrap_or_else(|| self.drawer.position(page, shape));
        self.drawer.present(shape, target, origin);
    }

    /// Tear down; no further draws happen.
    pub fn remove(&mut self) {
        if self.state != DrawerState::Removed {
            self.drawer.remove();
            self.state = DrawerState::Removed;
        }
    }
}
