//! Quadrant snapshots of static ink.
//!
//! Four viewport-sized raster tiles are painted around the viewport center
//! with every unselected stroke. While a gesture runs the tiles are only
//! offset as the page pans, so panning over thousands of strokes costs four
//! blits. Zooming or any structural ink change throws them away; recapture
//! is debounced so it never runs inside the input handler.

#[cfg(not(target_arch = "wasm32"))]
use std::time::{Duration, Instant};

#[cfg(target_arch = "wasm32")]
use web_time::{Duration, Instant};

use kurbo::{Affine, Point, Rect, Size, Vec2};

use elsa_core::page::Page;

use crate::context::Context2d;
use crate::ink::{paint_strokes, InkLayer};
use crate::raster::PixelCanvas;

/// Delays work until input has been quiet for a while.
#[derive(Debug, Clone, Copy)]
pub struct Debounce {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    pub fn new(delay: Duration) -> Self {
        Self { delay, deadline: None }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// (Re)start the timer from `now`.
    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// True once when the deadline has passed; the timer is then cleared.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}

/// View and ink state a capture was painted for.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CaptureKey {
    scale: Vec2,
    pan: Vec2,
    ink_version: u64,
}

impl CaptureKey {
    fn of(page: &Page) -> Self {
        Self {
            scale: Vec2::new(page.scale_x(), page.scale_y()),
            pan: page.pan_offset(),
            ink_version: page.ink_version(),
        }
    }
}

#[derive(Debug, Clone)]
struct Quadrant {
    /// Logical top-left corner.
    origin: Point,
    canvas: PixelCanvas,
}

fn covers(outer: Rect, inner: Rect) -> bool {
    outer.x0 <= inner.x0 && outer.y0 <= inner.y0 && inner.x1 <= outer.x1 && inner.y1 <= outer.y1
}

/// The four cached tiles of one page.
#[derive(Debug, Clone, Default)]
pub struct QuadrantSnapshots {
    quadrants: Vec<Quadrant>,
    key: Option<CaptureKey>,
    captures: u64,
}

impl QuadrantSnapshots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of captures so far.
    pub fn captures(&self) -> u64 {
        self.captures
    }

    pub fn is_captured(&self) -> bool {
        self.key.is_some()
    }

    /// Logical area the tiles cover.
    pub fn coverage(&self) -> Option<Rect> {
        self.quadrants
            .iter()
            .map(|q| {
                let size = Vec2::new(q.canvas.width() as f64, q.canvas.height() as f64);
                let scale = self.key.map_or(Vec2::new(1.0, 1.0), |k| k.scale);
                Rect::from_origin_size(q.origin, Size::new(size.x / scale.x, size.y / scale.y))
            })
            .reduce(|a, b| a.union(b))
    }

    /// Whether the tiles can stand in for painting static ink right now.
    ///
    /// Zoom and ink changes always invalidate. A pan keeps the tiles only
    /// during a gesture and only while they still cover the viewport.
    pub fn is_valid(&self, page: &Page, viewport: Size, gesture_active: bool) -> bool {
        let Some(key) = self.key else {
            return false;
        };
        let now = CaptureKey::of(page);
        if key.scale != now.scale || key.ink_version != now.ink_version {
            return false;
        }
        if key.pan == now.pan {
            return true;
        }
        gesture_active
            && self
                .coverage()
                .is_some_and(|c| covers(c, page.visible_rect(viewport)))
    }

    pub fn invalidate(&mut self) {
        if self.key.take().is_some() {
            log::debug!("Quadrant snapshots invalidated");
        }
    }

    /// Paint all four tiles from the current page state.
    ///
    /// The tiles meet at the viewport center, not the pan origin, so they
    /// cover what is on screen whichever way the next pan goes.
    pub fn capture(&mut self, page: &mut Page, viewport: Size) {
        let width = viewport.width.ceil().max(0.0) as u32;
        let height = viewport.height.ceil().max(0.0) as u32;
        if width == 0 || height == 0 {
            log::debug!("Zero-size viewport, snapshot capture skipped");
            self.quadrants.clear();
            self.key = None;
            return;
        }

        let scale = Vec2::new(page.scale_x(), page.scale_y());
        let tile = Vec2::new(width as f64 / scale.x, height as f64 / scale.y);
        let center = page.screen_to_logical(Point::new(viewport.width / 2.0, viewport.height / 2.0));
        let origins = [
            Point::new(center.x - tile.x, center.y - tile.y),
            Point::new(center.x, center.y - tile.y),
            Point::new(center.x - tile.x, center.y),
            center,
        ];

        let mut quadrants = std::mem::take(&mut self.quadrants);
        quadrants.resize_with(4, || Quadrant {
            origin: Point::ZERO,
            canvas: PixelCanvas::new(width, height),
        });
        for (quadrant, origin) in quadrants.iter_mut().zip(origins) {
            quadrant.origin = origin;
            quadrant.canvas.resize(width, height);
            quadrant.canvas.clear();
            quadrant.canvas.save();
            quadrant
                .canvas
                .transform(Affine::scale_non_uniform(scale.x, scale.y) * Affine::translate(-origin.to_vec2()));
            let clip = Rect::from_origin_size(origin, Size::new(tile.x, tile.y));
            paint_strokes(&mut quadrant.canvas, page, InkLayer::Static, Some(clip));
            quadrant.canvas.restore();
        }
        self.quadrants = quadrants;
        self.key = Some(CaptureKey::of(page));
        self.captures += 1;
        log::debug!("Captured ink snapshots at scale {:.2}", scale.x);
    }

    /// Blit the tiles onto a screen-space target.
    pub fn composite(&self, target: &mut dyn Context2d, page: &Page) {
        for quadrant in &self.quadrants {
            let at = page.logical_to_screen(quadrant.origin);
            target.draw_surface(&quadrant.canvas, Affine::translate(at.to_vec2()));
        }
    }

    pub fn clear(&mut self) {
        self.quadrants.clear();
        self.key = None;
    }
}
