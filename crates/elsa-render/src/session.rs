//! Per-page render state.
//!
//! A [`RenderSession`] owns everything that used to hang off the page as
//! ambient caches: one draw driver per shape, the quadrant snapshots of
//! static ink with their recapture timer, the animation loop and overlay,
//! the dynamic ink layer and the cursor canvas. It is built for one page and
//! torn down with it.

#[cfg(not(target_arch = "wasm32"))]
use std::time::{Duration, Instant};

#[cfg(target_arch = "wasm32")]
use web_time::{Duration, Instant};

use std::collections::HashMap;

use kurbo::{Affine, Point, Rect, Shape as _, Size};
use peniko::Color;

use elsa_core::config::{ConnectorConfig, EngineConfig};
use elsa_core::connector::connectors;
use elsa_core::interaction::InteractionSurface;
use elsa_core::page::{Page, PageId};
use elsa_core::shapes::{Shape, ShapeId};

use crate::animation::{AnimationLoop, FrameStats};
use crate::context::Context2d;
use crate::cursor::CursorCanvas;
use crate::drawer::{DrawDriver, SvgRecorder, SELECTION_COLOR};
use crate::error::RenderResult;
use crate::ink::{paint_live, paint_strokes, InkLayer};
use crate::raster::PixelCanvas;
use crate::snapshot::{Debounce, QuadrantSnapshots};

/// Handle edge length in screen pixels.
const HANDLE_SIZE: f64 = 8.0;
const TRACK_COLOR: Color = Color::from_rgba8(0, 0, 0, 20);
const THUMB_COLOR: Color = Color::from_rgba8(0, 0, 0, 90);
const BAND_FILL: Color = Color::from_rgba8(59, 130, 246, 40);

/// What [`RenderSession::sync`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub created: usize,
    pub replaced: usize,
    pub removed: usize,
    pub repainted: usize,
}

/// What one composed frame did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComposeStats {
    pub shapes: usize,
    /// Static ink came from the snapshots.
    pub snapshot_hit: bool,
    /// The snapshots were recaptured this frame.
    pub recaptured: bool,
    /// Strokes painted directly (static fallback plus the dynamic layer).
    pub strokes: usize,
}

pub struct RenderSession {
    page_id: PageId,
    viewport: Size,
    connectors: ConnectorConfig,
    drivers: HashMap<ShapeId, DrawDriver>,
    snapshots: QuadrantSnapshots,
    recapture: Debounce,
    /// Transform and ink versions seen by the last frame.
    seen: Option<(u64, u64)>,
    animation: AnimationLoop,
    dynamic: PixelCanvas,
    cursor: CursorCanvas,
}

impl std::fmt::Debug for RenderSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderSession")
            .field("page_id", &self.page_id)
            .field("viewport", &self.viewport)
            .field("drivers", &self.drivers.len())
            .field("snapshots", &self.snapshots.is_captured())
            .field("animation", &self.animation)
            .finish()
    }
}

fn pixels(viewport: Size) -> (u32, u32) {
    (viewport.width.ceil().max(0.0) as u32, viewport.height.ceil().max(0.0) as u32)
}

/// Shapes with a driver of their own. Ink hosts go through the ink path.
fn is_drawn(shape: &Shape) -> bool {
    !shape.is_free_line()
}

impl RenderSession {
    pub fn new(page: &Page, config: &EngineConfig, viewport: Size) -> Self {
        let (width, height) = pixels(viewport);
        log::debug!("Render session for page {} at {width}x{height}", page.id());
        Self {
            page_id: page.id(),
            viewport,
            connectors: config.connectors.clone(),
            drivers: HashMap::new(),
            snapshots: QuadrantSnapshots::new(),
            recapture: Debounce::new(Duration::from_millis(config.ink.recapture_debounce_ms)),
            seen: None,
            animation: AnimationLoop::new(),
            dynamic: PixelCanvas::new(width, height),
            cursor: CursorCanvas::new(config.view.cursor_size),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Size) {
        if self.viewport != viewport {
            self.viewport = viewport;
            let (width, height) = pixels(viewport);
            self.dynamic.resize(width, height);
            self.snapshots.invalidate();
            self.seen = None;
        }
    }

    pub fn driver(&self, id: ShapeId) -> Option<&DrawDriver> {
        self.drivers.get(&id)
    }

    pub fn driver_mut(&mut self, id: ShapeId) -> Option<&mut DrawDriver> {
        self.drivers.get_mut(&id)
    }

    pub fn snapshots(&self) -> &QuadrantSnapshots {
        &self.snapshots
    }

    pub fn animation(&self) -> &AnimationLoop {
        &self.animation
    }

    pub fn animation_mut(&mut self) -> &mut AnimationLoop {
        &mut self.animation
    }

    pub fn cursor(&self) -> &CursorCanvas {
        &self.cursor
    }

    /// Register a resize hook on a shape's driver.
    pub fn add_resize_hook(&mut self, id: ShapeId, hook: impl FnMut(&Shape, Size) + 'static) -> bool {
        match self.drivers.get_mut(&id) {
            Some(driver) => {
                driver.add_resize_hook(hook);
                true
            }
            None => false,
        }
    }

    fn check_page(&self, page: &Page) -> bool {
        if page.id() != self.page_id {
            log::warn!("Render session for page {} asked to draw page {}", self.page_id, page.id());
            return false;
        }
        true
    }

    /// Bring the drivers in line with the page: create, replace on a
    /// backend change, remove, then repaint what changed.
    pub fn sync(&mut self, page: &Page) -> SyncStats {
        let mut stats = SyncStats::default();
        if !self.check_page(page) {
            return stats;
        }

        self.drivers.retain(|id, driver| {
            let keep = page.get_shape(*id).is_some_and(is_drawn);
            if !keep {
                driver.remove();
                stats.removed += 1;
            }
            keep
        });

        for shape in page.shapes_ordered().filter(|s| is_drawn(s)) {
            let id = shape.id();
            match self.drivers.get(&id).map(DrawDriver::kind) {
                Some(kind) if kind == shape.drawer => {}
                Some(_) => {
                    log::debug!("Shape {id} switched to {:?} drawer", shape.drawer);
                    if let Some(mut old) = self.drivers.insert(id, DrawDriver::for_shape(shape)) {
                        old.remove();
                    }
                    stats.replaced += 1;
                }
                None => {
                    self.drivers.insert(id, DrawDriver::for_shape(shape));
                    stats.created += 1;
                }
            }
            let Some(driver) = self.drivers.get_mut(&id) else {
                continue;
            };
            if driver.update(page, shape) {
                stats.repainted += 1;
            }
        }
        stats
    }

    /// Run one animation frame.
    pub fn animate(&mut self, page: &Page) -> FrameStats {
        if !self.check_page(page) {
            return FrameStats::default();
        }
        self.animation.tick(page, &mut self.drivers, self.viewport)
    }

    /// Backend hit test on a shape's background.
    pub fn contains_back(&self, page: &Page, id: ShapeId, point: Point) -> bool {
        match (page.get_shape(id), self.drivers.get(&id)) {
            (Some(shape), Some(driver)) => driver.contains_back(shape, point),
            _ => false,
        }
    }

    /// Topmost shape whose background or border is under a logical point.
    pub fn shape_at(&self, page: &Page, point: Point) -> Option<ShapeId> {
        let ordered: Vec<&Shape> = page.shapes_ordered().collect();
        ordered.into_iter().rev().find_map(|shape| {
            let driver = self.drivers.get(&shape.id())?;
            (driver.contains_back(shape, point) || driver.contains_border(shape, point)).then(|| shape.id())
        })
    }

    /// Recapture the ink snapshots immediately.
    pub fn recapture_now(&mut self, page: &mut Page) {
        self.recapture.cancel();
        self.snapshots.capture(page, self.viewport);
    }

    fn gesture_active(surface: &InteractionSurface) -> bool {
        !surface.is_idle() || surface.ink().is_gesture_active()
    }

    /// Compose a full frame onto a screen-space target.
    pub fn compose(&mut self, page: &mut Page, surface: &InteractionSurface, target: &mut dyn Context2d, now: Instant) -> ComposeStats {
        let mut stats = ComposeStats::default();
        if !self.check_page(page) {
            return stats;
        }
        self.sync(page);

        // Shapes.
        target.save();
        target.transform(page.view_transform());
        for shape in page.shapes_ordered().filter(|s| is_drawn(s)) {
            if let Some(driver) = self.drivers.get(&shape.id()) {
                driver.present(page, shape, target);
                stats.shapes += 1;
            }
        }
        target.restore();

        // Static ink.
        // A version change restarts the timer. Tiles that went stale without
        // one (a pan that ended with its gesture) still get a recapture.
        let gesture = Self::gesture_active(surface);
        let versions = (page.transform_version(), page.ink_version());
        let changed = self.seen != Some(versions);
        self.seen = Some(versions);
        if !self.snapshots.is_valid(page, self.viewport, gesture) && (changed || !self.recapture.is_pending()) {
            self.recapture.schedule(now);
        }
        if !gesture && self.recapture.fire(now) {
            self.snapshots.capture(page, self.viewport);
            stats.recaptured = true;
        }
        if self.snapshots.is_valid(page, self.viewport, gesture) {
            self.snapshots.composite(target, page);
            stats.snapshot_hit = true;
        } else {
            let visible = page.visible_rect(self.viewport);
            target.save();
            target.transform(page.view_transform());
            stats.strokes += paint_strokes(target, page, InkLayer::Static, Some(visible));
            target.restore();
        }

        // Dynamic layer: selected strokes, the live stroke and selection chrome.
        stats.strokes += self.paint_dynamic(page, surface);
        target.draw_surface(&self.dynamic, Affine::IDENTITY);

        if let Some(overlay) = self.animation.overlay() {
            target.draw_surface(overlay, Affine::IDENTITY);
        }

        paint_scrollbars(target, page, surface);

        self.cursor.update(surface.cursor());
        self.cursor.present(surface.cursor(), target);
        stats
    }

    fn paint_dynamic(&mut self, page: &mut Page, surface: &InteractionSurface) -> usize {
        let scale = page.scale_x();
        let layer: &mut dyn Context2d = &mut self.dynamic;
        layer.clear();
        layer.save();
        layer.transform(page.view_transform());

        let painted = paint_strokes(layer, page, InkLayer::Selected, None);
        if let Some(live) = surface.ink().live() {
            paint_live(layer, live);
        }

        let handle = HANDLE_SIZE / scale;
        let line_width = 1.0 / scale;
        if let Some(bounds) = surface.ink().selection_bounds(page) {
            let group = Shape::rectangle(bounds.x0, bounds.y0, bounds.width(), bounds.height());
            layer.stroke_path(&bounds.to_path(0.1), SELECTION_COLOR, line_width);
            paint_handles(layer, &group, &self.connectors, handle, line_width);
        }
        for shape in page.shapes_ordered().filter(|s| s.is_selected() && is_drawn(s)) {
            paint_handles(layer, shape, &self.connectors, handle, line_width);
        }
        if let Some(band) = surface.rubber_band() {
            let path = band.to_path(0.1);
            layer.fill_path(&path, BAND_FILL);
            layer.stroke_path(&path, SELECTION_COLOR, line_width);
        }
        layer.restore();
        painted
    }

    /// Render the full frame to PNG bytes.
    pub fn render_png(&mut self, page: &mut Page, surface: &InteractionSurface, now: Instant) -> RenderResult<Vec<u8>> {
        let (width, height) = pixels(self.viewport);
        let mut canvas = PixelCanvas::new(width, height);
        self.compose(page, surface, &mut canvas, now);
        canvas.encode_png()
    }

    /// Export shapes and ink as an SVG document of the viewport.
    pub fn export_svg(&mut self, page: &mut Page) -> String {
        let (width, height) = pixels(self.viewport);
        let mut recorder = SvgRecorder::new(width, height);
        if !self.check_page(page) {
            return recorder.to_document();
        }
        self.sync(page);
        recorder.transform(page.view_transform());
        for shape in page.shapes_ordered().filter(|s| is_drawn(s)) {
            if let Some(driver) = self.drivers.get(&shape.id()) {
                driver.present(page, shape, &mut recorder);
            }
        }
        paint_strokes(&mut recorder, page, InkLayer::Static, None);
        paint_strokes(&mut recorder, page, InkLayer::Selected, None);
        recorder.to_document()
    }

    /// Release every backend resource. The session draws nothing afterwards.
    pub fn teardown(&mut self) {
        for driver in self.drivers.values_mut() {
            driver.remove();
        }
        self.drivers.clear();
        self.snapshots.clear();
        self.recapture.cancel();
        self.animation.teardown();
        self.seen = None;
        log::debug!("Render session for page {} torn down", self.page_id);
    }
}

fn paint_handles(ctx: &mut dyn Context2d, shape: &Shape, config: &ConnectorConfig, size: f64, line_width: f64) {
    let half = size / 2.0;
    for connector in connectors(shape, config.rotate_offset) {
        let p = connector.position;
        let path = Rect::new(p.x - half, p.y - half, p.x + half, p.y + half).to_path(0.1);
        ctx.fill_path(&path, Color::from_rgba8(255, 255, 255, 255));
        ctx.stroke_path(&path, SELECTION_COLOR, line_width);
    }
}

fn paint_scrollbars(ctx: &mut dyn Context2d, page: &Page, surface: &InteractionSurface) {
    let (horizontal, vertical) = surface.scrollbars(page);
    for bar in [horizontal, vertical].into_iter().flatten() {
        ctx.fill_path(&bar.track.to_path(0.1), TRACK_COLOR);
        ctx.fill_path(&bar.thumb.to_path(0.1), THUMB_COLOR);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elsa_core::ink::PenMode;
    use elsa_core::interaction::{InteractionMode, Modifiers, PointerEvent};
    use elsa_core::shapes::DrawerKind;
    use kurbo::Vec2;

    fn setup() -> (Page, InteractionSurface, RenderSession) {
        let config = EngineConfig::default();
        let viewport = Size::new(120.0, 90.0);
        let page = Page::from_config(&config.view);
        let surface = InteractionSurface::new(&config, viewport);
        let session = RenderSession::new(&page, &config, viewport);
        (page, surface, session)
    }

    fn draw_stroke(page: &mut Page, surface: &mut InteractionSurface, y: f64) {
        surface.set_mode(page, InteractionMode::Freehand(PenMode::Pen));
        surface.on_mouse_down(page, PointerEvent::new(Point::new(5.0, y)));
        for i in 1..=20 {
            surface.on_mouse_drag(page, PointerEvent::new(Point::new(5.0 + i as f64 * 4.0, y)));
        }
        surface.on_mouse_up(page, PointerEvent::new(Point::new(85.0, y)));
    }

    #[test]
    fn test_sync_tracks_shapes_and_backends() {
        let (mut page, _surface, mut session) = setup();
        let a = page.add_shape(Shape::rectangle(0.0, 0.0, 20.0, 20.0));
        let b = page.add_shape(Shape::rectangle(30.0, 0.0, 20.0, 20.0).with_drawer(DrawerKind::Canvas));
        let stats = session.sync(&page);
        assert_eq!(stats.created, 2);
        assert_eq!(stats.repainted, 2);
        assert_eq!(session.sync(&page), SyncStats::default());

        if let Some(shape) = page.get_shape_mut(a) {
            shape.drawer = DrawerKind::Svg;
            shape.invalidate();
        }
        page.remove_shape(b);
        let stats = session.sync(&page);
        assert_eq!(stats.replaced, 1);
        assert_eq!(stats.removed, 1);
        assert_eq!(session.driver(a).map(DrawDriver::kind), Some(DrawerKind::Svg));
        assert!(session.driver(b).is_none());
    }

    #[test]
    fn test_ink_hosts_have_no_driver() {
        let (mut page, mut surface, mut session) = setup();
        draw_stroke(&mut page, &mut surface, 40.0);
        session.sync(&page);
        let host = page.free_line_hosts().next().map(Shape::id).unwrap();
        assert!(session.driver(host).is_none());
    }

    #[test]
    fn test_compose_recaptures_after_debounce() {
        let (mut page, mut surface, mut session) = setup();
        draw_stroke(&mut page, &mut surface, 40.0);
        let start = Instant::now();

        let mut frame = PixelCanvas::new(120, 90);
        let first = session.compose(&mut page, &surface, &mut frame, start);
        assert!(!first.snapshot_hit);
        assert!(first.strokes >= 1);
        assert_eq!(frame.alpha_at(40, 40), Some(255));

        let mut frame = PixelCanvas::new(120, 90);
        let later = session.compose(&mut page, &surface, &mut frame, start + Duration::from_millis(10));
        assert!(later.recaptured);
        assert!(later.snapshot_hit);
        assert_eq!(frame.alpha_at(40, 40), Some(255));
        assert_eq!(session.snapshots().captures(), 1);
    }

    #[test]
    fn test_zoom_falls_back_to_direct_paint() {
        let (mut page, mut surface, mut session) = setup();
        draw_stroke(&mut page, &mut surface, 40.0);
        let start = Instant::now();
        session.recapture_now(&mut page);
        let mut frame = PixelCanvas::new(120, 90);
        assert!(session.compose(&mut page, &surface, &mut frame, start).snapshot_hit);

        let ctrl = Modifiers {
            ctrl: true,
            ..Modifiers::default()
        };
        surface.on_wheel(&mut page, Point::new(60.0, 45.0), Vec2::new(0.0, -1.0), ctrl);
        let mut frame = PixelCanvas::new(120, 90);
        let stats = session.compose(&mut page, &surface, &mut frame, start + Duration::from_millis(1));
        assert!(!stats.snapshot_hit);
        assert!(!stats.recaptured);
        let stats = session.compose(&mut page, &surface, &mut frame, start + Duration::from_millis(20));
        assert!(stats.recaptured && stats.snapshot_hit);
    }

    #[test]
    fn test_pan_gesture_recaptures_once_idle() {
        let (mut page, mut surface, mut session) = setup();
        draw_stroke(&mut page, &mut surface, 40.0);
        surface.set_mode(&mut page, InteractionMode::Pan);
        session.recapture_now(&mut page);
        let start = Instant::now();

        surface.on_mouse_down(&mut page, PointerEvent::new(Point::new(50.0, 50.0)));
        surface.on_mouse_drag(&mut page, PointerEvent::new(Point::new(60.0, 50.0)));
        let mut frame = PixelCanvas::new(120, 90);
        let during = session.compose(&mut page, &surface, &mut frame, start);
        assert!(during.snapshot_hit);
        assert!(!during.recaptured);
        surface.on_mouse_up(&mut page, PointerEvent::new(Point::new(60.0, 50.0)));

        // Stale tiles after the gesture: direct paint until the debounce fires.
        let mut frame = PixelCanvas::new(120, 90);
        let first_idle = session.compose(&mut page, &surface, &mut frame, start + Duration::from_millis(10));
        assert!(!first_idle.snapshot_hit);
        assert!(!first_idle.recaptured);
        assert_eq!(frame.alpha_at(50, 40), Some(255));

        let mut frame = PixelCanvas::new(120, 90);
        let settled = session.compose(&mut page, &surface, &mut frame, start + Duration::from_millis(50));
        assert!(settled.recaptured);
        assert!(settled.snapshot_hit);
        assert_eq!(session.snapshots().captures(), 2);
        assert_eq!(frame.alpha_at(50, 40), Some(255));

        let mut frame = PixelCanvas::new(120, 90);
        let later = session.compose(&mut page, &surface, &mut frame, start + Duration::from_millis(100));
        assert!(later.snapshot_hit);
        assert!(!later.recaptured);
        assert_eq!(session.snapshots().captures(), 2);
    }

    #[test]
    fn test_live_stroke_goes_to_dynamic_layer() {
        let (mut page, mut surface, mut session) = setup();
        draw_stroke(&mut page, &mut surface, 20.0);
        session.recapture_now(&mut page);
        let captures = session.snapshots().captures();

        surface.on_mouse_down(&mut page, PointerEvent::new(Point::new(10.0, 60.0)));
        for i in 1..=10 {
            surface.on_mouse_drag(&mut page, PointerEvent::new(Point::new(10.0 + i as f64 * 5.0, 60.0)));
        }
        let mut frame = PixelCanvas::new(120, 90);
        let stats = session.compose(&mut page, &surface, &mut frame, Instant::now() + Duration::from_secs(1));
        assert!(stats.snapshot_hit);
        assert_eq!(frame.alpha_at(30, 60), Some(255));
        assert_eq!(session.snapshots().captures(), captures);
    }

    #[test]
    fn test_shape_hit_uses_backend() {
        let (mut page, _surface, mut session) = setup();
        let mut rounded = Shape::rectangle(10.0, 10.0, 40.0, 40.0).with_drawer(DrawerKind::Canvas);
        rounded.style.corner_radius = 15.0;
        rounded.style.border_width = 0.0;
        let id = page.add_shape(rounded);
        session.sync(&page);
        assert!(session.contains_back(&page, id, Point::new(30.0, 30.0)));
        assert!(!session.contains_back(&page, id, Point::new(10.5, 10.5)));
        assert_eq!(session.shape_at(&page, Point::new(30.0, 30.0)), Some(id));
        assert_eq!(session.shape_at(&page, Point::new(100.0, 80.0)), None);
    }

    #[test]
    fn test_png_and_svg_export() {
        let (mut page, mut surface, mut session) = setup();
        page.add_shape(Shape::rectangle(10.0, 10.0, 30.0, 20.0).with_drawer(DrawerKind::Svg));
        draw_stroke(&mut page, &mut surface, 60.0);
        let png = session.render_png(&mut page, &surface, Instant::now()).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

        let svg = session.export_svg(&mut page);
        assert!(svg.contains("<svg"));
        assert!(svg.matches("<path").count() >= 3);
    }

    #[test]
    fn test_teardown_removes_drivers() {
        let (mut page, _surface, mut session) = setup();
        let id = page.add_shape(Shape::rectangle(0.0, 0.0, 10.0, 10.0));
        session.sync(&page);
        session.animation_mut().on_frame(|_, _, _| Ok(()));
        session.animate(&page);
        session.teardown();
        assert!(session.driver(id).is_none());
        assert!(session.animation().overlay().is_none());
        assert!(!session.snapshots().is_captured());
    }

    #[test]
    fn test_other_page_is_ignored() {
        let (page, _surface, mut session) = setup();
        let mut other = Page::new();
        other.add_shape(Shape::rectangle(0.0, 0.0, 10.0, 10.0));
        assert_eq!(session.sync(&other), SyncStats::default());
        assert_eq!(session.sync(&page), SyncStats::default());
    }
}
