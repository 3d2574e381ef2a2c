//! Pointer routing between screen space and the page model.
//!
//! The surface converts every event through the page mapping once, then hands
//! logical coordinates to whichever gesture is running: panning, rubber-band
//! selection, handle drags, shape moves, ink capture, erasing or stroke-group
//! transforms.

pub mod cursor;
pub mod rubber_band;
pub mod scrollbar;
pub mod zoom;

pub use cursor::{cursor_for_connector, CursorKind, CursorOverlay};
pub use rubber_band::RubberBand;
pub use scrollbar::{compute_scrollbars, Orientation, Scrollbar};
pub use zoom::{scale_to_slider, slider_to_scale, ZoomToolbar};

use kurbo::{Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

use crate::config::{ConnectorConfig, EngineConfig, ViewConfig};
use crate::connector::{hit_test_connector, ConnectorDrag, ConnectorKind};
use crate::ink::{FreehandEngine, PenMode};
use crate::page::Page;
use crate::shapes::{Shape, ShapeGeometry, ShapeId};

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

/// A pointer sample in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub position: Point,
    pub modifiers: Modifiers,
}

impl PointerEvent {
    pub fn new(position: Point) -> Self {
        Self {
            position,
            modifiers: Modifiers::default(),
        }
    }

    pub fn with_shift(mut self) -> Self {
        self.modifiers.shift = true;
        self
    }
}

/// What a primary-button drag does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionMode {
    #[default]
    Select,
    Pan,
    Freehand(PenMode),
    Eraser,
}

#[derive(Debug, Clone)]
enum Gesture {
    Idle,
    /// Last screen position.
    Pan(Point),
    ScrollThumb { bar: Scrollbar, last: Point },
    RubberBand(RubberBand),
    Connector(ConnectorDrag),
    MoveShapes { start: Point, originals: Vec<(ShapeId, ShapeGeometry)> },
    Ink,
    Erase,
    /// Selected strokes follow a handle or the pointer.
    InkTransform,
}

/// Interaction state for one viewport.
#[derive(Debug)]
pub struct InteractionSurface {
    connectors: ConnectorConfig,
    view: ViewConfig,
    mode: InteractionMode,
    viewport: Size,
    ink: FreehandEngine,
    cursor: CursorOverlay,
    toolbar: ZoomToolbar,
    gesture: Gesture,
}

impl InteractionSurface {
    pub fn new(config: &EngineConfig, viewport: Size) -> Self {
        Self {
            connectors: config.connectors.clone(),
            view: config.view.clone(),
            mode: InteractionMode::default(),
            viewport,
            ink: FreehandEngine::new(config.ink.clone()),
            cursor: CursorOverlay::new(config.view.cursor_size),
            toolbar: ZoomToolbar::new(),
            gesture: Gesture::Idle,
        }
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    /// Switch tools. Leaving freehand closes the open ink hosts.
    pub fn set_mode(&mut self, page: &mut Page, mode: InteractionMode) {
        if self.mode == mode {
            return;
        }
        self.finish_gesture(page);
        if matches!(self.mode, InteractionMode::Freehand(_)) {
            let closed = self.ink.close_hosts(page);
            log::debug!("Closed {closed} ink hosts");
        }
        self.mode = mode;
        self.cursor.set_kind(self.idle_cursor());
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Size) {
        self.viewport = viewport;
    }

    pub fn ink(&self) -> &FreehandEngine {
        &self.ink
    }

    pub fn ink_mut(&mut self) -> &mut FreehandEngine {
        &mut self.ink
    }

    pub fn cursor(&self) -> &CursorOverlay {
        &self.cursor
    }

    pub fn toolbar(&self) -> &ZoomToolbar {
        &self.toolbar
    }

    pub fn toolbar_mut(&mut self) -> &mut ZoomToolbar {
        &mut self.toolbar
    }

    /// Rubber band in logical coordinates while one is being dragged.
    pub fn rubber_band(&self) -> Option<Rect> {
        match &self.gesture {
            Gesture::RubberBand(band) => Some(band.rect()),
            _ => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.gesture, Gesture::Idle)
    }

    /// Scrollbars for the current page and viewport.
    pub fn scrollbars(&self, page: &Page) -> (Option<Scrollbar>, Option<Scrollbar>) {
        compute_scrollbars(page, self.viewport, self.view.scrollbar_thickness)
    }

    /// Shapes currently selected on the page, back to front.
    pub fn selected_shapes(&self, page: &Page) -> Vec<ShapeId> {
        page.shapes_ordered().filter(|s| s.is_selected()).map(Shape::id).collect()
    }

    /// Handle tolerance in logical units; handles keep their screen size under zoom.
    fn tolerance(&self, page: &Page) -> f64 {
        self.connectors.hit_tolerance / page.scale_x()
    }

    fn idle_cursor(&self) -> CursorKind {
        match self.mode {
            InteractionMode::Select => CursorKind::Default,
            InteractionMode::Pan => CursorKind::Grab,
            InteractionMode::Freehand(_) => CursorKind::Pen,
            InteractionMode::Eraser => CursorKind::Eraser,
        }
    }

    // --- Pointer events ---

    pub fn on_mouse_down(&mut self, page: &mut Page, event: PointerEvent) {
        self.finish_gesture(page);
        let logical = page.screen_to_logical(event.position);

        if let Some(bar) = self.thumb_at(page, event.position) {
            self.gesture = Gesture::ScrollThumb {
                bar,
                last: event.position,
            };
            return;
        }
        if self.mode == InteractionMode::Pan || self.toolbar.drag_mode() {
            self.gesture = Gesture::Pan(event.position);
            self.cursor.set_kind(CursorKind::Grabbing);
            return;
        }

        self.gesture = match self.mode {
            InteractionMode::Freehand(pen) => {
                self.ink.begin(page, pen, logical);
                Gesture::Ink
            }
            InteractionMode::Eraser => {
                self.ink.begin_erase();
                self.ink.erase_at(page, logical);
                Gesture::Erase
            }
            InteractionMode::Select | InteractionMode::Pan => self.begin_select(page, logical, event.modifiers),
        };
    }

    pub fn on_mouse_drag(&mut self, page: &mut Page, event: PointerEvent) {
        let logical = page.screen_to_logical(event.position);
        self.cursor.move_to(event.position);
        let keep_aspect = event.modifiers.shift;
        let snap = self.connectors.snap_rotation;

        match &mut self.gesture {
            Gesture::Idle => {}
            Gesture::Pan(last) => {
                page.pan_screen(event.position - *last);
                *last = event.position;
            }
            Gesture::ScrollThumb { bar, last } => {
                let delta = match bar.orientation {
                    Orientation::Horizontal => event.position.x - last.x,
                    Orientation::Vertical => event.position.y - last.y,
                };
                page.pan(bar.pan_for_thumb_drag(delta));
                *last = event.position;
            }
            Gesture::RubberBand(band) => {
                band.update(logical);
                let rect = band.rect();
                self.ink.select_in_rect(page, rect);
            }
            Gesture::Connector(drag) => {
                if let Some(shape) = page.get_shape_mut(drag.shape_id) {
                    drag.moving(shape, logical, keep_aspect, snap);
                }
            }
            Gesture::MoveShapes { start, originals } => {
                let delta = logical - *start;
                for (id, original) in originals.iter() {
                    if let Some(shape) = page.get_shape_mut(*id) {
                        shape.set_geometry(ShapeGeometry {
                            x: original.x + delta.x,
                            y: original.y + delta.y,
                            ..*original
                        });
                    }
                }
            }
            Gesture::Ink => {
                self.ink.drag(page, logical);
            }
            Gesture::Erase => {
                self.ink.erase_at(page, logical);
            }
            Gesture::InkTransform => {
                self.ink.transform_to(page, logical, keep_aspect, snap);
            }
        }
    }

    pub fn on_mouse_up(&mut self, page: &mut Page, event: PointerEvent) {
        if let Gesture::RubberBand(band) = &mut self.gesture {
            band.update(page.screen_to_logical(event.position));
        }
        self.finish_gesture(page);
        self.cursor.set_kind(self.idle_cursor());
    }

    /// Pointer left the viewport: finish whatever is running and hide the cursor.
    ///
    /// A stroke with fewer than two points is dropped by the finalize step.
    pub fn on_mouse_leave(&mut self, page: &mut Page) {
        self.finish_gesture(page);
        self.cursor.hide();
    }

    /// Hover: update the cursor overlay.
    pub fn on_mouse_move(&mut self, page: &Page, event: PointerEvent) {
        self.cursor.move_to(event.position);
        if !self.is_idle() {
            return;
        }
        let kind = match self.mode {
            InteractionMode::Select if !self.toolbar.drag_mode() => self.hover_cursor(page, event.position),
            _ if self.toolbar.drag_mode() => CursorKind::Grab,
            _ => self.idle_cursor(),
        };
        self.cursor.set_kind(kind);
    }

    /// Wheel: zoom about the pointer with ctrl/meta held, otherwise pan.
    pub fn on_wheel(&mut self, page: &mut Page, position: Point, delta: Vec2, modifiers: Modifiers) {
        if modifiers.ctrl || modifiers.meta {
            if delta.y == 0.0 {
                return;
            }
            let factor = if delta.y < 0.0 {
                self.view.zoom_step
            } else {
                1.0 / self.view.zoom_step
            };
            page.zoom_at(position, factor);
            self.toolbar.sync(page);
        } else {
            page.pan_screen(-delta);
        }
    }

    /// Move the zoom slider, zooming about the viewport center.
    pub fn set_zoom_slider(&mut self, page: &mut Page, value: f64) {
        let center = Point::new(self.viewport.width / 2.0, self.viewport.height / 2.0);
        self.toolbar.set_slider(page, value, center);
    }

    /// Zoom and pan so every shape is visible.
    pub fn fit_to_content(&mut self, page: &mut Page, padding: f64) {
        if let Some(bounds) = page.bounds() {
            page.fit_to_bounds(bounds, self.viewport, padding);
            self.toolbar.sync(page);
        }
    }

    /// Abort the running gesture, restoring what it had changed.
    pub fn cancel(&mut self, page: &mut Page) {
        match std::mem::replace(&mut self.gesture, Gesture::Idle) {
            Gesture::Connector(drag) => {
                if let Some(shape) = page.get_shape_mut(drag.shape_id) {
                    drag.cancel(shape);
                }
            }
            Gesture::MoveShapes { originals, .. } => {
                for (id, original) in originals {
                    if let Some(shape) = page.get_shape_mut(id) {
                        shape.set_geometry(original);
                    }
                }
            }
            Gesture::Ink => {
                self.ink.cancel();
            }
            Gesture::Erase => {
                self.ink.clear_pre_selection(page);
                self.ink.end_erase(page);
            }
            Gesture::InkTransform => self.ink.cancel_transform(page),
            Gesture::RubberBand(_) => self.ink.clear_pre_selection(page),
            Gesture::Idle | Gesture::Pan(_) | Gesture::ScrollThumb { .. } => {}
        }
        self.cursor.set_kind(self.idle_cursor());
    }

    // --- Gesture helpers ---

    fn begin_select(&mut self, page: &mut Page, logical: Point, modifiers: Modifiers) -> Gesture {
        let tolerance = self.tolerance(page);
        let rotate_offset = self.connectors.rotate_offset;

        // Handles of a single selected shape win over everything underneath.
        if let Some((shape, kind)) = self.handle_at(page, logical) {
            return Gesture::Connector(ConnectorDrag::new(shape, kind, logical));
        }

        if let Some(bounds) = self.ink.selection_bounds(page) {
            let started = match group_handle_at(bounds, logical, tolerance, rotate_offset) {
                Some(kind) => self.ink.begin_transform(page, kind, logical),
                None => bounds.inflate(tolerance, tolerance).contains(logical) && self.ink.begin_move(page, logical),
            };
            if started {
                return Gesture::InkTransform;
            }
        }

        if !modifiers.shift {
            self.ink.clear_selection(page);
        }
        if self.ink.select_at(page, logical, tolerance).is_some() {
            self.unselect_shapes(page);
            return if self.ink.begin_move(page, logical) {
                Gesture::InkTransform
            } else {
                Gesture::Idle
            };
        }

        let target = page
            .shapes_at_point(logical)
            .into_iter()
            .find(|id| page.get_shape(*id).is_some_and(|s| !s.is_free_line()));
        if let Some(id) = target {
            let already = page.get_shape(id).is_some_and(Shape::is_selected);
            if !already && !modifiers.shift {
                self.unselect_shapes(page);
            }
            if let Some(shape) = page.get_shape_mut(id) {
                shape.select();
            }
            let originals = self
                .selected_shapes(page)
                .into_iter()
                .filter_map(|id| page.get_shape(id).map(|s| (id, s.geometry())))
                .collect();
            return Gesture::MoveShapes { start: logical, originals };
        }

        if !modifiers.shift {
            self.unselect_shapes(page);
        }
        Gesture::RubberBand(RubberBand::new(logical))
    }

    fn finish_gesture(&mut self, page: &mut Page) {
        match std::mem::replace(&mut self.gesture, Gesture::Idle) {
            Gesture::Ink => {
                self.ink.done(page);
            }
            Gesture::Erase => {
                self.ink.end_erase(page);
            }
            Gesture::InkTransform => {
                self.ink.end_transform(page);
            }
            Gesture::RubberBand(band) => {
                let tolerance = self.tolerance(page);
                if band.is_click(tolerance) {
                    self.ink.clear_pre_selection(page);
                    return;
                }
                let rect = band.rect();
                self.ink.select_in_rect(page, rect);
                self.ink.commit_selection(page);
                for id in page.shapes_in_rect(rect) {
                    if let Some(shape) = page.get_shape_mut(id).filter(|s| !s.is_free_line()) {
                        shape.select();
                    }
                }
            }
            Gesture::Idle
            | Gesture::Pan(_)
            | Gesture::ScrollThumb { .. }
            | Gesture::Connector(_)
            | Gesture::MoveShapes { .. } => {}
        }
    }

    fn unselect_shapes(&self, page: &mut Page) {
        for id in self.selected_shapes(page) {
            if let Some(shape) = page.get_shape_mut(id) {
                shape.unselect();
            }
        }
    }

    /// Handle under `logical` when exactly one shape is selected.
    fn handle_at<'a>(&self, page: &'a Page, logical: Point) -> Option<(&'a Shape, ConnectorKind)> {
        let selected = self.selected_shapes(page);
        let [only] = selected.as_slice() else {
            return None;
        };
        let shape = page.get_shape(*only)?;
        let kind = hit_test_connector(shape, logical, self.tolerance(page), self.connectors.rotate_offset)?;
        Some((shape, kind))
    }

    fn thumb_at(&self, page: &Page, screen: Point) -> Option<Scrollbar> {
        let (horizontal, vertical) = self.scrollbars(page);
        [horizontal, vertical]
            .into_iter()
            .flatten()
            .find(|bar| bar.thumb.contains(screen))
    }

    fn hover_cursor(&self, page: &Page, screen: Point) -> CursorKind {
        let logical = page.screen_to_logical(screen);
        let tolerance = self.tolerance(page);
        if let Some((shape, kind)) = self.handle_at(page, logical) {
            return cursor_for_connector(kind, shape.rotate_degree);
        }
        if let Some(bounds) = self.ink.selection_bounds(page) {
            if let Some(kind) = group_handle_at(bounds, logical, tolerance, self.connectors.rotate_offset) {
                return cursor_for_connector(kind, 0.0);
            }
            if bounds.contains(logical) {
                return CursorKind::Move;
            }
        }
        if page.shapes_at_point(logical).is_empty() {
            CursorKind::Default
        } else {
            CursorKind::Move
        }
    }
}

/// Handle of the stroke-group selection box under `point`.
fn group_handle_at(bounds: Rect, point: Point, tolerance: f64, rotate_offset: f64) -> Option<ConnectorKind> {
    let frame = Shape::rectangle(bounds.x0, bounds.y0, bounds.width(), bounds.height());
    hit_test_connector(&frame, point, tolerance, rotate_offset)
}
