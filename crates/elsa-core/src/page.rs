//! Page: the logical canvas with its pan/zoom mapping and shape store.

use std::collections::HashMap;

use kurbo::{Affine, BezPath, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ViewConfig;
use crate::ink::{FreeLine, PathCache, PenMode, Stroke, StrokeId};
use crate::shapes::{Shape, ShapeId};

/// Unique identifier for pages.
pub type PageId = Uuid;

/// A page of the diagram.
///
/// The page owns the view mapping between screen pixels and logical page
/// coordinates:
///
/// ```text
/// screen = (logical + pan) * scale
/// logical = screen / scale - pan
/// ```
///
/// It also owns the page-scoped stroke path cache. All point mutations go
/// through page methods so the cached path is dropped at the same time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    id: PageId,
    x: f64,
    y: f64,
    scale_x: f64,
    scale_y: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    shapes: HashMap<ShapeId, Shape>,
    /// Back to front.
    z_order: Vec<ShapeId>,
    #[serde(skip)]
    transform_version: u64,
    #[serde(skip)]
    ink_version: u64,
    #[serde(skip)]
    paths: PathCache,
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

impl Page {
    pub fn new() -> Self {
        Self::from_config(&ViewConfig::default())
    }

    /// Create a page using the zoom bounds from a view configuration.
    pub fn from_config(config: &ViewConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            x: 0.0,
            y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            min_zoom: config.min_zoom,
            max_zoom: config.max_zoom,
            shapes: HashMap::new(),
            z_order: Vec::new(),
            transform_version: 0,
            ink_version: 0,
            paths: PathCache::new(),
        }
    }

    pub fn with_id(mut self, id: PageId) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    // --- View mapping ---

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn scale_x(&self) -> f64 {
        self.scale_x
    }

    pub fn scale_y(&self) -> f64 {
        self.scale_y
    }

    pub fn pan_offset(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    /// Bumped by every pan or zoom; snapshot caches compare against it.
    pub fn transform_version(&self) -> u64 {
        self.transform_version
    }

    /// Bumped by every structural ink change (add, delete, transform, erase).
    pub fn ink_version(&self) -> u64 {
        self.ink_version
    }

    /// Affine mapping logical coordinates to screen pixels.
    pub fn view_transform(&self) -> Affine {
        Affine::scale_non_uniform(self.scale_x, self.scale_y) * Affine::translate((self.x, self.y))
    }

    pub fn screen_to_logical(&self, screen: Point) -> Point {
        Point::new(screen.x / self.scale_x - self.x, screen.y / self.scale_y - self.y)
    }

    pub fn logical_to_screen(&self, logical: Point) -> Point {
        Point::new((logical.x + self.x) * self.scale_x, (logical.y + self.y) * self.scale_y)
    }

    /// Logical rectangle visible in a viewport of the given pixel size.
    pub fn visible_rect(&self, viewport: Size) -> Rect {
        Rect::from_points(
            self.screen_to_logical(Point::ZERO),
            self.screen_to_logical(Point::new(viewport.width, viewport.height)),
        )
    }

    /// Pan by a delta in logical units.
    pub fn pan(&mut self, delta: Vec2) {
        self.x += delta.x;
        self.y += delta.y;
        self.transform_version += 1;
    }

    /// Pan by a delta in screen pixels.
    pub fn pan_screen(&mut self, delta: Vec2) {
        self.pan(Vec2::new(delta.x / self.scale_x, delta.y / self.scale_y));
    }

    pub fn set_pan(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
        self.transform_version += 1;
    }

    /// Set a uniform zoom, clamped to the page's zoom bounds.
    pub fn set_scale(&mut self, scale: f64) {
        let scale = scale.clamp(self.min_zoom, self.max_zoom);
        self.scale_x = scale;
        self.scale_y = scale;
        self.transform_version += 1;
    }

    /// Zoom by a factor, keeping the logical point under `screen_point` fixed.
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64) {
        let new_scale = (self.scale_x * factor).clamp(self.min_zoom, self.max_zoom);
        if (new_scale - self.scale_x).abs() < f64::EPSILON && (new_scale - self.scale_y).abs() < f64::EPSILON {
            return;
        }
        let anchor = self.screen_to_logical(screen_point);
        self.scale_x = new_scale;
        self.scale_y = new_scale;
        self.x = screen_point.x / new_scale - anchor.x;
        self.y = screen_point.y / new_scale - anchor.y;
        self.transform_version += 1;
    }

    /// Zoom and pan so `bounds` is centered in the viewport with `padding` pixels around it.
    pub fn fit_to_bounds(&mut self, bounds: Rect, viewport: Size, padding: f64) {
        if bounds.width() <= 0.0 || bounds.height() <= 0.0 {
            self.set_scale(1.0);
            self.set_pan(0.0, 0.0);
            return;
        }
        let avail_w = (viewport.width - padding * 2.0).max(1.0);
        let avail_h = (viewport.height - padding * 2.0).max(1.0);
        let scale = (avail_w / bounds.width())
            .min(avail_h / bounds.height())
            .clamp(self.min_zoom, self.max_zoom);
        self.scale_x = scale;
        self.scale_y = scale;

        let center = bounds.center();
        self.x = viewport.width / (2.0 * scale) - center.x;
        self.y = viewport.height / (2.0 * scale) - center.y;
        self.transform_version += 1;
    }

    // --- Shape store ---

    /// Add a shape on top of the z-order.
    pub fn add_shape(&mut self, shape: Shape) -> ShapeId {
        let id = shape.id();
        if shape.is_free_line() {
            self.ink_version += 1;
        }
        if self.shapes.insert(id, shape).is_none() {
            self.z_order.push(id);
        }
        id
    }

    /// Remove a shape, dropping cached paths of any strokes it hosted.
    pub fn remove_shape(&mut self, id: ShapeId) -> Option<Shape> {
        let shape = self.shapes.remove(&id)?;
        self.z_order.retain(|&other| other != id);
        if let Some(host) = shape.as_free_line() {
            for stroke in host.strokes() {
                self.paths.invalidate(stroke.id());
            }
            self.ink_version += 1;
        }
        Some(shape)
    }

    pub fn get_shape(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.get(&id)
    }

    pub fn get_shape_mut(&mut self, id: ShapeId) -> Option<&mut Shape> {
        self.shapes.get_mut(&id)
    }

    pub fn contains_shape(&self, id: ShapeId) -> bool {
        self.shapes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn z_order(&self) -> &[ShapeId] {
        &self.z_order
    }

    /// Shapes in z-order (back to front).
    pub fn shapes_ordered(&self) -> impl Iterator<Item = &Shape> {
        self.z_order.iter().filter_map(|id| self.shapes.get(id))
    }

    pub fn bring_to_front(&mut self, id: ShapeId) {
        if self.shapes.contains_key(&id) {
            self.z_order.retain(|&other| other != id);
            self.z_order.push(id);
        }
    }

    /// Containers of a shape, nearest first.
    pub fn container_chain(&self, id: ShapeId) -> Vec<ShapeId> {
        let mut chain = Vec::new();
        let mut current = self.shapes.get(&id).and_then(|s| s.container);
        while let Some(parent) = current {
            // Guard against cycles in malformed documents.
            if chain.contains(&parent) || chain.len() >= self.shapes.len() {
                break;
            }
            chain.push(parent);
            current = self.shapes.get(&parent).and_then(|s| s.container);
        }
        chain
    }

    /// Scroll offset inherited by a shape from its containers.
    ///
    /// The direct container's scroll always applies; further ancestors only
    /// contribute while collapsed.
    pub fn container_scroll(&self, id: ShapeId) -> Vec2 {
        let mut scroll = Vec2::ZERO;
        for (depth, container_id) in self.container_chain(id).into_iter().enumerate() {
            let Some(container) = self.shapes.get(&container_id).and_then(Shape::as_container) else {
                continue;
            };
            if depth == 0 || container.collapsed {
                scroll += container.item_scroll;
            }
        }
        scroll
    }

    /// Union of all shape bounds.
    pub fn bounds(&self) -> Option<Rect> {
        self.shapes_ordered().map(Shape::bounds).reduce(|acc, b| acc.union(b))
    }

    /// Shapes under a logical point, topmost first.
    pub fn shapes_at_point(&self, point: Point) -> Vec<ShapeId> {
        self.z_order
            .iter()
            .rev()
            .filter(|id| {
                self.shapes.get(id).is_some_and(|shape| {
                    let scroll = self.container_scroll(shape.id());
                    shape.hit_test(point + scroll)
                })
            })
            .copied()
            .collect()
    }

    /// Shapes whose bounds lie completely inside `rect`, back to front.
    pub fn shapes_in_rect(&self, rect: Rect) -> Vec<ShapeId> {
        let rect = rect.abs();
        self.shapes_ordered()
            .filter(|shape| {
                let b = shape.bounds();
                b.x0 >= rect.x0 && b.y0 >= rect.y0 && b.x1 <= rect.x1 && b.y1 <= rect.y1
            })
            .map(Shape::id)
            .collect()
    }

    // --- Ink ---

    pub fn paths(&self) -> &PathCache {
        &self.paths
    }

    /// Freehand host shapes in z-order.
    pub fn free_line_hosts(&self) -> impl Iterator<Item = &Shape> {
        self.shapes_ordered().filter(|s| s.is_free_line())
    }

    /// The open host for a pen mode, if a drawing session is running.
    pub fn open_host(&self, mode: PenMode) -> Option<ShapeId> {
        self.free_line_hosts()
            .find(|s| s.as_free_line().is_some_and(|h| h.is_open() && h.mode == mode))
            .map(Shape::id)
    }

    /// Find the host containing a stroke.
    pub fn host_of(&self, stroke: StrokeId) -> Option<ShapeId> {
        self.free_line_hosts()
            .find(|s| s.as_free_line().is_some_and(|h| h.stroke(stroke).is_some()))
            .map(Shape::id)
    }

    pub fn stroke(&self, host: ShapeId, stroke: StrokeId) -> Option<&Stroke> {
        self.shapes.get(&host)?.as_free_line()?.stroke(stroke)
    }

    /// Mutate a host's strokes structurally.
    ///
    /// Every cached path of the host is dropped, the host frame is refit to
    /// its strokes and the ink version is bumped.
    pub(crate) fn edit_host<R>(&mut self, id: ShapeId, f: impl FnOnce(&mut FreeLine) -> R) -> Option<R> {
        let shape = self.shapes.get_mut(&id)?;
        let host = shape.as_free_line_mut()?;
        let before: Vec<StrokeId> = host.strokes.iter().map(|s| s.id).collect();
        let result = f(host);
        for stroke_id in before.into_iter().chain(host.strokes.iter().map(|s| s.id)) {
            self.paths.invalidate(stroke_id);
        }
        shape.fit_to_strokes();
        self.ink_version += 1;
        Some(result)
    }

    /// Mutate one stroke's points; its cached path is dropped and its bound refit.
    ///
    /// The ink version is left alone so live transforms of selected strokes
    /// do not invalidate snapshots; commit with [`Page::mark_ink_changed`].
    pub(crate) fn edit_stroke<R>(
        &mut self,
        host: ShapeId,
        stroke: StrokeId,
        f: impl FnOnce(&mut Stroke) -> R,
    ) -> Option<R> {
        let shape = self.shapes.get_mut(&host)?;
        let target = shape.as_free_line_mut()?.stroke_mut(stroke)?;
        let result = f(target);
        target.refit();
        self.paths.invalidate(stroke);
        shape.fit_to_strokes();
        Some(result)
    }

    /// Host access for selection flags only; points must not change through it.
    pub(crate) fn host_flags_mut(&mut self, id: ShapeId) -> Option<&mut FreeLine> {
        self.shapes.get_mut(&id)?.as_free_line_mut()
    }

    pub(crate) fn mark_ink_changed(&mut self) {
        self.ink_version += 1;
    }

    /// Visit every stroke with its cached path, building missing paths.
    pub fn for_each_stroke_path(&mut self, mut f: impl FnMut(&Shape, &Stroke, &BezPath)) {
        for id in &self.z_order {
            let Some(shape) = self.shapes.get(id) else {
                continue;
            };
            let Some(host) = shape.as_free_line() else {
                continue;
            };
            for stroke in host.strokes() {
                let path = self.paths.get_or_build(stroke);
                f(shape, stroke, path);
            }
        }
    }
}
