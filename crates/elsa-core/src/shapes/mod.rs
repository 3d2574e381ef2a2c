//! Shape model for the diagram canvas.
//!
//! A shape is a logical rectangle in page coordinates plus rotation and scale.
//! Width and height may be negative while a handle is dragged past the
//! opposite corner; [`Shape::frame`] always returns the normalized rectangle.

use kurbo::{Affine, Point, Rect, Vec2};
use peniko::Color;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::{frame_transform, is_point_in_rect, normalize_frame, to_frame_space};
use crate::ink::{FreeLine, PenMode};

/// Unique identifier for shapes.
pub type ShapeId = Uuid;

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub fn white() -> Self {
        Self::new(255, 255, 255, 255)
    }

    pub fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// CSS `rgba(...)` notation, as used by the HTML and SVG backends.
    pub fn to_css(&self) -> String {
        format!(
            "rgba({}, {}, {}, {})",
            self.r,
            self.g,
            self.b,
            f64::from(self.a) / 255.0
        )
    }

    /// Multiply the alpha channel by `factor` (clamped to `[0, 1]`).
    pub fn with_alpha_factor(self, factor: f64) -> Self {
        let a = (f64::from(self.a) * factor.clamp(0.0, 1.0)).round() as u8;
        Self { a, ..self }
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Which rendering backend a shape is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawerKind {
    /// DOM box model.
    #[default]
    Html,
    /// Raster 2D context.
    Canvas,
    /// Vector `<path>` elements.
    Svg,
}

/// Visual properties shared by all backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeStyle {
    /// Background fill (None = transparent back).
    pub back_color: Option<SerializableColor>,
    pub border_color: SerializableColor,
    pub border_width: f64,
    pub corner_radius: f64,
    /// Inset of the text area from the frame.
    pub text_padding: f64,
    pub opacity: f64,
}

impl Default for ShapeStyle {
    fn default() -> Self {
        Self {
            back_color: Some(SerializableColor::white()),
            border_color: SerializableColor::black(),
            border_width: 1.0,
            corner_radius: 0.0,
            text_padding: 4.0,
            opacity: 1.0,
        }
    }
}

/// State of a container shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Container {
    /// Internal scroll offset applied to every child.
    pub item_scroll: Vec2,
    /// Collapsed containers keep their children but scroll them as a block.
    pub collapsed: bool,
}

/// Shape variants known to the rendering core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ShapeKind {
    Rectangle,
    Container(Container),
    FreeLine(FreeLine),
}

/// Plain geometry of a shape, used to snapshot state at gesture start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeGeometry {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub rotate_degree: f64,
}

fn default_scale() -> f64 {
    1.0
}

/// A shape on a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shape {
    pub(crate) id: ShapeId,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Rotation around the frame center, in degrees, `[0, 360)`.
    #[serde(default)]
    pub rotate_degree: f64,
    #[serde(default = "default_scale")]
    pub scale_x: f64,
    #[serde(default = "default_scale")]
    pub scale_y: f64,
    /// Containing shape, if nested.
    #[serde(default)]
    pub container: Option<ShapeId>,
    #[serde(default)]
    pub drawer: DrawerKind,
    /// Drawn every frame by the animation loop.
    #[serde(default)]
    pub enable_animation: bool,
    #[serde(default)]
    pub style: ShapeStyle,
    pub kind: ShapeKind,
    #[serde(skip)]
    selected: bool,
    #[serde(skip)]
    focused: bool,
    /// Bumped by every `invalidate()`; renderers redraw when it changes.
    #[serde(skip)]
    revision: u64,
}

impl Shape {
    fn with_kind(x: f64, y: f64, width: f64, height: f64, kind: ShapeKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            x,
            y,
            width,
            height,
            rotate_degree: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            container: None,
            drawer: DrawerKind::default(),
            enable_animation: false,
            style: ShapeStyle::default(),
            kind,
            selected: false,
            focused: false,
            revision: 0,
        }
    }

    /// Create a plain rectangle shape.
    pub fn rectangle(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::with_kind(x, y, width, height, ShapeKind::Rectangle)
    }

    /// Create a container shape.
    pub fn container(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::with_kind(x, y, width, height, ShapeKind::Container(Container::default()))
    }

    /// Create an empty freehand host shape.
    ///
    /// Ink hosts render on the canvas backend and have no back fill.
    pub fn free_line(mode: PenMode) -> Self {
        let mut shape = Self::with_kind(0.0, 0.0, 0.0, 0.0, ShapeKind::FreeLine(FreeLine::new(mode)));
        shape.drawer = DrawerKind::Canvas;
        shape.style.back_color = None;
        shape.style.border_width = 0.0;
        shape
    }

    /// Reconstruct a shape with a known id (remote or stored shapes).
    pub fn with_id(mut self, id: ShapeId) -> Self {
        self.id = id;
        self
    }

    pub fn with_drawer(mut self, drawer: DrawerKind) -> Self {
        self.drawer = drawer;
        self
    }

    pub fn id(&self) -> ShapeId {
        self.id
    }

    /// The normalized frame in page coordinates (before rotation/scale).
    pub fn frame(&self) -> Rect {
        normalize_frame(self.x, self.y, self.width, self.height)
    }

    /// Text area: the frame inset by the text padding.
    pub fn text_rect(&self) -> Rect {
        let frame = self.frame();
        let pad = self
            .style
            .text_padding
            .min(frame.width() / 2.0)
            .min(frame.height() / 2.0)
            .max(0.0);
        frame.inset(-pad)
    }

    pub fn center(&self) -> Point {
        self.frame().center()
    }

    /// Affine mapping the unrotated frame to its on-page placement.
    pub fn transform(&self) -> Affine {
        frame_transform(self.frame(), self.rotate_degree, self.scale_x, self.scale_y)
    }

    /// Axis-aligned bounds of the rotated/scaled frame.
    pub fn bounds(&self) -> Rect {
        self.transform().transform_rect_bbox(self.frame())
    }

    /// Check whether a page point falls inside the rotated/scaled frame.
    pub fn hit_test(&self, point: Point) -> bool {
        let local = to_frame_space(point, self.frame(), self.rotate_degree, self.scale_x, self.scale_y);
        is_point_in_rect(local, self.frame())
    }

    pub fn geometry(&self) -> ShapeGeometry {
        ShapeGeometry {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            rotate_degree: self.rotate_degree,
        }
    }

    pub fn set_geometry(&mut self, geometry: ShapeGeometry) {
        self.x = geometry.x;
        self.y = geometry.y;
        self.width = geometry.width;
        self.height = geometry.height;
        self.rotate_degree = geometry.rotate_degree;
        self.invalidate();
    }

    /// Translate the shape.
    pub fn move_by(&mut self, delta: Vec2) {
        self.x += delta.x;
        self.y += delta.y;
        self.invalidate();
    }

    /// Mark the shape as needing a redraw.
    pub fn invalidate(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn select(&mut self) {
        if !self.selected {
            self.selected = true;
            self.invalidate();
        }
    }

    pub fn unselect(&mut self) {
        if self.selected {
            self.selected = false;
            self.invalidate();
        }
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn set_focused(&mut self, focused: bool) {
        if self.focused != focused {
            self.focused = focused;
            self.invalidate();
        }
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn is_container(&self) -> bool {
        matches!(self.kind, ShapeKind::Container(_))
    }

    pub fn as_container(&self) -> Option<&Container> {
        match &self.kind {
            ShapeKind::Container(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_container_mut(&mut self) -> Option<&mut Container> {
        match &mut self.kind {
            ShapeKind::Container(c) => Some(c),
            _ => None,
        }
    }

    pub fn is_free_line(&self) -> bool {
        matches!(self.kind, ShapeKind::FreeLine(_))
    }

    pub fn as_free_line(&self) -> Option<&FreeLine> {
        match &self.kind {
            ShapeKind::FreeLine(f) => Some(f),
            _ => None,
        }
    }

    pub(crate) fn as_free_line_mut(&mut self) -> Option<&mut FreeLine> {
        match &mut self.kind {
            ShapeKind::FreeLine(f) => Some(f),
            _ => None,
        }
    }

    /// Resize an ink host to the union of its stroke bounds.
    pub(crate) fn fit_to_strokes(&mut self) {
        let Some(bounds) = self.as_free_line().and_then(FreeLine::bounds) else {
            return;
        };
        self.x = bounds.x0;
        self.y = bounds.y0;
        self.width = bounds.width();
        self.height = bounds.height();
        self.invalidate();
    }
}
