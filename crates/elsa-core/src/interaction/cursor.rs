//! Cursor overlay state.
//!
//! The cursor is drawn into its own small canvas so it never forces a scene
//! repaint. This module only tracks what to draw and where.

use kurbo::Point;
use serde::{Deserialize, Serialize};

use crate::connector::ConnectorKind;
use crate::geometry::normalize_degrees;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorKind {
    #[default]
    Default,
    Crosshair,
    Pen,
    Eraser,
    Move,
    Grab,
    Grabbing,
    ResizeNs,
    ResizeEw,
    ResizeNesw,
    ResizeNwse,
    Rotate,
}

impl CursorKind {
    /// CSS cursor keyword, for hosts that fall back to the native cursor.
    pub fn css_name(self) -> &'static str {
        match self {
            CursorKind::Default => "default",
            CursorKind::Crosshair | CursorKind::Pen | CursorKind::Eraser => "crosshair",
            CursorKind::Move => "move",
            CursorKind::Grab => "grab",
            CursorKind::Grabbing => "grabbing",
            CursorKind::ResizeNs => "ns-resize",
            CursorKind::ResizeEw => "ew-resize",
            CursorKind::ResizeNesw => "nesw-resize",
            CursorKind::ResizeNwse => "nwse-resize",
            CursorKind::Rotate => "alias",
        }
    }
}

/// Cursor for a handle of a shape rotated by `rotate_degree`.
///
/// Resize arrows turn with the shape in 45° steps.
pub fn cursor_for_connector(kind: ConnectorKind, rotate_degree: f64) -> CursorKind {
    let base = match kind {
        ConnectorKind::Rotate => return CursorKind::Rotate,
        ConnectorKind::Top => 0.0,
        ConnectorKind::RightTop => 45.0,
        ConnectorKind::Right => 90.0,
        ConnectorKind::RightBottom => 135.0,
        ConnectorKind::Bottom => 180.0,
        ConnectorKind::LeftBottom => 225.0,
        ConnectorKind::Left => 270.0,
        ConnectorKind::LeftTop => 315.0,
    };
    let step = (normalize_degrees(base + rotate_degree) / 45.0).round() as i64 % 4;
    match step {
        0 => CursorKind::ResizeNs,
        1 => CursorKind::ResizeNesw,
        2 => CursorKind::ResizeEw,
        _ => CursorKind::ResizeNwse,
    }
}

/// What the cursor canvas should show.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorOverlay {
    kind: CursorKind,
    /// Pointer position in screen pixels.
    position: Point,
    visible: bool,
    /// Edge length of the square overlay canvas.
    size: u32,
    revision: u64,
}

impl CursorOverlay {
    pub fn new(size: u32) -> Self {
        Self {
            kind: CursorKind::Default,
            position: Point::ZERO,
            visible: false,
            size,
            revision: 0,
        }
    }

    pub fn kind(&self) -> CursorKind {
        self.kind
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Bumped when the overlay needs a repaint.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn set_kind(&mut self, kind: CursorKind) {
        if self.kind != kind {
            self.kind = kind;
            self.revision += 1;
        }
    }

    pub fn move_to(&mut self, position: Point) {
        if self.position != position || !self.visible {
            self.position = position;
            self.visible = true;
            self.revision += 1;
        }
    }

    pub fn hide(&mut self) {
        if self.visible {
            self.visible = false;
            self.revision += 1;
        }
    }
}
