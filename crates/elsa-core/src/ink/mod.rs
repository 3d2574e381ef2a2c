//! Freehand ink: capture, smoothing, hosting, erasing and editing of strokes.

pub mod engine;
pub mod eraser;
mod host;
mod path_cache;
pub mod smoothing;
mod stroke;
pub mod transform;

pub use engine::{FreehandEngine, InkCommand, InkOutbox, LiveStroke};
pub use eraser::EraseMode;
pub use host::FreeLine;
pub use path_cache::PathCache;
pub use smoothing::SampleBuffer;
pub use stroke::{build_path, Stroke, StrokeId};
pub use transform::StrokeGroupTransform;

use serde::{Deserialize, Serialize};

use crate::config::InkConfig;
use crate::shapes::SerializableColor;

/// Pen used for a drawing session. Each mode gets its own host shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenMode {
    #[default]
    Pen,
    /// Wide translucent strokes.
    Highlighter,
    /// Ink pen; its eraser clears pixels instead of strokes.
    Solid,
}

impl PenMode {
    /// Eraser behavior for hosts drawn with this pen.
    pub fn erase_mode(self) -> EraseMode {
        match self {
            PenMode::Solid => EraseMode::Pixel,
            PenMode::Pen | PenMode::Highlighter => EraseMode::Geometric,
        }
    }

    /// Color, width and alpha for a new stroke.
    pub fn stroke_style(self, config: &InkConfig) -> (SerializableColor, f64, f64) {
        match self {
            PenMode::Pen | PenMode::Solid => (config.pen_color, config.pen_width, 1.0),
            PenMode::Highlighter => (
                config.pen_color,
                config.pen_width * config.highlighter_width_factor,
                config.highlighter_alpha,
            ),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PenMode::Pen => "pen",
            PenMode::Highlighter => "highlighter",
            PenMode::Solid => "solid",
        }
    }
}
