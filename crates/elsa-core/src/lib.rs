//! Elsa Core Library
//!
//! Platform-agnostic model and algorithms for the elsa canvas engine: page
//! view mapping and shape store, connector transforms, freehand ink and the
//! interaction surface.

pub mod collaboration;
pub mod config;
pub mod connector;
pub mod geometry;
pub mod ink;
pub mod interaction;
pub mod page;
pub mod shapes;

pub use collaboration::{
    apply_remote, AckCallback, CollabError, CollabMessage, CollabMethod, CollaborationChannel, CommandRecorder,
    FreeLineAction, FreeLineActionKind, ShapeLines,
};
pub use config::{ConfigError, ConnectorConfig, EngineConfig, InkConfig, ViewConfig};
pub use connector::{connectors, hit_test_connector, rotation_angle, Connector, ConnectorDrag, ConnectorKind};
pub use ink::{FreeLine, FreehandEngine, InkCommand, InkOutbox, PenMode, Stroke, StrokeId};
pub use interaction::{CursorKind, CursorOverlay, InteractionMode, InteractionSurface, Modifiers, PointerEvent};
pub use page::{Page, PageId};
pub use shapes::{Container, DrawerKind, SerializableColor, Shape, ShapeGeometry, ShapeId, ShapeKind, ShapeStyle};
