//! Elsa Render Library
//!
//! Drawer backends, the per-page animation loop and ink snapshot caching for
//! the elsa canvas engine. Everything paints through [`Context2d`]; the
//! software [`PixelCanvas`] is the default surface and the browser canvas is
//! available on wasm32.

pub mod animation;
pub mod context;
pub mod cursor;
pub mod drawer;
pub mod error;
pub mod ink;
pub mod raster;
pub mod session;
pub mod snapshot;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use animation::{AnimationLoop, CallbackId, FrameCallback, FrameStats};
pub use context::{css_color, Context2d};
pub use cursor::CursorCanvas;
pub use drawer::{
    create_drawer, BoxStyle, CanvasDrawer, DrawDriver, DrawOutcome, Drawer, DrawerState, DynamicPainter, HtmlDrawer,
    SvgDrawer, SvgRecorder,
};
pub use error::{RenderError, RenderResult};
pub use ink::InkLayer;
pub use raster::PixelCanvas;
pub use session::{ComposeStats, RenderSession, SyncStats};
pub use snapshot::{Debounce, QuadrantSnapshots};

#[cfg(target_arch = "wasm32")]
pub use web::WebContext2d;
