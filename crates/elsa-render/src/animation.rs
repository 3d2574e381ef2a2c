//! Per-page animation loop.
//!
//! The host's frame scheduler calls [`AnimationLoop::tick`] once per frame.
//! Every shape flagged for animation gets its dynamic pass, then the page
//! hook and the registered frame callbacks paint into a viewport-sized
//! overlay. A failing callback loses its frame, never the loop.

use std::collections::HashMap;

use kurbo::Size;

use elsa_core::page::Page;
use elsa_core::shapes::ShapeId;

use crate::context::Context2d;
use crate::drawer::DrawDriver;
use crate::error::RenderResult;
use crate::raster::PixelCanvas;

/// Per-frame paint callback. The context is set up in logical page
/// coordinates.
pub type FrameCallback = Box<dyn FnMut(&mut dyn Context2d, &Page, u64) -> RenderResult<()>>;

/// Handle returned by [`AnimationLoop::on_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frame: u64,
    /// Shapes flagged for animation.
    pub animated: usize,
    /// Dynamic passes that painted.
    pub painted: usize,
    /// Callbacks that failed this frame.
    pub failed: usize,
}

#[derive(Default)]
pub struct AnimationLoop {
    frame: u64,
    overlay: Option<PixelCanvas>,
    dynamic_hook: Option<FrameCallback>,
    callbacks: Vec<(CallbackId, FrameCallback)>,
    next_id: u64,
}

impl std::fmt::Debug for AnimationLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationLoop")
            .field("frame", &self.frame)
            .field("has_overlay", &self.overlay.is_some())
            .field("has_dynamic_hook", &self.dynamic_hook.is_some())
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

impl AnimationLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// The overlay, once the first animated frame created it.
    pub fn overlay(&self) -> Option<&PixelCanvas> {
        self.overlay.as_ref()
    }

    /// Set or clear the page-level dynamic draw hook.
    pub fn set_dynamic_hook(&mut self, hook: Option<FrameCallback>) {
        self.dynamic_hook = hook;
    }

    /// Register a callback run every frame after the page hook.
    pub fn on_frame(&mut self, callback: impl FnMut(&mut dyn Context2d, &Page, u64) -> RenderResult<()> + 'static) -> CallbackId {
        let id = CallbackId(self.next_id);
        self.next_id += 1;
        self.callbacks.push((id, Box::new(callback)));
        id
    }

    pub fn remove_callback(&mut self, id: CallbackId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(cid, _)| *cid != id);
        self.callbacks.len() != before
    }

    fn has_painters(&self) -> bool {
        self.dynamic_hook.is_some() || !self.callbacks.is_empty()
    }

    /// Run one frame.
    pub fn tick(&mut self, page: &Page, drivers: &mut HashMap<ShapeId, DrawDriver>, viewport: Size) -> FrameStats {
        self.frame += 1;
        let frame = self.frame;
        let mut stats = FrameStats {
            frame,
            ..FrameStats::default()
        };

        for shape in page.shapes_ordered().filter(|s| s.enable_animation) {
            stats.animated += 1;
            if let Some(driver) = drivers.get_mut(&shape.id()) {
                if driver.draw_animation(shape, frame) {
                    stats.painted += 1;
                }
            }
        }

        if stats.animated == 0 && !self.has_painters() {
            return stats;
        }

        let width = viewport.width.ceil().max(0.0) as u32;
        let height = viewport.height.ceil().max(0.0) as u32;
        if width == 0 || height == 0 {
            log::debug!("Animation frame {frame}: zero-size viewport, overlay skipped");
            return stats;
        }
        if self.overlay.is_none() {
            log::debug!("Creating {width}x{height} animation overlay");
        }
        let overlay = self.overlay.get_or_insert_with(|| PixelCanvas::new(width, height));
        overlay.resize(width, height);
        overlay.clear();
        overlay.save();
        overlay.transform(page.view_transform());

        let painters = self.dynamic_hook.iter_mut().chain(self.callbacks.iter_mut().map(|(_, cb)| cb));
        for painter in painters {
            overlay.save();
            let result = painter(&mut *overlay, page, frame);
            overlay.restore();
            if let Err(err) = result {
                log::warn!("Frame callback failed on frame {frame}: {err}");
                stats.failed += 1;
            }
        }
        overlay.restore();
        stats
    }

    /// Drop the overlay and every callback.
    pub fn teardown(&mut self) {
        self.overlay = None;
        self.dynamic_hook = None;
        self.callbacks.clear();
    }
}
