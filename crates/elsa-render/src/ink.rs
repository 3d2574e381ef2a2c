//! Painting freehand ink.
//!
//! Strokes are painted host by host. Each host gets its own layer so the
//! pixel-erase regions recorded on it only remove that host's ink.

use kurbo::Rect;

use elsa_core::geometry::is_rect_interact_rect;
use elsa_core::ink::{LiveStroke, Stroke};
use elsa_core::page::Page;
use elsa_core::shapes::ShapeId;

use crate::context::Context2d;

/// Which strokes a pass paints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InkLayer {
    /// Everything not selected; cached in the quadrant snapshots.
    Static,
    /// Selected strokes, repainted every frame while they move.
    Selected,
}

impl InkLayer {
    fn includes(self, stroke: &Stroke) -> bool {
        match self {
            InkLayer::Static => !stroke.is_selected(),
            InkLayer::Selected => stroke.is_selected(),
        }
    }
}

/// Paint the strokes of one layer in logical coordinates.
///
/// Strokes whose bound misses `clip` are skipped. Returns the number of
/// strokes painted.
pub fn paint_strokes(ctx: &mut dyn Context2d, page: &mut Page, layer: InkLayer, clip: Option<Rect>) -> usize {
    let mut painted = 0;
    let mut open: Option<(ShapeId, Vec<Rect>)> = None;

    page.for_each_stroke_path(|host, stroke, path| {
        if !layer.includes(stroke) {
            return;
        }
        if clip.is_some_and(|clip| !is_rect_interact_rect(clip, stroke.bound())) {
            return;
        }
        if open.as_ref().map(|(id, _)| *id) != Some(host.id()) {
            if let Some((_, regions)) = open.take() {
                close_host(ctx, &regions);
            }
            let regions = host.as_free_line().map(|h| h.erased_regions().to_vec()).unwrap_or_default();
            ctx.push_layer();
            open = Some((host.id(), regions));
        }
        ctx.save();
        ctx.set_global_alpha(stroke.alpha);
        ctx.stroke_path(path, stroke.color.into(), stroke.width);
        ctx.restore();
        painted += 1;
    });

    if let Some((_, regions)) = open {
        close_host(ctx, &regions);
    }
    painted
}

fn close_host(ctx: &mut dyn Context2d, regions: &[Rect]) {
    for region in regions {
        ctx.clear_rect(*region);
    }
    ctx.pop_layer();
}

/// Paint the stroke being drawn.
pub fn paint_live(ctx: &mut dyn Context2d, live: &LiveStroke) {
    if live.points().is_empty() {
        return;
    }
    ctx.save();
    ctx.set_global_alpha(live.alpha());
    ctx.stroke_path(live.path(), live.color().into(), live.width());
    ctx.restore();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::PixelCanvas;
    use elsa_core::config::InkConfig;
    use elsa_core::ink::{FreehandEngine, PenMode};
    use kurbo::Point;

    fn draw_line(engine: &mut FreehandEngine, page: &mut Page, mode: PenMode, y: f64) {
        engine.begin(page, mode, Point::new(0.0, y));
        for i in 1..=20 {
            engine.drag(page, Point::new(i as f64 * 2.0, y));
        }
        engine.done(page);
    }

    #[test]
    fn test_static_and_selected_layers_split() {
        let mut page = Page::new();
        let mut engine = FreehandEngine::new(InkConfig::default());
        draw_line(&mut engine, &mut page, PenMode::Pen, 10.0);
        draw_line(&mut engine, &mut page, PenMode::Pen, 30.0);
        engine.select_in_rect(&mut page, Rect::new(-5.0, 25.0, 60.0, 35.0));
        engine.commit_selection(&mut page);

        let mut canvas = PixelCanvas::new(64, 48);
        assert_eq!(paint_strokes(&mut canvas, &mut page, InkLayer::Static, None), 1);
        assert_eq!(canvas.alpha_at(20, 10), Some(255));
        assert_eq!(canvas.alpha_at(20, 30), Some(0));

        let mut selected = PixelCanvas::new(64, 48);
        assert_eq!(paint_strokes(&mut selected, &mut page, InkLayer::Selected, None), 1);
        assert_eq!(selected.alpha_at(20, 30), Some(255));
    }

    #[test]
    fn test_clip_skips_strokes_outside() {
        let mut page = Page::new();
        let mut engine = FreehandEngine::new(InkConfig::default());
        draw_line(&mut engine, &mut page, PenMode::Pen, 10.0);
        let mut canvas = PixelCanvas::new(64, 48);
        let clip = Rect::new(0.0, 100.0, 50.0, 150.0);
        assert_eq!(paint_strokes(&mut canvas, &mut page, InkLayer::Static, Some(clip)), 0);
    }

    #[test]
    fn test_erased_regions_clear_only_their_host() {
        let mut page = Page::new();
        let mut engine = FreehandEngine::new(InkConfig::default());
        draw_line(&mut engine, &mut page, PenMode::Solid, 10.0);
        engine.begin_erase();
        engine.erase_at(&mut page, Point::new(20.0, 10.0));
        engine.end_erase(&mut page);
        // Drawn after the erase, across the erased square, on its own host.
        draw_line(&mut engine, &mut page, PenMode::Pen, 30.0);
        engine.begin(&page, PenMode::Pen, Point::new(20.0, 0.0));
        for i in 1..=10 {
            engine.drag(&page, Point::new(20.0, i as f64 * 4.0));
        }
        engine.done(&mut page);

        let mut canvas = PixelCanvas::new(64, 48);
        paint_strokes(&mut canvas, &mut page, InkLayer::Static, None);
        assert_eq!(canvas.alpha_at(15, 10), Some(0));
        assert_eq!(canvas.alpha_at(5, 10), Some(255));
        assert_eq!(canvas.alpha_at(20, 10), Some(255));
    }

    #[test]
    fn test_live_stroke_painted() {
        let page = Page::new();
        let mut engine = FreehandEngine::new(InkConfig::default());
        engine.begin(&page, PenMode::Pen, Point::new(0.0, 5.0));
        for i in 1..=10 {
            engine.drag(&page, Point::new(i as f64 * 3.0, 5.0));
        }
        let mut canvas = PixelCanvas::new(40, 10);
        paint_live(&mut canvas, engine.live().unwrap());
        assert_eq!(canvas.alpha_at(15, 5), Some(255));
        engine.cancel();
        assert!(engine.live().is_none());
        assert!(page.free_line_hosts().next().is_none());
    }
}
