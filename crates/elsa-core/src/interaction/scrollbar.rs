//! Scrollbars derived from the shapes' union bounds and the viewport.

use kurbo::{Rect, Size, Vec2};

use crate::page::Page;

/// Shortest thumb, in screen pixels.
const MIN_THUMB: f64 = 16.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// One scrollbar in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scrollbar {
    pub orientation: Orientation,
    pub track: Rect,
    pub thumb: Rect,
    /// Logical extent covered by the whole track.
    content_length: f64,
}

impl Scrollbar {
    fn track_length(&self) -> f64 {
        match self.orientation {
            Orientation::Horizontal => self.track.width(),
            Orientation::Vertical => self.track.height(),
        }
    }

    /// Logical pan that corresponds to dragging the thumb by `screen_delta` pixels.
    pub fn pan_for_thumb_drag(&self, screen_delta: f64) -> Vec2 {
        let track = self.track_length();
        if track <= 0.0 {
            return Vec2::ZERO;
        }
        // Moving the thumb forward shows content further along, i.e. pans backwards.
        let logical = -screen_delta / track * self.content_length;
        match self.orientation {
            Orientation::Horizontal => Vec2::new(logical, 0.0),
            Orientation::Vertical => Vec2::new(0.0, logical),
        }
    }
}

/// Horizontal and vertical scrollbars for the page.
///
/// A bar is `None` when the content fits the viewport along its axis.
pub fn compute_scrollbars(page: &Page, viewport: Size, thickness: f64) -> (Option<Scrollbar>, Option<Scrollbar>) {
    let visible = page.visible_rect(viewport);
    let content = page.bounds().map_or(visible, |b| b.union(visible));

    let horizontal = bar(
        Orientation::Horizontal,
        Rect::new(0.0, viewport.height - thickness, viewport.width - thickness, viewport.height),
        visible.x0 - content.x0,
        visible.width(),
        content.width(),
    );
    let vertical = bar(
        Orientation::Vertical,
        Rect::new(viewport.width - thickness, 0.0, viewport.width, viewport.height - thickness),
        visible.y0 - content.y0,
        visible.height(),
        content.height(),
    );
    (horizontal, vertical)
}

fn bar(orientation: Orientation, track: Rect, offset: f64, visible: f64, content: f64) -> Option<Scrollbar> {
    if content <= 0.0 || visible >= content - f64::EPSILON {
        return None;
    }
    let track_len = match orientation {
        Orientation::Horizontal => track.width(),
        Orientation::Vertical => track.height(),
    };
    if track_len <= 0.0 {
        return None;
    }
    let thumb_len = (visible / content * track_len).clamp(MIN_THUMB.min(track_len), track_len);
    let start = (offset / content * track_len).clamp(0.0, track_len - thumb_len);
    let thumb = match orientation {
        Orientation::Horizontal => Rect::new(track.x0 + start, track.y0, track.x0 + start + thumb_len, track.y1),
        Orientation::Vertical => Rect::new(track.x0, track.y0 + start, track.x1, track.y0 + start + thumb_len),
    };
    Some(Scrollbar {
        orientation,
        track,
        thumb,
        content_length: content,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::Shape;

    #[test]
    fn test_no_bars_when_content_fits() {
        let mut page = Page::new();
        page.add_shape(Shape::rectangle(10.0, 10.0, 100.0, 100.0));
        let (h, v) = compute_scrollbars(&page, Size::new(800.0, 600.0), 8.0);
        assert!(h.is_none());
        assert!(v.is_none());
    }

    #[test]
    fn test_horizontal_bar_for_wide_content() {
        let mut page = Page::new();
        page.add_shape(Shape::rectangle(0.0, 0.0, 1600.0, 100.0));
        let (h, v) = compute_scrollbars(&page, Size::new(800.0, 600.0), 8.0);
        let h = h.unwrap();
        assert!(v.is_none());
        // Half of the content is visible.
        assert!((h.thumb.width() - 396.0).abs() < 1e-9);
        assert!(h.thumb.x0.abs() < 1e-9);
    }

    #[test]
    fn test_thumb_follows_pan() {
        let mut page = Page::new();
        page.add_shape(Shape::rectangle(0.0, 0.0, 1600.0, 100.0));
        page.set_pan(-800.0, 0.0);
        let (h, _) = compute_scrollbars(&page, Size::new(800.0, 600.0), 8.0);
        let h = h.unwrap();
        assert!((h.thumb.x1 - h.track.x1).abs() < 1e-9);
    }

    #[test]
    fn test_thumb_drag_pans() {
        let mut page = Page::new();
        page.add_shape(Shape::rectangle(0.0, 0.0, 1600.0, 100.0));
        let viewport = Size::new(800.0, 600.0);
        let (h, _) = compute_scrollbars(&page, viewport, 8.0);
        let pan = h.unwrap().pan_for_thumb_drag(79.2);
        page.pan(pan);
        assert!((page.x() + 160.0).abs() < 1e-9);
    }
}
