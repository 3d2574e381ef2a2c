//! Zoom toolbar: drag-mode toggle and a non-linear zoom slider.
//!
//! The slider is split at 75: the lower part maps linearly to `[0.5, 1.0]`
//! and the upper part to `[1.5, 6.0]`. Fine control stays near 100% and the
//! far zoom-in range is reached in a few steps.

use kurbo::Point;

use crate::page::Page;

/// Slider position where the two linear ranges meet.
pub const SLIDER_KNEE: f64 = 75.0;
pub const SLIDER_MAX: f64 = 100.0;

const LOW_MIN: f64 = 0.5;
const LOW_MAX: f64 = 1.0;
const HIGH_MIN: f64 = 1.5;
const HIGH_MAX: f64 = 6.0;
/// Slider value that still reads back as 100%.
const BELOW_KNEE: f64 = SLIDER_KNEE - 1e-6;

/// Map a slider value in `[0, 100]` to a zoom scale.
pub fn slider_to_scale(slider: f64) -> f64 {
    let s = slider.clamp(0.0, SLIDER_MAX);
    if s < SLIDER_KNEE {
        LOW_MIN + s / SLIDER_KNEE * (LOW_MAX - LOW_MIN)
    } else {
        HIGH_MIN + (s - SLIDER_KNEE) / (SLIDER_MAX - SLIDER_KNEE) * (HIGH_MAX - HIGH_MIN)
    }
}

/// Slider position for a zoom scale.
///
/// Scales in the gap between the two ranges park at the nearer end: the
/// lower half just below the knee (reading back as 100%), the upper half on
/// the knee itself.
pub fn scale_to_slider(scale: f64) -> f64 {
    if scale < LOW_MAX {
        ((scale - LOW_MIN) / (LOW_MAX - LOW_MIN) * SLIDER_KNEE).max(0.0)
    } else if scale < (LOW_MAX + HIGH_MIN) / 2.0 {
        BELOW_KNEE
    } else if scale < HIGH_MIN {
        SLIDER_KNEE
    } else {
        (SLIDER_KNEE + (scale - HIGH_MIN) / (HIGH_MAX - HIGH_MIN) * (SLIDER_MAX - SLIDER_KNEE)).min(SLIDER_MAX)
    }
}

/// State of the pan/zoom toolbar.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoomToolbar {
    /// While on, every drag pans the page.
    drag_mode: bool,
    slider: f64,
}

impl Default for ZoomToolbar {
    fn default() -> Self {
        Self {
            drag_mode: false,
            slider: scale_to_slider(1.0),
        }
    }
}

impl ZoomToolbar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drag_mode(&self) -> bool {
        self.drag_mode
    }

    pub fn toggle_drag_mode(&mut self) -> bool {
        self.drag_mode = !self.drag_mode;
        self.drag_mode
    }

    pub fn slider(&self) -> f64 {
        self.slider
    }

    /// Move the slider and zoom the page about `anchor` (screen coordinates).
    pub fn set_slider(&mut self, page: &mut Page, value: f64, anchor: Point) {
        self.slider = value.clamp(0.0, SLIDER_MAX);
        let target = slider_to_scale(self.slider);
        page.zoom_at(anchor, target / page.scale_x());
    }

    /// Follow a zoom change made elsewhere (wheel, fit).
    pub fn sync(&mut self, page: &Page) {
        self.slider = scale_to_slider(page.scale_x());
    }

    /// Zoom percentage shown next to the slider.
    pub fn percent(page: &Page) -> u32 {
        (page.scale_x() * 100.0).round() as u32
    }
}
