//! The freeLine host: one shape holding many strokes of the same pen mode.

use kurbo::Rect;
use serde::{Deserialize, Serialize};

use super::stroke::{Stroke, StrokeId};
use super::PenMode;

/// Stroke container carried by a freeLine shape.
///
/// A host stays open for the whole drawing session so consecutive strokes of
/// the same pen mode land in the same element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreeLine {
    pub mode: PenMode,
    #[serde(default)]
    pub(crate) strokes: Vec<Stroke>,
    #[serde(skip)]
    pub(crate) open: bool,
    /// Regions cleared by pixel erase, in page coordinates, oldest first.
    #[serde(default)]
    pub(crate) erased: Vec<Rect>,
}

impl FreeLine {
    pub fn new(mode: PenMode) -> Self {
        Self {
            mode,
            strokes: Vec::new(),
            open: true,
            erased: Vec::new(),
        }
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn stroke(&self, id: StrokeId) -> Option<&Stroke> {
        self.strokes.iter().find(|s| s.id == id)
    }

    pub(crate) fn stroke_mut(&mut self, id: StrokeId) -> Option<&mut Stroke> {
        self.strokes.iter_mut().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn erased_regions(&self) -> &[Rect] {
        &self.erased
    }

    /// Union of all stroke bounds, `None` when the host is empty.
    pub fn bounds(&self) -> Option<Rect> {
        self.strokes
            .iter()
            .map(Stroke::bound)
            .reduce(|acc, b| acc.union(b))
    }

    pub fn selected_ids(&self) -> Vec<StrokeId> {
        self.strokes.iter().filter(|s| s.selected).map(|s| s.id).collect()
    }

    pub fn pre_selected_ids(&self) -> Vec<StrokeId> {
        self.strokes.iter().filter(|s| s.pre_selected).map(|s| s.id).collect()
    }

    /// Record a pixel-erase square, keeping the list small.
    ///
    /// A square already covered is dropped, regions the square covers are
    /// replaced, and regions sharing a full edge span with it are merged into
    /// one rectangle. Returns false when nothing changed.
    pub(crate) fn add_erased(&mut self, region: Rect) -> bool {
        if self.erased.iter().any(|r| covers(*r, region)) {
            return false;
        }
        self.erased.retain(|r| !covers(region, *r));
        let mut merged = region;
        while let Some(index) = self.erased.iter().position(|r| joins(*r, merged)) {
            merged = merged.union(self.erased.remove(index));
        }
        self.erased.push(merged);
        true
    }

    pub(crate) fn push(&mut self, stroke: Stroke) {
        self.strokes.push(stroke);
    }

    /// Insert or replace a stroke by id.
    pub(crate) fn upsert(&mut self, stroke: Stroke) {
        match self.stroke_mut(stroke.id) {
            Some(existing) => *existing = stroke,
            None => self.strokes.push(stroke),
        }
    }

    pub(crate) fn remove(&mut self, id: StrokeId) -> Option<Stroke> {
        let index = self.strokes.iter().position(|s| s.id == id)?;
        Some(self.strokes.remove(index))
    }
}

fn covers(outer: Rect, inner: Rect) -> bool {
    outer.x0 <= inner.x0 && outer.y0 <= inner.y0 && inner.x1 <= outer.x1 && inner.y1 <= outer.y1
}

/// Two rectangles whose union is exactly a rectangle.
fn joins(a: Rect, b: Rect) -> bool {
    let same_rows = a.y0 == b.y0 && a.y1 == b.y1 && a.x0 <= b.x1 && b.x0 <= a.x1;
    let same_cols = a.x0 == b.x0 && a.x1 == b.x1 && a.y0 <= b.y1 && b.y0 <= a.y1;
    same_rows || same_cols
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::SerializableColor;
    use kurbo::Point;

    fn stroke(x: f64) -> Stroke {
        Stroke::new(
            vec![Point::new(x, 0.0), Point::new(x + 10.0, 10.0)],
            SerializableColor::black(),
            2.0,
            1.0,
        )
    }

    #[test]
    fn test_empty_host_has_no_bounds() {
        assert!(FreeLine::new(PenMode::Pen).bounds().is_none());
    }

    #[test]
    fn test_bounds_union() {
        let mut host = FreeLine::new(PenMode::Pen);
        host.push(stroke(0.0));
        host.push(stroke(100.0));
        let bounds = host.bounds().unwrap();
        assert!((bounds.x0 + 1.0).abs() < f64::EPSILON);
        assert!((bounds.x1 - 111.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_upsert_replaces_by_id() {
        let mut host = FreeLine::new(PenMode::Pen);
        let original = stroke(0.0);
        let id = original.id();
        host.push(original);

        let replacement = stroke(50.0).with_id(id);
        host.upsert(replacement);
        assert_eq!(host.len(), 1);
        assert!((host.stroke(id).unwrap().points()[0].x - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_remove_missing_is_none() {
        let mut host = FreeLine::new(PenMode::Pen);
        assert!(host.remove(uuid::Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_erase_regions_coalesce() {
        let mut host = FreeLine::new(PenMode::Solid);
        assert!(host.add_erased(Rect::new(0.0, 0.0, 20.0, 20.0)));
        // Repeating a sample changes nothing.
        assert!(!host.add_erased(Rect::new(0.0, 0.0, 20.0, 20.0)));
        assert!(!host.add_erased(Rect::new(5.0, 5.0, 15.0, 15.0)));

        // A horizontal drag grows one strip.
        for x in [5.0, 10.0, 15.0, 20.0] {
            assert!(host.add_erased(Rect::new(x, 0.0, x + 20.0, 20.0)));
        }
        assert_eq!(host.erased_regions(), &[Rect::new(0.0, 0.0, 40.0, 20.0)]);

        // Off-row squares stay separate; a covering square swallows them.
        host.add_erased(Rect::new(50.0, 3.0, 70.0, 23.0));
        assert_eq!(host.erased_regions().len(), 2);
        host.add_erased(Rect::new(-10.0, -10.0, 80.0, 30.0));
        assert_eq!(host.erased_regions(), &[Rect::new(-10.0, -10.0, 80.0, 30.0)]);
    }

    #[test]
    fn test_deserialized_host_is_closed() {
        let host = FreeLine::new(PenMode::Solid);
        let json = serde_json::to_string(&host).unwrap();
        let back: FreeLine = serde_json::from_str(&json).unwrap();
        assert!(!back.is_open());
        assert_eq!(back.mode, PenMode::Solid);
    }
}
