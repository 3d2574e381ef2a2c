//! Page-scoped cache of built stroke paths.

use std::collections::HashMap;

use kurbo::BezPath;

use super::stroke::{Stroke, StrokeId};

/// Lazily built vector paths keyed by stroke id.
///
/// Entries are deleted whenever the stroke's points change and rebuilt on
/// the next draw; they are never patched in place.
#[derive(Debug, Clone, Default)]
pub struct PathCache {
    paths: HashMap<StrokeId, BezPath>,
    builds: u64,
}

impl PathCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the cached path for a stroke, building it on first use.
    pub fn get_or_build(&mut self, stroke: &Stroke) -> &BezPath {
        let builds = &mut self.builds;
        self.paths.entry(stroke.id()).or_insert_with(|| {
            *builds += 1;
            stroke.to_path()
        })
    }

    pub fn contains(&self, id: StrokeId) -> bool {
        self.paths.contains_key(&id)
    }

    /// Delete the cached path for a stroke.
    pub fn invalidate(&mut self, id: StrokeId) {
        self.paths.remove(&id);
    }

    pub fn clear(&mut self) {
        self.paths.clear();
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Total number of paths built since creation.
    pub fn builds(&self) -> u64 {
        self.builds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::SerializableColor;
    use kurbo::Point;

    fn stroke() -> Stroke {
        Stroke::new(
            vec![Point::new(0.0, 0.0), Point::new(10.0, 10.0)],
            SerializableColor::black(),
            2.0,
            1.0,
        )
    }

    #[test]
    fn test_builds_once() {
        let mut cache = PathCache::new();
        let stroke = stroke();
        cache.get_or_build(&stroke);
        cache.get_or_build(&stroke);
        assert_eq!(cache.builds(), 1);
        assert!(cache.contains(stroke.id()));
    }

    #[test]
    fn test_invalidate_forces_rebuild() {
        let mut cache = PathCache::new();
        let mut stroke = stroke();
        cache.get_or_build(&stroke);
        stroke.set_points(vec![Point::new(0.0, 0.0), Point::new(50.0, 0.0)]);
        cache.invalidate(stroke.id());
        assert!(!cache.contains(stroke.id()));

        let path = cache.get_or_build(&stroke).clone();
        assert_eq!(cache.builds(), 2);
        assert_eq!(path, stroke.to_path());
    }
}
