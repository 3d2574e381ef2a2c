//! Eraser geometry.
//!
//! Two modes exist. Pixel erase clears a square of the raster and never
//! touches stroke points. Geometric erase intersects strokes with a
//! rectangle to decide which strokes a gesture marks as pre-selected, and can
//! optionally cut strokes at the rectangle border.

use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

use crate::geometry::{is_rect_vertex, rect_edges, segment_intersection, GEOMETRY_EPSILON};

/// How an eraser gesture affects ink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EraseMode {
    /// Clear raster pixels under the eraser.
    #[default]
    Pixel,
    /// Mark or remove strokes crossing the eraser rectangle.
    Geometric,
}

/// The square cleared by a pixel erase centered at `center`.
pub fn pixel_region(center: Point, radius: f64) -> Rect {
    Rect::new(
        center.x - radius,
        center.y - radius,
        center.x + radius,
        center.y + radius,
    )
}

/// A stroke point counts as inside when it lies within the rectangle bounds
/// and is not exactly one of its vertices.
pub fn point_inside(point: Point, rect: Rect) -> bool {
    let rect = rect.abs();
    point.x >= rect.x0
        && point.x <= rect.x1
        && point.y >= rect.y0
        && point.y <= rect.y1
        && !is_rect_vertex(point, rect)
}

/// Points where the polyline crosses the rectangle border.
///
/// Crossings that coincide with a rectangle vertex are ignored.
pub fn intersections(points: &[Point], rect: Rect) -> Vec<Point> {
    let edges = rect_edges(rect);
    let mut hits: Vec<Point> = Vec::new();
    for w in points.windows(2) {
        for &(c, d) in &edges {
            let Some(hit) = segment_intersection(w[0], w[1], c, d) else {
                continue;
            };
            if is_rect_vertex(hit, rect) {
                continue;
            }
            let duplicate = hits
                .last()
                .is_some_and(|last| (*last - hit).hypot() < GEOMETRY_EPSILON);
            if !duplicate {
                hits.push(hit);
            }
        }
    }
    hits
}

/// Cut a polyline into the pieces lying outside `rect`.
///
/// Pieces shorter than two points are dropped.
pub fn split_outside(points: &[Point], rect: Rect) -> Vec<Vec<Point>> {
    let rect = rect.abs();
    let inside = |p: Point| p.x > rect.x0 && p.x < rect.x1 && p.y > rect.y0 && p.y < rect.y1;
    let edges = rect_edges(rect);

    let mut pieces = Vec::new();
    let mut current: Vec<Point> = Vec::new();
    if let Some(first) = points.first() {
        if !inside(*first) {
            current.push(*first);
        }
    }

    for w in points.windows(2) {
        let (a, b) = (w[0], w[1]);
        let mut cuts: Vec<Point> = edges
            .iter()
            .filter_map(|&(c, d)| segment_intersection(a, b, c, d))
            .collect();
        cuts.sort_by(|p, q| (*p - a).hypot2().total_cmp(&(*q - a).hypot2()));

        let mut from = a;
        for to in cuts.into_iter().chain(std::iter::once(b)) {
            if (to - from).hypot() < GEOMETRY_EPSILON {
                continue;
            }
            if inside(from.midpoint(to)) {
                if current.len() >= 2 {
                    pieces.push(std::mem::take(&mut current));
                } else {
                    current.clear();
                }
            } else {
                if current.is_empty() {
                    current.push(from);
                }
                current.push(to);
            }
            from = to;
        }
    }
    if current.len() >= 2 {
        pieces.push(current);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eraser_rect() -> Rect {
        Rect::new(0.0, 0.0, 10.0, 10.0)
    }

    #[test]
    fn test_outside_stroke_has_no_intersections() {
        let points = [Point::new(20.0, 0.0), Point::new(30.0, 5.0), Point::new(40.0, 0.0)];
        assert!(intersections(&points, eraser_rect()).is_empty());
    }

    #[test]
    fn test_single_edge_crossing() {
        let points = [Point::new(-10.0, 5.0), Point::new(5.0, 5.0)];
        let hits = intersections(&points, eraser_rect());
        assert_eq!(hits.len(), 1);
        assert!(hits[0].x.abs() < 1e-9);
        assert!((hits[0].y - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_vertex_crossing_is_ignored() {
        // Diagonal passing exactly through the top-left corner.
        let points = [Point::new(-5.0, -5.0), Point::new(5.0, 5.0)];
        assert!(intersections(&points, eraser_rect()).is_empty());
    }

    #[test]
    fn test_point_inside_excludes_vertices() {
        let rect = eraser_rect();
        assert!(point_inside(Point::new(5.0, 5.0), rect));
        assert!(point_inside(Point::new(0.0, 5.0), rect));
        assert!(!point_inside(Point::new(0.0, 0.0), rect));
        assert!(!point_inside(Point::new(11.0, 5.0), rect));
    }

    #[test]
    fn test_pixel_region_is_twice_radius() {
        let region = pixel_region(Point::new(50.0, 50.0), 10.0);
        assert!((region.width() - 20.0).abs() < f64::EPSILON);
        assert!((region.center().x - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_split_through_middle() {
        let points = [Point::new(-10.0, 5.0), Point::new(20.0, 5.0)];
        let pieces = split_outside(&points, eraser_rect());
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0], vec![Point::new(-10.0, 5.0), Point::new(0.0, 5.0)]);
        assert_eq!(pieces[1], vec![Point::new(10.0, 5.0), Point::new(20.0, 5.0)]);
    }

    #[test]
    fn test_split_fully_inside_removes_everything() {
        let points = [Point::new(2.0, 2.0), Point::new(8.0, 8.0)];
        assert!(split_outside(&points, eraser_rect()).is_empty());
    }

    #[test]
    fn test_split_untouched_stroke_is_kept() {
        let points = [Point::new(20.0, 0.0), Point::new(30.0, 0.0), Point::new(40.0, 0.0)];
        let pieces = split_outside(&points, eraser_rect());
        assert_eq!(pieces, vec![points.to_vec()]);
    }
}
