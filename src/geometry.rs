//! Polygon geometry for ROI measurement.
//!
//! Pure functions over image-space points:
//! - polygon area (shoelace formula)
//! - minimum perimeter distance between two polygons
//! - pointer to image-space mapping

use serde::{Deserialize, Serialize};

use crate::constants::MIN_ROI_VERTICES;

/// A 2D point in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Area of a simple polygon using the shoelace formula.
///
/// The polygon is implicitly closed. Returns 0 for fewer than 3 vertices.
pub fn polygon_area(points: &[Point]) -> f64 {
    if points.len() < MIN_ROI_VERTICES {
        return 0.0;
    }

    let n = points.len();
    let mut sum = 0.0;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        sum += a.x * b.y - b.x * a.y;
    }
    (sum / 2.0).abs()
}

/// Distance from `p` to the segment `a`-`b`.
///
/// Projects `p` onto the segment's line and clamps the projection parameter
/// to [0, 1]. A degenerate segment measures distance to `a`.
pub fn point_segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let cx = b.x - a.x;
    let cy = b.y - a.y;
    let len_sq = cx * cx + cy * cy;

    let t = if len_sq > 0.0 {
        (((p.x - a.x) * cx + (p.y - a.y) * cy) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };

    p.distance_to(&Point::new(a.x + t * cx, a.y + t * cy))
}

/// Smallest distance from any vertex of `from` to any edge of `to`.
fn directed_min_distance(from: &[Point], to: &[Point]) -> f64 {
    let n = to.len();
    let mut min = f64::INFINITY;
    for p in from {
        for j in 0..n {
            let d = point_segment_distance(*p, to[j], to[(j + 1) % n]);
            min = min.min(d);
        }
    }
    min
}

/// Minimum perimeter distance between two polygons.
///
/// Considers every (vertex of A, edge of B) and (vertex of B, edge of A) pair,
/// so the cost is O(n·m). Returns `None` if either polygon has fewer than
/// 2 vertices.
pub fn min_distance(a: &[Point], b: &[Point]) -> Option<f64> {
    if a.len() < 2 || b.len() < 2 {
        return None;
    }

    let d = directed_min_distance(a, b).min(directed_min_distance(b, a));
    d.is_finite().then_some(d)
}

/// Nearest-neighbour distance for each polygon in `polygons`.
///
/// Entry `i` is the minimum of `min_distance(polygons[i], polygons[j])` over
/// all `j != i`, or `None` when no other polygon is measurable.
/// O(N²·n·m); fine for tens of ROIs.
pub fn nearest_neighbor_distances(polygons: &[&[Point]]) -> Vec<Option<f64>> {
    polygons
        .iter()
        .enumerate()
        .map(|(i, poly)| {
            polygons
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .filter_map(|(_, other)| min_distance(poly, other))
                .reduce(f64::min)
        })
        .collect()
}

/// Map a pointer position into image space given the viewport offset and scale.
///
/// `(pointer - offset) / scale`, componentwise.
pub fn to_image_space(pointer: Point, offset: Point, scale: f64) -> Point {
    Point::new((pointer.x - offset.x) / scale, (pointer.y - offset.y) / scale)
}
