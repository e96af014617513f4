//! Points, polylines and rings.
//!
//! A [`PointSet`] is the vertex sequence backing one feature part: a
//! polyline for line features, a closed ring for polygons (stored without
//! the duplicate closing vertex). Degenerate input is filtered out at the
//! registration boundary, not here; these routines assume at least the
//! minimum vertex count for the operation invoked.

use cartolabel_core::Aabb;
use robust::{orient2d, Coord};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A 2D point.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Creates a new point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: Point) -> f64 {
        self.distance_sq(other).sqrt()
    }

    /// Squared distance to another point.
    pub fn distance_sq(&self, other: Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Which side of a directed segment a point falls on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
    On,
}

/// Result of a closest-segment query.
#[derive(Debug, Clone, Copy)]
pub struct ClosestSegment {
    /// Index of the segment (between vertex `index` and `index + 1`).
    pub index: usize,
    /// Perpendicular foot point (clamped to the segment).
    pub foot: Point,
    /// Distance from the query point to the foot.
    pub distance: f64,
    /// Side of the directed segment the query point lies on.
    pub side: Side,
}

/// Robust orientation predicate: positive if `c` is left of `a -> b`.
pub fn orientation(a: Point, b: Point, c: Point) -> f64 {
    orient2d(
        Coord { x: a.x, y: a.y },
        Coord { x: b.x, y: b.y },
        Coord { x: c.x, y: c.y },
    )
}

/// Returns the side of the directed segment `a -> b` that `c` lies on.
pub fn side_of(a: Point, b: Point, c: Point) -> Side {
    let orient = orientation(a, b, c);
    if orient > 0.0 {
        Side::Left
    } else if orient < 0.0 {
        Side::Right
    } else {
        Side::On
    }
}

/// Returns true if `p` lies on the closed segment `a -> b`, assuming the
/// three points are collinear.
fn on_segment(a: Point, b: Point, p: Point) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

/// Proper or touching intersection test for segments `a1 -> a2` and `b1 -> b2`.
pub fn segments_intersect(a1: Point, a2: Point, b1: Point, b2: Point) -> bool {
    let d1 = orientation(b1, b2, a1);
    let d2 = orientation(b1, b2, a2);
    let d3 = orientation(a1, a2, b1);
    let d4 = orientation(a1, a2, b2);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    (d1 == 0.0 && on_segment(b1, b2, a1))
        || (d2 == 0.0 && on_segment(b1, b2, a2))
        || (d3 == 0.0 && on_segment(a1, a2, b1))
        || (d4 == 0.0 && on_segment(a1, a2, b2))
}

/// Ray-casting point-in-ring test. The ring is given without a duplicate
/// closing vertex; boundary points count as inside.
pub fn point_in_ring(p: Point, ring: &[Point]) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let a = ring[i];
        let b = ring[j];

        if side_of(a, b, p) == Side::On && on_segment(a, b, p) {
            return true;
        }

        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Returns true if the open path crosses any edge of the ring.
pub fn path_intersects_ring(path: &[Point], ring: &[Point]) -> bool {
    let n = ring.len();
    if n < 3 || path.len() < 2 {
        return false;
    }
    for seg in path.windows(2) {
        let mut j = n - 1;
        for i in 0..n {
            if segments_intersect(seg[0], seg[1], ring[j], ring[i]) {
                return true;
            }
            j = i;
        }
    }
    false
}

/// An ordered sequence of points with a cached bounding box.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PointSet {
    points: Vec<Point>,
    bbox: Aabb,
}

impl PointSet {
    /// Creates a point set, computing its bounding box.
    pub fn new(points: Vec<Point>) -> Self {
        let coords: Vec<(f64, f64)> = points.iter().map(|p| (p.x, p.y)).collect();
        let bbox = Aabb::from_points(&coords).unwrap_or(Aabb::new(0.0, 0.0, 0.0, 0.0));
        Self { points, bbox }
    }

    /// Creates a point set from coordinate pairs.
    pub fn from_coords(coords: Vec<(f64, f64)>) -> Self {
        Self::new(coords.into_iter().map(Point::from).collect())
    }

    /// Returns the number of vertices.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns true if the set has no vertices.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns the vertices.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Returns the cached bounding box.
    pub fn bbox(&self) -> &Aabb {
        &self.bbox
    }

    /// Returns the cumulative polyline length.
    pub fn length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|seg| seg[0].distance(seg[1]))
            .sum()
    }

    /// Shoelace signed area of the ring (positive = counter-clockwise).
    pub fn signed_area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let mut sum = 0.0;
        let mut j = n - 1;
        for i in 0..n {
            sum += self.points[j].x * self.points[i].y - self.points[i].x * self.points[j].y;
            j = i;
        }
        sum / 2.0
    }

    /// Absolute ring area.
    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    /// Ring centroid; falls back to the vertex average for degenerate rings.
    pub fn centroid(&self) -> Point {
        let n = self.points.len();
        if n == 0 {
            return Point::default();
        }
        let signed = self.signed_area();
        if signed.abs() < 1e-12 {
            let sum = self
                .points
                .iter()
                .fold((0.0, 0.0), |acc, p| (acc.0 + p.x, acc.1 + p.y));
            return Point::new(sum.0 / n as f64, sum.1 / n as f64);
        }

        let mut cx = 0.0;
        let mut cy = 0.0;
        let mut j = n - 1;
        for i in 0..n {
            let cross =
                self.points[j].x * self.points[i].y - self.points[i].x * self.points[j].y;
            cx += (self.points[j].x + self.points[i].x) * cross;
            cy += (self.points[j].y + self.points[i].y) * cross;
            j = i;
        }
        Point::new(cx / (6.0 * signed), cy / (6.0 * signed))
    }

    /// Finds the segment closest to `p`.
    ///
    /// Returns `None` for sets with fewer than two vertices (the degenerate
    /// single-point sentinel).
    pub fn closest_segment(&self, p: Point) -> Option<ClosestSegment> {
        if self.points.len() < 2 {
            return None;
        }

        let mut best: Option<ClosestSegment> = None;
        for (index, seg) in self.points.windows(2).enumerate() {
            let (a, b) = (seg[0], seg[1]);
            let len_sq = a.distance_sq(b);
            if len_sq < 1e-24 {
                // Zero-length segment, nothing to project onto.
                continue;
            }
            let t = (((p.x - a.x) * (b.x - a.x) + (p.y - a.y) * (b.y - a.y)) / len_sq)
                .clamp(0.0, 1.0);
            let foot = Point::new(a.x + t * (b.x - a.x), a.y + t * (b.y - a.y));
            let distance = p.distance(foot);

            if best.map_or(true, |b_| distance < b_.distance) {
                best = Some(ClosestSegment {
                    index,
                    foot,
                    distance,
                    side: side_of(a, b, p),
                });
            }
        }
        best
    }

    /// Returns the point at arc-length `dist` from the start of the
    /// polyline, or `None` if `dist` is negative or past the end.
    pub fn point_along(&self, dist: f64) -> Option<Point> {
        self.placement_at(dist).map(|(p, _)| p)
    }

    /// Returns the point and local tangent angle at arc-length `dist`.
    ///
    /// This is the primitive behind curved label placement: the angle is
    /// that of the segment containing the offset.
    pub fn placement_at(&self, dist: f64) -> Option<(Point, f64)> {
        if dist < 0.0 || self.points.len() < 2 {
            return None;
        }

        let mut remaining = dist;
        for seg in self.points.windows(2) {
            let (a, b) = (seg[0], seg[1]);
            let seg_len = a.distance(b);
            if seg_len < 1e-12 {
                continue;
            }
            if remaining <= seg_len {
                let t = remaining / seg_len;
                let p = Point::new(a.x + t * (b.x - a.x), a.y + t * (b.y - a.y));
                let angle = (b.y - a.y).atan2(b.x - a.x);
                return Some((p, angle));
            }
            remaining -= seg_len;
        }

        // Within tolerance of the total length: snap to the end.
        if remaining < 1e-9 {
            let last = *self.points.last()?;
            let prev = self.points[self.points.len() - 2];
            let angle = (last.y - prev.y).atan2(last.x - prev.x);
            return Some((last, angle));
        }
        None
    }

    /// Point-in-polygon with holes subtracted. `self` is the exterior ring.
    pub fn contains(&self, p: Point, holes: &[PointSet]) -> bool {
        if !self.bbox.contains_point(p.x, p.y) {
            return false;
        }
        if !point_in_ring(p, &self.points) {
            return false;
        }
        !holes.iter().any(|hole| point_in_ring(p, hole.points()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square() -> PointSet {
        PointSet::from_coords(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)])
    }

    #[test]
    fn test_bbox() {
        let set = PointSet::from_coords(vec![(1.0, 2.0), (5.0, -3.0), (2.0, 8.0)]);
        let bbox = set.bbox();
        assert_relative_eq!(bbox.min_x, 1.0);
        assert_relative_eq!(bbox.min_y, -3.0);
        assert_relative_eq!(bbox.max_x, 5.0);
        assert_relative_eq!(bbox.max_y, 8.0);
    }

    #[test]
    fn test_area_and_length() {
        let set = square();
        assert_relative_eq!(set.area(), 100.0);
        // Open polyline length: three edges
        assert_relative_eq!(set.length(), 30.0);
    }

    #[test]
    fn test_centroid() {
        let c = square().centroid();
        assert_relative_eq!(c.x, 5.0, epsilon = 1e-9);
        assert_relative_eq!(c.y, 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_closest_segment() {
        let line = PointSet::from_coords(vec![(0.0, 0.0), (10.0, 0.0)]);
        let hit = line.closest_segment(Point::new(5.0, 3.0)).unwrap();
        assert_eq!(hit.index, 0);
        assert_relative_eq!(hit.foot.x, 5.0);
        assert_relative_eq!(hit.foot.y, 0.0);
        assert_relative_eq!(hit.distance, 3.0);
        assert_eq!(hit.side, Side::Left);

        let below = line.closest_segment(Point::new(5.0, -3.0)).unwrap();
        assert_eq!(below.side, Side::Right);

        // Degenerate single-point set returns the sentinel
        let single = PointSet::from_coords(vec![(1.0, 1.0)]);
        assert!(single.closest_segment(Point::new(0.0, 0.0)).is_none());
    }

    #[test]
    fn test_point_in_ring() {
        let ring = square();
        assert!(point_in_ring(Point::new(5.0, 5.0), ring.points()));
        assert!(!point_in_ring(Point::new(15.0, 5.0), ring.points()));
        // Boundary counts as inside
        assert!(point_in_ring(Point::new(0.0, 5.0), ring.points()));
    }

    #[test]
    fn test_contains_with_hole() {
        let outer = square();
        let hole =
            PointSet::from_coords(vec![(4.0, 4.0), (6.0, 4.0), (6.0, 6.0), (4.0, 6.0)]);

        assert!(outer.contains(Point::new(2.0, 2.0), &[hole.clone()]));
        assert!(!outer.contains(Point::new(5.0, 5.0), &[hole]));
    }

    #[test]
    fn test_segments_intersect() {
        let a1 = Point::new(0.0, 0.0);
        let a2 = Point::new(10.0, 10.0);
        let b1 = Point::new(0.0, 10.0);
        let b2 = Point::new(10.0, 0.0);
        assert!(segments_intersect(a1, a2, b1, b2));

        let c1 = Point::new(20.0, 20.0);
        let c2 = Point::new(30.0, 20.0);
        assert!(!segments_intersect(a1, a2, c1, c2));

        // Shared endpoint counts as touching
        assert!(segments_intersect(a1, a2, a2, c1));
    }

    #[test]
    fn test_path_intersects_ring() {
        let ring = square();
        let crossing = vec![Point::new(-5.0, 5.0), Point::new(15.0, 5.0)];
        assert!(path_intersects_ring(&crossing, ring.points()));

        let inside = vec![Point::new(2.0, 2.0), Point::new(8.0, 8.0)];
        assert!(!path_intersects_ring(&inside, ring.points()));
    }

    #[test]
    fn test_placement_at() {
        let line = PointSet::from_coords(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);

        let (p, angle) = line.placement_at(5.0).unwrap();
        assert_relative_eq!(p.x, 5.0);
        assert_relative_eq!(p.y, 0.0);
        assert_relative_eq!(angle, 0.0);

        let (p, angle) = line.placement_at(15.0).unwrap();
        assert_relative_eq!(p.x, 10.0);
        assert_relative_eq!(p.y, 5.0);
        assert_relative_eq!(angle, std::f64::consts::FRAC_PI_2);

        assert!(line.placement_at(25.0).is_none());
        assert!(line.placement_at(-1.0).is_none());
    }
}
