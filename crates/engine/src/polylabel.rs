//! Pole of inaccessibility.
//!
//! Quadtree refinement over the polygon's bounding box: cells are explored
//! best-first by the largest distance they could still contain, until no
//! cell can beat the current best by more than `precision`.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::pointset::{point_in_ring, Point, PointSet};

struct Cell {
    x: f64,
    y: f64,
    /// Half the cell size.
    h: f64,
    /// Signed distance from the cell center to the polygon boundary
    /// (negative outside).
    d: f64,
    /// Upper bound on the distance within the cell.
    max: f64,
}

impl Cell {
    fn new(x: f64, y: f64, h: f64, exterior: &PointSet, holes: &[PointSet]) -> Self {
        let d = signed_distance(Point::new(x, y), exterior, holes);
        Self {
            x,
            y,
            h,
            d,
            max: d + h * std::f64::consts::SQRT_2,
        }
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.max == other.max
    }
}

impl Eq for Cell {}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cell {
    fn cmp(&self, other: &Self) -> Ordering {
        self.max.partial_cmp(&other.max).unwrap_or(Ordering::Equal)
    }
}

/// Signed distance from `p` to the polygon boundary; positive inside.
fn signed_distance(p: Point, exterior: &PointSet, holes: &[PointSet]) -> f64 {
    let mut min_dist = f64::INFINITY;

    for ring in std::iter::once(exterior).chain(holes.iter()) {
        let points = ring.points();
        let n = points.len();
        if n < 2 {
            continue;
        }
        let mut j = n - 1;
        for i in 0..n {
            min_dist = min_dist.min(segment_distance(p, points[j], points[i]));
            j = i;
        }
    }

    let inside = point_in_ring(p, exterior.points())
        && !holes.iter().any(|h| point_in_ring(p, h.points()));
    if inside {
        min_dist
    } else {
        -min_dist
    }
}

/// Distance from a point to a closed segment.
fn segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let len_sq = a.distance_sq(b);
    if len_sq < 1e-24 {
        return p.distance(a);
    }
    let t = (((p.x - a.x) * (b.x - a.x) + (p.y - a.y) * (b.y - a.y)) / len_sq).clamp(0.0, 1.0);
    p.distance(Point::new(a.x + t * (b.x - a.x), a.y + t * (b.y - a.y)))
}

/// Computes the pole of inaccessibility of a polygon with holes.
///
/// Returns the interior point farthest from the boundary and that distance.
/// Falls back to the centroid for degenerate rings.
pub fn pole_of_inaccessibility(
    exterior: &PointSet,
    holes: &[PointSet],
    precision: f64,
) -> (Point, f64) {
    let bbox = exterior.bbox();
    let width = bbox.width();
    let height = bbox.height();
    let cell_size = width.min(height);

    if cell_size <= 0.0 || exterior.len() < 3 {
        let c = exterior.centroid();
        return (c, signed_distance(c, exterior, holes).max(0.0));
    }

    let precision = precision.max(cell_size * 1e-4);
    let mut h = cell_size / 2.0;
    let mut queue = BinaryHeap::new();

    // Initial grid cover
    let mut x = bbox.min_x;
    while x < bbox.max_x {
        let mut y = bbox.min_y;
        while y < bbox.max_y {
            queue.push(Cell::new(x + h, y + h, h, exterior, holes));
            y += cell_size;
        }
        x += cell_size;
    }

    // Seed with the centroid and the bbox center
    let centroid = exterior.centroid();
    let mut best = Cell::new(centroid.x, centroid.y, 0.0, exterior, holes);
    let center_cell = Cell::new(
        (bbox.min_x + bbox.max_x) / 2.0,
        (bbox.min_y + bbox.max_y) / 2.0,
        0.0,
        exterior,
        holes,
    );
    if center_cell.d > best.d {
        best = center_cell;
    }

    while let Some(cell) = queue.pop() {
        if cell.d > best.d {
            best = Cell::new(cell.x, cell.y, 0.0, exterior, holes);
        }

        if cell.max - best.d <= precision {
            continue;
        }

        h = cell.h / 2.0;
        queue.push(Cell::new(cell.x - h, cell.y - h, h, exterior, holes));
        queue.push(Cell::new(cell.x + h, cell.y - h, h, exterior, holes));
        queue.push(Cell::new(cell.x - h, cell.y + h, h, exterior, holes));
        queue.push(Cell::new(cell.x + h, cell.y + h, h, exterior, holes));
    }

    (Point::new(best.x, best.y), best.d.max(0.0))
}
