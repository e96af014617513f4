//! Candidate label positions.
//!
//! A [`LabelPosition`] is one possible placement of a label: an oriented
//! box (origin, dimensions, rotation) with a cost in [0, 1]. Curved
//! candidates carry one sub-box per character; the whole group is accepted
//! or rejected as a unit.

use cartolabel_core::Aabb;

use crate::pointset::Point;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One character box of a curved candidate.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CharBox {
    /// Box origin x (character baseline start).
    pub x: f64,
    /// Box origin y.
    pub y: f64,
    /// Character rotation in radians.
    pub angle: f64,
    /// Character advance width.
    pub width: f64,
    /// Character box height.
    pub height: f64,
}

impl CharBox {
    fn corners(&self) -> [Point; 4] {
        box_corners(self.x, self.y, self.width, self.height, self.angle)
    }
}

/// A candidate placement for one feature part.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LabelPosition {
    /// Global candidate id, assigned when the candidate is pooled.
    pub id: usize,

    /// Labeling unit (feature part) this candidate belongs to; candidates
    /// of the same unit are mutually exclusive by construction.
    pub unit: usize,

    /// Feature id, for reporting.
    pub feature: String,

    /// Box origin x (lower-left corner before rotation).
    pub x: f64,

    /// Box origin y.
    pub y: f64,

    /// Box width.
    pub width: f64,

    /// Box height.
    pub height: f64,

    /// Rotation in radians, counter-clockwise around the origin.
    pub angle: f64,

    /// Placement cost in [0, 1]; lower is better.
    pub cost: f64,

    /// Per-character boxes for curved candidates (empty otherwise).
    pub chars: Vec<CharBox>,
}

impl LabelPosition {
    /// Creates a candidate; the cost is clamped into [0, 1].
    pub fn new(feature: impl Into<String>, x: f64, y: f64, width: f64, height: f64, angle: f64, cost: f64) -> Self {
        Self {
            id: 0,
            unit: 0,
            feature: feature.into(),
            x,
            y,
            width,
            height,
            angle,
            cost: cost.clamp(0.0, 1.0),
            chars: Vec::new(),
        }
    }

    /// Attaches curved character boxes.
    pub fn with_chars(mut self, chars: Vec<CharBox>) -> Self {
        self.chars = chars;
        self
    }

    /// Adds a cost surcharge, keeping the total in [0, 1].
    pub fn add_cost(&mut self, surcharge: f64) {
        self.cost = (self.cost + surcharge).clamp(0.0, 1.0);
    }

    /// Corners of the oriented label box.
    pub fn corners(&self) -> [Point; 4] {
        box_corners(self.x, self.y, self.width, self.height, self.angle)
    }

    /// All oriented boxes of this candidate: the label box, or one box per
    /// character for curved candidates.
    fn boxes(&self) -> Vec<[Point; 4]> {
        if self.chars.is_empty() {
            vec![self.corners()]
        } else {
            self.chars.iter().map(|c| c.corners()).collect()
        }
    }

    /// Axis-aligned bounding box over all oriented boxes.
    pub fn bbox(&self) -> Aabb {
        let mut bbox: Option<Aabb> = None;
        for quad in self.boxes() {
            let coords: Vec<(f64, f64)> = quad.iter().map(|p| (p.x, p.y)).collect();
            if let Some(b) = Aabb::from_points(&coords) {
                bbox = Some(match bbox {
                    Some(acc) => acc.union(&b),
                    None => b,
                });
            }
        }
        bbox.unwrap_or(Aabb::new(self.x, self.y, self.x, self.y))
    }

    /// Oriented intersection test against another candidate.
    ///
    /// Pure geometry; same-unit exclusivity is handled by the conflict
    /// graph, not here.
    pub fn overlaps_with(&self, other: &LabelPosition) -> bool {
        if !self.bbox().intersects(&other.bbox()) {
            return false;
        }
        for a in self.boxes() {
            for b in other.boxes() {
                if quads_overlap(&a, &b) {
                    return true;
                }
            }
        }
        false
    }
}

/// Corners of a `w x h` box anchored at `(x, y)` and rotated by `angle`
/// around the anchor.
fn box_corners(x: f64, y: f64, w: f64, h: f64, angle: f64) -> [Point; 4] {
    let (sin, cos) = angle.sin_cos();
    let rot = |dx: f64, dy: f64| Point::new(x + dx * cos - dy * sin, y + dx * sin + dy * cos);
    [rot(0.0, 0.0), rot(w, 0.0), rot(w, h), rot(0.0, h)]
}

/// Separating-axis test for two convex quadrilaterals.
///
/// Edge contact does not count as overlap.
fn quads_overlap(a: &[Point; 4], b: &[Point; 4]) -> bool {
    const EPS: f64 = 1e-9;

    for quad in [a, b] {
        for i in 0..4 {
            let p1 = quad[i];
            let p2 = quad[(i + 1) % 4];
            // Edge normal as separating axis
            let axis = (p2.y - p1.y, -(p2.x - p1.x));

            let project = |points: &[Point; 4]| {
                let mut min = f64::INFINITY;
                let mut max = f64::NEG_INFINITY;
                for p in points {
                    let d = p.x * axis.0 + p.y * axis.1;
                    min = min.min(d);
                    max = max.max(d);
                }
                (min, max)
            };

            let (min_a, max_a) = project(a);
            let (min_b, max_b) = project(b);
            if max_a <= min_b + EPS || max_b <= min_a + EPS {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cost_clamped() {
        let lp = LabelPosition::new("f", 0.0, 0.0, 10.0, 4.0, 0.0, 2.5);
        assert_relative_eq!(lp.cost, 1.0);

        let mut lp = LabelPosition::new("f", 0.0, 0.0, 10.0, 4.0, 0.0, 0.9);
        lp.add_cost(0.5);
        assert_relative_eq!(lp.cost, 1.0);
    }

    #[test]
    fn test_axis_aligned_overlap() {
        let a = LabelPosition::new("a", 0.0, 0.0, 10.0, 4.0, 0.0, 0.0);
        let b = LabelPosition::new("b", 5.0, 2.0, 10.0, 4.0, 0.0, 0.0);
        let c = LabelPosition::new("c", 20.0, 0.0, 10.0, 4.0, 0.0, 0.0);

        assert!(a.overlaps_with(&b));
        assert!(b.overlaps_with(&a));
        assert!(!a.overlaps_with(&c));
    }

    #[test]
    fn test_edge_contact_is_not_overlap() {
        let a = LabelPosition::new("a", 0.0, 0.0, 10.0, 4.0, 0.0, 0.0);
        let b = LabelPosition::new("b", 10.0, 0.0, 10.0, 4.0, 0.0, 0.0);
        assert!(!a.overlaps_with(&b));
    }

    #[test]
    fn test_rotated_overlap() {
        // A tall thin box rotated 45 degrees through a flat box's bbox.
        // Bounding boxes intersect, but the oriented boxes do not.
        let flat = LabelPosition::new("a", 0.0, 0.0, 10.0, 1.0, 0.0, 0.0);
        let diag = LabelPosition::new(
            "b",
            6.0,
            1.5,
            8.0,
            0.5,
            std::f64::consts::FRAC_PI_4,
            0.0,
        );
        assert!(flat.bbox().intersects(&diag.bbox()));
        assert!(!flat.overlaps_with(&diag));

        // Lowering the diagonal box makes it pierce the flat one
        let piercing = LabelPosition::new(
            "c",
            6.0,
            0.2,
            8.0,
            0.5,
            std::f64::consts::FRAC_PI_4,
            0.0,
        );
        assert!(flat.overlaps_with(&piercing));
    }

    #[test]
    fn test_curved_group_overlap() {
        let chars = vec![
            CharBox {
                x: 0.0,
                y: 0.0,
                angle: 0.0,
                width: 2.0,
                height: 3.0,
            },
            CharBox {
                x: 2.0,
                y: 0.0,
                angle: 0.0,
                width: 2.0,
                height: 3.0,
            },
        ];
        let curved = LabelPosition::new("a", 0.0, 0.0, 4.0, 3.0, 0.0, 0.0).with_chars(chars);

        let hit = LabelPosition::new("b", 3.0, 1.0, 5.0, 2.0, 0.0, 0.0);
        assert!(curved.overlaps_with(&hit));

        let miss = LabelPosition::new("c", 10.0, 0.0, 5.0, 2.0, 0.0, 0.0);
        assert!(!curved.overlaps_with(&miss));

        let bbox = curved.bbox();
        assert_relative_eq!(bbox.max_x, 4.0);
        assert_relative_eq!(bbox.max_y, 3.0);
    }

    #[test]
    fn test_corners_rotation() {
        let lp = LabelPosition::new("a", 1.0, 1.0, 2.0, 1.0, std::f64::consts::FRAC_PI_2, 0.0);
        let corners = lp.corners();
        assert_relative_eq!(corners[1].x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(corners[1].y, 3.0, epsilon = 1e-12);
        assert_relative_eq!(corners[3].x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(corners[3].y, 1.0, epsilon = 1e-12);
    }
}
