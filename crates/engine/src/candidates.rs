//! Candidate generation.
//!
//! Each generator proposes weighted [`LabelPosition`] candidates for one
//! feature part. Returning an empty vector is a normal "no label fits"
//! outcome, not an error; the feature is reported as unplaced.

use std::f64::consts::PI;

use crate::feature::{FeaturePart, GeomKind, Quadrant};
use crate::label::{CharBox, LabelPosition};
use crate::layer::Arrangement;
use crate::pointset::{Point, PointSet};
use crate::polylabel::pole_of_inaccessibility;

/// Cost increment between successive candidates of a point fan.
const FAN_COST_STEP: f64 = 0.0021;

/// Cost weight of the distance-from-midpoint term for line labels.
const MIDPOINT_COST_WEIGHT: f64 = 0.5;

/// Cost weight of the curvature term for line and curved labels.
const CURVATURE_COST_WEIGHT: f64 = 0.25;

/// Cost surcharge for curved text running upside down.
const UPSIDE_DOWN_COST: f64 = 0.05;

impl FeaturePart {
    /// Generates candidates for this part under the layer's arrangement.
    ///
    /// `budget` caps the number of candidates; `fit_in_polygon` requires
    /// polygon labels to lie entirely inside the ring.
    pub fn generate_candidates(
        &self,
        arrangement: Arrangement,
        budget: usize,
        fit_in_polygon: bool,
    ) -> Vec<LabelPosition> {
        let budget = budget.max(1);
        match self.kind() {
            GeomKind::Point => match arrangement {
                Arrangement::OverPoint => self.candidates_over_point(),
                _ => self.candidates_around_point(budget),
            },
            GeomKind::Line => match arrangement {
                Arrangement::Curved if !self.info().char_widths().is_empty() => {
                    self.candidates_curved(self.set(), budget)
                }
                _ => self.candidates_along_line(self.set(), budget),
            },
            GeomKind::Polygon => match arrangement {
                Arrangement::Line => {
                    let ring = closed_ring(self.set());
                    self.candidates_along_line(&ring, budget)
                }
                Arrangement::Curved if !self.info().char_widths().is_empty() => {
                    let ring = closed_ring(self.set());
                    self.candidates_curved(&ring, budget)
                }
                _ => self.candidates_for_polygon(budget, fit_in_polygon),
            },
        }
    }

    /// Exactly one candidate centered on the point.
    pub fn candidates_over_point(&self) -> Vec<LabelPosition> {
        let info = self.info();
        let anchor = self.anchor();
        let angle = info.fixed_angle().unwrap_or(0.0);
        let origin = centered_origin(anchor, info.width(), info.height(), angle);
        vec![LabelPosition::new(
            info.id(),
            origin.x,
            origin.y,
            info.width(),
            info.height(),
            angle,
            0.0,
        )]
    }

    /// A fan of candidates around the point, ordered by quadrant
    /// preference. A fixed-position feature yields exactly one candidate.
    pub fn candidates_around_point(&self, budget: usize) -> Vec<LabelPosition> {
        let info = self.info();
        let anchor = self.anchor();
        let w = info.width();
        let h = info.height();
        let d = info.distance();
        let angle = info.fixed_angle().unwrap_or(0.0);

        if info.fixed_position().is_some() {
            let theta = info.quadrant().angle().unwrap_or(0.0);
            let origin = offset_box_origin(anchor, w, h, d, theta);
            return vec![LabelPosition::new(info.id(), origin.x, origin.y, w, h, angle, 0.0)];
        }

        if info.quadrant() == Quadrant::Over {
            let origin = centered_origin(anchor, w, h, angle);
            return vec![LabelPosition::new(info.id(), origin.x, origin.y, w, h, angle, 0.0)];
        }

        let preferred = info.quadrant().angle().unwrap_or(0.0);
        let n = budget.min(16).max(1);

        // Directions ordered by angular distance from the preferred
        // quadrant, alternating sides.
        let mut directions = Vec::with_capacity(n);
        let step = 2.0 * PI / n as f64;
        directions.push(preferred);
        for k in 1..n {
            let half = k.div_ceil(2) as f64;
            let sign = if k % 2 == 1 { 1.0 } else { -1.0 };
            directions.push(preferred + sign * half * step);
        }

        directions
            .into_iter()
            .enumerate()
            .map(|(rank, theta)| {
                let origin = offset_box_origin(anchor, w, h, d, theta);
                let cost = nearest_quadrant(theta).base_cost() + FAN_COST_STEP * rank as f64;
                LabelPosition::new(info.id(), origin.x, origin.y, w, h, angle, cost)
            })
            .collect()
    }

    /// Candidates along a line, scored by distance from the line midpoint
    /// and local curvature.
    fn candidates_along_line(&self, line: &PointSet, budget: usize) -> Vec<LabelPosition> {
        let info = self.info();
        let w = info.width();
        let h = info.height();
        let total = line.length();
        if total <= 0.0 || line.len() < 2 {
            return Vec::new();
        }

        let offsets: Vec<f64> = if total <= w {
            // Line shorter than the label: one centered, overhanging candidate
            vec![(total - w) / 2.0]
        } else {
            let n = budget.max(2);
            let span = total - w;
            (0..n).map(|i| span * i as f64 / (n - 1) as f64).collect()
        };

        let mut candidates = Vec::with_capacity(offsets.len());
        for offset in offsets {
            let center_offset = (offset + w / 2.0).clamp(0.0, total);
            let Some((center, tangent)) = line.placement_at(center_offset) else {
                continue;
            };

            // Keep text upright
            let angle = info.fixed_angle().unwrap_or_else(|| upright(tangent));

            let (sin, cos) = angle.sin_cos();
            let mut cx = center.x;
            let mut cy = center.y;
            if info.distance() > 0.0 {
                // Shift off the line along the upward normal
                let shift = info.distance() + h / 2.0;
                cx += -sin * shift;
                cy += cos * shift;
            }
            let origin = centered_origin(Point::new(cx, cy), w, h, angle);

            let midpoint_term = if total > w {
                ((center_offset - total / 2.0).abs() / (total / 2.0)).min(1.0)
            } else {
                // Overhanging candidate carries a flat penalty instead
                0.2
            };
            let curvature_term = self.curvature_penalty(line, offset, w, total);
            let cost =
                MIDPOINT_COST_WEIGHT * midpoint_term + CURVATURE_COST_WEIGHT * curvature_term;

            candidates.push(LabelPosition::new(info.id(), origin.x, origin.y, w, h, angle, cost));
        }

        candidates.truncate(budget);
        candidates
    }

    /// Normalized tangent-angle change over the label span.
    fn curvature_penalty(&self, line: &PointSet, offset: f64, w: f64, total: f64) -> f64 {
        let start = offset.clamp(0.0, total);
        let end = (offset + w).clamp(0.0, total);
        match (line.placement_at(start), line.placement_at(end)) {
            (Some((_, a0)), Some((_, a1))) => (angle_delta(a1, a0).abs() / PI).min(1.0),
            _ => 0.0,
        }
    }

    /// Curved candidates: one box per character following the local
    /// tangent. Placements whose inter-character angle exceeds the
    /// feature's limits are rejected.
    fn candidates_curved(&self, line: &PointSet, budget: usize) -> Vec<LabelPosition> {
        let info = self.info();
        let widths = info.char_widths();
        let h = info.height();
        let total_w: f64 = widths.iter().sum();
        let total = line.length();
        if widths.is_empty() || total_w <= 0.0 || total < total_w {
            return Vec::new();
        }

        let span = total - total_w;
        let n = budget.max(1);
        let mut candidates = Vec::new();

        'starts: for i in 0..n {
            let start = if n == 1 {
                span / 2.0
            } else {
                span * i as f64 / (n - 1) as f64
            };

            let mut chars = Vec::with_capacity(widths.len());
            let mut prev_angle: Option<f64> = None;
            let mut bend_total = 0.0;
            let mut cos_sum = 0.0;
            let mut offset = start;

            for &cw in widths {
                let Some((origin, angle)) = line.placement_at(offset) else {
                    continue 'starts;
                };
                if let Some(prev) = prev_angle {
                    let delta = angle_delta(angle, prev);
                    if delta > info.max_char_angle_inside()
                        || delta < info.max_char_angle_outside()
                    {
                        continue 'starts;
                    }
                    bend_total += delta.abs();
                }
                prev_angle = Some(angle);
                cos_sum += angle.cos();
                chars.push(CharBox {
                    x: origin.x,
                    y: origin.y,
                    angle,
                    width: cw,
                    height: h,
                });
                offset += cw;
            }

            let center_offset = start + total_w / 2.0;
            let midpoint_term = if span > 0.0 {
                ((center_offset - total / 2.0).abs() / (total / 2.0)).min(1.0)
            } else {
                0.0
            };
            let bend_term = (bend_total / (widths.len() as f64 * PI)).min(1.0);
            let mut cost =
                MIDPOINT_COST_WEIGHT * midpoint_term + CURVATURE_COST_WEIGHT * bend_term;
            if cos_sum < 0.0 {
                cost += UPSIDE_DOWN_COST;
            }

            let head = chars[0].clone();
            candidates.push(
                LabelPosition::new(info.id(), head.x, head.y, total_w, h, head.angle, cost)
                    .with_chars(chars),
            );
            if candidates.len() >= budget {
                break;
            }
        }

        candidates
    }

    /// Interior candidates for a polygon: pole of inaccessibility first,
    /// then a grid over the bounding box.
    fn candidates_for_polygon(&self, budget: usize, must_fit: bool) -> Vec<LabelPosition> {
        let info = self.info();
        let w = info.width();
        let h = info.height();
        let angle = info.fixed_angle().unwrap_or(0.0);
        let ring = self.set();
        let bbox = ring.bbox();

        let precision = (bbox.width().min(bbox.height()) / 100.0).max(1e-6);
        let (pole, pole_dist) = pole_of_inaccessibility(ring, self.holes(), precision);

        let mut candidates = Vec::new();
        if self.label_box_fits(pole, w, h, angle) {
            let origin = centered_origin(pole, w, h, angle);
            candidates.push(LabelPosition::new(info.id(), origin.x, origin.y, w, h, angle, 0.0));
        }

        let max_dist = (bbox.width().powi(2) + bbox.height().powi(2)).sqrt().max(1e-12);
        let cells = (budget as f64).sqrt().ceil() as usize;
        for ix in 0..cells {
            for iy in 0..cells {
                if candidates.len() >= budget {
                    break;
                }
                let cx = bbox.min_x + bbox.width() * (ix as f64 + 0.5) / cells as f64;
                let cy = bbox.min_y + bbox.height() * (iy as f64 + 0.5) / cells as f64;
                let center = Point::new(cx, cy);
                if !self.label_box_fits(center, w, h, angle) {
                    continue;
                }
                let cost = 0.5 * center.distance(pole) / max_dist + 0.01;
                let origin = centered_origin(center, w, h, angle);
                candidates.push(LabelPosition::new(info.id(), origin.x, origin.y, w, h, angle, cost));
            }
        }

        if candidates.is_empty() && !must_fit && pole_dist > 0.0 {
            // Containment not required: anchor at the pole and accept the
            // overhang with a surcharge.
            let origin = centered_origin(pole, w, h, angle);
            candidates.push(LabelPosition::new(info.id(), origin.x, origin.y, w, h, angle, 0.6));
        }

        candidates
    }

    /// True if a box centered at `center` lies entirely inside the ring
    /// (holes subtracted).
    fn label_box_fits(&self, center: Point, w: f64, h: f64, angle: f64) -> bool {
        let origin = centered_origin(center, w, h, angle);
        let probe = LabelPosition::new("", origin.x, origin.y, w, h, angle, 0.0);
        let mut path: Vec<Point> = probe.corners().to_vec();
        path.push(path[0]);

        let ring = self.set();
        if !path[..4]
            .iter()
            .all(|corner| ring.contains(*corner, self.holes()))
        {
            return false;
        }
        if crate::pointset::path_intersects_ring(&path, ring.points()) {
            return false;
        }
        !self
            .holes()
            .iter()
            .any(|hole| crate::pointset::path_intersects_ring(&path, hole.points()))
    }

    /// Anchor point for point-feature placement.
    fn anchor(&self) -> Point {
        if let Some((x, y)) = self.info().fixed_position() {
            Point::new(x, y)
        } else {
            self.set().points().first().copied().unwrap_or_default()
        }
    }
}

/// Origin of a `w x h` box whose center sits at `center`, rotated by
/// `angle` around the origin.
fn centered_origin(center: Point, w: f64, h: f64, angle: f64) -> Point {
    let (sin, cos) = angle.sin_cos();
    Point::new(
        center.x - (w / 2.0) * cos + (h / 2.0) * sin,
        center.y - (w / 2.0) * sin - (h / 2.0) * cos,
    )
}

/// Origin of an axis-aligned box pushed out of `anchor` along direction
/// `theta` until its nearest edge is `d` away.
fn offset_box_origin(anchor: Point, w: f64, h: f64, d: f64, theta: f64) -> Point {
    let (sin, cos) = theta.sin_cos();
    // Distance from the box center to its edge along the direction
    let rx = if cos.abs() > 1e-12 {
        (w / 2.0) / cos.abs()
    } else {
        f64::INFINITY
    };
    let ry = if sin.abs() > 1e-12 {
        (h / 2.0) / sin.abs()
    } else {
        f64::INFINITY
    };
    let reach = rx.min(ry);
    let cx = anchor.x + (d + reach) * cos;
    let cy = anchor.y + (d + reach) * sin;
    Point::new(cx - w / 2.0, cy - h / 2.0)
}

/// The compass quadrant whose direction is closest to `theta`.
fn nearest_quadrant(theta: f64) -> Quadrant {
    Quadrant::compass()
        .into_iter()
        .min_by(|a, b| {
            let da = angle_delta(theta, a.angle().unwrap_or(0.0)).abs();
            let db = angle_delta(theta, b.angle().unwrap_or(0.0)).abs();
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or(Quadrant::AboveRight)
}

/// Normalizes an angle so that text reads left to right.
fn upright(angle: f64) -> f64 {
    let a = normalize_angle(angle);
    if a.cos() < 0.0 {
        normalize_angle(a + PI)
    } else {
        a
    }
}

/// Signed smallest difference `a - b`, in (-PI, PI].
fn angle_delta(a: f64, b: f64) -> f64 {
    normalize_angle(a - b)
}

/// Normalizes into (-PI, PI].
fn normalize_angle(a: f64) -> f64 {
    let mut a = a % (2.0 * PI);
    if a > PI {
        a -= 2.0 * PI;
    } else if a <= -PI {
        a += 2.0 * PI;
    }
    a
}

/// Closes a ring into a walkable polyline.
fn closed_ring(ring: &PointSet) -> PointSet {
    let mut points = ring.points().to_vec();
    if let Some(&first) = points.first() {
        points.push(first);
    }
    PointSet::new(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::LabelInfo;
    use crate::pointset::PointSet;
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn point_part(info: LabelInfo) -> FeaturePart {
        FeaturePart::new(
            GeomKind::Point,
            PointSet::from_coords(vec![(0.0, 0.0)]),
            Vec::new(),
            Arc::new(info),
        )
    }

    fn line_part(info: LabelInfo, coords: Vec<(f64, f64)>) -> FeaturePart {
        FeaturePart::new(
            GeomKind::Line,
            PointSet::from_coords(coords),
            Vec::new(),
            Arc::new(info),
        )
    }

    #[test]
    fn test_over_point_single_centered() {
        let part = point_part(LabelInfo::new("f", "f", 10.0, 4.0));
        let candidates = part.candidates_over_point();
        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_relative_eq!(c.x, -5.0);
        assert_relative_eq!(c.y, -2.0);
        assert_relative_eq!(c.cost, 0.0);
    }

    #[test]
    fn test_fixed_position_single_candidate() {
        let info = LabelInfo::new("f", "f", 10.0, 4.0).with_fixed_position(3.0, 3.0);
        let part = point_part(info);
        // Budget must not matter for fixed positions
        for budget in [1usize, 8, 100] {
            assert_eq!(part.candidates_around_point(budget).len(), 1);
        }
    }

    #[test]
    fn test_point_fan_ordered_by_cost() {
        let part = point_part(LabelInfo::new("f", "f", 10.0, 4.0).with_distance(1.0));
        let candidates = part.candidates_around_point(8);
        assert_eq!(candidates.len(), 8);
        // First candidate sits in the preferred (above-right) direction
        let first = &candidates[0];
        assert!(first.x > -5.0 && first.y > 0.0);
        // Costs never decrease along the fan ranking apart from quadrant
        // table offsets; the first is strictly the cheapest.
        assert!(candidates[1..].iter().all(|c| c.cost > first.cost));
    }

    #[test]
    fn test_point_fan_respects_budget() {
        let part = point_part(LabelInfo::new("f", "f", 10.0, 4.0));
        assert_eq!(part.candidates_around_point(4).len(), 4);
    }

    #[test]
    fn test_line_candidates_within_expanded_bbox() {
        let info = LabelInfo::new("f", "f", 4.0, 1.0);
        let part = line_part(info, vec![(0.0, 0.0), (20.0, 0.0)]);
        let candidates = part.generate_candidates(Arrangement::Line, 10, true);
        assert!(!candidates.is_empty());

        let expanded = part.set().bbox().expanded(4.0 / 2.0 + 1.0);
        for c in &candidates {
            assert!(
                expanded.contains(&c.bbox()),
                "candidate bbox {:?} outside {:?}",
                c.bbox(),
                expanded
            );
        }
    }

    #[test]
    fn test_line_midpoint_is_cheapest() {
        let info = LabelInfo::new("f", "f", 4.0, 1.0);
        let part = line_part(info, vec![(0.0, 0.0), (20.0, 0.0)]);
        let candidates = part.generate_candidates(Arrangement::Line, 11, true);
        let cheapest = candidates
            .iter()
            .min_by(|a, b| a.cost.partial_cmp(&b.cost).unwrap())
            .unwrap();
        let center_x = cheapest.x + 2.0;
        assert_relative_eq!(center_x, 10.0, epsilon = 1.2);
    }

    #[test]
    fn test_short_line_single_overhang() {
        let info = LabelInfo::new("f", "f", 10.0, 1.0);
        let part = line_part(info, vec![(0.0, 0.0), (4.0, 0.0)]);
        let candidates = part.generate_candidates(Arrangement::Line, 10, true);
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn test_curved_straight_line() {
        let info = LabelInfo::new("f", "Oak", 0.0, 1.0).with_char_widths(vec![2.0, 2.0, 2.0]);
        let part = line_part(info, vec![(0.0, 0.0), (30.0, 0.0)]);
        let candidates = part.generate_candidates(Arrangement::Curved, 5, true);
        assert!(!candidates.is_empty());
        for c in &candidates {
            assert_eq!(c.chars.len(), 3);
            for ch in &c.chars {
                assert_relative_eq!(ch.angle, 0.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_curved_rejects_sharp_corner() {
        // 90 degree corner exceeds the default 20 degree character limit,
        // so no candidate may straddle it.
        let info = LabelInfo::new("f", "ab", 0.0, 1.0).with_char_widths(vec![4.0, 4.0]);
        let part = line_part(info, vec![(0.0, 0.0), (5.0, 0.0), (5.0, 5.0)]);
        let candidates = part.generate_candidates(Arrangement::Curved, 20, true);
        for c in &candidates {
            let a0 = c.chars[0].angle;
            let a1 = c.chars[1].angle;
            assert!(angle_delta(a1, a0).abs() <= 20.0_f64.to_radians() + 1e-9);
        }
    }

    #[test]
    fn test_curved_too_long_returns_empty() {
        let info = LabelInfo::new("f", "long", 0.0, 1.0).with_char_widths(vec![5.0; 10]);
        let part = line_part(info, vec![(0.0, 0.0), (10.0, 0.0)]);
        assert!(part
            .generate_candidates(Arrangement::Curved, 5, true)
            .is_empty());
    }

    #[test]
    fn test_polygon_pole_candidate_first() {
        let info = LabelInfo::new("f", "f", 4.0, 2.0);
        let part = FeaturePart::new(
            GeomKind::Polygon,
            PointSet::from_coords(vec![(0.0, 0.0), (20.0, 0.0), (20.0, 10.0), (0.0, 10.0)]),
            Vec::new(),
            Arc::new(info),
        );
        let candidates = part.generate_candidates(Arrangement::Free, 9, true);
        assert!(!candidates.is_empty());
        assert_relative_eq!(candidates[0].cost, 0.0);
        // Pole of a rectangle is its center
        assert_relative_eq!(candidates[0].x + 2.0, 10.0, epsilon = 0.3);
        assert_relative_eq!(candidates[0].y + 1.0, 5.0, epsilon = 0.3);
    }

    #[test]
    fn test_polygon_label_too_big() {
        let info = LabelInfo::new("f", "f", 50.0, 20.0);
        let part = FeaturePart::new(
            GeomKind::Polygon,
            PointSet::from_coords(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 5.0), (0.0, 5.0)]),
            Vec::new(),
            Arc::new(info),
        );
        // Must-fit: nothing fits
        assert!(part.generate_candidates(Arrangement::Free, 9, true).is_empty());
        // Relaxed: one overhanging candidate
        let relaxed = part.generate_candidates(Arrangement::Free, 9, false);
        assert_eq!(relaxed.len(), 1);
        assert!(relaxed[0].cost > 0.5);
    }

    #[test]
    fn test_polygon_candidates_avoid_hole() {
        let info = LabelInfo::new("f", "f", 3.0, 2.0);
        let part = FeaturePart::new(
            GeomKind::Polygon,
            PointSet::from_coords(vec![(0.0, 0.0), (30.0, 0.0), (30.0, 20.0), (0.0, 20.0)]),
            vec![PointSet::from_coords(vec![
                (10.0, 5.0),
                (20.0, 5.0),
                (20.0, 15.0),
                (10.0, 15.0),
            ])],
            Arc::new(info),
        );
        let candidates = part.generate_candidates(Arrangement::Free, 16, true);
        assert!(!candidates.is_empty());
        let hole = part.holes()[0].clone();
        for c in &candidates {
            let (cx, cy) = c.bbox().center();
            assert!(
                !crate::pointset::point_in_ring(crate::pointset::Point::new(cx, cy), hole.points()),
                "candidate centered inside hole at ({cx}, {cy})"
            );
        }
    }

    #[test]
    fn test_angle_helpers() {
        assert_relative_eq!(normalize_angle(3.0 * PI), PI);
        assert_relative_eq!(angle_delta(0.1, -0.1), 0.2, epsilon = 1e-12);
        assert_relative_eq!(upright(PI), 0.0, epsilon = 1e-12);
    }
}
