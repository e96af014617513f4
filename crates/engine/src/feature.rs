//! Features and feature parts.
//!
//! A caller registers a [`LabelInfo`] (the per-feature labeling parameters,
//! text metrics included — this engine never measures text itself) together
//! with a `geo::Geometry`. Multi-geometries are decomposed into one
//! [`FeaturePart`] per simple component at registration time.

use std::sync::{Arc, OnceLock};

use cartolabel_core::{Aabb, Error, Result};
use geo::{Geometry, LineString};

use crate::pointset::{Point, PointSet};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Tolerance for endpoint connectivity tests.
const CONNECT_TOL: f64 = 1e-9;

/// Placement quadrant preference for point features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Quadrant {
    AboveLeft,
    Above,
    #[default]
    AboveRight,
    Left,
    /// Centered on the point.
    Over,
    Right,
    BelowLeft,
    Below,
    BelowRight,
}

impl Quadrant {
    /// The eight directional quadrants, in intrinsic cost order.
    pub fn compass() -> [Quadrant; 8] {
        [
            Quadrant::AboveRight,
            Quadrant::Above,
            Quadrant::BelowRight,
            Quadrant::Below,
            Quadrant::AboveLeft,
            Quadrant::BelowLeft,
            Quadrant::Right,
            Quadrant::Left,
        ]
    }

    /// Direction angle from the anchor, in radians; `None` for `Over`.
    pub fn angle(&self) -> Option<f64> {
        use std::f64::consts::FRAC_PI_4;
        let octant = match self {
            Quadrant::Right => 0.0,
            Quadrant::AboveRight => 1.0,
            Quadrant::Above => 2.0,
            Quadrant::AboveLeft => 3.0,
            Quadrant::Left => 4.0,
            Quadrant::BelowLeft => 5.0,
            Quadrant::Below => 6.0,
            Quadrant::BelowRight => 7.0,
            Quadrant::Over => return None,
        };
        Some(octant * FRAC_PI_4)
    }

    /// Intrinsic cost of placing in this quadrant (label-above-right of a
    /// point reads best, left placements worst).
    pub fn base_cost(&self) -> f64 {
        match self {
            Quadrant::Over => 0.0,
            Quadrant::AboveRight => 0.0,
            Quadrant::Above => 0.001,
            Quadrant::BelowRight => 0.002,
            Quadrant::Below => 0.003,
            Quadrant::AboveLeft => 0.004,
            Quadrant::BelowLeft => 0.005,
            Quadrant::Right => 0.006,
            Quadrant::Left => 0.007,
        }
    }
}

/// Per-feature labeling parameters, supplied by the caller.
///
/// The engine reads these but never mutates them, apart from stamping the
/// owning layer's name at registration.
#[derive(Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LabelInfo {
    id: String,
    text: String,
    width: f64,
    height: f64,
    distance: f64,
    quadrant: Quadrant,
    fixed_position: Option<(f64, f64)>,
    fixed_angle: Option<f64>,
    priority: Option<f64>,
    obstacle: bool,
    obstacle_weight: f64,
    repeat_distance: f64,
    always_show: bool,
    char_widths: Vec<f64>,
    max_char_angle_inside: f64,
    max_char_angle_outside: f64,
    #[cfg_attr(feature = "serde", serde(skip))]
    layer: OnceLock<String>,
}

impl LabelInfo {
    /// Creates labeling parameters for one feature.
    ///
    /// `width` and `height` are the label box dimensions in paint units, as
    /// measured by the caller's text engine.
    pub fn new(id: impl Into<String>, text: impl Into<String>, width: f64, height: f64) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            width,
            height,
            distance: 0.0,
            quadrant: Quadrant::default(),
            fixed_position: None,
            fixed_angle: None,
            priority: None,
            obstacle: false,
            obstacle_weight: 1.0,
            repeat_distance: 0.0,
            always_show: false,
            char_widths: Vec::new(),
            max_char_angle_inside: 20.0_f64.to_radians(),
            max_char_angle_outside: -20.0_f64.to_radians(),
            layer: OnceLock::new(),
        }
    }

    /// Sets the offset distance from the anchor.
    pub fn with_distance(mut self, distance: f64) -> Self {
        self.distance = distance.max(0.0);
        self
    }

    /// Sets the preferred placement quadrant.
    pub fn with_quadrant(mut self, quadrant: Quadrant) -> Self {
        self.quadrant = quadrant;
        self
    }

    /// Pins the label to a fixed position.
    pub fn with_fixed_position(mut self, x: f64, y: f64) -> Self {
        self.fixed_position = Some((x, y));
        self
    }

    /// Pins the label to a fixed rotation angle (radians).
    pub fn with_fixed_angle(mut self, angle: f64) -> Self {
        self.fixed_angle = Some(angle);
        self
    }

    /// Sets the feature priority, clamped into [0.0001, 1.0]
    /// (0.0001 = highest priority).
    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = Some(priority.clamp(0.0001, 1.0));
        self
    }

    /// Marks the feature as an obstacle with the given weight (>= 1).
    pub fn as_obstacle(mut self, weight: f64) -> Self {
        self.obstacle = true;
        self.obstacle_weight = weight.max(1.0);
        self
    }

    /// Sets the repeat distance for line labels (0 = no repetition).
    pub fn with_repeat_distance(mut self, distance: f64) -> Self {
        self.repeat_distance = distance.max(0.0);
        self
    }

    /// Allows this label to overlap others rather than be dropped.
    pub fn with_always_show(mut self, always: bool) -> Self {
        self.always_show = always;
        self
    }

    /// Sets per-character advance widths, enabling curved placement.
    pub fn with_char_widths(mut self, widths: Vec<f64>) -> Self {
        self.char_widths = widths;
        self
    }

    /// Sets the maximum inter-character angles for curved labels, in
    /// radians (inside = left turns, outside = right turns, negative).
    pub fn with_char_angles(mut self, inside: f64, outside: f64) -> Self {
        self.max_char_angle_inside = inside.abs();
        self.max_char_angle_outside = -outside.abs();
        self
    }

    /// Validates the label box dimensions.
    pub fn validate(&self) -> Result<()> {
        if self.width < 0.0 || self.height < 0.0 {
            return Err(Error::InvalidLabelSize(format!(
                "label '{}' has negative dimensions {}x{}",
                self.id, self.width, self.height
            )));
        }
        Ok(())
    }

    /// Stamps the owning layer; only the first call takes effect.
    pub(crate) fn stamp_layer(&self, name: &str) {
        let _ = self.layer.set(name.to_string());
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn quadrant(&self) -> Quadrant {
        self.quadrant
    }

    pub fn fixed_position(&self) -> Option<(f64, f64)> {
        self.fixed_position
    }

    pub fn fixed_angle(&self) -> Option<f64> {
        self.fixed_angle
    }

    pub fn priority(&self) -> Option<f64> {
        self.priority
    }

    pub fn is_obstacle(&self) -> bool {
        self.obstacle
    }

    pub fn obstacle_weight(&self) -> f64 {
        self.obstacle_weight
    }

    pub fn repeat_distance(&self) -> f64 {
        self.repeat_distance
    }

    pub fn always_show(&self) -> bool {
        self.always_show
    }

    pub fn char_widths(&self) -> &[f64] {
        &self.char_widths
    }

    pub fn max_char_angle_inside(&self) -> f64 {
        self.max_char_angle_inside
    }

    pub fn max_char_angle_outside(&self) -> f64 {
        self.max_char_angle_outside
    }

    /// Name of the layer the feature was registered in, if any.
    pub fn layer_name(&self) -> Option<&str> {
        self.layer.get().map(|s| s.as_str())
    }
}

/// Simple geometry kind of a feature part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum GeomKind {
    Point,
    Line,
    Polygon,
}

impl GeomKind {
    /// Index into the per-kind candidate budgets (point, line, polygon).
    pub fn budget_index(&self) -> usize {
        match self {
            GeomKind::Point => 0,
            GeomKind::Line => 1,
            GeomKind::Polygon => 2,
        }
    }
}

/// One simple (non-multi) geometry of a feature, with its label parameters.
#[derive(Debug, Clone)]
pub struct FeaturePart {
    kind: GeomKind,
    set: PointSet,
    holes: Vec<PointSet>,
    info: Arc<LabelInfo>,
}

impl FeaturePart {
    pub(crate) fn new(
        kind: GeomKind,
        set: PointSet,
        holes: Vec<PointSet>,
        info: Arc<LabelInfo>,
    ) -> Self {
        Self {
            kind,
            set,
            holes,
            info,
        }
    }

    /// Decomposes a geometry into simple feature parts.
    ///
    /// Multi-geometries and collections are flattened recursively.
    /// Components below the minimum vertex count (2 for lines, 3 for
    /// polygon rings) are skipped with a warning; non-finite coordinates
    /// are a hard error. An empty result is a valid outcome the caller
    /// treats as "invalid geometry ignored".
    pub fn extract(info: Arc<LabelInfo>, geometry: &Geometry<f64>) -> Result<Vec<FeaturePart>> {
        let mut parts = Vec::new();
        Self::collect(&info, geometry, &mut parts)?;
        Ok(parts)
    }

    fn collect(
        info: &Arc<LabelInfo>,
        geometry: &Geometry<f64>,
        out: &mut Vec<FeaturePart>,
    ) -> Result<()> {
        match geometry {
            Geometry::Point(p) => {
                check_finite(info.id(), &[(p.x(), p.y())])?;
                out.push(FeaturePart::new(
                    GeomKind::Point,
                    PointSet::from_coords(vec![(p.x(), p.y())]),
                    Vec::new(),
                    info.clone(),
                ));
            }
            Geometry::MultiPoint(mp) => {
                for p in mp.iter() {
                    Self::collect(info, &Geometry::Point(*p), out)?;
                }
            }
            Geometry::Line(l) => {
                let coords = vec![(l.start.x, l.start.y), (l.end.x, l.end.y)];
                Self::push_line(info, coords, out)?;
            }
            Geometry::LineString(ls) => {
                let coords = dedup_coords(ls);
                Self::push_line(info, coords, out)?;
            }
            Geometry::MultiLineString(mls) => {
                for ls in mls.iter() {
                    Self::collect(info, &Geometry::LineString(ls.clone()), out)?;
                }
            }
            Geometry::Polygon(poly) => {
                let exterior = ring_coords(poly.exterior());
                check_finite(info.id(), &exterior)?;
                if exterior.len() < 3 {
                    log::warn!(
                        "feature '{}': degenerate polygon ring skipped ({} vertices)",
                        info.id(),
                        exterior.len()
                    );
                    return Ok(());
                }
                let mut holes = Vec::new();
                for interior in poly.interiors() {
                    let ring = ring_coords(interior);
                    check_finite(info.id(), &ring)?;
                    if ring.len() >= 3 {
                        holes.push(PointSet::from_coords(ring));
                    } else {
                        log::warn!("feature '{}': degenerate hole skipped", info.id());
                    }
                }
                out.push(FeaturePart::new(
                    GeomKind::Polygon,
                    PointSet::from_coords(exterior),
                    holes,
                    info.clone(),
                ));
            }
            Geometry::MultiPolygon(mp) => {
                for poly in mp.iter() {
                    Self::collect(info, &Geometry::Polygon(poly.clone()), out)?;
                }
            }
            Geometry::GeometryCollection(gc) => {
                for g in gc.iter() {
                    Self::collect(info, g, out)?;
                }
            }
            Geometry::Rect(r) => {
                Self::collect(info, &Geometry::Polygon(r.to_polygon()), out)?;
            }
            Geometry::Triangle(t) => {
                Self::collect(info, &Geometry::Polygon(t.to_polygon()), out)?;
            }
        }
        Ok(())
    }

    fn push_line(
        info: &Arc<LabelInfo>,
        coords: Vec<(f64, f64)>,
        out: &mut Vec<FeaturePart>,
    ) -> Result<()> {
        check_finite(info.id(), &coords)?;
        if coords.len() < 2 {
            log::warn!(
                "feature '{}': degenerate line skipped ({} vertices)",
                info.id(),
                coords.len()
            );
            return Ok(());
        }
        out.push(FeaturePart::new(
            GeomKind::Line,
            PointSet::from_coords(coords),
            Vec::new(),
            info.clone(),
        ));
        Ok(())
    }

    pub fn kind(&self) -> GeomKind {
        self.kind
    }

    pub fn set(&self) -> &PointSet {
        &self.set
    }

    pub fn holes(&self) -> &[PointSet] {
        &self.holes
    }

    pub fn info(&self) -> &Arc<LabelInfo> {
        &self.info
    }

    pub fn bbox(&self) -> &Aabb {
        self.set.bbox()
    }

    /// Size measure used to pick the biggest part of a multi-geometry:
    /// area for polygons, length for lines, zero for points.
    pub fn measure(&self) -> f64 {
        match self.kind {
            GeomKind::Point => 0.0,
            GeomKind::Line => self.set.length(),
            GeomKind::Polygon => self.set.area(),
        }
    }

    /// Effective priority: explicit feature priority, else the layer default.
    pub fn priority(&self, layer_default: f64) -> f64 {
        self.info.priority().unwrap_or(layer_default)
    }

    fn endpoints(&self) -> Option<(Point, Point)> {
        if self.kind != GeomKind::Line || self.set.len() < 2 {
            return None;
        }
        let points = self.set.points();
        Some((points[0], points[points.len() - 1]))
    }

    /// Returns true if both parts are lines sharing an endpoint.
    pub fn is_connected(&self, other: &FeaturePart) -> bool {
        let (Some((s1, e1)), Some((s2, e2))) = (self.endpoints(), other.endpoints()) else {
            return false;
        };
        let near = |a: Point, b: Point| a.distance_sq(b) <= CONNECT_TOL * CONNECT_TOL;
        near(e1, s2) || near(e1, e2) || near(s1, s2) || near(s1, e2)
    }

    /// Appends `other`'s points onto this part if the two share an
    /// endpoint; returns false (and leaves `self` untouched) otherwise.
    pub fn merge_with(&mut self, other: &FeaturePart) -> bool {
        let (Some((s1, e1)), Some((s2, e2))) = (self.endpoints(), other.endpoints()) else {
            return false;
        };
        let near = |a: Point, b: Point| a.distance_sq(b) <= CONNECT_TOL * CONNECT_TOL;

        let mut own: Vec<Point> = self.set.points().to_vec();
        let others = other.set.points();

        if near(e1, s2) {
            own.extend_from_slice(&others[1..]);
        } else if near(e1, e2) {
            own.extend(others[..others.len() - 1].iter().rev());
        } else if near(s1, e2) {
            let mut merged = others[..others.len() - 1].to_vec();
            merged.extend_from_slice(&own);
            own = merged;
        } else if near(s1, s2) {
            let mut merged: Vec<Point> = others[1..].iter().rev().copied().collect();
            merged.extend_from_slice(&own);
            own = merged;
        } else {
            return false;
        }

        self.set = PointSet::new(own);
        true
    }
}

/// Converts a `geo` line string to coordinate pairs, dropping consecutive
/// duplicates.
fn dedup_coords(ls: &LineString<f64>) -> Vec<(f64, f64)> {
    let mut coords: Vec<(f64, f64)> = Vec::with_capacity(ls.0.len());
    for c in &ls.0 {
        if coords
            .last()
            .map_or(true, |&(x, y)| (x - c.x).abs() > 0.0 || (y - c.y).abs() > 0.0)
        {
            coords.push((c.x, c.y));
        }
    }
    coords
}

/// Ring coordinates without the duplicate closing vertex.
fn ring_coords(ls: &LineString<f64>) -> Vec<(f64, f64)> {
    let mut coords = dedup_coords(ls);
    if coords.len() >= 2 && coords.first() == coords.last() {
        coords.pop();
    }
    coords
}

fn check_finite(id: &str, coords: &[(f64, f64)]) -> Result<()> {
    if coords.iter().any(|&(x, y)| !x.is_finite() || !y.is_finite()) {
        return Err(Error::InvalidGeometry(format!(
            "feature '{}' has non-finite coordinates",
            id
        )));
    }
    Ok(())
}
