//! Layers.
//!
//! A [`Layer`] groups features sharing an arrangement and default
//! parameters. Registration is callable from multiple threads; the mutable
//! state sits behind a mutex that is only contended while features are
//! being registered or preprocessed, never during placement.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use cartolabel_core::Result;
use geo::Geometry;

use crate::feature::{FeaturePart, GeomKind, LabelInfo};
use crate::pointset::PointSet;
use crate::spatial_index::{IndexEntry, SpatialIndex};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Label arrangement policy of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Arrangement {
    /// Point labels fanned around the anchor.
    #[default]
    AroundPoint,
    /// Point labels centered on the anchor.
    OverPoint,
    /// Straight labels following a line's tangent.
    Line,
    /// Per-character labels bending with the line.
    Curved,
    /// Horizontal labels inside a polygon.
    Horizontal,
    /// Rotated labels inside a polygon.
    Free,
}

/// Which part of a polygon obstacle blocks labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ObstacleKind {
    /// The polygon interior is blocked.
    #[default]
    PolygonInterior,
    /// Only the polygon boundary is blocked.
    PolygonBoundary,
}

/// Mutable per-layer state, guarded during registration and preprocessing.
#[derive(Debug, Default)]
struct LayerState {
    /// Part arena; `None` marks parts consumed by a merge.
    parts: Vec<Option<FeaturePart>>,
    index: SpatialIndex,
    registered: HashSet<String>,
    /// Line parts grouped by label text, for join-by-text.
    by_text: HashMap<String, Vec<usize>>,
}

/// A named group of features labeled with common settings.
#[derive(Debug)]
pub struct Layer {
    name: String,
    arrangement: Arrangement,
    obstacle_kind: ObstacleKind,
    default_priority: f64,
    merge_connected: bool,
    label_all_parts: bool,
    fit_in_polygon: bool,
    active: bool,
    state: Mutex<LayerState>,
}

impl Layer {
    /// Creates a layer with the given arrangement.
    pub fn new(name: impl Into<String>, arrangement: Arrangement) -> Self {
        Self {
            name: name.into(),
            arrangement,
            obstacle_kind: ObstacleKind::default(),
            default_priority: 0.5,
            merge_connected: false,
            label_all_parts: false,
            fit_in_polygon: true,
            active: true,
            state: Mutex::new(LayerState::default()),
        }
    }

    /// Sets the default priority for features without their own,
    /// clamped into [0.0001, 1.0].
    pub fn with_default_priority(mut self, priority: f64) -> Self {
        self.set_default_priority(priority);
        self
    }

    /// Joins connected same-text line features before placement.
    pub fn with_merge_connected(mut self, merge: bool) -> Self {
        self.merge_connected = merge;
        self
    }

    /// Labels every part of a multi-geometry instead of only the biggest.
    pub fn with_label_all_parts(mut self, all: bool) -> Self {
        self.label_all_parts = all;
        self
    }

    /// Requires polygon labels to fit entirely inside their ring.
    pub fn with_fit_in_polygon(mut self, fit: bool) -> Self {
        self.fit_in_polygon = fit;
        self
    }

    /// Sets which part of polygon obstacles blocks labels.
    pub fn with_obstacle_kind(mut self, kind: ObstacleKind) -> Self {
        self.obstacle_kind = kind;
        self
    }

    /// Activates or deactivates the layer; inactive layers are skipped
    /// during placement.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn set_default_priority(&mut self, priority: f64) {
        self.default_priority = priority.clamp(0.0001, 1.0);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arrangement(&self) -> Arrangement {
        self.arrangement
    }

    pub fn obstacle_kind(&self) -> ObstacleKind {
        self.obstacle_kind
    }

    pub fn default_priority(&self) -> f64 {
        self.default_priority
    }

    pub fn merge_connected(&self) -> bool {
        self.merge_connected
    }

    pub fn fit_in_polygon(&self) -> bool {
        self.fit_in_polygon
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Number of live feature parts.
    pub fn len(&self) -> usize {
        self.lock().parts.iter().flatten().count()
    }

    /// Returns true if the layer holds no feature parts.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, LayerState> {
        // A panic while holding the lock leaves the state consistent
        // enough to keep reading.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Registers a feature.
    ///
    /// Returns `Ok(false)` when the feature id was already registered or
    /// the geometry yields no usable parts, `Ok(true)` on success, and an
    /// error for invalid label parameters or non-finite coordinates.
    pub fn register_feature(&self, info: LabelInfo, geometry: &Geometry<f64>) -> Result<bool> {
        info.validate()?;

        let info = Arc::new(info);
        let mut parts = FeaturePart::extract(info.clone(), geometry)?;

        let mut state = self.lock();
        if state.registered.contains(info.id()) {
            log::debug!(
                "layer '{}': feature '{}' already registered, ignored",
                self.name,
                info.id()
            );
            return Ok(false);
        }
        if parts.is_empty() {
            log::warn!(
                "layer '{}': feature '{}' has no usable geometry, ignored",
                self.name,
                info.id()
            );
            return Ok(false);
        }

        if !self.label_all_parts && parts.len() > 1 {
            // Keep only the biggest part of a multi-geometry
            let biggest = parts
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| {
                    a.measure()
                        .partial_cmp(&b.measure())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|(i, _)| i);
            if let Some(i) = biggest {
                parts = vec![parts.swap_remove(i)];
            }
        }

        info.stamp_layer(&self.name);
        state.registered.insert(info.id().to_string());
        for part in parts {
            let slot = state.parts.len();
            state.index.insert(IndexEntry::new(slot, part.bbox()));
            if part.kind() == GeomKind::Line {
                state
                    .by_text
                    .entry(part.info().text().to_string())
                    .or_default()
                    .push(slot);
            }
            state.parts.push(Some(part));
        }
        Ok(true)
    }

    /// Joins line parts that share label text and an endpoint.
    ///
    /// Merging is greedy: each part absorbs the first connected candidate
    /// in its text group, repeatedly, until no join applies. Consumed
    /// slots are tombstoned and the spatial index rebuilt.
    pub fn join_connected_features(&self) {
        let mut state = self.lock();
        let mut merges = 0usize;

        let groups: Vec<Vec<usize>> = state.by_text.values().cloned().collect();
        for group in groups {
            if group.len() < 2 {
                continue;
            }
            let mut changed = true;
            while changed {
                changed = false;
                'outer: for &target in &group {
                    if state.parts[target].is_none() {
                        continue;
                    }
                    for &other in &group {
                        if other == target || state.parts[other].is_none() {
                            continue;
                        }
                        let connected = {
                            let (Some(a), Some(b)) =
                                (&state.parts[target], &state.parts[other])
                            else {
                                continue;
                            };
                            a.is_connected(b)
                        };
                        if !connected {
                            continue;
                        }
                        if let Some(b) = state.parts[other].take() {
                            let merged = match state.parts[target].as_mut() {
                                Some(t) => t.merge_with(&b),
                                None => false,
                            };
                            if merged {
                                merges += 1;
                                changed = true;
                                continue 'outer;
                            }
                            // Merge refused, restore the slot
                            state.parts[other] = Some(b);
                        }
                    }
                }
            }
        }

        if merges > 0 {
            log::debug!("layer '{}': joined {} line parts", self.name, merges);
            Self::rebuild_index(&mut state);
        }
    }

    /// Splits line parts longer than their repeat distance into
    /// `ceil(length / distance)` equal-length pieces.
    pub fn chop_features_at_repeat_distance(&self) {
        let mut state = self.lock();
        let mut chopped = false;

        for slot in 0..state.parts.len() {
            let Some(part) = &state.parts[slot] else {
                continue;
            };
            if part.kind() != GeomKind::Line {
                continue;
            }
            let repeat = part.info().repeat_distance();
            let length = part.set().length();
            if repeat <= 0.0 || length <= repeat {
                continue;
            }

            let pieces = (length / repeat).ceil() as usize;
            let piece_len = length / pieces as f64;
            let part = match state.parts[slot].take() {
                Some(p) => p,
                None => continue,
            };

            for i in 0..pieces {
                let set = slice_polyline(part.set(), i as f64 * piece_len, piece_len);
                if set.len() < 2 {
                    continue;
                }
                let piece =
                    FeaturePart::new(GeomKind::Line, set, Vec::new(), part.info().clone());
                state.parts.push(Some(piece));
            }
            chopped = true;
        }

        if chopped {
            Self::rebuild_index(&mut state);
        }
    }

    /// Runs `f` over every live part, in arena order.
    pub(crate) fn for_each_part<F>(&self, mut f: F)
    where
        F: FnMut(&FeaturePart),
    {
        let state = self.lock();
        for part in state.parts.iter().flatten() {
            f(part);
        }
    }

    /// Live parts whose bounding boxes intersect `bbox`.
    pub(crate) fn parts_in(&self, bbox: &cartolabel_core::Aabb) -> Vec<FeaturePart> {
        let state = self.lock();
        let mut hits: Vec<usize> = state.index.query(bbox).map(|e| e.index).collect();
        hits.sort_unstable();
        hits.into_iter()
            .filter_map(|slot| state.parts.get(slot).and_then(|p| p.clone()))
            .collect()
    }

    fn rebuild_index(state: &mut LayerState) {
        let entries: Vec<IndexEntry> = state
            .parts
            .iter()
            .enumerate()
            .filter_map(|(slot, part)| {
                part.as_ref().map(|p| IndexEntry::new(slot, p.bbox()))
            })
            .collect();
        state.index = SpatialIndex::with_entries(entries);
    }
}

/// Extracts the sub-polyline starting at arc-length `start` with length
/// `len`, interpolating the cut points.
fn slice_polyline(line: &PointSet, start: f64, len: f64) -> PointSet {
    let total = line.length();
    let end = (start + len).min(total);

    let mut points = Vec::new();
    if let Some(p) = line.point_along(start) {
        points.push(p);
    }

    let mut walked = 0.0;
    for seg in line.points().windows(2) {
        let seg_len = seg[0].distance(seg[1]);
        let vertex_offset = walked + seg_len;
        if vertex_offset > start && vertex_offset < end {
            points.push(seg[1]);
        }
        walked = vertex_offset;
    }

    if let Some(p) = line.point_along(end) {
        points.push(p);
    }
    PointSet::new(points)
}
