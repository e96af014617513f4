//! The labeling engine.
//!
//! [`Pal`] owns the layers and drives one labeling pass: preprocessing
//! (join, chop), parallel candidate generation per layer, conflict-graph
//! construction, selection search, and result assembly. A pass can be
//! aborted cooperatively from another thread through [`Pal::cancel_handle`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use cartolabel_core::{
    Aabb, EngineConfig, LabelingResult, Result, SearchConfig, SearchMethod, SearchProblem,
    SearchRunner,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::feature::{FeaturePart, GeomKind};
use crate::label::LabelPosition;
use crate::layer::{Layer, ObstacleKind};
use crate::pointset::{path_intersects_ring, point_in_ring, segments_intersect, Point};
use crate::problem::Problem;

/// Obstacle surcharge factor applied per unit of obstacle weight.
const OBSTACLE_COST_FACTOR: f64 = 0.1;

/// One labeling unit produced by candidate generation.
struct GeneratedUnit {
    feature: String,
    layer: String,
    priority: f64,
    always_show: bool,
    candidates: Vec<LabelPosition>,
}

/// The label placement engine.
pub struct Pal {
    config: EngineConfig,
    layers: Vec<Layer>,
    cancelled: Arc<AtomicBool>,
}

impl Default for Pal {
    fn default() -> Self {
        Self::new()
    }
}

impl Pal {
    /// Creates an engine with the default configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Creates an engine with the given configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            layers: Vec::new(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Adds a layer and returns a reference to it.
    pub fn add_layer(&mut self, layer: Layer) -> &Layer {
        self.layers.push(layer);
        &self.layers[self.layers.len() - 1]
    }

    /// Looks up a layer by name.
    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name() == name)
    }

    /// Looks up a layer by name, mutably.
    pub fn layer_mut(&mut self, name: &str) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.name() == name)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Returns the cancellation handle; storing `true` aborts the running
    /// pass at the next checkpoint, yielding a partial result.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    /// Runs one labeling pass over the given extent.
    pub fn compute_labeling(&mut self, extent: &Aabb) -> Result<LabelingResult> {
        let start = Instant::now();
        self.cancelled.store(false, Ordering::Relaxed);

        log::info!(
            "labeling pass over [{:.1}, {:.1}] x [{:.1}, {:.1}], {} layers",
            extent.min_x,
            extent.max_x,
            extent.min_y,
            extent.max_y,
            self.layers.len()
        );

        // Preprocessing mutates the part arenas before any candidate exists
        for layer in &self.layers {
            if !layer.is_active() {
                continue;
            }
            if layer.merge_connected() {
                layer.join_connected_features();
            }
            layer.chop_features_at_repeat_distance();
        }

        // A label can stick out of its part's bbox by its own size plus the
        // offset distance; widen the query so border features still label.
        let mut margin = 0.0f64;
        for layer in self.layers.iter().filter(|l| l.is_active()) {
            layer.for_each_part(|part| {
                let info = part.info();
                margin = margin.max(info.width().max(info.height()) + info.distance());
            });
        }
        let viewport = extent.expanded(margin);

        let config = &self.config;
        let cancelled = &self.cancelled;
        let generated: Vec<(Vec<GeneratedUnit>, Vec<(FeaturePart, ObstacleKind)>)> = self
            .layers
            .par_iter()
            .filter(|layer| layer.is_active())
            .map(|layer| {
                if cancelled.load(Ordering::Relaxed) {
                    return (Vec::new(), Vec::new());
                }
                Self::generate_layer(layer, config, &viewport, extent)
            })
            .collect();

        let mut units = Vec::new();
        let mut obstacles = Vec::new();
        for (layer_units, layer_obstacles) in generated {
            units.extend(layer_units);
            obstacles.extend(layer_obstacles);
        }

        // Candidates crossing an obstacle stay usable but cost more
        for unit in &mut units {
            for candidate in &mut unit.candidates {
                for (part, kind) in &obstacles {
                    if blocked_by_obstacle(candidate, part, *kind) {
                        candidate
                            .add_cost(OBSTACLE_COST_FACTOR * part.info().obstacle_weight());
                    }
                }
            }
        }

        let mut problem = Problem::new(self.config.conflict_penalty);
        for unit in units {
            problem.add_unit(
                unit.feature,
                unit.layer,
                unit.priority,
                unit.always_show,
                unit.candidates,
            );
        }
        problem.build_conflicts();

        let mut result = LabelingResult::new().with_method(self.config.search_method.name());
        result.candidates_generated = problem.candidate_count();
        result.conflicts = problem.conflict_count();

        let (labels, unplaced, iterations, search_cancelled) =
            match self.config.search_method {
                SearchMethod::Greedy => {
                    let mut rng = match self.config.seed {
                        Some(seed) => StdRng::seed_from_u64(seed),
                        None => StdRng::from_entropy(),
                    };
                    let mut solution = problem.initial_solution(&mut rng);
                    problem.enforce_no_overlap(&mut solution);
                    let (labels, unplaced) = problem.extract(&solution);
                    (labels, unplaced, 0, false)
                }
                SearchMethod::Chain => {
                    let mut search_config = SearchConfig::new()
                        .with_max_iterations(self.config.max_iterations);
                    if let Some(seed) = self.config.seed {
                        search_config = search_config.with_seed(seed);
                    }
                    let runner = SearchRunner::new(search_config, problem)
                        .with_cancel_flag(self.cancelled.clone());
                    let outcome = runner.run();

                    let mut solution = outcome.best;
                    runner.problem().enforce_no_overlap(&mut solution);
                    let (labels, unplaced) = runner.problem().extract(&solution);
                    (labels, unplaced, outcome.iterations, outcome.cancelled)
                }
            };

        result.labels = labels;
        result.unplaced = unplaced;
        result.iterations = iterations;
        result.cancelled = search_cancelled || self.cancelled.load(Ordering::Relaxed);
        result.deduplicate_unplaced();
        result.computation_time_ms = start.elapsed().as_millis() as u64;

        log::info!(
            "labeling pass done: {} placed, {} unplaced, {} conflicts, {} ms",
            result.placed_count(),
            result.unplaced_count(),
            result.conflicts,
            result.computation_time_ms
        );
        Ok(result)
    }

    /// Generates units and obstacles for one layer.
    fn generate_layer(
        layer: &Layer,
        config: &EngineConfig,
        viewport: &Aabb,
        extent: &Aabb,
    ) -> (Vec<GeneratedUnit>, Vec<(FeaturePart, ObstacleKind)>) {
        let mut units = Vec::new();
        let mut obstacles = Vec::new();

        for part in layer.parts_in(viewport) {
            let info = part.info();
            if info.is_obstacle() {
                obstacles.push((part.clone(), layer.obstacle_kind()));
                // Obstacle-only features carry no label box
                if info.width() <= 0.0 || info.height() <= 0.0 {
                    continue;
                }
            }

            let budget = config.budget_for(part.kind().budget_index());
            let mut candidates =
                part.generate_candidates(layer.arrangement(), budget, layer.fit_in_polygon());
            if !config.show_partial {
                candidates.retain(|c| extent.contains(&c.bbox()));
            }

            units.push(GeneratedUnit {
                feature: info.id().to_string(),
                layer: layer.name().to_string(),
                priority: part.priority(layer.default_priority()),
                always_show: info.always_show(),
                candidates,
            });
        }

        log::debug!(
            "layer '{}': {} units, {} obstacles",
            layer.name(),
            units.len(),
            obstacles.len()
        );
        (units, obstacles)
    }
}

/// Returns true if the candidate's label box conflicts with the obstacle
/// geometry.
fn blocked_by_obstacle(
    candidate: &LabelPosition,
    part: &FeaturePart,
    kind: ObstacleKind,
) -> bool {
    if !candidate.bbox().intersects(part.bbox()) {
        return false;
    }

    let corners = candidate.corners();
    let mut path = corners.to_vec();
    path.push(corners[0]);

    match part.kind() {
        GeomKind::Point => {
            let Some(&p) = part.set().points().first() else {
                return false;
            };
            point_in_ring(p, &corners)
        }
        GeomKind::Line => path_crosses_polyline(&path, part.set().points()),
        GeomKind::Polygon => {
            let boundary_hit = path_intersects_ring(&path, part.set().points());
            match kind {
                ObstacleKind::PolygonBoundary => boundary_hit,
                ObstacleKind::PolygonInterior => {
                    boundary_hit || part.set().contains(corners[0], part.holes())
                }
            }
        }
    }
}

/// Segment-against-segment test of an open path against an open polyline.
fn path_crosses_polyline(path: &[Point], line: &[Point]) -> bool {
    for a in path.windows(2) {
        for b in line.windows(2) {
            if segments_intersect(a[0], a[1], b[0], b[1]) {
                return true;
            }
        }
    }
    false
}
