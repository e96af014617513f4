//! The selection problem.
//!
//! Candidates from all layers are pooled, a conflict graph is built over
//! pairs whose oriented boxes overlap, and the assignment (one candidate or
//! none per labeling unit) is optimized by the local-search runner in
//! `cartolabel_core::search`.

use cartolabel_core::{CharPosition, PlacedLabel, SearchProblem};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::label::LabelPosition;
use crate::spatial_index::{IndexEntry, SpatialIndex};

/// Objective weight of an unplaced unit, before priority weighting.
const UNPLACED_PENALTY: f64 = 2.0;

/// One labeling unit: a feature part with its pooled candidates.
#[derive(Debug)]
pub struct LabelUnit {
    /// Feature id, for reporting.
    pub feature: String,
    /// Owning layer name.
    pub layer: String,
    /// Effective priority in [0.0001, 1.0]; lower is more important.
    pub priority: f64,
    /// Never drop this unit's label for conflicts.
    pub always_show: bool,
    /// Global ids of this unit's candidates, cheapest first.
    pub candidates: Vec<usize>,
}

impl LabelUnit {
    /// Objective weight: important units count roughly double.
    fn weight(&self) -> f64 {
        1.0 + (1.0 - self.priority)
    }
}

/// An assignment: the chosen candidate id per unit, or `None` for unplaced.
pub type Assignment = Vec<Option<usize>>;

/// The pooled selection problem over all layers.
#[derive(Debug, Default)]
pub struct Problem {
    candidates: Vec<LabelPosition>,
    units: Vec<LabelUnit>,
    /// Per-candidate adjacency: ids of overlapping candidates of other units.
    conflicts: Vec<Vec<usize>>,
    conflict_penalty: f64,
}

impl Problem {
    /// Creates an empty problem.
    pub fn new(conflict_penalty: f64) -> Self {
        Self {
            conflict_penalty: conflict_penalty.max(0.0),
            ..Self::default()
        }
    }

    /// Adds one labeling unit with its candidates.
    ///
    /// Candidates are sorted by cost and assigned global ids; units with an
    /// empty candidate list are accepted and reported as unplaced.
    pub fn add_unit(
        &mut self,
        feature: impl Into<String>,
        layer: impl Into<String>,
        priority: f64,
        always_show: bool,
        mut candidates: Vec<LabelPosition>,
    ) {
        candidates.sort_by(|a, b| {
            a.cost
                .partial_cmp(&b.cost)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let unit_id = self.units.len();
        let mut ids = Vec::with_capacity(candidates.len());
        for mut candidate in candidates {
            candidate.id = self.candidates.len();
            candidate.unit = unit_id;
            ids.push(candidate.id);
            self.candidates.push(candidate);
        }

        self.units.push(LabelUnit {
            feature: feature.into(),
            layer: layer.into(),
            priority: priority.clamp(0.0001, 1.0),
            always_show,
            candidates: ids,
        });
    }

    /// Builds the conflict graph.
    ///
    /// Bounding boxes are pre-filtered through an R-tree; surviving pairs
    /// are confirmed with the oriented overlap test. Candidates of the same
    /// unit are mutually exclusive by construction and carry no edge.
    pub fn build_conflicts(&mut self) {
        let entries: Vec<IndexEntry> = self
            .candidates
            .iter()
            .map(|c| IndexEntry::new(c.id, &c.bbox()))
            .collect();
        let index = SpatialIndex::with_entries(entries);

        self.conflicts = vec![Vec::new(); self.candidates.len()];
        for candidate in &self.candidates {
            for entry in index.query(&candidate.bbox()) {
                if entry.index <= candidate.id {
                    continue;
                }
                let other = &self.candidates[entry.index];
                if other.unit == candidate.unit {
                    continue;
                }
                if candidate.overlaps_with(other) {
                    self.conflicts[candidate.id].push(other.id);
                }
            }
        }

        // Mirror edges so each adjacency list is complete
        let forward: Vec<(usize, Vec<usize>)> = self
            .conflicts
            .iter()
            .enumerate()
            .map(|(id, adj)| (id, adj.clone()))
            .collect();
        for (id, adj) in forward {
            for other in adj {
                self.conflicts[other].push(id);
            }
        }

        log::debug!(
            "conflict graph: {} candidates, {} edges",
            self.candidates.len(),
            self.conflict_count()
        );
    }

    /// Number of undirected conflict edges.
    pub fn conflict_count(&self) -> usize {
        self.conflicts.iter().map(|adj| adj.len()).sum::<usize>() / 2
    }

    /// Number of pooled candidates.
    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    /// Number of labeling units.
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn candidate(&self, id: usize) -> &LabelPosition {
        &self.candidates[id]
    }

    /// Candidate ids of `solution` that conflict with another active
    /// candidate.
    fn active_conflicts(&self, solution: &Assignment) -> Vec<(usize, usize)> {
        let mut active = vec![false; self.candidates.len()];
        for chosen in solution.iter().flatten() {
            active[*chosen] = true;
        }

        let mut pairs = Vec::new();
        for chosen in solution.iter().flatten() {
            for &other in &self.conflicts[*chosen] {
                if active[other] && other > *chosen {
                    pairs.push((*chosen, other));
                }
            }
        }
        pairs
    }

    /// Incremental objective of assigning `choice` to `unit` while the rest
    /// of `solution` stays fixed.
    fn unit_objective(&self, solution: &Assignment, unit: usize, choice: Option<usize>) -> f64 {
        let weight = self.units[unit].weight();
        let Some(id) = choice else {
            return UNPLACED_PENALTY * weight;
        };

        let mut total = self.candidates[id].cost * weight;
        for &other in &self.conflicts[id] {
            let other_unit = self.candidates[other].unit;
            if other_unit != unit && solution[other_unit] == Some(other) {
                total += self.conflict_penalty
                    * (weight + self.units[other_unit].weight())
                    / 2.0;
            }
        }
        total
    }

    /// Removes the costlier label of each residual overlapping pair.
    ///
    /// The search minimizes conflicts but does not forbid them; this pass
    /// enforces the hard non-overlap guarantee. Pairs where both units are
    /// always-show are left alone.
    pub fn enforce_no_overlap(&self, solution: &mut Assignment) {
        loop {
            let offending = self.active_conflicts(solution).into_iter().find(|&(a, b)| {
                let (ua, ub) = (self.candidates[a].unit, self.candidates[b].unit);
                !(self.units[ua].always_show && self.units[ub].always_show)
            });
            let Some((a, b)) = offending else {
                break;
            };

            let (ua, ub) = (self.candidates[a].unit, self.candidates[b].unit);
            let drop = if self.units[ua].always_show {
                ub
            } else if self.units[ub].always_show {
                ua
            } else {
                // Less important unit loses; equal priority drops the
                // costlier placement.
                let (pa, pb) = (self.units[ua].priority, self.units[ub].priority);
                if pa > pb {
                    ua
                } else if pb > pa {
                    ub
                } else if self.candidates[a].cost > self.candidates[b].cost {
                    ua
                } else {
                    ub
                }
            };
            solution[drop] = None;
        }
    }

    /// Converts an assignment into placements and unplaced feature ids.
    pub fn extract(&self, solution: &Assignment) -> (Vec<PlacedLabel>, Vec<String>) {
        let mut labels = Vec::new();
        let mut unplaced = Vec::new();

        for (unit, choice) in self.units.iter().zip(solution.iter()) {
            match choice {
                Some(id) => {
                    let c = &self.candidates[*id];
                    labels.push(PlacedLabel {
                        feature: unit.feature.clone(),
                        layer: unit.layer.clone(),
                        x: c.x,
                        y: c.y,
                        width: c.width,
                        height: c.height,
                        angle: c.angle,
                        cost: c.cost,
                        chars: c
                            .chars
                            .iter()
                            .map(|ch| CharPosition {
                                x: ch.x,
                                y: ch.y,
                                angle: ch.angle,
                                width: ch.width,
                            })
                            .collect(),
                    });
                }
                None => unplaced.push(unit.feature.clone()),
            }
        }
        (labels, unplaced)
    }
}

impl SearchProblem for Problem {
    type Solution = Assignment;

    /// Greedy assignment: units in priority order each take the choice with
    /// the lowest incremental objective given the units placed so far.
    fn initial_solution<R: Rng>(&self, _rng: &mut R) -> Assignment {
        let mut order: Vec<usize> = (0..self.units.len()).collect();
        order.sort_by(|&a, &b| {
            self.units[a]
                .priority
                .partial_cmp(&self.units[b].priority)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut solution: Assignment = vec![None; self.units.len()];
        for unit in order {
            let mut best: Option<usize> = None;
            let mut best_objective = if self.units[unit].always_show {
                f64::INFINITY
            } else {
                self.unit_objective(&solution, unit, None)
            };
            for &id in &self.units[unit].candidates {
                let objective = self.unit_objective(&solution, unit, Some(id));
                if objective < best_objective {
                    best_objective = objective;
                    best = Some(id);
                }
            }
            if best.is_none() && self.units[unit].always_show {
                // Always-show units take their cheapest candidate regardless
                best = self.units[unit].candidates.first().copied();
            }
            solution[unit] = best;
        }
        solution
    }

    fn evaluate(&self, solution: &Assignment) -> f64 {
        let mut total = 0.0;
        for (unit, choice) in self.units.iter().zip(solution.iter()) {
            match choice {
                Some(id) => total += self.candidates[*id].cost * unit.weight(),
                None => total += UNPLACED_PENALTY * unit.weight(),
            }
        }
        for (a, b) in self.active_conflicts(solution) {
            let wa = self.units[self.candidates[a].unit].weight();
            let wb = self.units[self.candidates[b].unit].weight();
            total += self.conflict_penalty * (wa + wb) / 2.0;
        }
        total
    }

    /// Reassigns one unit currently involved in a conflict (or unplaced) to
    /// its best alternative; the chain of displaced neighbors is picked up
    /// on subsequent iterations.
    fn improving_neighbor<R: Rng>(
        &self,
        solution: &Assignment,
        rng: &mut R,
    ) -> Option<Assignment> {
        let mut troubled: Vec<usize> = Vec::new();
        for (a, b) in self.active_conflicts(solution) {
            troubled.push(self.candidates[a].unit);
            troubled.push(self.candidates[b].unit);
        }
        for (unit, choice) in solution.iter().enumerate() {
            if choice.is_none() && !self.units[unit].candidates.is_empty() {
                troubled.push(unit);
            }
        }
        troubled.sort_unstable();
        troubled.dedup();
        troubled.shuffle(rng);

        for unit in troubled {
            let current = self.unit_objective(solution, unit, solution[unit]);

            let mut choices: Vec<Option<usize>> =
                self.units[unit].candidates.iter().map(|&id| Some(id)).collect();
            if !self.units[unit].always_show {
                choices.push(None);
            }

            let mut best = solution[unit];
            let mut best_objective = current;
            for choice in choices {
                if choice == solution[unit] {
                    continue;
                }
                let objective = self.unit_objective(solution, unit, choice);
                if objective < best_objective - 1e-12 {
                    best_objective = objective;
                    best = choice;
                }
            }

            if best != solution[unit] {
                let mut neighbor = solution.clone();
                neighbor[unit] = best;
                return Some(neighbor);
            }
        }
        None
    }
}
