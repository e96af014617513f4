//! Engine configuration.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Candidate selection method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SearchMethod {
    /// Lowest-cost candidate per feature, no conflict resolution pass.
    Greedy,
    /// Greedy initial assignment followed by chain local search.
    #[default]
    Chain,
}

impl SearchMethod {
    /// Returns a short name for reporting.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Greedy => "Greedy",
            Self::Chain => "Chain",
        }
    }
}

/// Global engine configuration.
///
/// Budgets are per feature part; generation stops early once the budget for
/// the part's geometry kind is reached.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EngineConfig {
    /// Candidate selection method.
    pub search_method: SearchMethod,

    /// Maximum candidates for a point feature.
    pub candidates_point: usize,

    /// Maximum candidates for a line feature.
    pub candidates_line: usize,

    /// Maximum candidates for a polygon feature.
    pub candidates_polygon: usize,

    /// Iteration budget for the selection search.
    pub max_iterations: u64,

    /// Objective weight of one unresolved conflict.
    ///
    /// This is a tuning parameter of the chain heuristic: larger values
    /// favor dropping labels over keeping overlapping ones during search.
    pub conflict_penalty: f64,

    /// Admit labels that overhang the requested extent.
    pub show_partial: bool,

    /// Random seed for search tie-breaking (None = from entropy).
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            search_method: SearchMethod::default(),
            candidates_point: 16,
            candidates_line: 50,
            candidates_polygon: 30,
            max_iterations: 3000,
            conflict_penalty: 10.0,
            show_partial: true,
            seed: None,
        }
    }
}

impl EngineConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the selection method.
    pub fn with_search_method(mut self, method: SearchMethod) -> Self {
        self.search_method = method;
        self
    }

    /// Sets the per-kind candidate budgets.
    pub fn with_candidate_budgets(mut self, point: usize, line: usize, polygon: usize) -> Self {
        self.candidates_point = point.max(1);
        self.candidates_line = line.max(1);
        self.candidates_polygon = polygon.max(1);
        self
    }

    /// Sets the selection iteration budget.
    pub fn with_max_iterations(mut self, iterations: u64) -> Self {
        self.max_iterations = iterations;
        self
    }

    /// Sets the conflict penalty weight.
    pub fn with_conflict_penalty(mut self, penalty: f64) -> Self {
        self.conflict_penalty = penalty.max(0.0);
        self
    }

    /// Sets whether labels overhanging the extent are admitted.
    pub fn with_show_partial(mut self, show: bool) -> Self {
        self.show_partial = show;
        self
    }

    /// Sets the random seed for deterministic runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Returns the candidate budget for the given geometry kind index
    /// (0 = point, 1 = line, 2 = polygon).
    pub fn budget_for(&self, kind: usize) -> usize {
        match kind {
            0 => self.candidates_point,
            1 => self.candidates_line,
            _ => self.candidates_polygon,
        }
    }
}
