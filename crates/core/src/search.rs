//! Local-search framework for candidate selection.
//!
//! The selection phase is a descent over label assignments: starting from a
//! greedy initial solution, the runner repeatedly asks the problem for an
//! improving neighbor and accepts it only if the objective strictly
//! decreases. Termination: local optimum, iteration budget, stall limit, or
//! cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for the search runner.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SearchConfig {
    /// Maximum accepted moves (0 = unlimited).
    pub max_iterations: u64,

    /// Consecutive non-improving proposals tolerated before stopping.
    pub max_stall: u64,

    /// Random seed (None = from entropy).
    pub seed: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3000,
            max_stall: 50,
            seed: None,
        }
    }
}

impl SearchConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the iteration budget.
    pub fn with_max_iterations(mut self, iterations: u64) -> Self {
        self.max_iterations = iterations;
        self
    }

    /// Sets the stall limit.
    pub fn with_max_stall(mut self, stall: u64) -> Self {
        self.max_stall = stall.max(1);
        self
    }

    /// Sets the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// A problem solvable by the local-search runner.
pub trait SearchProblem {
    /// Solution representation.
    type Solution: Clone;

    /// Builds the initial (greedy) solution.
    fn initial_solution<R: rand::Rng>(&self, rng: &mut R) -> Self::Solution;

    /// Evaluates a solution; lower is better.
    fn evaluate(&self, solution: &Self::Solution) -> f64;

    /// Proposes a neighbor expected to improve on `solution`.
    ///
    /// Returning `None` signals a local optimum; the runner stops.
    fn improving_neighbor<R: rand::Rng>(
        &self,
        solution: &Self::Solution,
        rng: &mut R,
    ) -> Option<Self::Solution>;

    /// Hook invoked after every accepted move.
    fn on_improvement(&self, iteration: u64, objective: f64) {
        log::debug!("search iteration {}: objective={:.4}", iteration, objective);
    }
}

/// Outcome of a search run.
#[derive(Debug, Clone)]
pub struct SearchOutcome<S> {
    /// Best solution found.
    pub best: S,
    /// Objective of the best solution.
    pub objective: f64,
    /// Accepted moves.
    pub iterations: u64,
    /// Objective after each accepted move.
    pub history: Vec<f64>,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
    /// True if the run was cancelled before convergence.
    pub cancelled: bool,
}

/// Runs a [`SearchProblem`] to a local optimum.
pub struct SearchRunner<P: SearchProblem> {
    config: SearchConfig,
    problem: P,
    cancelled: Arc<AtomicBool>,
}

impl<P: SearchProblem> SearchRunner<P> {
    /// Creates a runner for the given problem.
    pub fn new(config: SearchConfig, problem: P) -> Self {
        Self {
            config,
            problem,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the cancellation handle; storing `true` aborts the run.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    /// Uses an external cancellation flag instead of an internal one.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancelled = flag;
        self
    }

    /// Returns the underlying problem.
    pub fn problem(&self) -> &P {
        &self.problem
    }

    /// Runs the descent and returns the best solution found.
    pub fn run(&self) -> SearchOutcome<P::Solution> {
        let start = Instant::now();
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut best = self.problem.initial_solution(&mut rng);
        let mut objective = self.problem.evaluate(&best);
        let mut history = vec![objective];
        let mut iterations = 0u64;
        let mut stall = 0u64;
        let mut cancelled = false;

        loop {
            if self.cancelled.load(Ordering::Relaxed) {
                cancelled = true;
                break;
            }
            if self.config.max_iterations > 0 && iterations >= self.config.max_iterations {
                break;
            }
            if stall >= self.config.max_stall {
                break;
            }

            let Some(neighbor) = self.problem.improving_neighbor(&best, &mut rng) else {
                break;
            };

            let neighbor_objective = self.problem.evaluate(&neighbor);
            if neighbor_objective < objective - 1e-12 {
                best = neighbor;
                objective = neighbor_objective;
                iterations += 1;
                stall = 0;
                history.push(objective);
                self.problem.on_improvement(iterations, objective);
            } else {
                // Proposal did not hold up under full evaluation.
                stall += 1;
            }
        }

        SearchOutcome {
            best,
            objective,
            iterations,
            history,
            elapsed: start.elapsed(),
            cancelled,
        }
    }
}
