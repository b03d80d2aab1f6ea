//! Solving many independent problems.
//!
//! Problems are borrowed immutably and share nothing, so they can be solved
//! concurrently. Parallel iteration uses rayon when the `parallel` feature is
//! enabled and the batch is large enough.

use serde::{Deserialize, Serialize};

use crate::config::SolverSettings;
use crate::continuation::{BarrierSolver, Problem};
use crate::error::OptimResult;
use crate::objective::Objective;
use crate::state::SolveResult;

/// Controls parallelism for batch solves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Enable parallel processing (requires the `parallel` feature).
    pub parallel: bool,
    /// Minimum batch size to trigger parallel processing.
    pub parallel_threshold: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            parallel_threshold: 4,
        }
    }
}

impl BatchConfig {
    /// Sequential configuration.
    #[must_use]
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }

    /// Sets the threshold for parallel processing.
    #[must_use]
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// Returns true if a batch of `count` problems should run in parallel.
    #[must_use]
    pub fn should_parallelize(&self, count: usize) -> bool {
        cfg!(feature = "parallel") && self.parallel && count >= self.parallel_threshold
    }
}

/// Maps `f` over `items`, in parallel when `config` allows it.
#[allow(unused_variables)]
pub fn maybe_parallel_map<T, U, F>(items: &[T], config: &BatchConfig, f: F) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> U + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        if config.should_parallelize(items.len()) {
            return items.par_iter().map(f).collect();
        }
    }

    items.iter().map(f).collect()
}

/// Solves every problem with the same settings. Results are in input order.
pub fn solve_batch<O>(
    problems: &[Problem<O>],
    settings: &SolverSettings,
    config: &BatchConfig,
) -> Vec<OptimResult<SolveResult>>
where
    O: Objective + Sync,
{
    let solver = BarrierSolver::new(*settings);
    maybe_parallel_map(problems, config, |problem| solver.solve(problem))
}
