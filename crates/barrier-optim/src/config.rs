//! Solver configuration.
//!
//! Every control block has sensible defaults, builder-style setters and a
//! `validate` method. [`SolverSettings`] groups them and can be loaded from
//! TOML:
//!
//! ```rust
//! use barrier_optim::config::{ConvergenceCriterion, SolverSettings};
//!
//! let settings = SolverSettings::from_toml_str(
//!     r#"
//!     [convergence]
//!     criterion = "gradient_norm"
//!     absolute_tolerance = 1e-9
//!
//!     [barrier]
//!     decay_factor = 0.2
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!(settings.convergence.criterion, ConvergenceCriterion::GradientNorm);
//! assert!((settings.barrier.decay_factor - 0.2).abs() < 1e-15);
//! ```

use std::time::Duration;

use barrier_math::linear_algebra::RegularizationConfig;
use serde::{Deserialize, Serialize};

use crate::error::{OptimError, OptimResult};

/// Which quantity the inner solver watches to decide convergence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceCriterion {
    /// Change in the augmented objective over a step, as predicted by the
    /// Newton model `−½∇φ·Δx`. The step is taken before stopping.
    #[default]
    ObjectiveSequence,
    /// Infinity norm of the augmented gradient.
    GradientNorm,
}

/// Convergence control for the inner (fixed-barrier) Newton solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergenceControl {
    /// Convergence criterion.
    pub criterion: ConvergenceCriterion,
    /// Relative tolerance.
    pub relative_tolerance: f64,
    /// Absolute tolerance.
    pub absolute_tolerance: f64,
    /// Maximum Newton iterations per barrier level.
    pub max_iterations: usize,
    /// Maximum absolute equality residual accepted at convergence.
    pub feasibility_tolerance: f64,
}

impl Default for ConvergenceControl {
    fn default() -> Self {
        Self {
            criterion: ConvergenceCriterion::ObjectiveSequence,
            relative_tolerance: 1e-14,
            absolute_tolerance: 1e-16,
            max_iterations: 100,
            feasibility_tolerance: 1e-9,
        }
    }
}

impl ConvergenceControl {
    /// Creates a control with the given criterion and default tolerances.
    #[must_use]
    pub fn new(criterion: ConvergenceCriterion) -> Self {
        Self {
            criterion,
            ..Self::default()
        }
    }

    /// Sets the relative and absolute tolerances.
    #[must_use]
    pub fn with_tolerances(mut self, relative: f64, absolute: f64) -> Self {
        self.relative_tolerance = relative;
        self.absolute_tolerance = absolute;
        self
    }

    /// Sets the maximum iterations.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the equality feasibility tolerance.
    #[must_use]
    pub fn with_feasibility_tolerance(mut self, tolerance: f64) -> Self {
        self.feasibility_tolerance = tolerance;
        self
    }

    /// Checks that all tolerances are usable.
    pub fn validate(&self) -> OptimResult<()> {
        if !(self.relative_tolerance >= 0.0 && self.absolute_tolerance >= 0.0) {
            return Err(OptimError::invalid_config(
                "convergence tolerances must be non-negative",
            ));
        }
        if self.relative_tolerance == 0.0 && self.absolute_tolerance == 0.0 {
            return Err(OptimError::invalid_config(
                "at least one convergence tolerance must be positive",
            ));
        }
        if !(self.feasibility_tolerance > 0.0) {
            return Err(OptimError::invalid_config(
                "feasibility tolerance must be positive",
            ));
        }
        if self.max_iterations == 0 {
            return Err(OptimError::invalid_config("max_iterations must be at least 1"));
        }
        Ok(())
    }
}

/// Barrier-strength schedule for the outer continuation driver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarrierControl {
    /// Initial barrier strength `μ₀`.
    pub initial_strength: f64,
    /// Factor applied to `μ` after each outer iteration, in (0, 1).
    pub decay_factor: f64,
    /// Absolute floor: the schedule stops once `μ` is at or below it.
    pub floor: f64,
    /// Maximum outer iterations.
    pub max_outer_iterations: usize,
    /// Duality gap (`μ·m_ineq`) at which the schedule stops.
    pub gap_tolerance: f64,
    /// Optional wall-clock budget for the whole solve, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_limit_secs: Option<f64>,
}

impl Default for BarrierControl {
    fn default() -> Self {
        Self {
            initial_strength: 1.0,
            decay_factor: 0.5,
            floor: 1e-9,
            max_outer_iterations: 60,
            gap_tolerance: 1e-8,
            time_limit_secs: None,
        }
    }
}

impl BarrierControl {
    /// Creates a schedule with the given initial strength and decay factor.
    #[must_use]
    pub fn new(initial_strength: f64, decay_factor: f64) -> Self {
        Self {
            initial_strength,
            decay_factor,
            ..Self::default()
        }
    }

    /// Sets the barrier floor.
    #[must_use]
    pub fn with_floor(mut self, floor: f64) -> Self {
        self.floor = floor;
        self
    }

    /// Sets the initial barrier strength.
    #[must_use]
    pub fn with_initial_strength(mut self, initial_strength: f64) -> Self {
        self.initial_strength = initial_strength;
        self
    }

    /// Sets the maximum outer iterations.
    #[must_use]
    pub fn with_max_outer_iterations(mut self, max_outer_iterations: usize) -> Self {
        self.max_outer_iterations = max_outer_iterations;
        self
    }

    /// Sets the duality gap tolerance.
    #[must_use]
    pub fn with_gap_tolerance(mut self, gap_tolerance: f64) -> Self {
        self.gap_tolerance = gap_tolerance;
        self
    }

    /// Sets the wall-clock budget.
    #[must_use]
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit_secs = Some(limit.as_secs_f64());
        self
    }

    /// Returns the wall-clock budget, if any.
    #[must_use]
    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_secs
            .filter(|s| s.is_finite() && *s >= 0.0)
            .map(Duration::from_secs_f64)
    }

    /// Checks the schedule parameters.
    pub fn validate(&self) -> OptimResult<()> {
        if !(self.initial_strength > 0.0 && self.initial_strength.is_finite()) {
            return Err(OptimError::invalid_config(format!(
                "initial barrier strength must be positive, got {}",
                self.initial_strength
            )));
        }
        if !(self.decay_factor > 0.0 && self.decay_factor < 1.0) {
            return Err(OptimError::invalid_config(format!(
                "barrier decay factor must lie in (0, 1), got {}",
                self.decay_factor
            )));
        }
        if !(self.floor > 0.0) {
            return Err(OptimError::invalid_config("barrier floor must be positive"));
        }
        if !(self.gap_tolerance >= 0.0) {
            return Err(OptimError::invalid_config(
                "gap tolerance must be non-negative",
            ));
        }
        if self.max_outer_iterations == 0 {
            return Err(OptimError::invalid_config(
                "max_outer_iterations must be at least 1",
            ));
        }
        if let Some(secs) = self.time_limit_secs {
            if !(secs >= 0.0 && secs.is_finite()) {
                return Err(OptimError::invalid_config(
                    "time limit must be a finite, non-negative number of seconds",
                ));
            }
        }
        Ok(())
    }
}

/// Strong Wolfe line-search parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineSearchControl {
    /// Sufficient decrease constant `c1`.
    pub c1: f64,
    /// Curvature constant `c2`.
    pub c2: f64,
    /// Maximum trial steps in the bracketing phase.
    pub max_iterations: usize,
    /// Maximum trial steps in the zoom phase.
    pub max_zoom_iterations: usize,
    /// Fraction of the distance to the nearest constraint boundary a step may cover.
    pub boundary_fraction: f64,
}

impl Default for LineSearchControl {
    fn default() -> Self {
        Self {
            c1: 1e-4,
            c2: 0.9,
            max_iterations: 30,
            max_zoom_iterations: 30,
            boundary_fraction: 0.995,
        }
    }
}

impl LineSearchControl {
    /// Creates a control with the given Wolfe constants.
    #[must_use]
    pub fn new(c1: f64, c2: f64) -> Self {
        Self {
            c1,
            c2,
            ..Self::default()
        }
    }

    /// Checks `0 < c1 < c2 < 1` and the iteration limits.
    pub fn validate(&self) -> OptimResult<()> {
        if !(self.c1 > 0.0 && self.c1 < self.c2 && self.c2 < 1.0) {
            return Err(OptimError::invalid_config(format!(
                "Wolfe constants require 0 < c1 < c2 < 1, got c1={}, c2={}",
                self.c1, self.c2
            )));
        }
        if self.max_iterations == 0 || self.max_zoom_iterations == 0 {
            return Err(OptimError::invalid_config(
                "line search iteration limits must be at least 1",
            ));
        }
        if !(self.boundary_fraction > 0.0 && self.boundary_fraction < 1.0) {
            return Err(OptimError::invalid_config(
                "boundary fraction must lie in (0, 1)",
            ));
        }
        Ok(())
    }
}

/// Method-of-multipliers parameters for equality constraints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PenaltyControl {
    /// Initial quadratic penalty `ρ`.
    pub initial_penalty: f64,
    /// Factor applied to `ρ` when the equality residual stalls.
    pub growth: f64,
    /// Upper bound on `ρ`.
    pub max_penalty: f64,
    /// Maximum multiplier updates per barrier level.
    pub max_multiplier_updates: usize,
}

impl Default for PenaltyControl {
    fn default() -> Self {
        Self {
            initial_penalty: 1e3,
            growth: 10.0,
            max_penalty: 1e10,
            max_multiplier_updates: 30,
        }
    }
}

impl PenaltyControl {
    /// Checks the penalty parameters.
    pub fn validate(&self) -> OptimResult<()> {
        if !(self.initial_penalty > 0.0 && self.initial_penalty <= self.max_penalty) {
            return Err(OptimError::invalid_config(
                "initial penalty must be positive and not above max_penalty",
            ));
        }
        if !(self.growth >= 1.0) {
            return Err(OptimError::invalid_config("penalty growth must be >= 1"));
        }
        Ok(())
    }
}

/// How the inner solver obtains curvature information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HessianMode {
    /// Use the objective's Hessian (Newton steps).
    #[default]
    Exact,
    /// Use a BFGS approximation of the objective curvature (quasi-Newton steps).
    Bfgs,
}

/// Hessian handling for the Newton system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HessianControl {
    /// Exact or quasi-Newton curvature.
    pub mode: HessianMode,
    /// First diagonal shift tried when the Hessian is not positive definite.
    pub initial_shift: f64,
    /// Maximum shifted factorizations before reporting a numerical stall.
    pub max_regularization_attempts: u32,
}

impl Default for HessianControl {
    fn default() -> Self {
        let reg = RegularizationConfig::default();
        Self {
            mode: HessianMode::Exact,
            initial_shift: reg.initial_shift,
            max_regularization_attempts: reg.max_attempts,
        }
    }
}

impl HessianControl {
    /// Returns the regularization config for the linear solver.
    #[must_use]
    pub fn regularization(&self) -> RegularizationConfig {
        RegularizationConfig {
            initial_shift: self.initial_shift,
            max_attempts: self.max_regularization_attempts,
            ..RegularizationConfig::default()
        }
    }

    /// Checks the regularization parameters.
    pub fn validate(&self) -> OptimResult<()> {
        if !(self.initial_shift > 0.0) {
            return Err(OptimError::invalid_config(
                "initial regularization shift must be positive",
            ));
        }
        Ok(())
    }
}

/// All solver settings.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Inner solver convergence.
    pub convergence: ConvergenceControl,
    /// Outer barrier schedule.
    pub barrier: BarrierControl,
    /// Line search.
    pub line_search: LineSearchControl,
    /// Equality penalty / multiplier updates.
    pub penalty: PenaltyControl,
    /// Newton system curvature.
    pub hessian: HessianControl,
}

impl SolverSettings {
    /// Creates settings from a convergence control and barrier schedule.
    #[must_use]
    pub fn new(convergence: ConvergenceControl, barrier: BarrierControl) -> Self {
        Self {
            convergence,
            barrier,
            ..Self::default()
        }
    }

    /// Sets the Hessian mode.
    #[must_use]
    pub fn with_hessian_mode(mut self, mode: HessianMode) -> Self {
        self.hessian.mode = mode;
        self
    }

    /// Sets the line search control.
    #[must_use]
    pub fn with_line_search(mut self, line_search: LineSearchControl) -> Self {
        self.line_search = line_search;
        self
    }

    /// Sets the penalty control.
    #[must_use]
    pub fn with_penalty(mut self, penalty: PenaltyControl) -> Self {
        self.penalty = penalty;
        self
    }

    /// Parses settings from TOML. Missing sections take their defaults.
    pub fn from_toml_str(source: &str) -> OptimResult<Self> {
        let settings: Self = toml::from_str(source).map_err(|e| OptimError::Parse {
            reason: e.to_string(),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Serializes settings to TOML.
    pub fn to_toml_string(&self) -> OptimResult<String> {
        toml::to_string(self).map_err(|e| OptimError::Parse {
            reason: e.to_string(),
        })
    }

    /// Validates every control block.
    pub fn validate(&self) -> OptimResult<()> {
        self.convergence.validate()?;
        self.barrier.validate()?;
        self.line_search.validate()?;
        self.penalty.validate()?;
        self.hessian.validate()
    }
}
