//! Convergence criteria for the Levenberg-Marquardt minimizer.
//!
//! This module defines the criteria used to determine when an optimization
//! run has converged, and the coarse status reported to fitters.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Possible convergence states inside a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvergenceStatus {
    /// The algorithm is still running.
    Running,

    /// The algorithm has converged due to a small parameter change.
    ParameterConvergence,

    /// The algorithm has converged due to a small function value change.
    FunctionValueConvergence,

    /// The algorithm has converged due to a small gradient.
    GradientConvergence,

    /// No step could reduce the cost any further before the damping
    /// parameter reached its ceiling.
    Stalled,

    /// The algorithm has terminated due to reaching the maximum number of iterations.
    MaxIterationsReached,

    /// The algorithm has terminated due to a numerical error.
    NumericalError,
}

impl ConvergenceStatus {
    /// Returns true if the optimization has terminated (either converged or failed).
    pub fn is_terminated(&self) -> bool {
        !matches!(self, ConvergenceStatus::Running)
    }

    /// Returns true if the optimization has converged.
    pub fn is_converged(&self) -> bool {
        matches!(
            self,
            ConvergenceStatus::ParameterConvergence
                | ConvergenceStatus::FunctionValueConvergence
                | ConvergenceStatus::GradientConvergence
                | ConvergenceStatus::Stalled
        )
    }

    /// Returns a description of the convergence status.
    pub fn description(&self) -> &'static str {
        match self {
            ConvergenceStatus::Running => "Optimization is still running",
            ConvergenceStatus::ParameterConvergence => "Converged: small parameter change",
            ConvergenceStatus::FunctionValueConvergence => "Converged: small cost change",
            ConvergenceStatus::GradientConvergence => "Converged: small gradient",
            ConvergenceStatus::Stalled => "Converged: cost cannot be reduced further",
            ConvergenceStatus::MaxIterationsReached => "Terminated: maximum iterations reached",
            ConvergenceStatus::NumericalError => "Terminated: numerical error",
        }
    }

    /// The coarse status reported to callers of a minimizer.
    pub fn minimizer_status(&self) -> MinimizerStatus {
        match self {
            ConvergenceStatus::MaxIterationsReached | ConvergenceStatus::Running => {
                MinimizerStatus::MaxIterationsReached
            }
            ConvergenceStatus::NumericalError => MinimizerStatus::NumericalFailure,
            _ => MinimizerStatus::Converged,
        }
    }
}

/// Outcome of one optimization run as seen by fitters and result sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MinimizerStatus {
    /// The run met one of its convergence criteria.
    Converged,

    /// The iteration budget ran out before convergence.
    MaxIterationsReached,

    /// The run broke down, e.g. on a singular Jacobian.
    NumericalFailure,
}

impl MinimizerStatus {
    /// Returns true unless the run failed numerically.
    pub fn is_usable(&self) -> bool {
        !matches!(self, MinimizerStatus::NumericalFailure)
    }

    /// Integer code written by text result sinks: 0 converged, 1 iteration
    /// budget exhausted, 2 numerical failure.
    pub fn code(&self) -> i32 {
        match self {
            MinimizerStatus::Converged => 0,
            MinimizerStatus::MaxIterationsReached => 1,
            MinimizerStatus::NumericalFailure => 2,
        }
    }
}

/// Criteria for determining when a run has converged.
#[derive(Debug, Clone)]
pub struct ConvergenceCriteria {
    /// Tolerance for the scaled change in parameter values.
    pub xtol: f64,

    /// Tolerance for the relative change in cost.
    pub ftol: f64,

    /// Tolerance for the scaled gradient norm.
    pub gtol: f64,

    /// Maximum number of iterations.
    pub max_iterations: usize,
}

impl ConvergenceCriteria {
    /// Creates a new set of convergence criteria with the given tolerances.
    pub fn new(xtol: f64, ftol: f64, gtol: f64, max_iterations: usize) -> Self {
        Self {
            xtol,
            ftol,
            gtol,
            max_iterations,
        }
    }

    /// Checks whether an accepted step has converged.
    ///
    /// Parameter changes are measured in the Marquardt-scaled norm, with
    /// `scale[i] = sqrt((JᵀJ)ᵢᵢ)`, so coordinates of very different magnitude
    /// contribute in proportion to their effect on the residuals.
    ///
    /// # Arguments
    ///
    /// * `params` - The parameter values before the step
    /// * `new_params` - The parameter values after the step
    /// * `scale` - Per-parameter scale factors
    /// * `cost` - The cost before the step
    /// * `new_cost` - The cost after the step
    /// * `gradient_norm` - The scaled gradient norm at `params`
    /// * `iterations` - The number of iterations so far
    pub fn check(
        &self,
        params: &Array1<f64>,
        new_params: &Array1<f64>,
        scale: &Array1<f64>,
        cost: f64,
        new_cost: f64,
        gradient_norm: f64,
        iterations: usize,
    ) -> ConvergenceStatus {
        if gradient_norm < self.gtol {
            return ConvergenceStatus::GradientConvergence;
        }

        let scaled_step = scaled_norm(&(new_params - params), scale);
        let scaled_params = scaled_norm(new_params, scale);
        if scaled_step <= self.xtol * (scaled_params + self.xtol) {
            return ConvergenceStatus::ParameterConvergence;
        }

        let cost_change = (cost - new_cost).abs() / cost.max(f64::MIN_POSITIVE);
        if cost_change < self.ftol {
            return ConvergenceStatus::FunctionValueConvergence;
        }

        if iterations >= self.max_iterations {
            return ConvergenceStatus::MaxIterationsReached;
        }

        ConvergenceStatus::Running
    }
}

/// Euclidean norm of `v` after elementwise scaling.
pub fn scaled_norm(v: &Array1<f64>, scale: &Array1<f64>) -> f64 {
    v.iter()
        .zip(scale.iter())
        .map(|(x, s)| (x * s).powi(2))
        .sum::<f64>()
        .sqrt()
}
