//! Problem definition trait.
//!
//! This module defines the `Problem` trait, which represents a nonlinear
//! least squares problem posed in optimization space. Minimizers only ever see
//! a `Problem`; the physical constraints of a compartment model live in the
//! codec that the problem applies before predicting a signal.

use crate::error::{FitError, Result};
use ndarray::{Array1, Array2};

/// A trait representing a nonlinear least squares problem.
pub trait Problem {
    /// Evaluate the residuals at the given parameters.
    ///
    /// # Arguments
    ///
    /// * `params` - The parameter values at which to evaluate the residuals
    ///
    /// # Returns
    ///
    /// * A vector of residuals, or an error if the evaluation fails
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>>;

    /// Get the number of parameters in the problem.
    fn parameter_count(&self) -> usize;

    /// Get the number of residuals in the problem.
    fn residual_count(&self) -> usize;

    /// Evaluate the analytic Jacobian matrix at the given parameters.
    ///
    /// Only consulted when [`Problem::has_custom_jacobian`] returns true;
    /// otherwise minimizers fall back to forward finite differences.
    fn jacobian(&self, _params: &Array1<f64>) -> Result<Array2<f64>> {
        Err(FitError::FunctionEvaluation(
            "no analytic Jacobian available".to_string(),
        ))
    }

    /// Check if this problem provides a custom Jacobian implementation.
    fn has_custom_jacobian(&self) -> bool {
        false
    }

    /// Evaluate the sum of squared residuals at the given parameters.
    fn eval_cost(&self, params: &Array1<f64>) -> Result<f64> {
        let residuals = self.eval(params)?;
        Ok(residuals.iter().map(|r| r.powi(2)).sum())
    }
}

/// A `Problem` built from a residual closure.
///
/// Handy for driving a minimizer with an ad-hoc objective, e.g. in tests or
/// when the caller already has the residual function at hand.
pub struct FnProblem<F>
where
    F: Fn(&Array1<f64>) -> Result<Array1<f64>>,
{
    residuals: F,
    n_params: usize,
    n_residuals: usize,
}

impl<F> FnProblem<F>
where
    F: Fn(&Array1<f64>) -> Result<Array1<f64>>,
{
    /// Wrap `residuals` as a problem with the given dimensions.
    pub fn new(residuals: F, n_params: usize, n_residuals: usize) -> Self {
        Self {
            residuals,
            n_params,
            n_residuals,
        }
    }
}

impl<F> Problem for FnProblem<F>
where
    F: Fn(&Array1<f64>) -> Result<Array1<f64>>,
{
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        (self.residuals)(params)
    }

    fn parameter_count(&self) -> usize {
        self.n_params
    }

    fn residual_count(&self) -> usize {
        self.n_residuals
    }
}
