//! Implementation of the Levenberg-Marquardt algorithm.
//!
//! This module contains the minimizer every fitter drives. It works purely in
//! optimization space and knows nothing about compartments or constraints.

use ndarray::Array1;
use std::fmt;
use tracing::debug;

use crate::error::{FitError, Result};
use crate::problem::Problem;
use crate::utils::finite_difference;

use super::config::{DiffMethod, LmConfig};
use super::convergence::{ConvergenceCriteria, ConvergenceStatus, MinimizerStatus};
use super::step::LmStep;
use super::trust_region::TrustRegion;

/// Result of one minimization run.
#[derive(Debug, Clone)]
pub struct MinimizerOutcome {
    /// Best parameter values found, in optimization space
    pub params: Array1<f64>,

    /// Sum of squared residuals at `params`
    pub cost: f64,

    /// Number of iterations performed
    pub iterations: usize,

    /// Number of function evaluations
    pub func_evals: usize,

    /// Coarse termination status
    pub status: MinimizerStatus,

    /// A message describing the result
    pub message: String,
}

impl fmt::Display for MinimizerOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Optimization Result:")?;
        writeln!(f, "  Status: {:?}", self.status)?;
        writeln!(f, "  Message: {}", self.message)?;
        writeln!(f, "  Cost: {:.6e}", self.cost)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        writeln!(f, "  Function evaluations: {}", self.func_evals)?;
        writeln!(f, "  Parameters: {:?}", self.params)?;
        Ok(())
    }
}

/// A least-squares minimizer working in unconstrained optimization space.
///
/// Each call is independent: implementations keep no state between runs, so
/// one instance may serve any number of voxels.
pub trait Minimizer: Send + Sync {
    /// Minimize `Σ r(x)²` starting from `start`.
    ///
    /// A run that breaks down numerically is reported through
    /// [`MinimizerStatus::NumericalFailure`], not as an error; errors are
    /// reserved for malformed problems and failing residual evaluations.
    fn minimize(&self, problem: &dyn Problem, start: Array1<f64>) -> Result<MinimizerOutcome>;
}

/// The Levenberg-Marquardt optimizer.
#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardt {
    /// Configuration options
    config: LmConfig,
}

impl LevenbergMarquardt {
    /// Create a new Levenberg-Marquardt optimizer with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new Levenberg-Marquardt optimizer with the given configuration.
    pub fn with_config(config: LmConfig) -> Self {
        Self { config }
    }

    /// The configuration in use.
    pub fn config(&self) -> &LmConfig {
        &self.config
    }

    /// Set the convergence threshold on the relative cost change.
    pub fn with_convergence_threshold(mut self, threshold: f64) -> Self {
        self.config.ftol = threshold;
        self
    }

    /// Set the maximum number of iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    fn jacobian(&self, problem: &dyn Problem, params: &Array1<f64>) -> Result<ndarray::Array2<f64>> {
        match self.config.diff_method {
            DiffMethod::Analytical if problem.has_custom_jacobian() => problem.jacobian(params),
            _ => finite_difference::jacobian(problem, params, None),
        }
    }

    fn outcome(
        &self,
        params: Array1<f64>,
        cost: f64,
        iterations: usize,
        func_evals: usize,
        status: ConvergenceStatus,
        message: String,
    ) -> MinimizerOutcome {
        debug!(
            cost,
            iterations,
            func_evals,
            status = ?status,
            "levenberg-marquardt run finished: {}",
            message
        );
        MinimizerOutcome {
            params,
            cost,
            iterations,
            func_evals,
            status: status.minimizer_status(),
            message,
        }
    }
}

impl Minimizer for LevenbergMarquardt {
    /// Minimize the sum of squared residuals for the given problem.
    ///
    /// Each outer iteration evaluates the Jacobian once; the inner loop raises
    /// the damping until a step is accepted. A Jacobian column that vanishes
    /// relative to the others makes the normal equations singular and ends the
    /// run with `NumericalFailure`.
    fn minimize(&self, problem: &dyn Problem, initial_params: Array1<f64>) -> Result<MinimizerOutcome> {
        let n_params = problem.parameter_count();
        if initial_params.len() != n_params {
            return Err(FitError::DimensionMismatch(format!(
                "Expected {} parameters, got {}",
                n_params,
                initial_params.len()
            )));
        }

        let criteria = ConvergenceCriteria::new(
            self.config.xtol,
            self.config.ftol,
            self.config.gtol,
            self.config.max_iterations,
        );
        let mut trust_region = TrustRegion::from_config(&self.config);

        let mut params = initial_params;
        let mut residuals = problem.eval(&params)?;
        let mut cost: f64 = residuals.iter().map(|r| r.powi(2)).sum();
        let mut func_evals = 1;
        let mut iterations = 0;

        if !cost.is_finite() {
            return Ok(self.outcome(
                params,
                cost,
                iterations,
                func_evals,
                ConvergenceStatus::NumericalError,
                "Non-finite cost at the start point".to_string(),
            ));
        }

        loop {
            let jac = self.jacobian(problem, &params)?;
            func_evals += n_params;

            let j_t_j = jac.t().dot(&jac);
            let j_t_r = jac.t().dot(&residuals);
            let scale = j_t_j.diag().mapv(f64::sqrt);

            let max_scale = scale.iter().cloned().fold(0.0, f64::max);
            if !(max_scale > 0.0 && max_scale.is_finite()) {
                return Ok(self.outcome(
                    params,
                    cost,
                    iterations,
                    func_evals,
                    ConvergenceStatus::NumericalError,
                    "Singular Jacobian: residuals do not depend on any parameter".to_string(),
                ));
            }
            if let Some(col) = scale
                .iter()
                .position(|s| *s <= self.config.singular_column_ratio * max_scale)
            {
                return Ok(self.outcome(
                    params,
                    cost,
                    iterations,
                    func_evals,
                    ConvergenceStatus::NumericalError,
                    format!("Singular Jacobian: column {} vanishes", col),
                ));
            }

            // Largest cosine between the residual vector and a Jacobian column.
            let residual_norm = cost.sqrt();
            let gradient_norm = if residual_norm > 0.0 {
                j_t_r
                    .iter()
                    .zip(scale.iter())
                    .map(|(g, s)| (g / (s * residual_norm)).abs())
                    .fold(0.0, f64::max)
            } else {
                0.0
            };
            if gradient_norm <= self.config.gtol {
                return Ok(self.outcome(
                    params,
                    cost,
                    iterations,
                    func_evals,
                    ConvergenceStatus::GradientConvergence,
                    format!("Gradient convergence: {:.2e}", gradient_norm),
                ));
            }

            // Inner loop: raise the damping until a step is accepted.
            loop {
                if iterations >= self.config.max_iterations {
                    return Ok(self.outcome(
                        params,
                        cost,
                        iterations,
                        func_evals,
                        ConvergenceStatus::MaxIterationsReached,
                        format!("Maximum iterations ({}) reached", self.config.max_iterations),
                    ));
                }
                iterations += 1;

                let step = match LmStep::calculate_step(&j_t_j, &j_t_r, &scale, trust_region.lambda)
                {
                    Ok(step) => step,
                    Err(FitError::NumericalFailure(message)) => {
                        trust_region.update_lambda(f64::NEG_INFINITY);
                        if trust_region.is_saturated() {
                            return Ok(self.outcome(
                                params,
                                cost,
                                iterations,
                                func_evals,
                                ConvergenceStatus::NumericalError,
                                message,
                            ));
                        }
                        continue;
                    }
                    Err(e) => return Err(e),
                };

                let new_params = &params + &step.step;
                let new_residuals = problem.eval(&new_params)?;
                func_evals += 1;
                let new_cost: f64 = new_residuals.iter().map(|r| r.powi(2)).sum();

                let gain_ratio = TrustRegion::gain_ratio(cost, new_cost, step.predicted_reduction);
                if trust_region.update_lambda(gain_ratio) {
                    let mut status = criteria.check(
                        &params,
                        &new_params,
                        &scale,
                        cost,
                        new_cost,
                        gradient_norm,
                        iterations,
                    );
                    // A small cost change only counts when the quadratic model
                    // agreed with the step.
                    if status == ConvergenceStatus::FunctionValueConvergence
                        && gain_ratio < trust_region.good_gain_ratio
                    {
                        status = ConvergenceStatus::Running;
                    }

                    params = new_params;
                    residuals = new_residuals;
                    cost = new_cost;

                    if status.is_terminated() {
                        let message = status.description().to_string();
                        return Ok(self.outcome(
                            params, cost, iterations, func_evals, status, message,
                        ));
                    }
                    break;
                } else if trust_region.is_saturated() {
                    return Ok(self.outcome(
                        params,
                        cost,
                        iterations,
                        func_evals,
                        ConvergenceStatus::Stalled,
                        ConvergenceStatus::Stalled.description().to_string(),
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::FnProblem;
    use approx::assert_relative_eq;
    use ndarray::{array, Array2};

    /// A simple linear model for testing: f(x) = a * x + b
    struct LinearModel {
        x_data: Array1<f64>,
        y_data: Array1<f64>,
    }

    impl Problem for LinearModel {
        fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
            Ok(self.x_data.mapv(|x| params[0] * x + params[1]) - &self.y_data)
        }

        fn parameter_count(&self) -> usize {
            2
        }

        fn residual_count(&self) -> usize {
            self.x_data.len()
        }

        fn jacobian(&self, _params: &Array1<f64>) -> Result<Array2<f64>> {
            let n = self.x_data.len();
            let mut jac = Array2::zeros((n, 2));
            for i in 0..n {
                jac[[i, 0]] = self.x_data[i];
                jac[[i, 1]] = 1.0;
            }
            Ok(jac)
        }

        fn has_custom_jacobian(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_linear_fit() {
        let model = LinearModel {
            x_data: array![1.0, 2.0, 3.0, 4.0, 5.0],
            y_data: array![5.1, 7.0, 8.9, 11.2, 13.0],
        };

        let lm = LevenbergMarquardt::with_config(
            LmConfig::default().with_differentiation_method(DiffMethod::Analytical),
        );
        let result = lm.minimize(&model, array![1.0, 1.0]).unwrap();

        assert_eq!(result.status, MinimizerStatus::Converged);
        assert_relative_eq!(result.params[0], 2.0, epsilon = 0.1);
        assert_relative_eq!(result.params[1], 3.0, epsilon = 0.1);
        assert!(result.cost < 0.1);
    }

    #[test]
    fn test_exponential_decay_with_finite_differences() {
        let x = Array1::linspace(0.0, 4.0, 20);
        let y = x.mapv(|t: f64| 3.0 * (-1.3 * t).exp());
        let xs = x.clone();
        let problem = FnProblem::new(
            move |p: &Array1<f64>| Ok(xs.mapv(|t| p[0] * (-p[1] * t).exp()) - &y),
            2,
            20,
        );

        let result = LevenbergMarquardt::new()
            .minimize(&problem, array![1.0, 0.5])
            .unwrap();

        assert_eq!(result.status, MinimizerStatus::Converged);
        assert_relative_eq!(result.params[0], 3.0, max_relative = 1e-6);
        assert_relative_eq!(result.params[1], 1.3, max_relative = 1e-6);
        assert!(result.cost < 1e-12);
    }

    #[test]
    fn test_vanishing_column_is_numerical_failure() {
        // The second parameter never influences the residuals.
        let problem = FnProblem::new(|p: &Array1<f64>| Ok(array![p[0] - 1.0, p[0] + 1.0]), 2, 2);
        let result = LevenbergMarquardt::new()
            .minimize(&problem, array![0.3, 0.7])
            .unwrap();

        assert_eq!(result.status, MinimizerStatus::NumericalFailure);
        assert_eq!(result.params, array![0.3, 0.7]);
    }

    #[test]
    fn test_max_iterations() {
        let problem = FnProblem::new(
            |p: &Array1<f64>| Ok(array![10.0 * (p[1] - p[0] * p[0]), 1.0 - p[0]]),
            2,
            2,
        );
        let result = LevenbergMarquardt::new()
            .with_max_iterations(2)
            .minimize(&problem, array![-1.2, 1.0])
            .unwrap();

        assert_eq!(result.status, MinimizerStatus::MaxIterationsReached);
        assert!(result.iterations <= 2);
    }

    #[test]
    fn test_dimension_mismatch() {
        let problem = FnProblem::new(|p: &Array1<f64>| Ok(p.clone()), 2, 2);
        assert!(matches!(
            LevenbergMarquardt::new().minimize(&problem, array![1.0]),
            Err(FitError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn test_non_finite_start_is_numerical_failure() {
        let problem = FnProblem::new(|p: &Array1<f64>| Ok(p.mapv(|v| v.ln())), 1, 1);
        let result = LevenbergMarquardt::new()
            .minimize(&problem, array![-1.0])
            .unwrap();
        assert_eq!(result.status, MinimizerStatus::NumericalFailure);
    }
}
