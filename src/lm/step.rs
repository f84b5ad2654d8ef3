//! Step calculation for the Levenberg-Marquardt algorithm.
//!
//! The damped normal equations `(JᵀJ + λ·diag(JᵀJ)) δ = −Jᵀr` are solved in
//! Jacobi-scaled form with faer's Cholesky (LLᵀ) solver.

use faer::linalg::solvers::{Llt, Solve};
use faer::{Mat, Side};
use ndarray::{Array1, Array2};

use crate::error::{FitError, Result};
use crate::utils::matrix_convert::{faer_vec_to_ndarray, ndarray_to_faer, ndarray_vec_to_faer};

/// Result of a Levenberg-Marquardt step calculation.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// The calculated step vector
    pub step: Array1<f64>,

    /// The predicted reduction in cost function value
    pub predicted_reduction: f64,

    /// The damping parameter used to calculate the step
    pub lambda: f64,
}

/// Handles step calculation for the Levenberg-Marquardt algorithm.
pub struct LmStep;

impl LmStep {
    /// Calculates the Levenberg-Marquardt step.
    ///
    /// # Arguments
    ///
    /// * `j_t_j` - The JᵀJ matrix at the current position
    /// * `j_t_r` - The Jᵀr vector at the current position
    /// * `scale` - `sqrt(diag(JᵀJ))`, all strictly positive
    /// * `lambda` - The damping parameter
    ///
    /// # Returns
    ///
    /// * The step, or `NumericalFailure` if the damped system is not
    ///   positive definite
    pub fn calculate_step(
        j_t_j: &Array2<f64>,
        j_t_r: &Array1<f64>,
        scale: &Array1<f64>,
        lambda: f64,
    ) -> Result<StepResult> {
        let n = j_t_r.len();

        // Scaled system: the diagonal of the scaled JᵀJ is exactly one, so the
        // Marquardt damping becomes λ·I.
        let mut scaled = j_t_j.clone();
        for i in 0..n {
            for j in 0..n {
                scaled[[i, j]] /= scale[i] * scale[j];
            }
            scaled[[i, i]] += lambda;
        }
        let a = ndarray_to_faer(&scaled);
        let b = ndarray_vec_to_faer(&-(j_t_r / scale));

        let y = cholesky_solve(&a, &b)?;
        let step = faer_vec_to_ndarray(&y) / scale;

        let predicted_reduction = Self::predicted_reduction(j_t_j, j_t_r, &step);

        Ok(StepResult {
            step,
            predicted_reduction,
            lambda,
        })
    }

    /// Reduction in `Σr²` predicted by the linearised model for `step`.
    fn predicted_reduction(j_t_j: &Array2<f64>, j_t_r: &Array1<f64>, step: &Array1<f64>) -> f64 {
        -2.0 * step.dot(j_t_r) - step.dot(&j_t_j.dot(step))
    }
}

/// Solves `a x = b` for symmetric positive definite `a`.
fn cholesky_solve(a: &Mat<f64>, b: &Mat<f64>) -> Result<Mat<f64>> {
    let llt = Llt::new(a.as_ref(), Side::Lower)
        .map_err(|e| FitError::NumericalFailure(format!("normal equations not positive definite: {:?}", e)))?;

    let mut x = b.clone();
    llt.solve_in_place(x.as_mut());
    if (0..x.nrows()).any(|i| !x[(i, 0)].is_finite()) {
        return Err(FitError::NumericalFailure("non-finite step from normal equations".to_string()));
    }
    Ok(x)
}
