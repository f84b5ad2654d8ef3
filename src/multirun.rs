//! Multi-run minimization.
//!
//! Runs the same problem from several start points and keeps the best
//! outcome. One failing run never stops the others: errors and numerical
//! breakdowns are recorded as failed outcomes and skipped when ranking.

use std::sync::Arc;

use ndarray::Array1;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tracing::{debug, warn};

use crate::error::{FitError, Result};
use crate::lm::{Minimizer, MinimizerOutcome, MinimizerStatus};
use crate::problem::Problem;

/// Repeats a minimization from several starts.
#[derive(Clone)]
pub struct MultiRunMinimizer {
    minimizer: Arc<dyn Minimizer>,
    runs: usize,
    seed: u64,
    perturbation: f64,
}

impl MultiRunMinimizer {
    /// Create a multi-run driver around `minimizer`. At least one run is
    /// always made.
    pub fn new(minimizer: Arc<dyn Minimizer>, runs: usize) -> Self {
        Self {
            minimizer,
            runs: runs.max(1),
            seed: 0,
            perturbation: 0.5,
        }
    }

    /// Seed for the start point perturbations.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Standard deviation (radians) of the angle perturbations.
    pub fn with_perturbation(mut self, perturbation: f64) -> Self {
        self.perturbation = perturbation;
        self
    }

    pub fn runs(&self) -> usize {
        self.runs
    }

    /// Candidate starts derived from `start`.
    ///
    /// The first candidate is `start` itself. The others add normal noise to
    /// the coordinates listed in `angles`; every other coordinate is kept.
    pub fn candidate_starts(&self, start: &Array1<f64>, angles: &[usize]) -> Vec<Array1<f64>> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let noise = Normal::new(0.0, self.perturbation.abs()).ok();

        let mut starts = Vec::with_capacity(self.runs);
        starts.push(start.clone());
        for _ in 1..self.runs {
            let mut candidate = start.clone();
            let len = candidate.len();
            if let Some(noise) = &noise {
                for &i in angles.iter().filter(|&&i| i < len) {
                    candidate[i] += noise.sample(&mut rng);
                }
            }
            starts.push(candidate);
        }
        starts
    }

    /// Minimize from every start. The result has one outcome per start, in
    /// order; a run that returned a recoverable error shows up as
    /// `NumericalFailure` with infinite cost at its start point.
    ///
    /// # Errors
    ///
    /// The first unrecoverable error (a malformed problem rather than a bad
    /// start) stops the remaining runs and is returned.
    pub fn fit_multiple(&self, problem: &dyn Problem, starts: Vec<Array1<f64>>) -> Result<Vec<MinimizerOutcome>> {
        starts
            .into_iter()
            .enumerate()
            .map(|(run, start)| match self.minimizer.minimize(problem, start.clone()) {
                Ok(outcome) => {
                    debug!(run, cost = outcome.cost, status = ?outcome.status, "run finished");
                    Ok(outcome)
                }
                Err(e) if e.is_recoverable() => {
                    warn!(run, error = %e, "run failed");
                    Ok(MinimizerOutcome {
                        params: start,
                        cost: f64::INFINITY,
                        iterations: 0,
                        func_evals: 0,
                        status: MinimizerStatus::NumericalFailure,
                        message: e.to_string(),
                    })
                }
                Err(e) => Err(e),
            })
            .collect()
    }

    /// Generate candidate starts, minimize from each, and keep the best.
    pub fn minimize(&self, problem: &dyn Problem, start: &Array1<f64>, angles: &[usize]) -> Result<MinimizerOutcome> {
        let outcomes = self.fit_multiple(problem, self.candidate_starts(start, angles))?;
        best_of(outcomes)
    }
}

/// The outcome with the lowest cost among runs that did not fail
/// numerically. Ties go to the earliest run.
///
/// # Errors
///
/// `AllRunsFailed` if no run is usable.
pub fn best_of(outcomes: Vec<MinimizerOutcome>) -> Result<MinimizerOutcome> {
    let runs = outcomes.len();
    let mut best: Option<MinimizerOutcome> = None;
    for outcome in outcomes {
        if !outcome.status.is_usable() || outcome.cost.is_nan() {
            continue;
        }
        match &best {
            Some(b) if b.cost <= outcome.cost => {}
            _ => best = Some(outcome),
        }
    }
    best.ok_or(FitError::AllRunsFailed { runs })
}
