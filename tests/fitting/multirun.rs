//! Multi-run selection with failing runs.

use std::sync::Arc;

use compartment_fit::error::{FitError, Result};
use compartment_fit::lm::{Minimizer, MinimizerOutcome, MinimizerStatus};
use compartment_fit::multirun::{best_of, MultiRunMinimizer};
use compartment_fit::problem::{FnProblem, Problem};
use ndarray::{array, Array1};

/// Replays a fixed outcome per run; the run index is the first start
/// coordinate.
struct ScriptedMinimizer {
    script: Vec<Option<(f64, MinimizerStatus)>>,
}

impl Minimizer for ScriptedMinimizer {
    fn minimize(&self, _problem: &dyn Problem, start: Array1<f64>) -> Result<MinimizerOutcome> {
        match self.script[start[0] as usize] {
            Some((cost, status)) => Ok(MinimizerOutcome {
                params: start,
                cost,
                iterations: 10,
                func_evals: 20,
                status,
                message: String::new(),
            }),
            None => Err(FitError::NumericalFailure("scripted failure".to_string())),
        }
    }
}

fn dummy_problem() -> impl Problem {
    FnProblem::new(|p: &Array1<f64>| Ok(p.clone()), 1, 1)
}

fn starts(n: usize) -> Vec<Array1<f64>> {
    (0..n).map(|i| array![i as f64]).collect()
}

#[test]
fn partial_failure_keeps_best_remaining_run() {
    let minimizer = ScriptedMinimizer {
        script: vec![
            Some((0.8, MinimizerStatus::Converged)),
            None,
            Some((0.3, MinimizerStatus::MaxIterationsReached)),
            Some((0.01, MinimizerStatus::NumericalFailure)),
            Some((0.5, MinimizerStatus::Converged)),
        ],
    };
    let multi = MultiRunMinimizer::new(Arc::new(minimizer), 5);
    let outcomes = multi.fit_multiple(&dummy_problem(), starts(5)).unwrap();

    assert_eq!(outcomes.len(), 5);
    let failed = outcomes.iter().filter(|o| !o.status.is_usable()).count();
    assert_eq!(failed, 2);

    let best = best_of(outcomes).unwrap();
    assert_eq!(best.cost, 0.3);
    assert_eq!(best.params, array![2.0]);
}

#[test]
fn every_run_failing_is_reported() {
    let minimizer = ScriptedMinimizer {
        script: vec![None, Some((0.2, MinimizerStatus::NumericalFailure)), None],
    };
    let multi = MultiRunMinimizer::new(Arc::new(minimizer), 3);
    let outcomes = multi.fit_multiple(&dummy_problem(), starts(3)).unwrap();

    assert!(matches!(best_of(outcomes), Err(FitError::AllRunsFailed { runs: 3 })));
}
