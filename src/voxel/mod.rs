//! Batch fitting over many voxels.
//!
//! Voxels are independent: a voxel that cannot be fitted is logged, written
//! as a failed result, and processing moves on. Only reading the source and
//! writing the sink can stop a batch.

pub mod source;

pub use source::{BinaryVoxelSource, ByteOrder, InMemorySource, Precision, VoxelSource};

use ndarray::Array1;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::error::{FitError, Result};
use crate::fitters::{CompartmentFitter, FitResult};
use crate::io::ResultSink;
use crate::lm::MinimizerStatus;

/// Per-status counts of a finished batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub voxels: usize,
    pub converged: usize,
    pub max_iterations: usize,
    pub failed: usize,
}

impl BatchSummary {
    fn record(&mut self, result: &FitResult) {
        self.voxels += 1;
        match result.status {
            MinimizerStatus::Converged => self.converged += 1,
            MinimizerStatus::MaxIterationsReached => self.max_iterations += 1,
            MinimizerStatus::NumericalFailure => self.failed += 1,
        }
    }
}

/// Fit one voxel, turning any error into a failed result.
fn fit_one<F: CompartmentFitter + ?Sized>(fitter: &F, index: usize, voxel: &Array1<f64>) -> FitResult {
    match fitter.fit(voxel) {
        Ok(result) => result,
        Err(e) => {
            let e = FitError::VoxelProcessing {
                index,
                reason: e.to_string(),
            };
            warn!(error = %e, "voxel skipped");
            let codec = fitter.codec();
            FitResult::failed(codec.num_model_params(), codec.num_opt_params())
        }
    }
}

/// Fit every voxel of `source` in order, writing each result to `sink`.
pub fn fit_voxels<F, S>(fitter: &F, source: &mut dyn VoxelSource, sink: &mut S) -> Result<BatchSummary>
where
    F: CompartmentFitter + ?Sized,
    S: ResultSink + ?Sized,
{
    let mut summary = BatchSummary::default();
    let mut index = 0;
    while source.has_next() {
        let voxel = source.next_voxel()?;
        let result = fit_one(fitter, index, &voxel);
        summary.record(&result);
        sink.write_result(index, &result)?;
        index += 1;
    }
    sink.flush()?;

    info!(
        voxels = summary.voxels,
        converged = summary.converged,
        failed = summary.failed,
        "batch finished"
    );
    Ok(summary)
}

/// Fit `voxels` on the rayon pool, one fitter per worker built by `build`.
///
/// Results come back in voxel order.
///
/// # Errors
///
/// The first error `build` returns.
pub fn fit_voxels_parallel<F, B>(voxels: &[Array1<f64>], build: B) -> Result<Vec<FitResult>>
where
    F: CompartmentFitter,
    B: Fn() -> Result<F> + Sync + Send,
{
    let results = voxels
        .par_iter()
        .enumerate()
        .map_init(&build, |fitter, (index, voxel)| match fitter {
            Ok(fitter) => Ok(fit_one(&*fitter, index, voxel)),
            Err(e) => Err(FitError::Configuration(format!("fitter construction failed: {}", e))),
        })
        .collect::<Result<Vec<_>>>()?;

    let failed = results.iter().filter(|r| r.is_failure()).count();
    info!(voxels = results.len(), failed, "parallel batch finished");
    Ok(results)
}
