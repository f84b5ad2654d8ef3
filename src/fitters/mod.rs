//! Compartment fitters.
//!
//! A fitter owns everything needed to fit one model to many voxels: the
//! compartment layout, the codec, the acquisition scheme, the minimizer and
//! an explicit [`FitterConfig`]. Fitting a voxel runs
//! start point → encode → minimize (single or multi-run) → decode.
//!
//! Complex models get their start point from a simpler model's fit. Each
//! fitter holds its simpler fitter by composition through the
//! [`CompartmentFitter`] trait.

pub mod ball_cylinder;
pub mod ball_cylinder_dot;
pub mod ball_stick;
pub mod objective;
pub mod start_point;

pub use ball_cylinder::BallCylinderFitter;
pub use ball_cylinder_dot::BallCylinderDotFitter;
pub use ball_stick::BallStickFitter;
pub use objective::CompartmentProblem;

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::codec::ParameterCodec;
use crate::compartments::{CompartmentKind, CompartmentModel};
use crate::error::{FitError, Result};
use crate::lm::{LevenbergMarquardt, LmConfig, Minimizer, MinimizerStatus};
use crate::multirun::MultiRunMinimizer;
use crate::noise::NoiseModel;
use crate::problem::Problem;
use crate::scheme::AcquisitionScheme;

/// Outcome of fitting one voxel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    /// Fitted model parameters.
    #[serde(with = "array_serde")]
    pub params: Array1<f64>,

    /// The optimization-space vector the minimizer returned.
    #[serde(with = "array_serde")]
    pub opt_params: Array1<f64>,

    /// Sum of squared residuals at `params`.
    pub objective: f64,

    pub status: MinimizerStatus,

    pub iterations: usize,
}

impl FitResult {
    /// Placeholder for a voxel that could not be processed at all.
    pub fn failed(num_model_params: usize, num_opt_params: usize) -> Self {
        Self {
            params: Array1::zeros(num_model_params),
            opt_params: Array1::zeros(num_opt_params),
            objective: f64::INFINITY,
            status: MinimizerStatus::NumericalFailure,
            iterations: 0,
        }
    }

    pub fn is_failure(&self) -> bool {
        !self.status.is_usable()
    }
}

/// Settings shared by every voxel a fitter processes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitterConfig {
    pub noise: NoiseModel,

    /// Optimization runs per voxel; 1 means a single run.
    pub runs: usize,

    /// Seed for multi-run start point perturbation.
    pub seed: u64,

    /// Standard deviation (radians) of the angle perturbations between runs.
    pub perturbation: f64,

    /// Solver settings.
    pub lm: LmConfig,

    /// Start point used verbatim for every voxel instead of estimating one.
    pub fixed_start_point: Option<Vec<f64>>,
}

impl Default for FitterConfig {
    fn default() -> Self {
        Self {
            noise: NoiseModel::Gaussian,
            runs: 1,
            seed: 0,
            perturbation: 0.5,
            lm: LmConfig::default(),
            fixed_start_point: None,
        }
    }
}

impl FitterConfig {
    /// Load a configuration from a JSON file. Missing fields take their
    /// defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn with_noise(mut self, noise: NoiseModel) -> Self {
        self.noise = noise;
        self
    }

    pub fn with_runs(mut self, runs: usize) -> Self {
        self.runs = runs;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_perturbation(mut self, perturbation: f64) -> Self {
        self.perturbation = perturbation;
        self
    }

    pub fn with_lm(mut self, lm: LmConfig) -> Self {
        self.lm = lm;
        self
    }

    pub fn with_fixed_start_point(mut self, start: Vec<f64>) -> Self {
        self.fixed_start_point = Some(start);
        self
    }
}

/// A fitter for one compartment model.
pub trait CompartmentFitter: Send + Sync {
    /// Shared state: layout, codec, scheme, config, minimizer.
    fn core(&self) -> &FitterCore;

    /// Start point estimated from the data alone, without any fitting.
    fn heuristic_start_point(&self, measurements: &Array1<f64>) -> Result<Array1<f64>>;

    /// Start point for the main optimization. Defaults to the heuristic.
    fn start_point(&self, measurements: &Array1<f64>) -> Result<Array1<f64>> {
        self.heuristic_start_point(measurements)
    }

    /// Fit one voxel.
    ///
    /// A minimizer failure is reported through [`FitResult::status`]; only
    /// malformed input or configuration is an error.
    fn fit(&self, measurements: &Array1<f64>) -> Result<FitResult> {
        let core = self.core();
        core.check_measurements(measurements)?;
        let start = match &core.config.fixed_start_point {
            Some(fixed) => Array1::from_vec(fixed.clone()),
            None => self.start_point(measurements)?,
        };
        core.fit_from(measurements, &start)
    }

    fn codec(&self) -> &ParameterCodec {
        &self.core().codec
    }

    fn kinds(&self) -> &[CompartmentKind] {
        &self.core().kinds
    }

    /// The model with the parameters of the latest fit.
    fn model(&self) -> CompartmentModel {
        self.core().model()
    }

    fn scheme(&self) -> &AcquisitionScheme {
        &self.core().scheme
    }

    fn config(&self) -> &FitterConfig {
        &self.core().config
    }
}

/// State and the optimization step every fitter shares.
///
/// The core owns the fitter's [`CompartmentModel`]; its vector is replaced
/// wholesale with the decoded result after each fit.
pub struct FitterCore {
    kinds: Vec<CompartmentKind>,
    model: Mutex<CompartmentModel>,
    codec: ParameterCodec,
    scheme: Arc<AcquisitionScheme>,
    config: FitterConfig,
    minimizer: Arc<dyn Minimizer>,
}

impl Clone for FitterCore {
    fn clone(&self) -> Self {
        Self {
            kinds: self.kinds.clone(),
            model: Mutex::new(self.model()),
            codec: self.codec.clone(),
            scheme: self.scheme.clone(),
            config: self.config.clone(),
            minimizer: self.minimizer.clone(),
        }
    }
}

impl FitterCore {
    /// Assemble a fitter core.
    ///
    /// # Errors
    ///
    /// `Configuration` if the codec does not cover the compartment layout or
    /// the fixed start point has the wrong length.
    pub fn new(
        kinds: Vec<CompartmentKind>,
        codec: ParameterCodec,
        scheme: Arc<AcquisitionScheme>,
        config: FitterConfig,
    ) -> Result<Self> {
        let expected = CompartmentModel::expected_len(&kinds);
        if codec.num_model_params() != expected {
            return Err(FitError::Configuration(format!(
                "codec maps {} model parameters, compartments need {}",
                codec.num_model_params(),
                expected
            )));
        }
        let initial = match &config.fixed_start_point {
            Some(fixed) => Array1::from_vec(fixed.clone()),
            None => Array1::zeros(expected),
        };
        let model = CompartmentModel::new(kinds.clone(), initial)?;
        let minimizer: Arc<dyn Minimizer> = Arc::new(LevenbergMarquardt::with_config(config.lm.clone()));

        Ok(Self {
            kinds,
            model: Mutex::new(model),
            codec,
            scheme,
            config,
            minimizer,
        })
    }

    /// Replace the minimizer.
    pub fn with_minimizer(mut self, minimizer: Arc<dyn Minimizer>) -> Self {
        self.minimizer = minimizer;
        self
    }

    pub fn codec(&self) -> &ParameterCodec {
        &self.codec
    }

    pub fn scheme(&self) -> &Arc<AcquisitionScheme> {
        &self.scheme
    }

    pub fn config(&self) -> &FitterConfig {
        &self.config
    }

    pub fn minimizer(&self) -> &Arc<dyn Minimizer> {
        &self.minimizer
    }

    /// Snapshot of the model as left by the latest fit.
    pub fn model(&self) -> CompartmentModel {
        self.lock_model().clone()
    }

    fn lock_model(&self) -> MutexGuard<'_, CompartmentModel> {
        // A panic mid-update cannot leave a half-written vector behind.
        self.model.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_measurements(&self, measurements: &Array1<f64>) -> Result<()> {
        if measurements.len() != self.scheme.len() {
            return Err(FitError::DimensionMismatch(format!(
                "scheme has {} measurements, voxel has {}",
                self.scheme.len(),
                measurements.len()
            )));
        }
        if measurements.iter().any(|v| !v.is_finite()) {
            return Err(FitError::InvalidInput(
                "voxel contains non-finite measurements".to_string(),
            ));
        }
        Ok(())
    }

    /// Encode `start`, minimize, decode the winner, and store it as the
    /// model's vector.
    ///
    /// When every run fails numerically the result carries the start point
    /// and a `NumericalFailure` status.
    pub fn fit_from(&self, measurements: &Array1<f64>, start: &Array1<f64>) -> Result<FitResult> {
        let opt_start = {
            let mut model = self.lock_model();
            model.set_params(start.clone())?;
            self.codec.encode(model.params())?
        };

        let problem = CompartmentProblem::new(
            &self.codec,
            &self.kinds,
            &self.scheme,
            measurements,
            self.config.noise,
        );

        let multi = MultiRunMinimizer::new(self.minimizer.clone(), self.config.runs)
            .with_seed(self.config.seed)
            .with_perturbation(self.config.perturbation);

        let result = match multi.minimize(&problem, &opt_start, &self.perturbed_indices()) {
            Ok(best) => {
                let params = start_point::canonicalise(&self.codec, self.codec.decode(&best.params)?);
                FitResult {
                    params,
                    opt_params: best.params,
                    objective: best.cost,
                    status: best.status,
                    iterations: best.iterations,
                }
            }
            Err(FitError::AllRunsFailed { runs }) => {
                warn!(runs, "every optimization run failed; reporting the start point");
                let objective = problem.eval_cost(&opt_start).unwrap_or(f64::INFINITY);
                FitResult {
                    params: self.codec.decode(&opt_start)?,
                    opt_params: opt_start,
                    objective,
                    status: MinimizerStatus::NumericalFailure,
                    iterations: 0,
                }
            }
            Err(e) => return Err(e),
        };

        self.lock_model().set_params(result.params.clone())?;
        Ok(result)
    }

    /// Optimization coordinates jittered between runs: orientation and
    /// simplex angles.
    fn perturbed_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.codec.simplex_opt_ranges().into_iter().flatten().collect();
        if let Some(theta) = self.codec.orientation_opt_index() {
            indices.extend([theta, theta + 1]);
        }
        debug!(?indices, "multi-run perturbation targets");
        indices
    }
}

/// Rejects a sub-fitter whose model vector does not have the layout its
/// parent copies a start point from.
pub(crate) fn check_sub_layout(
    sub: &dyn CompartmentFitter,
    model_params: usize,
    orientation_index: usize,
) -> Result<()> {
    let codec = sub.codec();
    if codec.num_model_params() != model_params || codec.orientation_index() != Some(orientation_index) {
        return Err(FitError::Configuration(format!(
            "sub-fitter layout has {} parameters with orientation at {:?}; expected {} with orientation at {}",
            codec.num_model_params(),
            codec.orientation_index(),
            model_params,
            orientation_index
        )));
    }
    Ok(())
}

/// Serialises `Array1<f64>` as a plain JSON array.
mod array_serde {
    use ndarray::Array1;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Array1<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(value.iter())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Array1<f64>, D::Error> {
        Ok(Array1::from_vec(Vec::<f64>::deserialize(deserializer)?))
    }
}
