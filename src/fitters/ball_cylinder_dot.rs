//! Ball, cylinder and dot.
//!
//! Model vector: `[S0, f_cyl, f_ball, f_dot, d, θ, φ, R, d_ball]`, with the
//! ball diffusivity tied to the cylinder's. Starts from a three-run
//! ball-and-cylinder fit with a small dot fraction carved out of the other
//! two.

use std::sync::Arc;

use ndarray::{array, Array1};
use tracing::{debug, warn};

use super::start_point::{extend_fractions, VoxelEstimate, DEFAULT_RADIUS};
use super::{check_sub_layout, BallCylinderFitter, CompartmentFitter, FitterConfig, FitterCore};
use crate::codec::ParameterCodec;
use crate::compartments::CompartmentKind;
use crate::error::Result;
use crate::lm::{LmConfig, Minimizer};
use crate::scheme::AcquisitionScheme;

/// Runs of the ball-and-cylinder fit that seeds each voxel.
pub const SUB_FIT_RUNS: usize = 3;

/// Seed of the ball-and-cylinder sub-fit.
pub const SUB_FIT_SEED: u64 = 0;

/// Fits a GPD cylinder, an isotropic ball and a stationary dot.
pub struct BallCylinderDotFitter {
    core: FitterCore,
    sub: Box<dyn CompartmentFitter>,
}

impl BallCylinderDotFitter {
    /// Solver settings of the full fit: cost threshold 1e-8, at most 5000
    /// iterations.
    pub fn default_lm_config() -> LmConfig {
        LmConfig::default()
            .with_convergence_threshold(1e-8)
            .with_max_iterations(5000)
    }

    /// Default configuration with [`Self::default_lm_config`].
    pub fn default_config() -> FitterConfig {
        FitterConfig::default().with_lm(Self::default_lm_config())
    }

    /// Create the fitter. The ball-and-cylinder sub-fit uses the noise model
    /// and solver settings of `config` with three runs and seed 0.
    pub fn new(scheme: Arc<AcquisitionScheme>, config: FitterConfig) -> Result<Self> {
        let mut sub_config = config.clone().with_runs(SUB_FIT_RUNS).with_seed(SUB_FIT_SEED);
        sub_config.fixed_start_point = None;
        let sub = BallCylinderFitter::new(scheme.clone(), sub_config)?;
        Self::with_sub_fitter(scheme, config, Box::new(sub))
    }

    /// Create the fitter around a caller-supplied ball-and-cylinder fitter,
    /// whose model vector must follow the
    /// `[S0, f_cyl, f_ball, d, θ, φ, R, d_ball]` layout.
    ///
    /// # Errors
    ///
    /// `Configuration` if `sub` has a different parameter count or
    /// orientation position.
    pub fn with_sub_fitter(
        scheme: Arc<AcquisitionScheme>,
        config: FitterConfig,
        sub: Box<dyn CompartmentFitter>,
    ) -> Result<Self> {
        check_sub_layout(sub.as_ref(), 8, 4)?;
        let codec = ParameterCodec::builder()
            .positive()
            .simplex(3)
            .positive()
            .orientation()
            .radius()
            .tied(4)
            .build()?;
        let core = FitterCore::new(
            vec![
                CompartmentKind::Cylinder,
                CompartmentKind::Ball,
                CompartmentKind::Dot,
            ],
            codec,
            scheme,
            config,
        )?;
        Ok(Self { core, sub })
    }

    /// Drive the main fit with another minimizer. The sub-fit keeps its own.
    pub fn with_minimizer(mut self, minimizer: Arc<dyn Minimizer>) -> Self {
        self.core = self.core.with_minimizer(minimizer);
        self
    }

    /// Extend a ball-and-cylinder vector with the dot compartment.
    pub fn from_ball_cylinder(p: &Array1<f64>) -> Array1<f64> {
        let f = extend_fractions(&[p[1], p[2]]);
        array![p[0], f[0], f[1], f[2], p[3], p[4], p[5], p[6], p[3]]
    }
}

impl CompartmentFitter for BallCylinderDotFitter {
    fn core(&self) -> &FitterCore {
        &self.core
    }

    fn heuristic_start_point(&self, measurements: &Array1<f64>) -> Result<Array1<f64>> {
        let e = VoxelEstimate::from_measurements(&self.core.scheme, measurements);
        let f = extend_fractions(&[0.5, 0.5]);
        Ok(array![
            e.s0,
            f[0],
            f[1],
            f[2],
            e.diffusivity,
            e.theta,
            e.phi,
            DEFAULT_RADIUS,
            e.diffusivity
        ])
    }

    /// The ball-and-cylinder fit with a dot fraction of 1e-4. Falls back to
    /// the ball-and-cylinder heuristic when every sub-fit run fails.
    fn start_point(&self, measurements: &Array1<f64>) -> Result<Array1<f64>> {
        let sub = self.sub.fit(measurements)?;
        let params = if sub.is_failure() {
            warn!("ball-cylinder fit failed; starting from its heuristic");
            self.sub.heuristic_start_point(measurements)?
        } else {
            sub.params
        };
        debug!(start = ?params, "ball-cylinder-dot start point from ball-cylinder");
        Ok(Self::from_ball_cylinder(&params))
    }
}
