//! Ball and cylinder.
//!
//! Model vector: `[S0, f_cyl, f_ball, d, θ, φ, R, d_ball]`, with the ball
//! diffusivity tied to the cylinder's. Starts from a ball-and-stick fit.

use std::sync::Arc;

use ndarray::{array, Array1};
use tracing::{debug, warn};

use super::start_point::{VoxelEstimate, DEFAULT_RADIUS};
use super::{check_sub_layout, BallStickFitter, CompartmentFitter, FitterConfig, FitterCore};
use crate::codec::ParameterCodec;
use crate::compartments::CompartmentKind;
use crate::error::Result;
use crate::lm::Minimizer;
use crate::scheme::AcquisitionScheme;

/// Fits a GPD cylinder and an isotropic ball sharing one diffusivity.
pub struct BallCylinderFitter {
    core: FitterCore,
    sub: Box<dyn CompartmentFitter>,
}

impl BallCylinderFitter {
    /// Create the fitter. The ball-and-stick sub-fit shares `config` except
    /// for any fixed start point.
    pub fn new(scheme: Arc<AcquisitionScheme>, config: FitterConfig) -> Result<Self> {
        let mut sub_config = config.clone();
        sub_config.fixed_start_point = None;
        let sub = BallStickFitter::new(scheme.clone(), sub_config)?;
        Self::with_sub_fitter(scheme, config, Box::new(sub))
    }

    /// Create the fitter around a caller-supplied ball-and-stick fitter,
    /// whose model vector must follow the `[S0, f1, f2, d, θ, φ, d_ball]`
    /// layout.
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
        check_sub_layout(sub.as_ref(), 7, 4)?;
        let codec = ParameterCodec::builder()
            .positive()
            .simplex(2)
            .positive()
            .orientation()
            .radius()
            .tied(3)
            .build()?;
        let core = FitterCore::new(
            vec![CompartmentKind::Cylinder, CompartmentKind::Ball],
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

    fn from_ball_stick(p: &Array1<f64>) -> Array1<f64> {
        array![p[0], p[1], p[2], p[3], p[4], p[5], DEFAULT_RADIUS, p[3]]
    }
}

impl CompartmentFitter for BallCylinderFitter {
    fn core(&self) -> &FitterCore {
        &self.core
    }

    fn heuristic_start_point(&self, measurements: &Array1<f64>) -> Result<Array1<f64>> {
        let e = VoxelEstimate::from_measurements(&self.core.scheme, measurements);
        Ok(array![
            e.s0,
            0.5,
            0.5,
            e.diffusivity,
            e.theta,
            e.phi,
            DEFAULT_RADIUS,
            e.diffusivity
        ])
    }

    /// The ball-and-stick fit with the default radius added. Falls back to
    /// the ball-and-stick heuristic when every sub-fit run fails.
    fn start_point(&self, measurements: &Array1<f64>) -> Result<Array1<f64>> {
        let sub = self.sub.fit(measurements)?;
        let params = if sub.is_failure() {
            warn!("ball-stick fit failed; starting from its heuristic");
            self.sub.heuristic_start_point(measurements)?
        } else {
            sub.params
        };
        debug!(start = ?params, "ball-cylinder start point from ball-stick");
        Ok(Self::from_ball_stick(&params))
    }
}
