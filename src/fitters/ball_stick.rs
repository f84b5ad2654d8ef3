//! Ball and stick: the simplest fitter of the hierarchy.
//!
//! Model vector: `[S0, f_stick, f_ball, d, θ, φ, d_ball]`, with the ball
//! diffusivity tied to the stick's.

use std::sync::Arc;

use ndarray::{array, Array1};

use super::start_point::VoxelEstimate;
use super::{CompartmentFitter, FitterConfig, FitterCore};
use crate::codec::ParameterCodec;
use crate::compartments::CompartmentKind;
use crate::error::Result;
use crate::lm::Minimizer;
use crate::scheme::AcquisitionScheme;

/// Fits a stick and an isotropic ball sharing one diffusivity.
#[derive(Clone)]
pub struct BallStickFitter {
    core: FitterCore,
}

impl BallStickFitter {
    pub fn new(scheme: Arc<AcquisitionScheme>, config: FitterConfig) -> Result<Self> {
        let codec = ParameterCodec::builder()
            .positive()
            .simplex(2)
            .positive()
            .orientation()
            .tied(3)
            .build()?;
        let core = FitterCore::new(
            vec![CompartmentKind::Stick, CompartmentKind::Ball],
            codec,
            scheme,
            config,
        )?;
        Ok(Self { core })
    }

    /// Drive the fits with another minimizer.
    pub fn with_minimizer(mut self, minimizer: Arc<dyn Minimizer>) -> Self {
        self.core = self.core.with_minimizer(minimizer);
        self
    }
}

impl CompartmentFitter for BallStickFitter {
    fn core(&self) -> &FitterCore {
        &self.core
    }

    /// Equal fractions, the most attenuated direction as the fibre, and the
    /// apparent diffusivity for both compartments.
    fn heuristic_start_point(&self, measurements: &Array1<f64>) -> Result<Array1<f64>> {
        let e = VoxelEstimate::from_measurements(&self.core.scheme, measurements);
        Ok(array![e.s0, 0.5, 0.5, e.diffusivity, e.theta, e.phi, e.diffusivity])
    }
}
