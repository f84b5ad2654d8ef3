//! Noise models turning predicted and measured signal into residuals.

use ndarray::{Array1, Zip};
use serde::{Deserialize, Serialize};

/// How measurement noise enters the least-squares residual.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NoiseModel {
    /// Additive Gaussian noise: `predicted − measured`.
    #[default]
    Gaussian,

    /// Rician magnitude noise with standard deviation `sigma`, using the
    /// second-moment bias correction `sqrt(predicted² + 2σ²) − measured`.
    Rician { sigma: f64 },
}

impl NoiseModel {
    /// Residual of a single measurement.
    pub fn residual(&self, predicted: f64, measured: f64) -> f64 {
        match *self {
            NoiseModel::Gaussian => predicted - measured,
            NoiseModel::Rician { sigma } => {
                (predicted * predicted + 2.0 * sigma * sigma).sqrt() - measured
            }
        }
    }

    /// Residuals of a whole voxel.
    pub fn residuals(&self, predicted: &Array1<f64>, measured: &Array1<f64>) -> Array1<f64> {
        Zip::from(predicted)
            .and(measured)
            .map_collect(|&p, &m| self.residual(p, m))
    }
}
